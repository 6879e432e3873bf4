//! Runtime value layout and lifecycle for element types.
//!
//! Callers hand the executor untyped buffers, so everything the boxed-call
//! path does with a value (size it, clone it into a call-frame, move it back
//! out) goes through this type-erased interface.

use std::any::TypeId;
use std::marker::PhantomData;
use std::ptr;

pub trait ValueTypeInfo: Send + Sync {
    /// Size of one element in bytes, including trailing padding.
    fn size(&self) -> usize;

    fn alignment(&self) -> usize;

    /// Identity of the Rust type stored at these addresses.
    fn value_type_id(&self) -> TypeId;

    fn value_type_name(&self) -> &'static str;

    /// Clone the value at `src` into uninitialized memory at `dst`.
    ///
    /// # Safety
    /// `src` must point to a valid, aligned value of this type and `dst` to
    /// aligned, writable, uninitialized storage for one.
    unsafe fn copy_to_uninitialized(&self, src: *const u8, dst: *mut u8);

    /// Move the value at `src` into `dst`, dropping the value `dst` held.
    /// `src` is left logically uninitialized.
    ///
    /// # Safety
    /// Both pointers must reference valid, aligned values of this type and
    /// must not overlap.
    unsafe fn relocate_to_initialized(&self, src: *mut u8, dst: *mut u8);

    /// # Safety
    /// `ptr` must reference a valid value that is not used afterwards.
    unsafe fn destruct(&self, ptr: *mut u8);
}

/// [`ValueTypeInfo`] for a concrete Rust type.
pub struct TypedValueInfo<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedValueInfo<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedValueInfo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TypedValueInfo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypedValueInfo<{}>", std::any::type_name::<T>())
    }
}

impl<T: Clone + Send + Sync + 'static> ValueTypeInfo for TypedValueInfo<T> {
    fn size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn alignment(&self) -> usize {
        std::mem::align_of::<T>()
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    unsafe fn copy_to_uninitialized(&self, src: *const u8, dst: *mut u8) {
        unsafe {
            let value = (*src.cast::<T>()).clone();
            ptr::write(dst.cast::<T>(), value);
        }
    }

    unsafe fn relocate_to_initialized(&self, src: *mut u8, dst: *mut u8) {
        unsafe {
            let value = ptr::read(src.cast::<T>());
            *dst.cast::<T>() = value;
        }
    }

    unsafe fn destruct(&self, ptr: *mut u8) {
        unsafe { ptr::drop_in_place(ptr.cast::<T>()) }
    }
}
