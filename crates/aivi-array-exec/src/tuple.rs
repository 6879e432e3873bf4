//! Call-frames for the boxed calling convention.
//!
//! A [`Tuple`] holds one value per slot of a [`TupleMeta`] layout in a single
//! allocation and tracks which slots are occupied, so the same frame can be
//! filled and drained once per index without leaking or double-dropping.

use std::alloc::{self, Layout};
use std::any::TypeId;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::types::SharedType;
use crate::value_info::ValueTypeInfo;

/// Slot layout shared by every frame built for the same type list.
pub struct TupleMeta {
    types: Vec<SharedType>,
    offsets: Vec<usize>,
    layout: Layout,
}

impl TupleMeta {
    /// Panics if any type lacks a [`ValueTypeInfo`].
    pub fn new(types: &[SharedType]) -> Self {
        let mut offsets = Vec::with_capacity(types.len());
        let mut layout = Layout::from_size_align(0, 1).expect("empty layout");
        for ty in types {
            let info = value_info_of(ty);
            let field = Layout::from_size_align(info.size(), info.alignment())
                .expect("value type layout");
            let (extended, offset) = layout.extend(field).expect("tuple layout overflow");
            layout = extended;
            offsets.push(offset);
        }
        Self {
            types: types.to_vec(),
            offsets,
            layout: layout.pad_to_align(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[SharedType] {
        &self.types
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Total bytes of slot storage.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    fn info(&self, index: usize) -> &dyn ValueTypeInfo {
        value_info_of(&self.types[index])
    }
}

impl fmt::Debug for TupleMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleMeta")
            .field(
                "types",
                &self.types.iter().map(|ty| ty.name()).collect::<Vec<_>>(),
            )
            .field("offsets", &self.offsets)
            .field("size", &self.layout.size())
            .finish()
    }
}

fn value_info_of(ty: &SharedType) -> &dyn ValueTypeInfo {
    match ty.value_info() {
        Some(info) => info,
        None => panic!("type `{}` has no value type info", ty.name()),
    }
}

pub struct Tuple {
    meta: Arc<TupleMeta>,
    data: NonNull<u8>,
    initialized: Vec<bool>,
}

impl Tuple {
    pub fn new(meta: Arc<TupleMeta>) -> Self {
        let data = if meta.layout.size() == 0 {
            // Zero-sized layouts must not be passed to the allocator.
            NonNull::<u8>::dangling()
        } else {
            // SAFETY: the layout has a non-zero size.
            let raw = unsafe { alloc::alloc(meta.layout) };
            match NonNull::new(raw) {
                Some(data) => data,
                None => alloc::handle_alloc_error(meta.layout),
            }
        };
        let initialized = vec![false; meta.len()];
        Self {
            meta,
            data,
            initialized,
        }
    }

    pub fn meta(&self) -> &TupleMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    pub fn is_initialized(&self, index: usize) -> bool {
        self.initialized[index]
    }

    pub fn all_initialized(&self) -> bool {
        self.initialized.iter().all(|init| *init)
    }

    fn slot_ptr(&self, index: usize) -> *mut u8 {
        // SAFETY: offsets were computed inside the allocated layout.
        unsafe { self.data.as_ptr().add(self.meta.offsets[index]) }
    }

    fn check_type<T: 'static>(&self, index: usize) {
        let info = self.meta.info(index);
        assert!(
            info.value_type_id() == TypeId::of::<T>(),
            "tuple slot {index} holds `{}`, not `{}`",
            info.value_type_name(),
            std::any::type_name::<T>()
        );
    }

    /// Clone the value at `src` into slot `index`, dropping any previous occupant.
    ///
    /// # Safety
    /// `src` must point to a valid, aligned value of the slot's type.
    pub unsafe fn copy_in_dynamic(&mut self, index: usize, src: *const u8) {
        let info = self.meta.info(index);
        let dst = self.slot_ptr(index);
        if self.initialized[index] {
            self.initialized[index] = false;
            unsafe { info.destruct(dst) };
        }
        // A panicking clone leaves the slot empty.
        unsafe { info.copy_to_uninitialized(src, dst) };
        self.initialized[index] = true;
    }

    /// Move slot `index` into the initialized value at `dst`, leaving the slot empty.
    ///
    /// # Safety
    /// `dst` must point to a valid, aligned value of the slot's type.
    pub unsafe fn relocate_out_dynamic(&mut self, index: usize, dst: *mut u8) {
        assert!(
            self.initialized[index],
            "tuple slot {index} was not set by the function body"
        );
        let info = self.meta.info(index);
        self.initialized[index] = false;
        // SAFETY: the slot is occupied and the caller vouches for `dst`.
        unsafe { info.relocate_to_initialized(self.slot_ptr(index), dst) };
    }

    pub fn set<T: Clone + 'static>(&mut self, index: usize, value: T) {
        self.check_type::<T>(index);
        let dst = self.slot_ptr(index).cast::<T>();
        // SAFETY: the slot's type is `T` and its storage is aligned for it.
        if self.initialized[index] {
            self.initialized[index] = false;
            unsafe { std::ptr::drop_in_place(dst) };
        }
        unsafe { std::ptr::write(dst, value) };
        self.initialized[index] = true;
    }

    pub fn get_ref<T: 'static>(&self, index: usize) -> &T {
        self.check_type::<T>(index);
        assert!(self.initialized[index], "tuple slot {index} is empty");
        // SAFETY: type checked above and the slot is occupied.
        unsafe { &*self.slot_ptr(index).cast::<T>() }
    }

    pub fn get<T: Clone + 'static>(&self, index: usize) -> T {
        self.get_ref::<T>(index).clone()
    }

    /// Drop every occupied slot, leaving the frame empty.
    pub fn clear(&mut self) {
        for index in 0..self.meta.len() {
            if self.initialized[index] {
                self.initialized[index] = false;
                // SAFETY: the slot was occupied.
                unsafe { self.meta.info(index).destruct(self.slot_ptr(index)) };
            }
        }
    }
}

impl Drop for Tuple {
    fn drop(&mut self) {
        self.clear();
        if self.meta.layout.size() != 0 {
            // SAFETY: allocated in `new` with this exact layout.
            unsafe { alloc::dealloc(self.data.as_ptr(), self.meta.layout) };
        }
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tuple")
            .field("meta", &self.meta)
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{self, Type};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn text() -> SharedType {
        Type::new("Text").with_value_info::<String>().into_shared()
    }

    #[test]
    fn offsets_respect_alignment() {
        let meta = TupleMeta::new(&[types::boolean(), types::float64(), types::int32()]);
        assert_eq!(meta.offsets(), &[0, 8, 16]);
        assert_eq!(meta.size(), 24);
    }

    #[test]
    fn empty_meta_has_no_storage() {
        let meta = Arc::new(TupleMeta::new(&[]));
        assert!(meta.is_empty());
        let tuple = Tuple::new(meta);
        assert!(tuple.all_initialized());
    }

    #[test]
    fn typed_set_and_get() {
        let meta = Arc::new(TupleMeta::new(&[types::int32(), text()]));
        let mut tuple = Tuple::new(meta);
        tuple.set(0, 7_i32);
        tuple.set(1, String::from("seven"));
        assert_eq!(tuple.get::<i32>(0), 7);
        assert_eq!(tuple.get_ref::<String>(1), "seven");
        tuple.set(1, String::from("replaced"));
        assert_eq!(tuple.get_ref::<String>(1), "replaced");
    }

    #[test]
    fn copy_in_then_relocate_out_empties_slot() {
        let meta = Arc::new(TupleMeta::new(&[text()]));
        let mut tuple = Tuple::new(meta);
        let source = String::from("hello");
        let mut target = String::from("stale");
        unsafe {
            tuple.copy_in_dynamic(0, (&source as *const String).cast());
            tuple.copy_in_dynamic(0, (&source as *const String).cast());
            tuple.relocate_out_dynamic(0, (&mut target as *mut String).cast());
        }
        assert_eq!(source, "hello");
        assert_eq!(target, "hello");
        assert!(!tuple.is_initialized(0));
    }

    static LIVE: AtomicUsize = AtomicUsize::new(0);
    static CLONES: AtomicUsize = AtomicUsize::new(0);

    /// Counts live instances; the second clone ever made panics.
    struct Tracked;

    impl Tracked {
        fn new() -> Self {
            LIVE.fetch_add(1, Ordering::SeqCst);
            Tracked
        }
    }

    impl Clone for Tracked {
        fn clone(&self) -> Self {
            if CLONES.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("clone failed");
            }
            Tracked::new()
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            LIVE.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn panicking_clone_does_not_drop_the_slot_twice() {
        let tracked = Type::new("Tracked").with_value_info::<Tracked>().into_shared();
        let first = Tracked::new();
        let second = Tracked::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut tuple = Tuple::new(Arc::new(TupleMeta::new(&[tracked])));
            unsafe {
                tuple.copy_in_dynamic(0, (&first as *const Tracked).cast());
                tuple.copy_in_dynamic(0, (&second as *const Tracked).cast());
            }
        }));
        assert!(result.is_err());
        assert_eq!(LIVE.load(Ordering::SeqCst), 2);
        drop((first, second));
        assert_eq!(LIVE.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "not `i64`")]
    fn typed_access_checks_slot_type() {
        let meta = Arc::new(TupleMeta::new(&[types::int32()]));
        let mut tuple = Tuple::new(meta);
        tuple.set(0, 1_i64);
    }

    #[test]
    #[should_panic(expected = "was not set")]
    fn relocating_an_empty_slot_panics() {
        let meta = Arc::new(TupleMeta::new(&[types::int32()]));
        let mut tuple = Tuple::new(meta);
        let mut out = 0_i32;
        unsafe { tuple.relocate_out_dynamic(0, (&mut out as *mut i32).cast()) };
    }
}
