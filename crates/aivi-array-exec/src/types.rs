//! Element types and their per-type capabilities.
//!
//! A [`Type`] is little more than a name plus a bag of extensions keyed by the
//! extension's own Rust type. Consumers look up the capability they need
//! (`ValueTypeInfo` for sizing and call-frames, `JitTypeInfo` for code
//! generation) instead of requiring every type to implement everything.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use cranelift_codegen::ir::types as clif;
use rustc_hash::FxHashMap;

use crate::jit::type_info::{BoolJitType, JitTypeInfo, ScalarJitType};
use crate::value_info::{TypedValueInfo, ValueTypeInfo};

pub type SharedType = Arc<Type>;

pub struct Type {
    name: String,
    extensions: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Type {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach an extension; an existing extension of the same type is replaced.
    pub fn with_extension<E: Any + Send + Sync>(mut self, extension: E) -> Self {
        self.extensions
            .insert(TypeId::of::<E>(), Box::new(extension));
        self
    }

    pub fn with_value_info<T: Clone + Send + Sync + 'static>(self) -> Self {
        let info: Box<dyn ValueTypeInfo> = Box::new(TypedValueInfo::<T>::new());
        self.with_extension(info)
    }

    pub fn with_jit_info(self, info: impl JitTypeInfo + 'static) -> Self {
        let info: Box<dyn JitTypeInfo> = Box::new(info);
        self.with_extension(info)
    }

    pub fn extension<E: Any>(&self) -> Option<&E> {
        self.extensions
            .get(&TypeId::of::<E>())
            .and_then(|ext| ext.downcast_ref::<E>())
    }

    pub fn has_extension<E: Any>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<E>())
    }

    pub fn value_info(&self) -> Option<&dyn ValueTypeInfo> {
        self.extension::<Box<dyn ValueTypeInfo>>()
            .map(|info| info.as_ref())
    }

    pub fn jit_info(&self) -> Option<&dyn JitTypeInfo> {
        self.extension::<Box<dyn JitTypeInfo>>()
            .map(|info| info.as_ref())
    }

    pub fn into_shared(self) -> SharedType {
        Arc::new(self)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builtin scalar types
// ---------------------------------------------------------------------------

macro_rules! builtin_type {
    ($(#[$doc:meta])* $fn_name:ident, $name:literal, $rust:ty, $jit:expr) => {
        $(#[$doc])*
        pub fn $fn_name() -> SharedType {
            static TYPE: OnceLock<SharedType> = OnceLock::new();
            TYPE.get_or_init(|| {
                Type::new($name)
                    .with_value_info::<$rust>()
                    .with_jit_info($jit)
                    .into_shared()
            })
            .clone()
        }
    };
}

builtin_type!(int32, "Int32", i32, ScalarJitType::new(clif::I32));
builtin_type!(int64, "Int64", i64, ScalarJitType::new(clif::I64));
builtin_type!(float32, "Float32", f32, ScalarJitType::new(clif::F32));
builtin_type!(float64, "Float64", f64, ScalarJitType::new(clif::F64));
builtin_type!(
    /// Stored as one byte holding 0 or 1, matching Rust's `bool`.
    boolean,
    "Bool",
    bool,
    BoolJitType
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_shared_instances() {
        assert!(Arc::ptr_eq(&int32(), &int32()));
        assert!(!Arc::ptr_eq(&int32(), &int64()));
    }

    #[test]
    fn builtins_carry_both_capabilities() {
        for ty in [int32(), int64(), float32(), float64(), boolean()] {
            assert!(ty.value_info().is_some(), "{} lacks value info", ty.name());
            assert!(ty.jit_info().is_some(), "{} lacks jit info", ty.name());
        }
        assert_eq!(float64().value_info().map(|info| info.size()), Some(8));
        assert_eq!(boolean().value_info().map(|info| info.size()), Some(1));
    }

    #[test]
    fn custom_types_only_have_what_was_attached() {
        let text = Type::new("Text").with_value_info::<String>();
        assert!(text.value_info().is_some());
        assert!(text.jit_info().is_none());
        assert!(!Type::new("Opaque").has_extension::<Box<dyn ValueTypeInfo>>());
    }
}
