//! Cranelift plumbing shared by the compiled array executor and by
//! JIT-buildable function bodies.

mod cache;
pub(crate) mod code_builder;
mod context;
mod module;
pub(crate) mod runtime_helpers;
pub mod type_info;

pub use cache::{BuildIrSettings, FunctionIrCache};
pub use code_builder::{CodeBuilder, IterationsLoop, StridedPointer};
pub use context::{acquire_jit_context, JitContext, JitContextGuard};
pub use runtime_helpers::{DeclaredHelpers, HelperRefs};
pub use type_info::{BoolJitType, JitTypeInfo, ScalarJitType};

pub(crate) use module::create_jit_module;

/// Make an arbitrary function name usable as a symbol name.
pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}
