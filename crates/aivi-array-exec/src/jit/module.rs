//! JIT module construction with runtime helper symbols pre-registered.

use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::default_libcall_names;

use super::runtime_helpers::runtime_helper_symbols;

/// Create a `JITModule` for `isa` in which generated code can call the
/// runtime helpers.
pub(crate) fn create_jit_module(isa: OwnedTargetIsa) -> JITModule {
    let mut builder = JITBuilder::with_isa(isa, default_libcall_names());
    for (name, ptr) in runtime_helper_symbols() {
        builder.symbol(name, ptr);
    }
    JITModule::new(builder)
}
