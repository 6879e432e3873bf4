//! `extern "C"` helpers callable from generated code.
//!
//! Every helper receives the `*mut ExecutionContext` that the batch function
//! was invoked with; this is how compiled bodies observe cancellation and
//! report failures.

use cranelift_codegen::ir::{types, AbiParam, FuncRef, Function, Type};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};

use crate::context::ExecutionContext;
use crate::error::ExecutionError;

/// Record a failure code on the context. Only the first failure is kept.
pub(crate) extern "C" fn rt_context_fail(ctx: *mut ExecutionContext, code: i64) {
    // SAFETY: generated code only forwards the context pointer it was given.
    if let Some(ctx) = unsafe { ctx.as_mut() } {
        ctx.record_failure(code);
    }
}

/// 1 when the context's cancellation token has been triggered, else 0.
pub(crate) extern "C" fn rt_context_is_cancelled(ctx: *const ExecutionContext) -> i8 {
    // SAFETY: see `rt_context_fail`.
    match unsafe { ctx.as_ref() } {
        Some(ctx) => i8::from(ctx.is_cancelled()),
        None => 0,
    }
}

pub(crate) fn runtime_helper_symbols() -> Vec<(&'static str, *const u8)> {
    vec![
        ("rt_context_fail", rt_context_fail as *const u8),
        ("rt_context_is_cancelled", rt_context_is_cancelled as *const u8),
    ]
}

/// Module-level ids of the runtime helpers.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredHelpers {
    pub rt_context_fail: FuncId,
    pub rt_context_is_cancelled: FuncId,
}

/// Helper references imported into one function.
#[derive(Debug, Clone, Copy)]
pub struct HelperRefs {
    pub rt_context_fail: FuncRef,
    pub rt_context_is_cancelled: FuncRef,
}

pub(crate) fn declare_helpers(module: &mut JITModule) -> Result<DeclaredHelpers, ExecutionError> {
    let ptr: Type = module.target_config().pointer_type();
    macro_rules! decl {
        ($name:expr, [$($param:expr),*], [$($ret:expr),*]) => {{
            let mut sig = module.make_signature();
            $(sig.params.push(AbiParam::new($param));)*
            $(sig.returns.push(AbiParam::new($ret));)*
            module
                .declare_function($name, Linkage::Import, &sig)
                .map_err(|e| ExecutionError::Codegen(format!("declare {}: {e}", $name)))?
        }};
    }

    Ok(DeclaredHelpers {
        // (ctx, code) -> void
        rt_context_fail: decl!("rt_context_fail", [ptr, types::I64], []),
        // (ctx) -> i8
        rt_context_is_cancelled: decl!("rt_context_is_cancelled", [ptr], [types::I8]),
    })
}

impl DeclaredHelpers {
    /// Import all helpers into `func`, producing `FuncRef`s.
    pub fn import_into(&self, module: &mut JITModule, func: &mut Function) -> HelperRefs {
        HelperRefs {
            rt_context_fail: module.declare_func_in_func(self.rt_context_fail, func),
            rt_context_is_cancelled: module
                .declare_func_in_func(self.rt_context_is_cancelled, func),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;

    #[test]
    fn fail_helper_records_on_context() {
        let mut ctx = ExecutionContext::new();
        rt_context_fail(&mut ctx, 11);
        assert_eq!(ctx.failure().map(|failure| failure.code), Some(11));
    }

    #[test]
    fn helpers_tolerate_null_context() {
        rt_context_fail(std::ptr::null_mut(), 1);
        assert_eq!(rt_context_is_cancelled(std::ptr::null()), 0);
    }

    #[test]
    fn cancelled_helper_reads_token() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::with_cancellation(token.clone());
        assert_eq!(rt_context_is_cancelled(&ctx), 0);
        token.cancel();
        assert_eq!(rt_context_is_cancelled(&ctx), 1);
    }
}
