//! The two interchangeable function body representations.

use std::fmt;

use cranelift_codegen::ir::{InstBuilder, Signature, UserFuncName, Value};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::jit::{BuildIrSettings, FunctionIrCache, HelperRefs};
use crate::tuple::Tuple;

// ---------------------------------------------------------------------------
// Boxed calls
// ---------------------------------------------------------------------------

/// A body invoked through type-erased call-frames.
///
/// `fn_in` holds one value per input; the body must set every slot of
/// `fn_out` before returning `Ok`.
pub trait TupleCallBody: Send + Sync {
    fn call(
        &self,
        fn_in: &Tuple,
        fn_out: &mut Tuple,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ExecutionError>;
}

/// [`TupleCallBody`] backed by a closure.
pub struct FnTupleCall<F> {
    call: F,
}

impl<F> FnTupleCall<F>
where
    F: Fn(&Tuple, &mut Tuple, &mut ExecutionContext) -> Result<(), ExecutionError> + Send + Sync,
{
    pub fn new(call: F) -> Self {
        Self { call }
    }
}

impl<F> TupleCallBody for FnTupleCall<F>
where
    F: Fn(&Tuple, &mut Tuple, &mut ExecutionContext) -> Result<(), ExecutionError> + Send + Sync,
{
    fn call(
        &self,
        fn_in: &Tuple,
        fn_out: &mut Tuple,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ExecutionError> {
        (self.call)(fn_in, fn_out, ctx)
    }
}

impl<F> fmt::Debug for FnTupleCall<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnTupleCall")
    }
}

// ---------------------------------------------------------------------------
// Native code
// ---------------------------------------------------------------------------

/// A body expressed as a recipe for emitting a native function.
///
/// The emitted function has `signature`: every input in its JIT operand
/// representation followed by the `*mut ExecutionContext`, returning one
/// value per output in order.
pub trait JitBuildBody: Send + Sync {
    fn build_function(
        &self,
        module: &mut JITModule,
        name: &str,
        signature: &Signature,
        settings: &BuildIrSettings,
        cache: &mut FunctionIrCache,
    ) -> Result<FuncId, ExecutionError>;
}

/// Emission state handed to an [`InlineJitBody`] closure.
pub struct BodyIr<'a, 'f> {
    pub builder: &'a mut FunctionBuilder<'f>,
    pub inputs: &'a [Value],
    pub context: Value,
    helpers: HelperRefs,
}

impl BodyIr<'_, '_> {
    /// Record `code` as this batch's failure. Execution continues; the
    /// executor reports the failure once the batch returns.
    pub fn signal_failure(&mut self, code: Value) {
        self.builder
            .ins()
            .call(self.helpers.rt_context_fail, &[self.context, code]);
    }

    /// `i8` that is 1 once the context has been cancelled.
    pub fn is_cancelled(&mut self) -> Value {
        let call = self
            .builder
            .ins()
            .call(self.helpers.rt_context_is_cancelled, &[self.context]);
        self.builder.inst_results(call)[0]
    }
}

/// [`JitBuildBody`] whose straight-line IR is produced by a closure.
pub struct InlineJitBody<F> {
    emit: F,
}

impl<F> InlineJitBody<F>
where
    F: Fn(&mut BodyIr<'_, '_>) -> Vec<Value> + Send + Sync,
{
    pub fn new(emit: F) -> Self {
        Self { emit }
    }
}

impl<F> fmt::Debug for InlineJitBody<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InlineJitBody")
    }
}

impl<F> JitBuildBody for InlineJitBody<F>
where
    F: Fn(&mut BodyIr<'_, '_>) -> Vec<Value> + Send + Sync,
{
    fn build_function(
        &self,
        module: &mut JITModule,
        name: &str,
        signature: &Signature,
        settings: &BuildIrSettings,
        cache: &mut FunctionIrCache,
    ) -> Result<FuncId, ExecutionError> {
        if let Some(func_id) = cache.get(name) {
            return Ok(func_id);
        }

        let func_id = module
            .declare_function(name, Linkage::Local, signature)
            .map_err(|e| ExecutionError::Codegen(format!("declare {name}: {e}")))?;

        let mut ctx = module.make_context();
        ctx.func.signature = signature.clone();
        ctx.func.name = UserFuncName::user(0, func_id.as_u32());
        let mut fb_ctx = FunctionBuilderContext::new();
        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fb_ctx);
            let helpers = settings.helpers.import_into(module, builder.func);

            let entry = builder.create_block();
            builder.append_block_params_for_function_params(entry);
            builder.switch_to_block(entry);
            builder.seal_block(entry);
            let params = builder.block_params(entry).to_vec();
            let Some((&context, inputs)) = params.split_last() else {
                return Err(ExecutionError::Codegen(format!(
                    "{name}: body signature lacks the context parameter"
                )));
            };

            let outputs = {
                let mut ir = BodyIr {
                    builder: &mut builder,
                    inputs,
                    context,
                    helpers,
                };
                (self.emit)(&mut ir)
            };
            if outputs.len() != signature.returns.len() {
                return Err(ExecutionError::Codegen(format!(
                    "{name}: body produced {} values for {} outputs",
                    outputs.len(),
                    signature.returns.len()
                )));
            }
            builder.ins().return_(&outputs);
            builder.finalize();
        }

        module
            .define_function(func_id, &mut ctx)
            .map_err(|e| ExecutionError::Codegen(format!("define {name}: {e}")))?;
        module.clear_context(&mut ctx);

        cache.insert(name, func_id);
        Ok(func_id)
    }
}
