//! Compiled execution: the whole batch loop is generated as one native
//! function when the executor is constructed.
//!
//! The generated function has the signature
//!     `(count, indices, input_buffers, output_buffers, ctx) -> void`
//! where every parameter is pointer-sized. It walks `indices`, loads each
//! input element through the type's `JitTypeInfo`, calls the function's
//! compiled body and stores each result the same way.

use cranelift_codegen::ir::{AbiParam, InstBuilder, Signature, UserFuncName, Value};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};

use crate::array_execution::{ArrayExecution, ArrayExecutionBase};
use crate::body::JitBuildBody;
use crate::config::JitSettings;
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::function::SharedFunction;
use crate::jit::runtime_helpers::declare_helpers;
use crate::jit::{
    acquire_jit_context, create_jit_module, sanitize_name, BuildIrSettings, CodeBuilder,
    FunctionIrCache, JitTypeInfo, StridedPointer,
};
use crate::types::SharedType;

type CompiledFunctionSignature = unsafe extern "C" fn(
    usize,
    *const usize,
    *const *const u8,
    *const *mut u8,
    *mut ExecutionContext,
);

/// The finalized module and the entry point inside it.
struct CompiledBatch {
    module: Option<JITModule>,
    function: CompiledFunctionSignature,
}

// SAFETY: the finalized code and its data are immutable after construction;
// the module itself is only touched again in `Drop`, which has `&mut self`.
unsafe impl Send for CompiledBatch {}
unsafe impl Sync for CompiledBatch {}

impl Drop for CompiledBatch {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: `function` points into this module and is dropped with it.
            unsafe { module.free_memory() };
        }
    }
}

pub struct PrecompiledArrayExecution {
    base: ArrayExecutionBase,
    compiled: CompiledBatch,
}

impl PrecompiledArrayExecution {
    /// Compiles immediately. Panics unless `function` has a JIT body and every
    /// parameter type has JIT type info.
    pub fn new(function: SharedFunction) -> Result<Self, ExecutionError> {
        let base = ArrayExecutionBase::new(function);
        let compiled = compile(&base)?;
        Ok(Self { base, compiled })
    }
}

impl ArrayExecution for PrecompiledArrayExecution {
    fn base(&self) -> &ArrayExecutionBase {
        &self.base
    }

    fn strategy(&self) -> &'static str {
        "precompiled"
    }

    /// A failure recorded by the compiled body during this call is returned as
    /// [`ExecutionError::Body`]. A failure already on `context` is left there.
    unsafe fn execute(
        &self,
        indices: &[usize],
        input_buffers: &[*const u8],
        output_buffers: &[*mut u8],
        context: &mut ExecutionContext,
    ) -> Result<(), ExecutionError> {
        self.base
            .assert_buffer_arity(input_buffers.len(), output_buffers.len());
        tracing::trace!(
            function = self.base.function().name(),
            strategy = self.strategy(),
            indices = indices.len(),
            "execute"
        );

        let earlier = context.take_failure();
        let failure = {
            let mut frame = context.enter(self.base.function().name());
            // SAFETY: the generated code reads and writes exactly the elements the
            // caller vouched for.
            unsafe {
                (self.compiled.function)(
                    indices.len(),
                    indices.as_ptr(),
                    input_buffers.as_ptr(),
                    output_buffers.as_ptr(),
                    std::ptr::from_mut(&mut *frame),
                );
            }
            frame.take_failure()
        };
        if let Some(earlier) = earlier {
            context.record_failure(earlier.code);
        }

        match failure {
            Some(failure) => Err(ExecutionError::body(
                self.base.function().name(),
                format!("compiled body failed with code {}", failure.code),
            )),
            None => Ok(()),
        }
    }
}

pub fn get_precompiled_array_execution(
    function: SharedFunction,
) -> Result<Box<dyn ArrayExecution>, ExecutionError> {
    Ok(Box::new(PrecompiledArrayExecution::new(function)?))
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

fn jit_infos<'a>(
    function_name: &str,
    types: impl Iterator<Item = &'a SharedType>,
) -> Vec<&'a dyn JitTypeInfo> {
    types
        .map(|ty| match ty.jit_info() {
            Some(info) => info,
            None => panic!("{function_name}: type `{}` has no jit type info", ty.name()),
        })
        .collect()
}

fn compile(base: &ArrayExecutionBase) -> Result<CompiledBatch, ExecutionError> {
    let function = base.function();
    let body = match function.jit_build_body() {
        Some(body) => body.as_ref(),
        None => panic!("{}: function has no jit-build body", function.name()),
    };
    let input_infos = jit_infos(function.name(), function.input_types());
    let output_infos = jit_infos(function.name(), function.output_types());

    let jit = acquire_jit_context()?;
    let mut module = create_jit_module(jit.isa());
    let settings = *jit.settings();

    let entry = match build_module(&mut module, base, body, &input_infos, &output_infos, settings)
    {
        Ok(entry) => entry,
        Err(err) => {
            // SAFETY: nothing from the module escaped.
            unsafe { module.free_memory() };
            return Err(err);
        }
    };
    let code = module.get_finalized_function(entry);
    // SAFETY: `entry` was emitted with exactly `CompiledFunctionSignature`
    // and the module outlives the pointer inside `CompiledBatch`.
    let function_ptr =
        unsafe { std::mem::transmute::<*const u8, CompiledFunctionSignature>(code) };

    tracing::debug!(
        function = function.name(),
        inputs = function.input_amount(),
        outputs = function.output_amount(),
        "compiled array execution"
    );
    Ok(CompiledBatch {
        module: Some(module),
        function: function_ptr,
    })
}

fn build_module(
    module: &mut JITModule,
    base: &ArrayExecutionBase,
    body: &dyn JitBuildBody,
    input_infos: &[&dyn JitTypeInfo],
    output_infos: &[&dyn JitTypeInfo],
    jit: JitSettings,
) -> Result<FuncId, ExecutionError> {
    let function = base.function();
    let pointer_type = module.target_config().pointer_type();
    let helpers = declare_helpers(module)?;
    let settings = BuildIrSettings {
        jit,
        helpers,
        pointer_type,
    };

    let mut sig = module.make_signature();
    for _ in 0..5 {
        sig.params.push(AbiParam::new(pointer_type));
    }
    let name = format!("aivi_array_exec_{}", sanitize_name(function.name()));
    let entry_id = module
        .declare_function(&name, Linkage::Local, &sig)
        .map_err(|e| ExecutionError::Codegen(format!("declare {name}: {e}")))?;

    let mut function_cache = FunctionIrCache::new();
    let body_sig = body_signature(module, input_infos, output_infos);
    let body_name = format!("aivi_fn_{}", sanitize_name(function.name()));
    let body_id = body.build_function(module, &body_name, &body_sig, &settings, &mut function_cache)?;

    let mut ctx = module.make_context();
    ctx.func.signature = sig;
    ctx.func.name = UserFuncName::user(0, entry_id.as_u32());
    let mut fb_ctx = FunctionBuilderContext::new();
    {
        let mut fb = FunctionBuilder::new(&mut ctx.func, &mut fb_ctx);
        let body_ref = module.declare_func_in_func(body_id, fb.func);
        {
            let mut builder = CodeBuilder::new(&mut fb, pointer_type);
            let params = builder.take_function_inputs();
            let (size, indices, input_buffers_arg, output_buffers_arg, context_ptr) =
                (params[0], params[1], params[2], params[3], params[4]);

            let input_buffers = strided_buffers(&mut builder, input_buffers_arg, base.input_sizes())?;
            let output_buffers =
                strided_buffers(&mut builder, output_buffers_arg, base.output_sizes())?;

            let iterations = builder.create_n_iterations_loop(size);
            let index_to_process =
                builder.load_pointer_sized_at_index(indices, iterations.current_iteration());

            let mut input_values = Vec::with_capacity(input_infos.len() + 1);
            for (buffer, info) in input_buffers.iter().zip(input_infos) {
                let addr = builder.element_address(*buffer, index_to_process)?;
                input_values.push(info.build_load_ir_copy(&mut builder, addr));
            }
            input_values.push(context_ptr);

            let call = builder.ins().call(body_ref, &input_values);
            let results: Vec<Value> = builder.inst_results(call).to_vec();

            for ((buffer, info), value) in output_buffers.iter().zip(output_infos).zip(results) {
                let addr = builder.element_address(*buffer, index_to_process)?;
                info.build_store_ir_relocate(&mut builder, value, addr);
            }

            builder.finalize_loop(iterations);
            builder.ins().return_(&[]);
        }
        fb.finalize();
    }

    module
        .define_function(entry_id, &mut ctx)
        .map_err(|e| ExecutionError::Codegen(format!("define {name}: {e}")))?;
    module.clear_context(&mut ctx);
    module
        .finalize_definitions()
        .map_err(|e| ExecutionError::Codegen(format!("finalize {name}: {e}")))?;
    Ok(entry_id)
}

/// `(inputs..., ctx) -> (outputs...)` in JIT operand types.
fn body_signature(
    module: &JITModule,
    input_infos: &[&dyn JitTypeInfo],
    output_infos: &[&dyn JitTypeInfo],
) -> Signature {
    let pointer_type = module.target_config().pointer_type();
    let mut sig = module.make_signature();
    for info in input_infos {
        sig.params.push(AbiParam::new(info.clif_type(pointer_type)));
    }
    sig.params.push(AbiParam::new(pointer_type));
    for info in output_infos {
        sig.returns.push(AbiParam::new(info.clif_type(pointer_type)));
    }
    sig
}

/// Load each buffer pointer out of the pointer array `buffers_arg`.
fn strided_buffers(
    builder: &mut CodeBuilder<'_, '_>,
    buffers_arg: Value,
    element_sizes: &[usize],
) -> Result<Vec<StridedPointer>, ExecutionError> {
    let pointer_type = builder.pointer_type();
    element_sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| {
            let buffer = builder.load_at_const_index(buffers_arg, index, pointer_type)?;
            Ok(builder.cast_to_pointer_with_stride(buffer, size))
        })
        .collect()
}
