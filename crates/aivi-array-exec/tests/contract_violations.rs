//! Precondition violations are programming errors and panic.

mod common;

use aivi_array_exec::cranelift_codegen::ir::InstBuilder;
use aivi_array_exec::{
    get_precompiled_array_execution, get_tuple_call_array_execution, types, BodyIr,
    ExecutionContext, FnTupleCall, Function, InlineJitBody, Type,
};
use common::{double_i32, tuple_call};

#[test]
#[should_panic(expected = "has no tuple-call body")]
fn tuple_call_requires_tuple_call_body() {
    let function = Function::builder("jit_only")
        .input("value", types::int32())
        .output("value", types::int32())
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| vec![ir.inputs[0]]))
        .build();
    let _ = get_tuple_call_array_execution(function);
}

#[test]
#[should_panic(expected = "has no jit-build body")]
fn precompiled_requires_jit_body() {
    let function = Function::builder("boxed_only")
        .input("value", types::int32())
        .output("value", types::int32())
        .tuple_call_body(FnTupleCall::new(|fn_in, fn_out, _ctx| {
            fn_out.set(0, fn_in.get::<i32>(0));
            Ok(())
        }))
        .build();
    let _ = get_precompiled_array_execution(function);
}

#[test]
#[should_panic(expected = "has no value type info")]
fn sizes_require_value_type_info() {
    let opaque = Type::new("Opaque").into_shared();
    let function = Function::builder("opaque")
        .input("value", opaque)
        .tuple_call_body(FnTupleCall::new(|_, _, _| Ok(())))
        .build();
    let _ = get_tuple_call_array_execution(function);
}

#[test]
#[should_panic(expected = "has no jit type info")]
fn precompiled_requires_jit_type_info() {
    let text = Type::new("Text").with_value_info::<String>().into_shared();
    let function = Function::builder("text")
        .input("value", text)
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| {
            let _ = ir.builder.ins().iconst(
                aivi_array_exec::cranelift_codegen::ir::types::I64,
                0,
            );
            Vec::new()
        }))
        .build();
    let _ = get_precompiled_array_execution(function);
}

#[test]
#[should_panic(expected = "wrong number of input buffers")]
fn execute_checks_input_arity() {
    let execution = tuple_call(&double_i32());
    let mut output = [0_i32; 1];
    let mut ctx = ExecutionContext::new();
    unsafe {
        let _ = execution.execute(&[], &[], &[output.as_mut_ptr().cast()], &mut ctx);
    }
}

#[test]
#[should_panic(expected = "wrong number of output buffers")]
fn execute_checks_output_arity() {
    let execution = common::precompiled(&double_i32());
    let input = [0_i32; 1];
    let mut ctx = ExecutionContext::new();
    unsafe {
        let _ = execution.execute(&[], &[input.as_ptr().cast()], &[], &mut ctx);
    }
}
