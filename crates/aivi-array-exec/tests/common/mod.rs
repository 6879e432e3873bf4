#![allow(dead_code)]

use aivi_array_exec::cranelift_codegen::ir::condcodes::FloatCC;
use aivi_array_exec::cranelift_codegen::ir::InstBuilder;
use aivi_array_exec::types;
use aivi_array_exec::{
    get_precompiled_array_execution, get_tuple_call_array_execution, ArrayExecution, BodyIr,
    FnTupleCall, Function, InlineJitBody, SharedFunction,
};

/// `doubled = value * 2` over `Int32`.
pub fn double_i32() -> SharedFunction {
    Function::builder("double")
        .input("value", types::int32())
        .output("doubled", types::int32())
        .tuple_call_body(FnTupleCall::new(|fn_in, fn_out, _ctx| {
            fn_out.set(0, fn_in.get::<i32>(0).wrapping_mul(2));
            Ok(())
        }))
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| {
            let value = ir.inputs[0];
            vec![ir.builder.ins().imul_imm(value, 2)]
        }))
        .build()
}

/// `sum = a + b` over `Int32`.
pub fn add_i32() -> SharedFunction {
    Function::builder("add")
        .input("a", types::int32())
        .input("b", types::int32())
        .output("sum", types::int32())
        .tuple_call_body(FnTupleCall::new(|fn_in, fn_out, _ctx| {
            fn_out.set(0, fn_in.get::<i32>(0).wrapping_add(fn_in.get::<i32>(1)));
            Ok(())
        }))
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| {
            let (a, b) = (ir.inputs[0], ir.inputs[1]);
            vec![ir.builder.ins().iadd(a, b)]
        }))
        .build()
}

/// Two outputs over `Int64`: `(a + b, a - b)`.
pub fn sum_and_difference_i64() -> SharedFunction {
    Function::builder("sum_and_difference")
        .input("a", types::int64())
        .input("b", types::int64())
        .output("sum", types::int64())
        .output("difference", types::int64())
        .tuple_call_body(FnTupleCall::new(|fn_in, fn_out, _ctx| {
            let a = fn_in.get::<i64>(0);
            let b = fn_in.get::<i64>(1);
            fn_out.set(0, a.wrapping_add(b));
            fn_out.set(1, a.wrapping_sub(b));
            Ok(())
        }))
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| {
            let (a, b) = (ir.inputs[0], ir.inputs[1]);
            let sum = ir.builder.ins().iadd(a, b);
            let difference = ir.builder.ins().isub(a, b);
            vec![sum, difference]
        }))
        .build()
}

/// `value` when `keep` is set, `-value` otherwise.
pub fn conditional_negate_f64() -> SharedFunction {
    Function::builder("conditional_negate")
        .input("value", types::float64())
        .input("keep", types::boolean())
        .output("result", types::float64())
        .tuple_call_body(FnTupleCall::new(|fn_in, fn_out, _ctx| {
            let value = fn_in.get::<f64>(0);
            let keep = fn_in.get::<bool>(1);
            fn_out.set(0, if keep { value } else { -value });
            Ok(())
        }))
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| {
            let (value, keep) = (ir.inputs[0], ir.inputs[1]);
            let negated = ir.builder.ins().fneg(value);
            vec![ir.builder.ins().select(keep, value, negated)]
        }))
        .build()
}

/// `positive = value > 0.0` over `Float32`, producing `Bool`.
pub fn is_positive_f32() -> SharedFunction {
    Function::builder("is_positive")
        .input("value", types::float32())
        .output("positive", types::boolean())
        .tuple_call_body(FnTupleCall::new(|fn_in, fn_out, _ctx| {
            fn_out.set(0, fn_in.get::<f32>(0) > 0.0);
            Ok(())
        }))
        .jit_build_body(InlineJitBody::new(|ir: &mut BodyIr<'_, '_>| {
            let value = ir.inputs[0];
            let zero = ir.builder.ins().f32const(0.0);
            vec![ir.builder.ins().fcmp(FloatCC::GreaterThan, value, zero)]
        }))
        .build()
}

pub fn tuple_call(function: &SharedFunction) -> Box<dyn ArrayExecution> {
    get_tuple_call_array_execution(function.clone())
}

pub fn precompiled(function: &SharedFunction) -> Box<dyn ArrayExecution> {
    get_precompiled_array_execution(function.clone()).expect("compile array execution")
}

/// Both strategies for the same function.
pub fn strategies(function: &SharedFunction) -> Vec<Box<dyn ArrayExecution>> {
    vec![tuple_call(function), precompiled(function)]
}
