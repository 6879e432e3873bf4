//! Per-type load/store emission for the compiled executor.
//!
//! Each element type decides how a value travels between memory and an SSA
//! operand; the batch loop only computes addresses.

use cranelift_codegen::ir::{types, InstBuilder, MemFlags, Type, Value};
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_frontend::FunctionBuilder;

pub trait JitTypeInfo: Send + Sync {
    /// Operand type used for this element in generated signatures.
    fn clif_type(&self, pointer_type: Type) -> Type;

    /// Emit a load that yields an independent copy of the element at `addr`.
    fn build_load_ir_copy(&self, builder: &mut FunctionBuilder<'_>, addr: Value) -> Value;

    /// Emit a store that moves `value` into the element at `addr`.
    fn build_store_ir_relocate(&self, builder: &mut FunctionBuilder<'_>, value: Value, addr: Value);
}

/// Plain-old-data scalar whose memory and operand representations agree.
#[derive(Debug, Clone, Copy)]
pub struct ScalarJitType {
    ty: Type,
}

impl ScalarJitType {
    pub fn new(ty: Type) -> Self {
        Self { ty }
    }
}

impl JitTypeInfo for ScalarJitType {
    fn clif_type(&self, _pointer_type: Type) -> Type {
        self.ty
    }

    fn build_load_ir_copy(&self, builder: &mut FunctionBuilder<'_>, addr: Value) -> Value {
        builder.ins().load(self.ty, MemFlags::trusted(), addr, 0)
    }

    fn build_store_ir_relocate(&self, builder: &mut FunctionBuilder<'_>, value: Value, addr: Value) {
        builder.ins().store(MemFlags::trusted(), value, addr, 0);
    }
}

/// Rust `bool`: one byte that must be exactly 0 or 1 in memory, while
/// generated code may treat any non-zero `i8` as true.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolJitType;

impl JitTypeInfo for BoolJitType {
    fn clif_type(&self, _pointer_type: Type) -> Type {
        types::I8
    }

    fn build_load_ir_copy(&self, builder: &mut FunctionBuilder<'_>, addr: Value) -> Value {
        builder.ins().load(types::I8, MemFlags::trusted(), addr, 0)
    }

    fn build_store_ir_relocate(&self, builder: &mut FunctionBuilder<'_>, value: Value, addr: Value) {
        let normalized = builder.ins().icmp_imm(IntCC::NotEqual, value, 0);
        builder.ins().store(MemFlags::trusted(), normalized, addr, 0);
    }
}
