//! Small IR construction helpers on top of `FunctionBuilder`.

use std::ops::{Deref, DerefMut};

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{Block, InstBuilder, MemFlags, Type, Value};
use cranelift_frontend::FunctionBuilder;

use crate::error::ExecutionError;

/// Base pointer of an array whose elements are `stride` bytes apart.
#[derive(Debug, Clone, Copy)]
pub struct StridedPointer {
    pub base: Value,
    pub stride: usize,
}

/// A loop that runs its body exactly `count` times.
#[derive(Debug, Clone, Copy)]
pub struct IterationsLoop {
    header: Block,
    exit: Block,
    iteration: Value,
}

impl IterationsLoop {
    /// Zero-based iteration counter, valid inside the loop body.
    pub fn current_iteration(&self) -> Value {
        self.iteration
    }
}

pub struct CodeBuilder<'a, 'f> {
    builder: &'a mut FunctionBuilder<'f>,
    pointer_type: Type,
}

impl<'a, 'f> CodeBuilder<'a, 'f> {
    pub fn new(builder: &'a mut FunctionBuilder<'f>, pointer_type: Type) -> Self {
        Self {
            builder,
            pointer_type,
        }
    }

    pub fn pointer_type(&self) -> Type {
        self.pointer_type
    }

    fn pointer_bytes(&self) -> i64 {
        i64::from(self.pointer_type.bytes())
    }

    /// Create the entry block, bind the function parameters to it and return them.
    pub fn take_function_inputs(&mut self) -> Vec<Value> {
        let entry = self.builder.create_block();
        self.builder.append_block_params_for_function_params(entry);
        self.builder.switch_to_block(entry);
        self.builder.seal_block(entry);
        self.builder.block_params(entry).to_vec()
    }

    /// Load element `index` (a constant) of an array of `ty` at `base`.
    pub fn load_at_const_index(
        &mut self,
        base: Value,
        index: usize,
        ty: Type,
    ) -> Result<Value, ExecutionError> {
        let offset = index
            .checked_mul(ty.bytes() as usize)
            .and_then(|offset| i32::try_from(offset).ok())
            .ok_or_else(|| {
                ExecutionError::Codegen(format!("array offset of element {index} overflows"))
            })?;
        Ok(self.builder.ins().load(ty, MemFlags::trusted(), base, offset))
    }

    /// Load the pointer-sized element at the dynamic `index` of the array at `base`.
    pub fn load_pointer_sized_at_index(&mut self, base: Value, index: Value) -> Value {
        let pointer_bytes = self.pointer_bytes();
        let offset = self.builder.ins().imul_imm(index, pointer_bytes);
        let addr = self.builder.ins().iadd(base, offset);
        self.builder
            .ins()
            .load(self.pointer_type, MemFlags::trusted(), addr, 0)
    }

    pub fn cast_to_pointer_with_stride(&self, base: Value, stride: usize) -> StridedPointer {
        StridedPointer { base, stride }
    }

    /// Address of element `index` of a strided array.
    pub fn element_address(
        &mut self,
        pointer: StridedPointer,
        index: Value,
    ) -> Result<Value, ExecutionError> {
        let stride = i64::try_from(pointer.stride)
            .map_err(|_| ExecutionError::Codegen(format!("stride {} too large", pointer.stride)))?;
        let offset = self.builder.ins().imul_imm(index, stride);
        Ok(self.builder.ins().iadd(pointer.base, offset))
    }

    /// Open a loop running `count` times and continue emitting into its body.
    ///
    /// The loop must be closed with [`CodeBuilder::finalize_loop`].
    pub fn create_n_iterations_loop(&mut self, count: Value) -> IterationsLoop {
        let header = self.builder.create_block();
        let body = self.builder.create_block();
        let exit = self.builder.create_block();
        let iteration = self.builder.append_block_param(header, self.pointer_type);

        let zero = self.builder.ins().iconst(self.pointer_type, 0);
        self.builder.ins().jump(header, &[zero.into()]);

        self.builder.switch_to_block(header);
        let more = self
            .builder
            .ins()
            .icmp(IntCC::UnsignedLessThan, iteration, count);
        self.builder.ins().brif(more, body, &[], exit, &[]);

        self.builder.switch_to_block(body);
        self.builder.seal_block(body);

        IterationsLoop {
            header,
            exit,
            iteration,
        }
    }

    /// Branch back to the loop header and continue emitting after the loop.
    pub fn finalize_loop(&mut self, iterations: IterationsLoop) {
        let next = self.builder.ins().iadd_imm(iterations.iteration, 1);
        self.builder.ins().jump(iterations.header, &[next.into()]);
        self.builder.seal_block(iterations.header);

        self.builder.switch_to_block(iterations.exit);
        self.builder.seal_block(iterations.exit);
    }
}

impl<'f> Deref for CodeBuilder<'_, 'f> {
    type Target = FunctionBuilder<'f>;

    fn deref(&self) -> &FunctionBuilder<'f> {
        self.builder
    }
}

impl<'f> DerefMut for CodeBuilder<'_, 'f> {
    fn deref_mut(&mut self) -> &mut FunctionBuilder<'f> {
        self.builder
    }
}
