//! Checked entry point over the raw execution contract.
//!
//! `InputArray` / `OutputArray` remember the element type and length of the
//! slices they borrow, so [`execute_arrays`] can verify arity, element types
//! and index bounds before handing raw pointers to an executor.

use std::any::TypeId;
use std::marker::PhantomData;

use crate::array_execution::ArrayExecution;
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::types::SharedType;

#[derive(Debug, Clone, Copy)]
pub struct InputArray<'a> {
    ptr: *const u8,
    len: usize,
    type_id: TypeId,
    type_name: &'static str,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> InputArray<'a> {
    pub fn new<T: 'static>(values: &'a [T]) -> Self {
        Self {
            ptr: values.as_ptr().cast(),
            len: values.len(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug)]
pub struct OutputArray<'a> {
    ptr: *mut u8,
    len: usize,
    type_id: TypeId,
    type_name: &'static str,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> OutputArray<'a> {
    pub fn new<T: 'static>(values: &'a mut [T]) -> Self {
        Self {
            ptr: values.as_mut_ptr().cast(),
            len: values.len(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn check_buffer(
    direction: &str,
    slot: usize,
    ty: &SharedType,
    type_id: TypeId,
    type_name: &str,
    len: usize,
    max_index: Option<usize>,
) -> Result<(), ExecutionError> {
    let expected = ty.value_info().map(|info| info.value_type_id());
    if expected != Some(type_id) {
        return Err(ExecutionError::InvalidArgument(format!(
            "{direction} {slot} expects `{}`, got a `{type_name}` buffer",
            ty.name()
        )));
    }
    if let Some(max_index) = max_index {
        if max_index >= len {
            return Err(ExecutionError::InvalidArgument(format!(
                "index {max_index} out of bounds for {direction} {slot} of length {len}"
            )));
        }
    }
    Ok(())
}

/// Validate the buffers against the executor's function, then execute.
pub fn execute_arrays(
    execution: &dyn ArrayExecution,
    indices: &[usize],
    inputs: &[InputArray<'_>],
    outputs: &mut [OutputArray<'_>],
    context: &mut ExecutionContext,
) -> Result<(), ExecutionError> {
    let function = execution.function();
    if inputs.len() != function.input_amount() || outputs.len() != function.output_amount() {
        return Err(ExecutionError::InvalidArgument(format!(
            "{} takes {} inputs and {} outputs, got {} and {}",
            function.name(),
            function.input_amount(),
            function.output_amount(),
            inputs.len(),
            outputs.len()
        )));
    }

    let max_index = indices.iter().copied().max();
    for (slot, (buffer, ty)) in inputs.iter().zip(function.input_types()).enumerate() {
        check_buffer("input", slot, ty, buffer.type_id, buffer.type_name, buffer.len, max_index)?;
    }
    for (slot, (buffer, ty)) in outputs.iter().zip(function.output_types()).enumerate() {
        check_buffer("output", slot, ty, buffer.type_id, buffer.type_name, buffer.len, max_index)?;
    }

    let input_ptrs: Vec<*const u8> = inputs.iter().map(|buffer| buffer.ptr).collect();
    let output_ptrs: Vec<*mut u8> = outputs.iter().map(|buffer| buffer.ptr).collect();
    // SAFETY: types and bounds were checked above, and the borrows held by
    // the arrays keep inputs and outputs alive and disjoint.
    unsafe { execution.execute(indices, &input_ptrs, &output_ptrs, context) }
}
