//! The array execution contract shared by both strategies.

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::function::SharedFunction;
use crate::precompiled::get_precompiled_array_execution;
use crate::tuple_call::get_tuple_call_array_execution;

/// Runs a function over selected elements of caller-owned arrays.
///
/// Executors are shareable: `execute` only reads the executor, so one handle
/// may serve concurrent calls that use disjoint output buffers.
pub trait ArrayExecution: Send + Sync {
    fn base(&self) -> &ArrayExecutionBase;

    /// Short name of the strategy, for diagnostics.
    fn strategy(&self) -> &'static str;

    /// For every index `i`, read element `i` of each input buffer, call the
    /// function and write element `i` of each output buffer. Indices may be
    /// in any order and may repeat; the processing order is unspecified.
    ///
    /// # Safety
    /// `input_buffers[k]` must point to an array of the function's `k`-th input
    /// type holding more than `max(indices)` initialized elements, and
    /// likewise for `output_buffers` (writable, not aliasing any input).
    /// Arity mismatches panic.
    unsafe fn execute(
        &self,
        indices: &[usize],
        input_buffers: &[*const u8],
        output_buffers: &[*mut u8],
        context: &mut ExecutionContext,
    ) -> Result<(), ExecutionError>;

    fn function(&self) -> &SharedFunction {
        &self.base().function
    }

    fn input_sizes(&self) -> &[usize] {
        &self.base().input_sizes
    }

    fn output_sizes(&self) -> &[usize] {
        &self.base().output_sizes
    }
}

/// The function plus the element size of every input and output.
#[derive(Debug)]
pub struct ArrayExecutionBase {
    function: SharedFunction,
    input_sizes: Vec<usize>,
    output_sizes: Vec<usize>,
}

impl ArrayExecutionBase {
    /// Panics when a parameter type has no value type info.
    pub fn new(function: SharedFunction) -> Self {
        let size_of = |ty: &crate::types::SharedType| match ty.value_info() {
            Some(info) => info.size(),
            None => panic!(
                "{}: type `{}` has no value type info",
                function.name(),
                ty.name()
            ),
        };
        let input_sizes = function.input_types().map(size_of).collect();
        let output_sizes = function.output_types().map(size_of).collect();
        Self {
            function,
            input_sizes,
            output_sizes,
        }
    }

    pub fn function(&self) -> &SharedFunction {
        &self.function
    }

    pub fn input_sizes(&self) -> &[usize] {
        &self.input_sizes
    }

    pub fn output_sizes(&self) -> &[usize] {
        &self.output_sizes
    }

    pub(crate) fn assert_buffer_arity(&self, inputs: usize, outputs: usize) {
        assert_eq!(
            inputs,
            self.input_sizes.len(),
            "{}: wrong number of input buffers",
            self.function.name()
        );
        assert_eq!(
            outputs,
            self.output_sizes.len(),
            "{}: wrong number of output buffers",
            self.function.name()
        );
    }
}

/// Prefer compiled execution when the function can be compiled.
pub fn get_array_execution(
    function: SharedFunction,
) -> Result<Box<dyn ArrayExecution>, ExecutionError> {
    if function.has_jit_build_body() {
        get_precompiled_array_execution(function)
    } else {
        Ok(get_tuple_call_array_execution(function))
    }
}
