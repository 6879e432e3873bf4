//! Boxed-call execution: one body call per index through reused call-frames.

use std::sync::Arc;

use crate::array_execution::{ArrayExecution, ArrayExecutionBase};
use crate::body::TupleCallBody;
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::function::SharedFunction;
use crate::tuple::{Tuple, TupleMeta};

pub struct TupleCallArrayExecution {
    base: ArrayExecutionBase,
    body: Arc<dyn TupleCallBody>,
    input_meta: Arc<TupleMeta>,
    output_meta: Arc<TupleMeta>,
}

impl TupleCallArrayExecution {
    /// Panics unless `function` has a tuple-call body.
    pub fn new(function: SharedFunction) -> Self {
        let base = ArrayExecutionBase::new(function);
        let function = base.function();
        let body = match function.tuple_call_body() {
            Some(body) => body.clone(),
            None => panic!("{}: function has no tuple-call body", function.name()),
        };
        let input_types: Vec<_> = function.input_types().cloned().collect();
        let output_types: Vec<_> = function.output_types().cloned().collect();
        Self {
            input_meta: Arc::new(TupleMeta::new(&input_types)),
            output_meta: Arc::new(TupleMeta::new(&output_types)),
            body,
            base,
        }
    }

    unsafe fn process(
        &self,
        indices: &[usize],
        input_buffers: &[*const u8],
        output_buffers: &[*mut u8],
        fn_in: &mut Tuple,
        fn_out: &mut Tuple,
        context: &mut ExecutionContext,
    ) -> Result<(), ExecutionError> {
        let input_sizes = self.base.input_sizes();
        let output_sizes = self.base.output_sizes();

        for &index in indices {
            for (slot, (&buffer, &size)) in input_buffers.iter().zip(input_sizes).enumerate() {
                // SAFETY: the caller guarantees `index` is inside every buffer.
                unsafe { fn_in.copy_in_dynamic(slot, buffer.add(index * size)) };
            }

            if let Err(err) = self.body.call(fn_in, fn_out, context) {
                tracing::warn!(
                    function = self.base.function().name(),
                    index,
                    error = %err,
                    "function body failed, abandoning batch"
                );
                return Err(err);
            }

            for (slot, (&buffer, &size)) in output_buffers.iter().zip(output_sizes).enumerate() {
                // SAFETY: as above, for output buffers.
                unsafe { fn_out.relocate_out_dynamic(slot, buffer.add(index * size)) };
            }
        }
        Ok(())
    }
}

impl ArrayExecution for TupleCallArrayExecution {
    fn base(&self) -> &ArrayExecutionBase {
        &self.base
    }

    fn strategy(&self) -> &'static str {
        "tuple-call"
    }

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

        let mut fn_in = Tuple::new(self.input_meta.clone());
        let mut fn_out = Tuple::new(self.output_meta.clone());

        let mut frame = context.enter(self.base.function().name());
        // SAFETY: forwarded from the caller.
        unsafe {
            self.process(
                indices,
                input_buffers,
                output_buffers,
                &mut fn_in,
                &mut fn_out,
                &mut frame,
            )
        }
    }
}

pub fn get_tuple_call_array_execution(function: SharedFunction) -> Box<dyn ArrayExecution> {
    Box::new(TupleCallArrayExecution::new(function))
}
