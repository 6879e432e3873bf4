//! Execute typed functions over batches of array elements.
//!
//! A [`Function`] describes its inputs, outputs and one or more bodies. An
//! [`ArrayExecution`] runs it over selected indices of caller-owned buffers,
//! either by calling a [`TupleCallBody`] once per index
//! ([`get_tuple_call_array_execution`]) or by compiling the whole batch loop
//! around a [`JitBuildBody`] with Cranelift ([`get_precompiled_array_execution`]).

mod array_execution;
mod body;
mod buffers;
mod config;
mod context;
mod error;
mod function;
pub mod jit;
mod precompiled;
mod tuple;
mod tuple_call;
pub mod types;
mod value_info;

pub use array_execution::{get_array_execution, ArrayExecution, ArrayExecutionBase};
pub use body::{BodyIr, FnTupleCall, InlineJitBody, JitBuildBody, TupleCallBody};
pub use buffers::{execute_arrays, InputArray, OutputArray};
pub use config::{JitSettings, OptLevel, OPT_LEVEL_ENV, VERIFY_ENV};
pub use context::{CancellationToken, ExecutionContext, RecordedFailure};
pub use error::ExecutionError;
pub use function::{Function, FunctionBody, FunctionBuilder, Parameter, SharedFunction};
pub use precompiled::{get_precompiled_array_execution, PrecompiledArrayExecution};
pub use tuple::{Tuple, TupleMeta};
pub use tuple_call::{get_tuple_call_array_execution, TupleCallArrayExecution};
pub use types::{SharedType, Type};
pub use value_info::{TypedValueInfo, ValueTypeInfo};

/// Re-exported so bodies can be written against the same Cranelift version.
pub use cranelift_codegen;
pub use cranelift_frontend;
