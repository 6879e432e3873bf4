//! Per-batch execution state threaded through every function call.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a caller can flip from another thread to ask bodies to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A failure recorded by compiled code through `rt_context_fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedFailure {
    pub code: i64,
}

/// Opaque to the array executors; bodies use it to observe cancellation,
/// report failures from generated code and label diagnostics.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    cancellation: CancellationToken,
    failure: Option<RecordedFailure>,
    stack: Vec<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..Self::default()
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Only the first failure of a batch is kept.
    pub fn record_failure(&mut self, code: i64) {
        if self.failure.is_none() {
            self.failure = Some(RecordedFailure { code });
        }
    }

    pub fn failure(&self) -> Option<RecordedFailure> {
        self.failure
    }

    pub fn take_failure(&mut self) -> Option<RecordedFailure> {
        self.failure.take()
    }

    pub fn push_frame(&mut self, name: impl Into<String>) {
        self.stack.push(name.into());
    }

    pub fn pop_frame(&mut self) -> Option<String> {
        self.stack.pop()
    }

    /// Push `name` for the lifetime of the returned guard, popping it again
    /// even when the body unwinds.
    pub fn enter(&mut self, name: impl Into<String>) -> FrameGuard<'_> {
        self.push_frame(name);
        FrameGuard { context: self }
    }

    /// Names of the functions currently being executed, outermost first.
    pub fn stack(&self) -> &[String] {
        &self.stack
    }
}

/// A call-stack entry held by [`ExecutionContext::enter`].
#[derive(Debug)]
pub struct FrameGuard<'a> {
    context: &'a mut ExecutionContext,
}

impl Deref for FrameGuard<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.context
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.context
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.context.pop_frame();
    }
}
