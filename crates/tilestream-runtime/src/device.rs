use crate::{HostBuffer, backtrace::BackTrace};
use alloc::string::String;
use thiserror::Error;

/// Error reported by a device operation.
///
/// Device errors are always fatal to the pipeline: a failed asynchronous operation leaves the
/// buffers it touched in an undefined state.
#[derive(Error, Clone)]
pub enum DeviceError {
    /// A host-device copy failed.
    #[error("A transfer failed\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    Transfer {
        /// The cause of the failure.
        reason: String,
        /// The captured backtrace.
        backtrace: BackTrace,
    },

    /// The kernel couldn't be enqueued.
    #[error("A kernel launch failed\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    Launch {
        /// The cause of the failure.
        reason: String,
        /// The captured backtrace.
        backtrace: BackTrace,
    },

    /// An enqueued operation failed while executing on the device.
    #[error("An error happened during execution\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    Execution {
        /// The cause of the failure.
        reason: String,
        /// The captured backtrace.
        backtrace: BackTrace,
    },

    /// An operation was skipped because one of the signals it waited on failed.
    #[error("An operation this one depends on failed\nCaused by:\n  {reason}")]
    DependencyFailed {
        /// The cause of the failure.
        reason: String,
    },

    /// The buffer handle is unknown to the device, or was already released.
    #[error("Invalid buffer handle\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    InvalidBuffer {
        /// The cause of the failure.
        reason: String,
        /// The captured backtrace.
        backtrace: BackTrace,
    },

    /// The execution queue stopped accepting work.
    #[error("The {queue} queue is disconnected\nBacktrace:\n{backtrace}")]
    QueueDisconnected {
        /// The queue that stopped.
        queue: QueueKind,
        /// The captured backtrace.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for DeviceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

impl DeviceError {
    /// Creates a transfer error capturing the current backtrace.
    pub fn transfer(reason: impl Into<String>) -> Self {
        Self::Transfer {
            reason: reason.into(),
            backtrace: BackTrace::capture(),
        }
    }

    /// Creates a launch error capturing the current backtrace.
    pub fn launch(reason: impl Into<String>) -> Self {
        Self::Launch {
            reason: reason.into(),
            backtrace: BackTrace::capture(),
        }
    }

    /// Creates an execution error capturing the current backtrace.
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
            backtrace: BackTrace::capture(),
        }
    }

    /// Creates an invalid buffer error capturing the current backtrace.
    pub fn invalid_buffer(reason: impl Into<String>) -> Self {
        Self::InvalidBuffer {
            reason: reason.into(),
            backtrace: BackTrace::capture(),
        }
    }

    /// Creates a disconnected queue error capturing the current backtrace.
    pub fn disconnected(queue: QueueKind) -> Self {
        Self::QueueDisconnected {
            queue,
            backtrace: BackTrace::capture(),
        }
    }

    /// Wraps the error of a failed dependency.
    pub fn dependency(cause: &DeviceError) -> Self {
        Self::DependencyFailed {
            reason: cause.summary(),
        }
    }

    /// A one-line description of the error, without backtrace.
    pub fn summary(&self) -> String {
        match self {
            DeviceError::Transfer { reason, .. } => alloc::format!("transfer failed: {reason}"),
            DeviceError::Launch { reason, .. } => alloc::format!("launch failed: {reason}"),
            DeviceError::Execution { reason, .. } => alloc::format!("execution failed: {reason}"),
            DeviceError::DependencyFailed { reason } => alloc::format!("dependency failed: {reason}"),
            DeviceError::InvalidBuffer { reason, .. } => alloc::format!("invalid buffer: {reason}"),
            DeviceError::QueueDisconnected { queue, .. } => {
                alloc::format!("{queue} queue disconnected")
            }
        }
    }
}

/// Error raised when device memory can't be reserved.
#[derive(Error, Clone)]
pub enum AllocationError {
    /// The device doesn't have enough free memory left.
    #[error(
        "Out of device memory: requested {requested} bytes, {available} bytes available\nBacktrace:\n{backtrace}"
    )]
    OutOfMemory {
        /// Requested size in bytes.
        requested: usize,
        /// Free size in bytes.
        available: usize,
        /// The captured backtrace.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for AllocationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// The two independent execution queues of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Host-device copies.
    Transfer,
    /// Kernel launches.
    Compute,
}

impl core::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QueueKind::Transfer => f.write_str("transfer"),
            QueueKind::Compute => f.write_str("compute"),
        }
    }
}

/// The device buffers bound to one kernel launch.
#[derive(new, Debug)]
pub struct TileBindings<'a, B> {
    /// The left-hand side tile.
    pub lhs: &'a B,
    /// The right-hand side tile.
    pub rhs: &'a B,
    /// The output tile.
    pub out: &'a B,
    /// Length of the reduction dimension.
    pub reduce_len: usize,
    /// Number of columns of the output tile.
    pub out_width: usize,
}

/// A device able to run transfers and kernels asynchronously on two queues.
///
/// Every enqueue returns a completion signal immediately. An operation doesn't start before all
/// the signals in its `wait_on` set have completed. When an operation fails, its signal resolves
/// with the error, and so do the signals of every operation waiting on it, so
/// [wait](DeviceContext::wait) never blocks on an operation that will never happen.
pub trait DeviceContext {
    /// A device-resident buffer of `f32`.
    type Buffer: core::fmt::Debug;
    /// Opaque handle on the completion of one operation.
    type Signal: Clone + core::fmt::Debug;
    /// The compute kernel bound by the setup layer.
    type Kernel;

    /// Allocates a buffer of `len` elements.
    fn allocate(&mut self, len: usize) -> Result<Self::Buffer, AllocationError>;

    /// Releases a buffer. Operations already enqueued against it still complete.
    fn release(&mut self, buffer: Self::Buffer);

    /// Enqueues a copy of `src` into `dst` on the transfer queue.
    fn upload(
        &mut self,
        src: &HostBuffer,
        dst: &Self::Buffer,
        wait_on: &[Self::Signal],
    ) -> Result<Self::Signal, DeviceError>;

    /// Enqueues a copy of `src` into `dst` on the transfer queue.
    ///
    /// The content of `dst` is only valid once the returned signal completed.
    fn download(
        &mut self,
        src: &Self::Buffer,
        dst: &HostBuffer,
        wait_on: &[Self::Signal],
    ) -> Result<Self::Signal, DeviceError>;

    /// Enqueues the kernel over the given bindings on the compute queue.
    fn launch(
        &mut self,
        kernel: &Self::Kernel,
        bindings: TileBindings<'_, Self::Buffer>,
        wait_on: &[Self::Signal],
    ) -> Result<Self::Signal, DeviceError>;

    /// Blocks until every signal completed, returning the first error reported.
    fn wait(&mut self, signals: &[Self::Signal]) -> Result<(), DeviceError>;

    /// Returns whether the signal already resolved, successfully or not.
    fn is_complete(&self, signal: &Self::Signal) -> bool;
}
