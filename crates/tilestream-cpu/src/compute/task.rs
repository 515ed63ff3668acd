use super::{CpuBuffer, CpuSignal};
use std::{panic::AssertUnwindSafe, sync::Arc};
use tilestream_runtime::{DeviceError, HostBuffer, TileArgs, TileKernel};

/// An operation executed by a queue worker.
#[derive(Debug)]
pub enum Operation {
    /// Copies host memory into a device buffer.
    Upload { src: HostBuffer, dst: CpuBuffer },
    /// Copies a device buffer into host memory.
    Download { src: CpuBuffer, dst: HostBuffer },
    /// Runs a tile kernel.
    Launch {
        kernel: Arc<dyn TileKernel>,
        lhs: CpuBuffer,
        rhs: CpuBuffer,
        out: CpuBuffer,
        reduce_len: usize,
        out_width: usize,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Upload { .. } => "upload",
            Operation::Download { .. } => "download",
            Operation::Launch { .. } => "launch",
        }
    }

    fn execute(self) -> Result<(), DeviceError> {
        match self {
            Operation::Upload { src, dst } => {
                let src = src.lock();
                let mut dst = dst.lock();
                copy(&src, &mut dst).map_err(DeviceError::transfer)
            }
            Operation::Download { src, dst } => {
                let src = src.lock();
                let mut dst = dst.lock();
                copy(&src, &mut dst).map_err(DeviceError::transfer)
            }
            Operation::Launch {
                kernel,
                lhs,
                rhs,
                out,
                reduce_len,
                out_width,
            } => {
                if out.same_storage(&lhs) || out.same_storage(&rhs) {
                    return Err(DeviceError::execution(
                        "the output buffer of a launch aliases one of its inputs",
                    ));
                }

                let lhs_data = lhs.lock();
                // Both inputs can be bound to the same buffer, the spin lock isn't reentrant.
                let rhs_data = if rhs.same_storage(&lhs) {
                    None
                } else {
                    Some(rhs.lock())
                };
                let rhs_slice = rhs_data.as_deref().unwrap_or(&*lhs_data);
                let mut out_data = out.lock();

                let args = TileArgs::new(&lhs_data, rhs_slice, &mut out_data, reduce_len, out_width);
                args.validate().map_err(DeviceError::execution)?;

                std::panic::catch_unwind(AssertUnwindSafe(|| kernel.compute(args))).map_err(
                    |_| DeviceError::execution(format!("kernel {} panicked", kernel.name())),
                )
            }
        }
    }
}

fn copy(src: &[f32], dst: &mut [f32]) -> Result<(), String> {
    if src.len() != dst.len() {
        return Err(format!(
            "source holds {} elements, destination {}",
            src.len(),
            dst.len()
        ));
    }
    dst.copy_from_slice(src);
    Ok(())
}

/// An operation with its dependencies and completion signal.
#[derive(new, Debug)]
pub struct QueueTask {
    pub operation: Operation,
    pub wait_on: Vec<CpuSignal>,
    pub signal: CpuSignal,
}

impl QueueTask {
    /// Waits on the dependencies, executes the operation and resolves the signal.
    pub fn run(self) {
        let QueueTask {
            operation,
            wait_on,
            signal,
        } = self;

        for dependency in wait_on.iter() {
            if let Err(err) = dependency.wait() {
                log::debug!("Skipping {}: {}", operation.name(), err.summary());
                signal.resolve(Err(DeviceError::dependency(&err)));
                return;
            }
        }

        let name = operation.name();
        let result = operation.execute();
        if let Err(err) = &result {
            log::warn!("Operation {name} failed: {}", err.summary());
        }
        signal.resolve(result);
    }
}
