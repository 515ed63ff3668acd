use crate::compute::{CpuBuffer, CpuExecutionQueue, CpuSignal, Operation, QueueTask};
use hashbrown::HashMap;
use std::sync::Arc;
use tilestream_runtime::{
    AllocationError, BufferId, DeviceContext, DeviceError, HostBuffer, QueueKind, TileBindings,
    TileKernel,
    backtrace::BackTrace,
    config::{GlobalConfig, Logger, device::DeviceConfig, device::DeviceLogLevel},
};

/// A device whose memory lives on the host, with one worker thread per execution queue.
///
/// Transfers are executed by the transfer queue and kernels by the compute queue, so a kernel
/// can run while the next tiles are copied.
#[derive(Debug)]
pub struct CpuDevice {
    transfer: CpuExecutionQueue,
    compute: CpuExecutionQueue,
    allocations: HashMap<BufferId, usize>,
    memory_budget: Option<usize>,
    memory_used: usize,
    logger: Logger,
}

impl CpuDevice {
    /// Creates a device configured from the global configuration.
    pub fn new() -> Result<Self, DeviceError> {
        let config = GlobalConfig::get();
        Self::from_config(&config.device, Logger::from_config(config.clone()))
    }

    /// Creates a device with the given configuration.
    pub fn from_config(config: &DeviceConfig, logger: Logger) -> Result<Self, DeviceError> {
        Ok(Self {
            transfer: CpuExecutionQueue::new(QueueKind::Transfer, config.queue_capacity)?,
            compute: CpuExecutionQueue::new(QueueKind::Compute, config.queue_capacity)?,
            allocations: HashMap::new(),
            memory_budget: config.memory_budget,
            memory_used: 0,
            logger,
        })
    }

    /// Number of bytes currently allocated.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Number of live buffers.
    pub fn num_allocations(&self) -> usize {
        self.allocations.len()
    }

    /// Blocks until both queues executed every submitted operation.
    pub fn sync(&mut self) -> Result<(), DeviceError> {
        self.transfer.flush()?;
        self.compute.flush()
    }

    fn check_buffer(&self, buffer: &CpuBuffer) -> Result<(), DeviceError> {
        if self.allocations.contains_key(&buffer.id()) {
            return Ok(());
        }

        Err(DeviceError::invalid_buffer(format!(
            "{} isn't allocated on this device",
            buffer.id()
        )))
    }

    fn submit(
        &mut self,
        queue: QueueKind,
        operation: Operation,
        wait_on: &[CpuSignal],
    ) -> Result<CpuSignal, DeviceError> {
        let signal = CpuSignal::pending();

        if self.logger.log_level_device() == DeviceLogLevel::Full {
            let deps = wait_on.iter().map(|s| s.id().value()).collect::<Vec<_>>();
            self.logger.log_device(&format!(
                "[{queue}] {} -> {} waiting on {deps:?}",
                operation.name(),
                signal.id()
            ));
        }

        let task = QueueTask::new(operation, wait_on.to_vec(), signal.clone());
        match queue {
            QueueKind::Transfer => self.transfer.push(task)?,
            QueueKind::Compute => self.compute.push(task)?,
        }

        Ok(signal)
    }
}

impl DeviceContext for CpuDevice {
    type Buffer = CpuBuffer;
    type Signal = CpuSignal;
    type Kernel = Arc<dyn TileKernel>;

    fn allocate(&mut self, len: usize) -> Result<CpuBuffer, AllocationError> {
        let available = match self.memory_budget {
            Some(budget) => budget.saturating_sub(self.memory_used),
            None => usize::MAX,
        };
        // An overflowing size is reported as `usize::MAX` bytes.
        let requested = match len.checked_mul(core::mem::size_of::<f32>()) {
            Some(requested) if requested <= available => requested,
            requested => {
                let requested = requested.unwrap_or(usize::MAX);
                if self.logger.log_level_device() != DeviceLogLevel::Disabled {
                    self.logger.log_device(&format!(
                        "Allocation of {requested} bytes refused, {available} bytes available"
                    ));
                }
                return Err(AllocationError::OutOfMemory {
                    requested,
                    available,
                    backtrace: BackTrace::capture(),
                });
            }
        };

        let buffer = CpuBuffer::new(len);
        self.allocations.insert(buffer.id(), requested);
        self.memory_used += requested;

        if self.logger.log_level_device() != DeviceLogLevel::Disabled {
            self.logger
                .log_device(&format!("Allocated {} ({requested} bytes)", buffer.id()));
        }

        Ok(buffer)
    }

    fn release(&mut self, buffer: CpuBuffer) {
        match self.allocations.remove(&buffer.id()) {
            Some(size) => {
                self.memory_used -= size;
                if self.logger.log_level_device() != DeviceLogLevel::Disabled {
                    self.logger
                        .log_device(&format!("Released {} ({size} bytes)", buffer.id()));
                }
            }
            None => log::warn!("Releasing {}, which isn't allocated on this device", buffer.id()),
        }
    }

    fn upload(
        &mut self,
        src: &HostBuffer,
        dst: &CpuBuffer,
        wait_on: &[CpuSignal],
    ) -> Result<CpuSignal, DeviceError> {
        self.check_buffer(dst)?;
        if src.len() != dst.len() {
            return Err(DeviceError::transfer(format!(
                "can't upload {} elements into {} holding {}",
                src.len(),
                dst.id(),
                dst.len()
            )));
        }

        let operation = Operation::Upload {
            src: src.clone(),
            dst: dst.clone(),
        };
        self.submit(QueueKind::Transfer, operation, wait_on)
    }

    fn download(
        &mut self,
        src: &CpuBuffer,
        dst: &HostBuffer,
        wait_on: &[CpuSignal],
    ) -> Result<CpuSignal, DeviceError> {
        self.check_buffer(src)?;
        if src.len() != dst.len() {
            return Err(DeviceError::transfer(format!(
                "can't download {} holding {} elements into {}",
                src.id(),
                src.len(),
                dst.len()
            )));
        }

        let operation = Operation::Download {
            src: src.clone(),
            dst: dst.clone(),
        };
        self.submit(QueueKind::Transfer, operation, wait_on)
    }

    fn launch(
        &mut self,
        kernel: &Arc<dyn TileKernel>,
        bindings: TileBindings<'_, CpuBuffer>,
        wait_on: &[CpuSignal],
    ) -> Result<CpuSignal, DeviceError> {
        for buffer in [bindings.lhs, bindings.rhs, bindings.out] {
            self.check_buffer(buffer).map_err(|err| DeviceError::launch(err.summary()))?;
        }

        let operation = Operation::Launch {
            kernel: kernel.clone(),
            lhs: bindings.lhs.clone(),
            rhs: bindings.rhs.clone(),
            out: bindings.out.clone(),
            reduce_len: bindings.reduce_len,
            out_width: bindings.out_width,
        };
        self.submit(QueueKind::Compute, operation, wait_on)
    }

    fn wait(&mut self, signals: &[CpuSignal]) -> Result<(), DeviceError> {
        let mut first_error = None;

        // Every signal is awaited, even after a failure.
        for signal in signals {
            if let Err(err) = signal.wait() {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_complete(&self, signal: &CpuSignal) -> bool {
        signal.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NaiveTileKernel;

    fn test_device(memory_budget: Option<usize>) -> CpuDevice {
        let config = DeviceConfig {
            memory_budget,
            ..Default::default()
        };
        CpuDevice::from_config(&config, Logger::from_config(Arc::new(GlobalConfig::default())))
            .unwrap()
    }

    #[test_log::test]
    fn upload_launch_download() {
        let mut device = test_device(None);
        let kernel: Arc<dyn TileKernel> = Arc::new(NaiveTileKernel);
        let lhs = device.allocate(4).unwrap();
        let rhs = device.allocate(4).unwrap();
        let out = device.allocate(4).unwrap();

        let host_lhs = HostBuffer::zeros(4);
        host_lhs.lock().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let host_rhs = HostBuffer::zeros(4);
        host_rhs.lock().copy_from_slice(&[5.0, 6.0, 7.0, 8.0]);
        let host_out = HostBuffer::zeros(4);

        let up_lhs = device.upload(&host_lhs, &lhs, &[]).unwrap();
        let up_rhs = device.upload(&host_rhs, &rhs, &[]).unwrap();
        let launched = device
            .launch(
                &kernel,
                TileBindings::new(&lhs, &rhs, &out, 2, 2),
                &[up_lhs, up_rhs],
            )
            .unwrap();
        let downloaded = device.download(&out, &host_out, &[launched]).unwrap();
        device.wait(&[downloaded]).unwrap();

        assert_eq!(host_out.to_vec(), vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test_log::test]
    fn allocation_respects_budget() {
        let mut device = test_device(Some(64));

        let first = device.allocate(8).unwrap();
        let err = device.allocate(16).unwrap_err();

        assert!(matches!(
            err,
            AllocationError::OutOfMemory {
                requested: 64,
                available: 32,
                ..
            }
        ));

        device.release(first);
        assert_eq!(device.memory_used(), 0);
        assert!(device.allocate(16).is_ok());
    }

    #[test_log::test]
    fn overflowing_allocation_is_out_of_memory() {
        let mut device = test_device(None);

        let err = device.allocate(usize::MAX / 2).unwrap_err();

        assert!(matches!(
            err,
            AllocationError::OutOfMemory {
                requested: usize::MAX,
                ..
            }
        ));
        assert_eq!(device.memory_used(), 0);
        assert_eq!(device.num_allocations(), 0);
    }

    #[test_log::test]
    fn upload_to_foreign_buffer_is_rejected() {
        let mut device = test_device(None);
        let mut other = test_device(None);
        let buffer = other.allocate(2).unwrap();

        let err = device
            .upload(&HostBuffer::zeros(2), &buffer, &[])
            .unwrap_err();

        assert!(matches!(err, DeviceError::InvalidBuffer { .. }));
    }

    #[test_log::test]
    fn failure_propagates_across_queues() {
        #[derive(Debug)]
        struct FailingKernel;

        impl TileKernel for FailingKernel {
            fn compute(&self, _args: tilestream_runtime::TileArgs<'_>) {
                panic!("kernel failure");
            }
        }

        let mut device = test_device(None);
        let kernel: Arc<dyn TileKernel> = Arc::new(FailingKernel);
        let lhs = device.allocate(1).unwrap();
        let rhs = device.allocate(1).unwrap();
        let out = device.allocate(1).unwrap();
        let host_out = HostBuffer::zeros(1);

        let launched = device
            .launch(&kernel, TileBindings::new(&lhs, &rhs, &out, 1, 1), &[])
            .unwrap();
        let downloaded = device.download(&out, &host_out, &[launched.clone()]).unwrap();

        assert!(matches!(
            device.wait(&[downloaded]),
            Err(DeviceError::DependencyFailed { .. })
        ));
        assert!(matches!(
            device.wait(&[launched]),
            Err(DeviceError::Execution { .. })
        ));
    }
}
