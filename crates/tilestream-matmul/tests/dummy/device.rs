use hashbrown::{HashMap, HashSet};
use std::sync::Arc;
use tilestream_runtime::{
    AllocationError, BufferId, DeviceContext, DeviceError, HostBuffer, QueueKind, TileArgs,
    TileBindings, TileKernel, backtrace::BackTrace,
};

/// A buffer of the dummy device.
#[derive(Debug)]
pub struct DummyBuffer {
    id: usize,
    len: usize,
}

/// Signal of one operation of the dummy device, the index of the operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DummySignal(usize);

/// How the injected launch failure shows up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// The launch call itself returns an error.
    Enqueue,
    /// The launch is accepted, its signal resolves with an error.
    Execution,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Resource {
    Device(usize),
    Host(BufferId),
}

#[derive(Debug)]
enum OpKind {
    Upload {
        src: HostBuffer,
        dst: usize,
    },
    Download {
        src: usize,
        dst: HostBuffer,
    },
    Launch {
        kernel: Arc<dyn TileKernel>,
        lhs: usize,
        rhs: usize,
        out: usize,
        reduce_len: usize,
        out_width: usize,
        fail: bool,
    },
}

impl OpKind {
    fn name(&self) -> &'static str {
        match self {
            OpKind::Upload { .. } => "upload",
            OpKind::Download { .. } => "download",
            OpKind::Launch { .. } => "launch",
        }
    }

    fn queue(&self) -> QueueKind {
        match self {
            OpKind::Launch { .. } => QueueKind::Compute,
            _ => QueueKind::Transfer,
        }
    }

    /// Resources read and written by the operation.
    fn resources(&self) -> (Vec<Resource>, Vec<Resource>) {
        match self {
            OpKind::Upload { src, dst } => (
                vec![Resource::Host(src.id())],
                vec![Resource::Device(*dst)],
            ),
            OpKind::Download { src, dst } => (
                vec![Resource::Device(*src)],
                vec![Resource::Host(dst.id())],
            ),
            OpKind::Launch { lhs, rhs, out, .. } => (
                vec![Resource::Device(*lhs), Resource::Device(*rhs)],
                vec![Resource::Device(*out)],
            ),
        }
    }
}

#[derive(Debug)]
enum OpState {
    Pending,
    Done,
    Failed(DeviceError),
}

#[derive(Debug)]
struct DeferredOp {
    kind: OpKind,
    wait_on: Vec<usize>,
    reads: Vec<Resource>,
    writes: Vec<Resource>,
    state: OpState,
}

impl DeferredOp {
    fn is_pending(&self) -> bool {
        matches!(self.state, OpState::Pending)
    }

    fn touches(&self, resource: &Resource) -> bool {
        self.reads.contains(resource) || self.writes.contains(resource)
    }
}

/// The dummy device is used to test the pipeline driver.
///
/// Operations are only executed when a signal depending on them is waited on, in queue order,
/// so any operation the driver forgets to wait on stays pending for as long as possible. Every
/// enqueue is checked against the operations still pending:
/// - writing a resource a pending operation reads or writes is a hazard,
/// - reading a resource a pending operation writes is a hazard,
/// - a host buffer must not be used by a pending transfer when a new transfer is issued, since
///   the host may have repacked it in between,
///
/// unless the pending operation is one of the dependencies of the new one.
#[derive(Debug, Default)]
pub struct DeferredDevice {
    buffers: HashMap<usize, Vec<f32>>,
    next_buffer: usize,
    ops: Vec<DeferredOp>,
    hazards: Vec<String>,
    max_buffers: Option<usize>,
    launch_failure: Option<(usize, FailureMode)>,
    launches: usize,
}

impl DeferredDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses allocations once `max_buffers` buffers are live.
    pub fn with_max_buffers(max_buffers: usize) -> Self {
        Self {
            max_buffers: Some(max_buffers),
            ..Self::default()
        }
    }

    /// Makes the `nth` launch (starting at 1) fail.
    pub fn fail_launch(mut self, nth: usize, mode: FailureMode) -> Self {
        self.launch_failure = Some((nth, mode));
        self
    }

    pub fn hazards(&self) -> &[String] {
        &self.hazards
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn num_launches(&self) -> usize {
        self.launches
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    pub fn pending_ops(&self) -> usize {
        self.ops.iter().filter(|op| op.is_pending()).count()
    }

    fn check_buffer(&self, buffer: &DummyBuffer) -> Result<(), DeviceError> {
        if self.buffers.contains_key(&buffer.id) {
            return Ok(());
        }

        Err(DeviceError::invalid_buffer(format!(
            "buffer {} isn't allocated",
            buffer.id
        )))
    }

    fn dependencies(&self, wait_on: &[DummySignal]) -> HashSet<usize> {
        let mut deps = HashSet::new();
        let mut stack = wait_on.iter().map(|signal| signal.0).collect::<Vec<_>>();

        while let Some(index) = stack.pop() {
            if deps.insert(index) {
                stack.extend(self.ops[index].wait_on.iter().copied());
            }
        }

        deps
    }

    fn issue(&mut self, kind: OpKind, wait_on: &[DummySignal]) -> DummySignal {
        let index = self.ops.len();
        let (reads, writes) = kind.resources();
        let deps = self.dependencies(wait_on);

        for (other, op) in self.ops.iter().enumerate() {
            if !op.is_pending() || deps.contains(&other) {
                continue;
            }

            for resource in writes.iter() {
                if op.touches(resource) {
                    self.hazards.push(format!(
                        "{} #{index} writes {resource:?} used by pending {} #{other}",
                        kind.name(),
                        op.kind.name()
                    ));
                }
            }

            for resource in reads.iter() {
                let host_race = matches!(resource, Resource::Host(_)) && op.touches(resource);
                if op.writes.contains(resource) || host_race {
                    self.hazards.push(format!(
                        "{} #{index} reads {resource:?} used by pending {} #{other}",
                        kind.name(),
                        op.kind.name()
                    ));
                }
            }
        }

        self.ops.push(DeferredOp {
            kind,
            wait_on: wait_on.iter().map(|signal| signal.0).collect(),
            reads,
            writes,
            state: OpState::Pending,
        });

        DummySignal(index)
    }

    fn execute(&mut self, index: usize) {
        if !self.ops[index].is_pending() {
            return;
        }

        // Queues are in order.
        let queue = self.ops[index].kind.queue();
        for earlier in 0..index {
            if self.ops[earlier].kind.queue() == queue {
                self.execute(earlier);
            }
        }

        let mut failure = None;
        for dep in self.ops[index].wait_on.clone() {
            self.execute(dep);
            if let OpState::Failed(err) = &self.ops[dep].state {
                failure.get_or_insert_with(|| DeviceError::dependency(err));
            }
        }

        let state = match failure {
            Some(err) => OpState::Failed(err),
            None => match self.run(index) {
                Ok(()) => OpState::Done,
                Err(err) => OpState::Failed(err),
            },
        };
        self.ops[index].state = state;
    }

    fn run(&mut self, index: usize) -> Result<(), DeviceError> {
        let op = &self.ops[index];

        match &op.kind {
            OpKind::Upload { src, dst } => {
                let dst = self
                    .buffers
                    .get_mut(dst)
                    .ok_or_else(|| DeviceError::transfer("upload into a released buffer"))?;
                dst.copy_from_slice(&src.lock());
            }
            OpKind::Download { src, dst } => {
                let src = self
                    .buffers
                    .get(src)
                    .ok_or_else(|| DeviceError::transfer("download from a released buffer"))?;
                dst.lock().copy_from_slice(src);
            }
            OpKind::Launch {
                kernel,
                lhs,
                rhs,
                out,
                reduce_len,
                out_width,
                fail,
            } => {
                if *fail {
                    return Err(DeviceError::execution("injected kernel failure"));
                }

                let released = || DeviceError::execution("launch over a released buffer");
                let lhs = self.buffers.get(lhs).ok_or_else(released)?.clone();
                let rhs = self.buffers.get(rhs).ok_or_else(released)?.clone();
                let out = self.buffers.get_mut(out).ok_or_else(released)?;

                let args = TileArgs::new(&lhs, &rhs, out, *reduce_len, *out_width);
                args.validate().map_err(DeviceError::execution)?;
                kernel.compute(args);
            }
        }

        Ok(())
    }
}

impl DeviceContext for DeferredDevice {
    type Buffer = DummyBuffer;
    type Signal = DummySignal;
    type Kernel = Arc<dyn TileKernel>;

    fn allocate(&mut self, len: usize) -> Result<DummyBuffer, AllocationError> {
        if self.max_buffers.is_some_and(|max| self.buffers.len() >= max) {
            return Err(AllocationError::OutOfMemory {
                requested: len * core::mem::size_of::<f32>(),
                available: 0,
                backtrace: BackTrace::capture(),
            });
        }

        let id = self.next_buffer;
        self.next_buffer += 1;
        self.buffers.insert(id, vec![0.0; len]);

        Ok(DummyBuffer { id, len })
    }

    fn release(&mut self, buffer: DummyBuffer) {
        let resource = Resource::Device(buffer.id);
        for (index, op) in self.ops.iter().enumerate() {
            if op.is_pending() && op.touches(&resource) {
                self.hazards.push(format!(
                    "buffer {} released while pending {} #{index} uses it",
                    buffer.id,
                    op.kind.name()
                ));
            }
        }

        self.buffers.remove(&buffer.id);
    }

    fn upload(
        &mut self,
        src: &HostBuffer,
        dst: &DummyBuffer,
        wait_on: &[DummySignal],
    ) -> Result<DummySignal, DeviceError> {
        self.check_buffer(dst)?;
        if src.len() != dst.len {
            return Err(DeviceError::transfer("length mismatch"));
        }

        let kind = OpKind::Upload {
            src: src.clone(),
            dst: dst.id,
        };
        Ok(self.issue(kind, wait_on))
    }

    fn download(
        &mut self,
        src: &DummyBuffer,
        dst: &HostBuffer,
        wait_on: &[DummySignal],
    ) -> Result<DummySignal, DeviceError> {
        self.check_buffer(src)?;
        if src.len != dst.len() {
            return Err(DeviceError::transfer("length mismatch"));
        }

        let kind = OpKind::Download {
            src: src.id,
            dst: dst.clone(),
        };
        Ok(self.issue(kind, wait_on))
    }

    fn launch(
        &mut self,
        kernel: &Arc<dyn TileKernel>,
        bindings: TileBindings<'_, DummyBuffer>,
        wait_on: &[DummySignal],
    ) -> Result<DummySignal, DeviceError> {
        for buffer in [bindings.lhs, bindings.rhs, bindings.out] {
            self.check_buffer(buffer)?;
        }

        self.launches += 1;
        let fail = match self.launch_failure {
            Some((nth, FailureMode::Enqueue)) if nth == self.launches => {
                return Err(DeviceError::launch("injected enqueue failure"));
            }
            Some((nth, FailureMode::Execution)) => nth == self.launches,
            _ => false,
        };

        let kind = OpKind::Launch {
            kernel: kernel.clone(),
            lhs: bindings.lhs.id,
            rhs: bindings.rhs.id,
            out: bindings.out.id,
            reduce_len: bindings.reduce_len,
            out_width: bindings.out_width,
            fail,
        };
        Ok(self.issue(kind, wait_on))
    }

    fn wait(&mut self, signals: &[DummySignal]) -> Result<(), DeviceError> {
        let mut first_error = None;

        for signal in signals {
            self.execute(signal.0);
            if let OpState::Failed(err) = &self.ops[signal.0].state {
                first_error.get_or_insert_with(|| err.clone());
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_complete(&self, signal: &DummySignal) -> bool {
        !self.ops[signal.0].is_pending()
    }
}
