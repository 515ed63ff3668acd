use super::QueueTask;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;
use tilestream_runtime::{DeviceError, QueueKind};

/// In-order execution queue backed by a worker thread.
///
/// Tasks are executed one at a time in submission order. A task first waits on its
/// dependencies, which may belong to the other queue of the device.
#[derive(Debug)]
pub struct CpuExecutionQueue {
    kind: QueueKind,
    sender: Option<SyncSender<QueueItem>>,
    worker: Option<JoinHandle<()>>,
}

enum QueueItem {
    Task(QueueTask),
    Flush(SyncSender<()>),
}

impl CpuExecutionQueue {
    /// Spawns the worker thread of a new queue accepting up to `capacity` pending tasks.
    pub fn new(kind: QueueKind, capacity: usize) -> Result<Self, DeviceError> {
        let (sender, receiver) = std::sync::mpsc::sync_channel(capacity.max(1));

        let worker = std::thread::Builder::new()
            .name(format!("tilestream-{kind}"))
            .spawn(move || Self::work(kind, receiver))
            .map_err(|err| DeviceError::execution(format!("can't spawn the {kind} queue: {err}")))?;

        Ok(Self {
            kind,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Submits a task, blocking while the queue is full.
    pub fn push(&self, task: QueueTask) -> Result<(), DeviceError> {
        let sender = self.sender()?;

        match sender.try_send(QueueItem::Task(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) => {
                log::trace!("The {} queue is full, waiting for a free entry", self.kind);
                sender
                    .send(item)
                    .map_err(|_| DeviceError::disconnected(self.kind))
            }
            Err(TrySendError::Disconnected(_)) => Err(DeviceError::disconnected(self.kind)),
        }
    }

    /// Blocks until every submitted task has been executed.
    pub fn flush(&self) -> Result<(), DeviceError> {
        let (sender, receiver) = std::sync::mpsc::sync_channel(1);
        self.sender()?
            .send(QueueItem::Flush(sender))
            .map_err(|_| DeviceError::disconnected(self.kind))?;
        receiver
            .recv()
            .map_err(|_| DeviceError::disconnected(self.kind))
    }

    fn sender(&self) -> Result<&SyncSender<QueueItem>, DeviceError> {
        self.sender
            .as_ref()
            .ok_or_else(|| DeviceError::disconnected(self.kind))
    }

    fn work(kind: QueueKind, receiver: Receiver<QueueItem>) {
        log::trace!("The {kind} queue started");

        for item in receiver.iter() {
            match item {
                QueueItem::Task(task) => task.run(),
                QueueItem::Flush(sender) => {
                    // The flusher may have given up waiting.
                    sender.send(()).ok();
                }
            }
        }

        log::trace!("The {kind} queue stopped");
    }
}

impl Drop for CpuExecutionQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what was submitted, then exit.
        self.sender.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("The {} queue worker panicked", self.kind);
            }
        }
    }
}
