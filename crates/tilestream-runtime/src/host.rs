use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use spin::{Mutex, MutexGuard};

use crate::BufferId;

/// Fixed-length host memory that device queues can read from or write into asynchronously.
///
/// Cloning a host buffer only clones the handle; both handles refer to the same storage. The
/// pipeline hands a clone to the device when it enqueues a transfer and keeps its own clone to
/// pack or unpack the data once the transfer's signal has completed.
#[derive(Clone, Debug)]
pub struct HostBuffer {
    id: BufferId,
    data: Arc<Mutex<Vec<f32>>>,
    len: usize,
}

impl HostBuffer {
    /// Allocates a zero-filled host buffer of `len` elements.
    pub fn zeros(len: usize) -> Self {
        Self {
            id: BufferId::new(),
            data: Arc::new(Mutex::new(vec![0.0; len])),
            len,
        }
    }

    /// The unique id of the buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no element.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Locks the buffer.
    ///
    /// The lock is exclusive: readers and writers, host or device queue, are serialized.
    /// Callers overwrite elements, they never resize.
    pub fn lock(&self) -> MutexGuard<'_, Vec<f32>> {
        self.data.lock()
    }

    /// Copies the buffer into a new vector.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.lock().clone()
    }

    /// Whether both handles refer to the same storage.
    pub fn same_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let buffer = HostBuffer::zeros(4);
        let handle = buffer.clone();

        handle.lock()[2] = 3.0;

        assert_eq!(buffer.to_vec(), vec![0.0, 0.0, 3.0, 0.0]);
        assert!(buffer.same_storage(&handle));
        assert_eq!(buffer.id(), handle.id());
    }

    #[test]
    #[cfg(feature = "std")]
    fn lock_is_exclusive_across_threads() {
        let buffer = HostBuffer::zeros(1);
        let guard = buffer.lock();
        let handle = buffer.clone();

        let writer = std::thread::spawn(move || handle.lock()[0] = 2.0);

        // The writer can't get in while the guard is held.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(guard[0], 0.0);
        core::mem::drop(guard);

        writer.join().unwrap();
        assert_eq!(buffer.to_vec(), vec![2.0]);
    }
}
