use spin::{Mutex, MutexGuard};
use std::sync::Arc;
use tilestream_runtime::BufferId;

/// A device buffer of the cpu device.
///
/// Queue workers hold clones of the buffers bound to the operations they execute, so a released
/// buffer stays alive until its last enqueued operation completed.
#[derive(Clone)]
pub struct CpuBuffer {
    id: BufferId,
    data: Arc<Mutex<Vec<f32>>>,
    len: usize,
}

impl core::fmt::Debug for CpuBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CpuBuffer")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

impl CpuBuffer {
    pub(crate) fn new(len: usize) -> Self {
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
        self.len() == 0
    }

    pub(crate) fn same_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<f32>> {
        self.data.lock()
    }
}
