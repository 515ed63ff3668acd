use std::sync::{Arc, Condvar, Mutex};
use tilestream_runtime::{DeviceError, SignalId};

/// Completion signal of one operation enqueued on a [cpu queue](super::CpuExecutionQueue).
#[derive(Clone)]
pub struct CpuSignal {
    id: SignalId,
    state: Arc<SignalState>,
}

#[derive(Default)]
struct SignalState {
    result: Mutex<Option<Result<(), DeviceError>>>,
    ready: Condvar,
}

impl core::fmt::Debug for CpuSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CpuSignal")
            .field("id", &self.id)
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl CpuSignal {
    /// Creates a signal that isn't resolved yet.
    pub fn pending() -> Self {
        Self {
            id: SignalId::new(),
            state: Arc::new(SignalState::default()),
        }
    }

    /// The unique id of the signal.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Resolves the signal, waking up every waiter. Only the first resolution is kept.
    pub fn resolve(&self, result: Result<(), DeviceError>) {
        let mut state = self.lock();
        if state.is_none() {
            *state = Some(result);
            self.state.ready.notify_all();
        }
    }

    /// Blocks until the signal is resolved.
    pub fn wait(&self) -> Result<(), DeviceError> {
        let mut state = self.lock();
        loop {
            if let Some(result) = state.as_ref() {
                return result.clone();
            }
            state = match self.state.ready.wait(state) {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Returns whether the signal is resolved.
    pub fn is_complete(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Result<(), DeviceError>>> {
        match self.state.result.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_after_resolve_from_another_thread() {
        let signal = CpuSignal::pending();
        let remote = signal.clone();

        let handle = std::thread::spawn(move || remote.resolve(Ok(())));

        assert!(signal.wait().is_ok());
        assert!(signal.is_complete());
        handle.join().unwrap();
    }

    #[test]
    fn first_resolution_wins() {
        let signal = CpuSignal::pending();

        signal.resolve(Err(DeviceError::execution("boom")));
        signal.resolve(Ok(()));

        assert!(signal.wait().is_err());
    }
}
