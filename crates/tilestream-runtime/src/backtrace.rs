use alloc::string::String;

/// Backtrace captured when a device error is created.
///
/// Capturing follows `RUST_BACKTRACE`; when it is disabled, or without `std`, nothing is
/// recorded.
#[derive(Clone, Default)]
pub struct BackTrace {
    frames: Option<String>,
}

impl BackTrace {
    /// Captures the backtrace of the current thread, if enabled.
    pub fn capture() -> Self {
        #[cfg(feature = "std")]
        {
            use std::backtrace::{Backtrace, BacktraceStatus};

            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                return Self {
                    frames: Some(alloc::format!("{backtrace}")),
                };
            }
        }

        Self::default()
    }
}

impl core::fmt::Debug for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

impl core::fmt::Display for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.frames {
            Some(frames) => f.write_str(frames),
            None => f.write_str("  <not captured, set RUST_BACKTRACE=1>"),
        }
    }
}
