#[macro_export(local_inner_macros)]
/// Create a new identifier type backed by a global counter.
macro_rules! device_id_type {
    ($name:ident) => {
        /// Device object ID.
        #[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
        pub struct $name {
            value: usize,
        }

        impl $name {
            /// Create a new ID.
            pub fn new() -> Self {
                use core::sync::atomic::{AtomicUsize, Ordering};

                static COUNTER: AtomicUsize = AtomicUsize::new(0);

                let value = COUNTER.fetch_add(1, Ordering::Relaxed);
                if value == usize::MAX {
                    core::panic!("Device ID overflowed");
                }
                Self { value }
            }

            /// The raw value of the ID.
            pub fn value(&self) -> usize {
                self.value
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_fmt(core::format_args!("{}({})", core::stringify!($name), self.value))
            }
        }
    };
}

device_id_type!(BufferId);
device_id_type!(SignalId);
