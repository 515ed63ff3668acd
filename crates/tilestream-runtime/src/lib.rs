#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! Tilestream runtime crate: the device contract the tiled matmul pipeline is written against.

extern crate alloc;

#[macro_use]
extern crate derive_new;

mod id;

/// Captured backtraces attached to errors.
pub mod backtrace;
/// Global configuration and logging.
pub mod config;
/// Device context module.
pub mod device;
/// Host staging memory.
pub mod host;
/// Kernel binding module.
pub mod kernel;

pub use device::*;
pub use host::HostBuffer;
pub use id::*;
pub use kernel::*;
