//! Host-backed device running transfers and kernels on two worker-thread queues.

#[macro_use]
extern crate derive_new;

pub mod compute;
pub mod device;
pub mod kernel;

pub use device::CpuDevice;
pub use kernel::NaiveTileKernel;
