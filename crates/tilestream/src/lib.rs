//! Double-buffered tiled matrix multiplication, streaming tiles through a device while the
//! host keeps the next ones loading.

pub use tilestream_matmul::*;

pub use tilestream_runtime as runtime;

#[cfg(feature = "cpu")]
pub use tilestream_cpu as cpu;
