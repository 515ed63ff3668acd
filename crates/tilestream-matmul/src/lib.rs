//! Double-buffered tiled matrix multiplication.
//!
//! The operands are cut into tiles that are streamed to a [device](tilestream_runtime::DeviceContext)
//! while the previous tiles are being multiplied, so that transfers and compute overlap. Partial
//! products are read back and accumulated into the output on the host.

#[macro_use]
extern crate derive_new;

mod base;
/// Components for the tiled matmul pipeline.
pub mod components;
/// The state machine driving the pipeline.
pub mod pipeline;
/// Naive multiplication used to validate the pipeline.
pub mod reference;

pub use base::*;
