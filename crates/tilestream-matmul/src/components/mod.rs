/// Accumulation of downloaded tiles into the output.
pub mod accumulate;
/// Kernel launches over one tile.
pub mod compute;
/// Host-device copies of tiles.
pub mod transfer;

mod error;
mod event;
mod ident;
mod matrix;
mod planner;
mod pool;
mod problem;

pub use error::*;
pub use event::*;
pub use ident::*;
pub use matrix::*;
pub use planner::*;
pub use pool::*;
pub use problem::*;
