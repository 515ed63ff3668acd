mod queue;
mod signal;
mod storage;
mod task;

pub use queue::*;
pub use signal::*;
pub use storage::*;
pub use task::*;
