mod driver;
mod state;

pub use driver::*;
pub use state::*;
