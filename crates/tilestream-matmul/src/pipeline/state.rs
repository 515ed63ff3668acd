use crate::components::TileCoord;

/// A stage register of the pipeline driver.
///
/// A register holds at most one tile. The tile is pending while the operation issued for it
/// may still be running, and ready once the driver observed its signal. `T` is the host tile
/// the operation writes into, if any; it is only valid to read once the register is ready.
#[derive(Clone, Debug)]
pub enum InFlight<S, T = ()> {
    Empty,
    Pending {
        signal: S,
        coord: TileCoord,
        staging: T,
    },
    Ready {
        coord: TileCoord,
        staging: T,
    },
}

impl<S, T> InFlight<S, T> {
    /// Takes the content of the register, leaving it empty.
    pub fn take(&mut self) -> Self {
        core::mem::replace(self, InFlight::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, InFlight::Empty)
    }
}

/// Progress of one role through the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RoleState {
    /// Nothing is issued against the role.
    #[default]
    Idle,
    /// An upload was issued and isn't known to be complete.
    Loading,
    /// The last upload completed and the tile waits for its kernel.
    Loaded,
    /// A kernel reading or writing the role was issued.
    Computing,
    /// The computed tile is being read back.
    Downloading,
}
