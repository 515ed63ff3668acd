#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
/// Identifier for the three matrices of a matmul
///
/// Each role owns its own pair of device slots and its own staging tile.
pub enum TileRole {
    Lhs,
    Rhs,
    Out,
}

impl TileRole {
    /// All roles, in pool order.
    pub const ALL: [TileRole; 3] = [TileRole::Lhs, TileRole::Rhs, TileRole::Out];

    pub(crate) fn index(self) -> usize {
        match self {
            TileRole::Lhs => 0,
            TileRole::Rhs => 1,
            TileRole::Out => 2,
        }
    }
}

impl core::fmt::Display for TileRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TileRole::Lhs => f.write_str("lhs"),
            TileRole::Rhs => f.write_str("rhs"),
            TileRole::Out => f.write_str("out"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
/// One of the two device slots of a role, relative to the current index
pub enum SlotIdent {
    /// The slot holding the most recently issued tile.
    Current,
    /// The slot the next tile is issued into.
    Other,
}
