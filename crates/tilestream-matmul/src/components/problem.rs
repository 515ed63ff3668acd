use tilestream_runtime::config::pipeline::TileShapeConfig;

use super::{ConfigurationError, TileRole};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, new)]
/// Description of a matmul problem to solve, regardless of actual data
///
/// `lhs` is `m`×`k`, `rhs` is `k`×`n` and `out` is `m`×`n`.
pub struct MatmulProblem {
    pub m: usize,
    pub k: usize,
    pub n: usize,
}

impl MatmulProblem {
    /// Returns the shape of the identified matrix, as `(rows, cols)`.
    pub fn shape(&self, role: TileRole) -> (usize, usize) {
        match role {
            TileRole::Lhs => (self.m, self.k),
            TileRole::Rhs => (self.k, self.n),
            TileRole::Out => (self.m, self.n),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.m == 0 || self.k == 0 || self.n == 0 {
            return Err(ConfigurationError::ZeroDimension { problem: *self });
        }

        Ok(())
    }
}

impl core::fmt::Display for MatmulProblem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "m={}, k={}, n={}", self.m, self.k, self.n)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, new)]
/// Number of elements along each axis of a tile
pub struct TileShape {
    /// Rows of the lhs and out tiles.
    pub rows: usize,
    /// Columns of the lhs tile, rows of the rhs tile.
    pub reduce: usize,
    /// Columns of the rhs and out tiles.
    pub cols: usize,
}

impl TileShape {
    /// A tile with the same length on every axis.
    pub fn square(size: usize) -> Self {
        Self::new(size, size, size)
    }

    /// Returns the shape of the identified tile, as `(rows, cols)`.
    pub fn shape(&self, role: TileRole) -> (usize, usize) {
        match role {
            TileRole::Lhs => (self.rows, self.reduce),
            TileRole::Rhs => (self.reduce, self.cols),
            TileRole::Out => (self.rows, self.cols),
        }
    }

    /// Number of elements of the identified tile. The shape must be [valid](Self::validate).
    pub fn num_elems(&self, role: TileRole) -> usize {
        let (rows, cols) = self.shape(role);
        rows * cols
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.rows == 0 || self.reduce == 0 || self.cols == 0 {
            return Err(ConfigurationError::ZeroTileShape { shape: *self });
        }

        for role in TileRole::ALL {
            let (rows, cols) = self.shape(role);
            let bytes = rows
                .checked_mul(cols)
                .and_then(|elems| elems.checked_mul(core::mem::size_of::<f32>()));

            if bytes.is_none() {
                return Err(ConfigurationError::TileTooLarge { shape: *self });
            }
        }

        Ok(())
    }
}

impl From<TileShapeConfig> for TileShape {
    fn from(config: TileShapeConfig) -> Self {
        Self::new(config.rows, config.reduce, config.cols)
    }
}

impl core::fmt::Display for TileShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}x{}", self.rows, self.reduce, self.cols)
    }
}
