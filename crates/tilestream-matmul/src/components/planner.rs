use core::iter::StepBy;
use core::ops::Range;

use super::{ConfigurationError, MatmulProblem, TileRole, TileShape};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// One unit of work: the origins of a row block, a reduction block and a column block
///
/// Origins are multiples of the tile shape. The extents are the number of elements of the
/// block that fall inside the true matrices, the rest of the tile is padding.
pub struct TileCoord {
    pub row: usize,
    pub reduce: usize,
    pub col: usize,
    pub rows_in: usize,
    pub reduce_in: usize,
    pub cols_in: usize,
}

impl TileCoord {
    /// Whether this tile is the first of its `(row, reduce)` group, which shares one lhs tile.
    pub fn starts_group(&self) -> bool {
        self.col == 0
    }
}

impl core::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.reduce, self.col)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The part of a matrix covered by one tile, clipped to the true bounds
pub struct TileRegion {
    /// First row of the region in the matrix.
    pub row: usize,
    /// First column of the region in the matrix.
    pub col: usize,
    /// Rows inside the matrix.
    pub rows: usize,
    /// Columns inside the matrix.
    pub cols: usize,
    /// Row stride of the staging tile.
    pub tile_width: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Tile geometry of a matmul problem
///
/// The padded dimensions are the smallest multiples of the tile shape covering the problem. The
/// grid is walked row block first, then reduction block, with the column block innermost.
pub struct TilePlan {
    problem: MatmulProblem,
    tile: TileShape,
    padded: MatmulProblem,
}

impl TilePlan {
    pub fn new(problem: MatmulProblem, tile: TileShape) -> Result<Self, ConfigurationError> {
        tile.validate()?;
        problem.validate()?;

        let too_large = ConfigurationError::ProblemTooLarge {
            problem,
            shape: tile,
        };
        let (Some(m), Some(k), Some(n)) = (
            problem.m.checked_next_multiple_of(tile.rows),
            problem.k.checked_next_multiple_of(tile.reduce),
            problem.n.checked_next_multiple_of(tile.cols),
        ) else {
            return Err(too_large);
        };

        let plan = Self {
            problem,
            tile,
            padded: MatmulProblem::new(m, k, n),
        };

        let (rows, reduce, cols) = plan.num_blocks();
        if rows
            .checked_mul(reduce)
            .and_then(|blocks| blocks.checked_mul(cols))
            .is_none()
        {
            return Err(too_large);
        }

        Ok(plan)
    }

    pub fn problem(&self) -> MatmulProblem {
        self.problem
    }

    pub fn tile_shape(&self) -> TileShape {
        self.tile
    }

    pub fn padded(&self) -> MatmulProblem {
        self.padded
    }

    pub fn row_origins(&self) -> StepBy<Range<usize>> {
        (0..self.padded.m).step_by(self.tile.rows)
    }

    pub fn reduce_origins(&self) -> StepBy<Range<usize>> {
        (0..self.padded.k).step_by(self.tile.reduce)
    }

    pub fn col_origins(&self) -> StepBy<Range<usize>> {
        (0..self.padded.n).step_by(self.tile.cols)
    }

    /// Number of blocks along `(rows, reduce, cols)`.
    pub fn num_blocks(&self) -> (usize, usize, usize) {
        (
            self.padded.m / self.tile.rows,
            self.padded.k / self.tile.reduce,
            self.padded.n / self.tile.cols,
        )
    }

    /// Number of tiles in the grid, which is also the number of launches and accumulations.
    pub fn num_tiles(&self) -> usize {
        let (rows, reduce, cols) = self.num_blocks();
        rows * reduce * cols
    }

    /// Iterates over every tile, column block innermost.
    pub fn grid(&self) -> TileGrid {
        TileGrid {
            plan: *self,
            next: 0,
        }
    }

    /// The coordinate of the tile at the given block indices, with its clipped extents.
    pub fn coord(&self, row_block: usize, reduce_block: usize, col_block: usize) -> TileCoord {
        let row = row_block * self.tile.rows;
        let reduce = reduce_block * self.tile.reduce;
        let col = col_block * self.tile.cols;

        TileCoord {
            row,
            reduce,
            col,
            rows_in: clip(row, self.tile.rows, self.problem.m),
            reduce_in: clip(reduce, self.tile.reduce, self.problem.k),
            cols_in: clip(col, self.tile.cols, self.problem.n),
        }
    }

    /// The region of the identified matrix covered by the tile at `coord`.
    pub fn region(&self, role: TileRole, coord: &TileCoord) -> TileRegion {
        let (_, tile_width) = self.tile.shape(role);

        let (row, col, rows, cols) = match role {
            TileRole::Lhs => (coord.row, coord.reduce, coord.rows_in, coord.reduce_in),
            TileRole::Rhs => (coord.reduce, coord.col, coord.reduce_in, coord.cols_in),
            TileRole::Out => (coord.row, coord.col, coord.rows_in, coord.cols_in),
        };

        TileRegion {
            row,
            col,
            rows,
            cols,
            tile_width,
        }
    }
}

fn clip(origin: usize, tile_len: usize, dim: usize) -> usize {
    dim.saturating_sub(origin).min(tile_len)
}

/// Iterator over the tiles of a [plan](TilePlan).
#[derive(Clone, Debug)]
pub struct TileGrid {
    plan: TilePlan,
    next: usize,
}

impl Iterator for TileGrid {
    type Item = TileCoord;

    fn next(&mut self) -> Option<TileCoord> {
        if self.next >= self.plan.num_tiles() {
            return None;
        }

        let (_, reduce_blocks, col_blocks) = self.plan.num_blocks();
        let index = self.next;
        self.next += 1;

        let col_block = index % col_blocks;
        let reduce_block = (index / col_blocks) % reduce_blocks;
        let row_block = index / (col_blocks * reduce_blocks);

        Some(self.plan.coord(row_block, reduce_block, col_block))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.num_tiles() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileGrid {}
