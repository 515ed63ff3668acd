use thiserror::Error;
use tilestream_runtime::{AllocationError, DeviceError};

use super::{MatmulProblem, TileRole, TileShape};

/// The matmul can't start with the given arguments.
///
/// Configuration errors are always reported before any device operation is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A tile axis has zero length.
    #[error("Tile shape {shape} has an empty axis")]
    ZeroTileShape { shape: TileShape },

    /// A tile holds more bytes than the host can address.
    #[error("Tile shape {shape} is too large")]
    TileTooLarge { shape: TileShape },

    /// The problem padded to tile multiples, or its number of tiles, overflows.
    #[error("Problem {problem} is too large for tile shape {shape}")]
    ProblemTooLarge {
        problem: MatmulProblem,
        shape: TileShape,
    },

    /// A matrix holds more elements than the host can address.
    #[error("A {rows}x{cols} matrix is too large")]
    MatrixTooLarge { rows: usize, cols: usize },

    /// A matrix dimension is zero.
    #[error("Problem {problem} has an empty dimension")]
    ZeroDimension { problem: MatmulProblem },

    /// The storage of a matrix doesn't hold `rows * cols` elements.
    #[error("The matrix storage holds {actual} elements, {expected} expected")]
    LengthMismatch { expected: usize, actual: usize },

    /// A matrix doesn't have the shape the problem requires.
    #[error(
        "The {operand} matrix is {}x{}, the problem requires {}x{}",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    ShapeMismatch {
        operand: TileRole,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Errors returned by the tiled matmul.
#[derive(Error, Debug)]
pub enum MatmulError {
    /// The arguments were rejected before anything was sent to the device.
    #[error("Invalid matmul configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The pipeline buffers couldn't be allocated, nothing was computed.
    #[error("Not enough device resources to start the pipeline: {0}")]
    ResourceExhaustion(#[from] AllocationError),

    /// A device operation failed. The output may have been partially accumulated.
    #[error("{0}")]
    Device(#[from] DeviceError),
}
