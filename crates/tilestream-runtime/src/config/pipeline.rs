use super::logger::{LogLevel, LoggerConfig};

/// Configuration of the tiled matmul pipeline.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    /// Logger configuration for stage events.
    #[serde(default)]
    pub logger: LoggerConfig<PipelineLogLevel>,

    /// Tile shape used when the caller doesn't provide one.
    #[serde(default)]
    pub tile_shape: TileShapeConfig,
}

/// Tile shape as written in the configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileShapeConfig {
    /// Rows of an output tile.
    #[serde(default = "default_tile_length")]
    pub rows: usize,
    /// Length of the reduction dimension of a tile.
    #[serde(default = "default_tile_length")]
    pub reduce: usize,
    /// Columns of an output tile.
    #[serde(default = "default_tile_length")]
    pub cols: usize,
}

impl Default for TileShapeConfig {
    fn default() -> Self {
        Self {
            rows: default_tile_length(),
            reduce: default_tile_length(),
            cols: default_tile_length(),
        }
    }
}

impl TileShapeConfig {
    /// Parses a tile shape written as `RxKxC`, e.g. `64x32x64`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut dims = value.split(['x', 'X']).map(|dim| dim.trim().parse::<usize>());

        let rows = dims.next()?.ok()?;
        let reduce = dims.next()?.ok()?;
        let cols = dims.next()?.ok()?;

        if dims.next().is_some() {
            return None;
        }

        Some(Self { rows, reduce, cols })
    }
}

fn default_tile_length() -> usize {
    256
}

/// Log levels for the pipeline stage events.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PipelineLogLevel {
    /// Stage logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Only pipeline start, drain and abort are logged.
    #[serde(rename = "basic")]
    Basic,

    /// Every stage event is logged.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for PipelineLogLevel {}
