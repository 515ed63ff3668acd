use tilestream_runtime::config::{Logger, pipeline::PipelineLogLevel};

use super::{TileCoord, TilePlan, TileRole};
use crate::pipeline::RoleState;

/// What the driver waits on before reusing a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitTarget {
    /// The other device slot of a role.
    Slot,
    /// The staging tile of a role.
    Staging,
}

/// Stage boundaries reported by the pipeline driver.
#[derive(Clone, Debug, PartialEq)]
pub enum StageEvent {
    /// The pool is allocated and the first tile is about to be loaded.
    Started { plan: TilePlan },
    /// A tile was packed and its upload issued.
    Upload { role: TileRole, coord: TileCoord },
    /// A kernel launch was issued.
    Launch { coord: TileCoord },
    /// The download of a computed tile was issued.
    Download { coord: TileCoord },
    /// A downloaded tile was added to the output.
    Accumulate { coord: TileCoord },
    /// The driver blocks until a buffer is free to be reused.
    Wait { role: TileRole, target: WaitTarget },
    /// The progress of a role changed.
    RoleState { role: TileRole, state: RoleState },
    /// Every tile was accumulated.
    Drained { tiles: usize },
    /// The pipeline stopped on an error.
    Aborted { reason: String },
}

impl core::fmt::Display for StageEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StageEvent::Started { plan } => write!(
                f,
                "Started {} with tiles {}, {} tiles",
                plan.problem(),
                plan.tile_shape(),
                plan.num_tiles()
            ),
            StageEvent::Upload { role, coord } => write!(f, "Upload {role} {coord}"),
            StageEvent::Launch { coord } => write!(f, "Launch {coord}"),
            StageEvent::Download { coord } => write!(f, "Download {coord}"),
            StageEvent::Accumulate { coord } => write!(f, "Accumulate {coord}"),
            StageEvent::Wait { role, target } => match target {
                WaitTarget::Slot => write!(f, "Wait for the {role} slot"),
                WaitTarget::Staging => write!(f, "Wait for the {role} staging tile"),
            },
            StageEvent::RoleState { role, state } => write!(f, "{role} is {state:?}"),
            StageEvent::Drained { tiles } => write!(f, "Drained after {tiles} tiles"),
            StageEvent::Aborted { reason } => write!(f, "Aborted: {reason}"),
        }
    }
}

/// Observer of the pipeline stages.
pub trait StageEventListener {
    fn on_event(&mut self, event: &StageEvent);
}

impl StageEventListener for () {
    fn on_event(&mut self, _event: &StageEvent) {}
}

impl<F: FnMut(&StageEvent)> StageEventListener for F {
    fn on_event(&mut self, event: &StageEvent) {
        self(event)
    }
}

/// Writes stage events through the configured [logger](Logger).
///
/// With the `basic` pipeline log level only the start, drain and abort of the pipeline are
/// logged, with `full` every event is.
#[derive(Debug)]
pub struct LoggingListener {
    logger: Logger,
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingListener {
    /// Creates a listener logging according to the global configuration.
    pub fn new() -> Self {
        Self::from_logger(Logger::new())
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }
}

impl StageEventListener for LoggingListener {
    fn on_event(&mut self, event: &StageEvent) {
        let enabled = match self.logger.log_level_pipeline() {
            PipelineLogLevel::Disabled => false,
            PipelineLogLevel::Basic => matches!(
                event,
                StageEvent::Started { .. } | StageEvent::Drained { .. } | StageEvent::Aborted { .. }
            ),
            PipelineLogLevel::Full => true,
        };

        if enabled {
            self.logger.log_pipeline(event);
        }
    }
}
