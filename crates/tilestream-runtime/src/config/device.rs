use super::logger::{LogLevel, LoggerConfig};

/// Configuration of the device queues and memory.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    /// Logger configuration for queue activity.
    #[serde(default)]
    pub logger: LoggerConfig<DeviceLogLevel>,

    /// Maximum number of bytes a device may allocate, `None` for no limit.
    #[serde(default)]
    pub memory_budget: Option<usize>,

    /// Number of operations a queue accepts before enqueuing blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            logger: Default::default(),
            memory_budget: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    32
}

/// Log levels for the device queues.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeviceLogLevel {
    /// Queue logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// Allocations and failures are logged.
    #[serde(rename = "basic")]
    Basic,

    /// Every enqueued operation is logged.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for DeviceLogLevel {}
