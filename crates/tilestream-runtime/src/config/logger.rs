use super::GlobalConfig;
use crate::config::{device::DeviceLogLevel, pipeline::PipelineLogLevel};
use alloc::{string::ToString, sync::Arc, vec::Vec};
use core::fmt::Display;
use hashbrown::HashMap;

#[cfg(std_io)]
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
};

/// Sinks and verbosity of one logging section, parameterized by its level type.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled (requires `std` feature).
    #[serde(default)]
    #[cfg(std_io)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or overwrite it (false). Defaults to true.
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Optional crate-level logging configuration (e.g., info, debug, trace).
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// The log level for this logger, determining verbosity.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            #[cfg(std_io)]
            file: None,
            append: true,
            stdout: false,
            stderr: false,
            log: None,
            level: L::default(),
        }
    }
}

/// Log levels using the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Trait for types that can be used as log levels in `LoggerConfig`.
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
}

/// The parts of the crate with their own logger settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogSection {
    /// Stage events of the tiled matmul pipeline.
    Pipeline,
    /// Queue activity and allocations of a device.
    Device,
}

/// Routes pipeline and device messages to the sinks of their configuration sections.
///
/// A sink shared by both sections, such as a common log file, is opened once.
#[derive(Debug)]
pub struct Logger {
    sinks: Vec<Sink>,
    pipeline: Vec<usize>,
    device: Vec<usize>,

    /// The configuration the logger was built from.
    pub config: Arc<GlobalConfig>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a logger from the global configuration.
    ///
    /// File sinks open their file here.
    pub fn new() -> Self {
        Self::from_config(GlobalConfig::get())
    }

    /// Creates a logger from the provided configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        let mut registry = SinkRegistry::default();

        let pipeline = match config.pipeline.logger.level {
            PipelineLogLevel::Disabled => Vec::new(),
            _ => registry.register(&config.pipeline.logger),
        };
        let device = match config.device.logger.level {
            DeviceLogLevel::Disabled => Vec::new(),
            _ => registry.register(&config.device.logger),
        };

        Self {
            sinks: registry.sinks,
            pipeline,
            device,
            config,
        }
    }

    /// Writes a pipeline message to every pipeline sink.
    pub fn log_pipeline<S: Display>(&mut self, msg: &S) {
        self.log(LogSection::Pipeline, msg)
    }

    /// Writes a device message to every device sink.
    pub fn log_device<S: Display>(&mut self, msg: &S) {
        self.log(LogSection::Device, msg)
    }

    /// Writes a message to every sink of the section.
    pub fn log<S: Display>(&mut self, section: LogSection, msg: &S) {
        let indices = match section {
            LogSection::Pipeline => &self.pipeline,
            LogSection::Device => &self.device,
        };

        match indices.as_slice() {
            [] => {}
            [index] => self.sinks[*index].write(msg),
            many => {
                let msg = msg.to_string();
                for index in many {
                    self.sinks[*index].write(&msg);
                }
            }
        }
    }

    /// Whether the section has at least one sink.
    pub fn is_enabled(&self, section: LogSection) -> bool {
        match section {
            LogSection::Pipeline => !self.pipeline.is_empty(),
            LogSection::Device => !self.device.is_empty(),
        }
    }

    /// The configured pipeline log level.
    pub fn log_level_pipeline(&self) -> PipelineLogLevel {
        self.config.pipeline.logger.level
    }

    /// The configured device log level.
    pub fn log_level_device(&self) -> DeviceLogLevel {
        self.config.device.logger.level
    }
}

#[derive(Hash, PartialEq, Eq)]
enum SinkKey {
    #[cfg(std_io)]
    File(PathBuf),
    #[cfg(feature = "std")]
    Stdout,
    #[cfg(feature = "std")]
    Stderr,
    LogCrate(LogCrateLevel),
}

#[derive(Default)]
struct SinkRegistry {
    sinks: Vec<Sink>,
    keys: HashMap<SinkKey, usize>,
}

impl SinkRegistry {
    // Returns the indices of the sinks of one section, opening the ones not seen yet.
    fn register<L: LogLevel>(&mut self, config: &LoggerConfig<L>) -> Vec<usize> {
        let mut indices = Vec::new();

        #[cfg(std_io)]
        if let Some(path) = &config.file {
            let append = config.append;
            indices.extend(self.get_or_open(SinkKey::File(path.clone()), || {
                FileSink::open(path, append).map(Sink::File)
            }));
        }

        #[cfg(feature = "std")]
        if config.stdout {
            indices.extend(self.get_or_open(SinkKey::Stdout, || Some(Sink::Stdout)));
        }

        #[cfg(feature = "std")]
        if config.stderr {
            indices.extend(self.get_or_open(SinkKey::Stderr, || Some(Sink::Stderr)));
        }

        if let Some(level) = config.log {
            indices.extend(self.get_or_open(SinkKey::LogCrate(level), || Some(Sink::Log(level))));
        }

        indices
    }

    fn get_or_open<F: FnOnce() -> Option<Sink>>(&mut self, key: SinkKey, open: F) -> Option<usize> {
        if let Some(index) = self.keys.get(&key) {
            return Some(*index);
        }

        let sink = open()?;
        let index = self.sinks.len();
        self.sinks.push(sink);
        self.keys.insert(key, index);

        Some(index)
    }
}

#[derive(Debug)]
enum Sink {
    #[cfg(std_io)]
    File(FileSink),
    #[cfg(feature = "std")]
    Stdout,
    #[cfg(feature = "std")]
    Stderr,
    Log(LogCrateLevel),
}

impl Sink {
    fn write<S: Display + ?Sized>(&mut self, msg: &S) {
        match self {
            #[cfg(std_io)]
            Sink::File(file) => file.write(msg),
            #[cfg(feature = "std")]
            Sink::Stdout => println!("{msg}"),
            #[cfg(feature = "std")]
            Sink::Stderr => eprintln!("{msg}"),
            Sink::Log(LogCrateLevel::Info) => log::info!("{msg}"),
            Sink::Log(LogCrateLevel::Debug) => log::debug!("{msg}"),
            Sink::Log(LogCrateLevel::Trace) => log::trace!("{msg}"),
        }
    }
}

#[derive(Debug)]
#[cfg(std_io)]
struct FileSink {
    writer: BufWriter<File>,
}

#[cfg(std_io)]
impl FileSink {
    // A file that can't be opened is skipped with a warning.
    fn open(path: &PathBuf, append: bool) -> Option<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path);

        match file {
            Ok(file) => Some(Self {
                writer: BufWriter::new(file),
            }),
            Err(err) => {
                log::warn!("Can't open the log file {}: {err}", path.display());
                None
            }
        }
    }

    fn write<S: Display + ?Sized>(&mut self, msg: &S) {
        if let Err(err) = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush()) {
            log::warn!("Can't write to the log file: {err}");
        }
    }
}
