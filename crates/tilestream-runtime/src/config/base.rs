use super::{device::DeviceConfig, pipeline::PipelineConfig};
use alloc::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static TILESTREAM_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Represents the global configuration for tilestream, combining pipeline and device settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Configuration of the tiled matmul pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Configuration of the device queues and memory.
    #[serde(default)]
    pub device: DeviceConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `tilestream.toml` or
    /// `TileStream.toml` in the current directory or its parents. If no file is found, a default
    /// configuration is used. Environment variables are applied on top of the loaded file.
    pub fn get() -> Arc<Self> {
        let mut state = TILESTREAM_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                cfg_if::cfg_if! {
                    if #[cfg(std_io)] {
                        let config = Self::from_current_dir();
                        let config = config.override_from_env();
                    } else {
                        let config = Self::default();
                    }
                }

                let config = Arc::new(config);
                *state = Some(config.clone());
                config
            }
        }
    }

    #[cfg(std_io)]
    /// Save the current configuration to the provided file path.
    pub fn save_default<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<()> {
        use std::io::Write;

        let config = Self::get();
        let content = toml::to_string_pretty(config.as_ref())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())?;

        Ok(())
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = TILESTREAM_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    #[cfg(std_io)]
    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_with(|name| std::env::var(name).ok())
    }

    // Applies the overrides, looking variables up with `var`.
    #[cfg(std_io)]
    fn override_with<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        use super::{
            device::DeviceLogLevel,
            pipeline::{PipelineLogLevel, TileShapeConfig},
        };

        if let Some(val) = var("TILESTREAM_DEBUG_LOG") {
            self.pipeline.logger.level = PipelineLogLevel::Full;
            self.device.logger.level = DeviceLogLevel::Basic;

            match val.as_str() {
                "stdout" => {
                    self.pipeline.logger.stdout = true;
                    self.device.logger.stdout = true;
                }
                "stderr" => {
                    self.pipeline.logger.stderr = true;
                    self.device.logger.stderr = true;
                }
                "1" | "true" => {
                    let file_path = "/tmp/tilestream.log";
                    self.pipeline.logger.file = Some(file_path.into());
                    self.device.logger.file = Some(file_path.into());
                }
                "0" | "false" => {
                    self.pipeline.logger.level = PipelineLogLevel::Disabled;
                    self.device.logger.level = DeviceLogLevel::Disabled;
                }
                file_path => {
                    self.pipeline.logger.file = Some(file_path.into());
                    self.device.logger.file = Some(file_path.into());
                }
            }
        };

        if let Some(val) = var("TILESTREAM_TILE_SHAPE") {
            match TileShapeConfig::parse(&val) {
                Some(shape) => self.pipeline.tile_shape = shape,
                None => log::warn!("Ignoring malformed TILESTREAM_TILE_SHAPE={val:?}"),
            }
        }

        self
    }

    // Loads configuration from `tilestream.toml` or `TileStream.toml` in the current directory or
    // its parents.
    #[cfg(std_io)]
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in ["tilestream.toml", "TileStream.toml"] {
                match Self::from_file_path(dir.join(name)) {
                    Ok(Some(config)) => return config,
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!("Ignoring {}: {err}", dir.join(name).display());
                    }
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    /// Loads the configuration stored at the given path, `None` when there is no file.
    ///
    /// A file that exists but can't be read or parsed is an error.
    #[cfg(std_io)]
    pub fn from_file_path<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Option<Self>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(toml::from_str(&content)?))
    }
}

/// Error raised when loading a configuration file.
#[cfg(std_io)]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but couldn't be read.
    #[error("Can't read the configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The file isn't valid TOML, or doesn't match the configuration layout.
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}
