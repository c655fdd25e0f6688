// src/config/loader.rs
//! Configuration loader: optional TOML file plus environment overrides
//!
//! Environment variables use the `EMG__SECTION__KEY` form, for example
//! `EMG__ACQUISITION__WINDOW_SIZE=200`.

use crate::config::constants::paths;
use crate::config::EmgConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Builds a validated [`EmgConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    required: bool,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Look for `emg.toml` in the working directory, if present
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            required: false,
            env_prefix: Some(paths::ENV_PREFIX.to_string()),
        }
    }

    /// Load from a file that must exist
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: true,
            ..Self::new()
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge sources, deserialize and validate
    pub fn load(&self) -> Result<EmgConfig, ConfigError> {
        if self.required && !self.path.exists() {
            return Err(ConfigError::FileNotFound(self.path.display().to_string()));
        }

        let mut builder = Config::builder().add_source(
            File::from(self.path.as_path())
                .format(FileFormat::Toml)
                .required(self.required),
        );

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator(paths::ENV_SEPARATOR)
                    .separator(paths::ENV_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: EmgConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(ConfigError::Validation)?;

        info!(
            path = %self.path.display(),
            found = self.path.exists(),
            window_size = config.acquisition.window_size,
            rules = config.classifier.rules.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Write a configuration as TOML
    pub fn export<P: AsRef<Path>>(config: &EmgConfig, path: P) -> Result<(), ConfigError> {
        let content = config.to_toml_string()?;
        std::fs::write(path.as_ref(), content)?;
        debug!(path = %path.as_ref().display(), "configuration exported");
        Ok(())
    }
}
