use std::{fs, io, path::Path};

use tracing::{debug, info};

use super::{Config, ConfigPaths};
use crate::{BridgeError, Result};

impl Config {
    /// Loads the configuration file at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The TOML content is invalid
    /// - A value fails validation
    pub fn load(path: &Path) -> Result<Config> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(BridgeError::IoError {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                });
            }
        };

        let config = Self::from_toml(&content).map_err(|e| match e {
            BridgeError::TomlParseError { details, .. } => {
                BridgeError::toml_parse(details, Some(path))
            }
            other => other,
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Loads the configuration from the default location.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be determined or the
    /// file is invalid.
    pub fn load_default() -> Result<Config> {
        Self::load(&ConfigPaths::main_config()?)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// Returns error if the TOML is invalid or a value fails validation.
    pub fn from_toml(content: &str) -> Result<Config> {
        let config: Config =
            toml::from_str(content).map_err(|e| BridgeError::toml_parse(e, None))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check on its own.
    ///
    /// # Errors
    /// Returns error naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.bridge.signal_buffer == 0 {
            return Err(BridgeError::ConfigValidation {
                component: "bridge".to_string(),
                details: "signal_buffer must be at least 1".to_string(),
            });
        }
        if self.bridge.server_name.trim().is_empty() {
            return Err(BridgeError::ConfigValidation {
                component: "bridge".to_string(),
                details: "server_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
