//! Configuration schema definitions and validation.
//!
//! Defines the TOML configuration of the bridge: process-wide settings and
//! the policy switches bus callers are subject to.

mod bridge;
mod general;
mod loading;
mod paths;

#[cfg(test)]
mod tests;

pub use bridge::BridgeConfig;
pub use general::{GeneralConfig, LogLevel};
pub use paths::ConfigPaths;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// Represents the complete configuration schema that can be loaded
/// from TOML files. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Bridge policy and server identity.
    #[serde(default)]
    pub bridge: BridgeConfig,
}
