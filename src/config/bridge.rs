use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Policy switches and server identity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Reject `LoadModule` calls with an access-denied error.
    pub disallow_module_loading: bool,

    /// Reject `Exit` calls with an access-denied error.
    pub disallow_exit: bool,

    /// Signals buffered per slow async subscriber before it starts skipping.
    pub signal_buffer: usize,

    /// Server name reported by the core object.
    pub server_name: String,

    /// Server version reported by the core object.
    pub server_version: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            disallow_module_loading: false,
            disallow_exit: false,
            signal_buffer: 256,
            server_name: "pulseaudio".to_string(),
            server_version: "8.0".to_string(),
        }
    }
}
