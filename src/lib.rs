//! Pulsebridge - PulseAudio-style object registry and change notification
//! over a message bus.
//!
//! The crate mirrors the entities of an audio server core (cards, sinks,
//! sources, streams, samples, modules and clients) as bus objects under
//! `/org/pulseaudio/core1`, answers property and method requests on them,
//! and turns core change events into bus signals.
//!
//! - [`server`] holds the in-process core model and its hook events
//! - [`bridge`] keeps proxies in step with the core and emits signals
//! - [`bus`] has the wire-facing value, error and signal types
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pulsebridge::{
//!     bridge::{Bridge, CORE_PATH},
//!     bus::{Caller, RecordingSink},
//!     config::BridgeConfig,
//!     server::{ServerCore, ServerInfo},
//! };
//!
//! let core = ServerCore::new(ServerInfo::local("pulseaudio", "8.0"));
//! let signals = RecordingSink::new();
//! let bridge = Bridge::new(core, BridgeConfig::default(), Arc::new(signals.clone()));
//!
//! let caller = Caller::anonymous(":1.1");
//! let name = bridge.get_property(&caller, CORE_PATH, "org.PulseAudio.Core1", "Name");
//! assert!(name.is_ok());
//! ```

/// Proxy registry, property dispatch and change notification.
pub mod bridge;

/// Bus-facing value, error and signal types.
pub mod bus;

/// Configuration schema definitions and validation.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// In-process audio server core model.
pub mod server;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use crate::core::{BridgeError, Result};
