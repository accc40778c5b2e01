//! Bus-facing value, error and signal types.

mod connection;
mod error;
mod listeners;
mod signal;
mod variant;

pub use connection::{SharedListeners, ZbusSignalSink};
pub use error::{BusError, ErrorKind};
pub use listeners::ListenerRegistry;
pub use signal::{BroadcastSink, FanoutSink, RecordingSink, Signal, SignalSink};
pub use variant::Variant;

/// Identity of the connection making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Unique bus name of the connection
    pub connection: String,
    /// Core client backing the connection, if any
    pub client: Option<u32>,
}

impl Caller {
    /// Caller on `connection` with no backing client.
    pub fn anonymous(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            client: None,
        }
    }

    /// Caller on `connection` backed by core client `client`.
    pub fn with_client(connection: impl Into<String>, client: u32) -> Self {
        Self {
            connection: connection.into(),
            client: Some(client),
        }
    }
}
