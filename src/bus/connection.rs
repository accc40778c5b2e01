use std::sync::{Arc, Mutex};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};
use zbus::Connection;

use super::{ListenerRegistry, Signal, SignalSink};

/// Shared listener table, updated by the core object and read by the emitter.
pub type SharedListeners = Arc<Mutex<ListenerRegistry>>;

/// Forwards signals onto a real bus connection.
///
/// Each signal is unicast to every connection whose listener filter admits
/// it. Emission happens on a background task so [`SignalSink::send`] never
/// blocks the caller.
#[derive(Debug, Clone)]
pub struct ZbusSignalSink {
    tx: mpsc::UnboundedSender<Signal>,
}

impl ZbusSignalSink {
    /// Start forwarding on `connection`.
    ///
    /// The returned task ends once every clone of the sink is dropped.
    pub fn spawn(connection: Connection, listeners: SharedListeners) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Signal>();

        let task = tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                let recipients = match listeners.lock() {
                    Ok(registry) => registry.recipients(&signal),
                    Err(poisoned) => poisoned.into_inner().recipients(&signal),
                };
                for destination in recipients {
                    if let Err(e) = emit(&connection, &destination, &signal).await {
                        warn!(
                            error = %e,
                            destination,
                            signal = %signal.qualified_name(),
                            "failed to emit signal"
                        );
                    }
                }
            }
            debug!("signal forwarder stopped");
        });

        (Self { tx }, task)
    }
}

impl SignalSink for ZbusSignalSink {
    fn send(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            warn!("signal forwarder is gone");
        }
    }
}

async fn emit(connection: &Connection, destination: &str, signal: &Signal) -> zbus::Result<()> {
    let path = signal.path.as_str();
    let mut args = signal
        .args
        .iter()
        .map(super::Variant::to_value)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    match (args.next(), args.next(), args.next()) {
        (None, _, _) => {
            connection
                .emit_signal(Some(destination), path, signal.interface, signal.member, &())
                .await
        }
        (Some(a), None, _) => {
            connection
                .emit_signal(Some(destination), path, signal.interface, signal.member, &(a,))
                .await
        }
        (Some(a), Some(b), None) => {
            connection
                .emit_signal(
                    Some(destination),
                    path,
                    signal.interface,
                    signal.member,
                    &(a, b),
                )
                .await
        }
        _ => Err(zbus::Error::Failure(format!(
            "{} has more arguments than supported",
            signal.qualified_name()
        ))),
    }
}
