use std::sync::Arc;

use futures::Stream;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use super::Bridge;
use crate::{
    bus::{
        BroadcastSink, BusError, Caller, FanoutSink, SharedListeners, Signal, SignalSink, Variant,
    },
    config::BridgeConfig,
    server::ServerCore,
};

type Reply<T> = oneshot::Sender<Result<T, BusError>>;

/// Requests served by the bridge task.
enum BridgeCommand {
    Get {
        caller: Caller,
        path: String,
        interface: String,
        property: String,
        reply: Reply<Variant>,
    },
    GetAll {
        caller: Caller,
        path: String,
        interface: String,
        reply: Reply<Vec<(String, Variant)>>,
    },
    Set {
        caller: Caller,
        path: String,
        interface: String,
        property: String,
        value: Variant,
        reply: Reply<()>,
    },
    Call {
        caller: Caller,
        path: String,
        interface: String,
        method: String,
        args: Vec<Variant>,
        reply: Reply<Vec<Variant>>,
    },
    Introspect {
        path: String,
        reply: Reply<String>,
    },
    Mutate {
        apply: Box<dyn FnOnce(&mut ServerCore) + Send>,
    },
    Shutdown {
        reply: oneshot::Sender<ServerCore>,
    },
}

fn gone() -> BusError {
    BusError::failed("Bridge task has stopped.")
}

/// Async handle to a bridge running on its own task.
///
/// Every request is queued and served in order, so requests never observe a
/// half-applied change. Cloning the handle is cheap.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    command_tx: mpsc::UnboundedSender<BridgeCommand>,
    signals: BroadcastSink,
}

impl std::fmt::Debug for BridgeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get { .. } => "Get",
            Self::GetAll { .. } => "GetAll",
            Self::Set { .. } => "Set",
            Self::Call { .. } => "Call",
            Self::Introspect { .. } => "Introspect",
            Self::Mutate { .. } => "Mutate",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl BridgeHandle {
    /// Move `core` onto a new bridge task.
    ///
    /// Signals go to the handle's broadcast stream and to each of `sinks`.
    pub fn spawn(
        core: ServerCore,
        config: BridgeConfig,
        listeners: SharedListeners,
        sinks: Vec<Arc<dyn SignalSink>>,
    ) -> (Self, JoinHandle<()>) {
        let signals = BroadcastSink::new(config.signal_buffer);
        let mut all: Vec<Arc<dyn SignalSink>> = vec![Arc::new(signals.clone())];
        all.extend(sinks);
        let sink = Arc::new(FanoutSink::new(all));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let bridge = Bridge::with_listeners(core, config, sink, listeners);
        let task = tokio::spawn(run(bridge, command_rx));

        (
            Self {
                command_tx,
                signals,
            },
            task,
        )
    }

    /// Every signal emitted from now on.
    pub fn signals(&self) -> impl Stream<Item = Signal> + Send + 'static {
        self.signals.signals()
    }

    /// Read one property.
    ///
    /// # Errors
    /// Returns error if the read fails or the task has stopped.
    pub async fn get_property(
        &self,
        caller: Caller,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<Variant, BusError> {
        self.request(|reply| BridgeCommand::Get {
            caller,
            path: path.to_string(),
            interface: interface.to_string(),
            property: property.to_string(),
            reply,
        })
        .await
    }

    /// Read every available property of one interface.
    ///
    /// # Errors
    /// Returns error if the read fails or the task has stopped.
    pub async fn get_all(
        &self,
        caller: Caller,
        path: &str,
        interface: &str,
    ) -> Result<Vec<(String, Variant)>, BusError> {
        self.request(|reply| BridgeCommand::GetAll {
            caller,
            path: path.to_string(),
            interface: interface.to_string(),
            reply,
        })
        .await
    }

    /// Write one property.
    ///
    /// # Errors
    /// Returns error if the write is rejected or the task has stopped.
    pub async fn set_property(
        &self,
        caller: Caller,
        path: &str,
        interface: &str,
        property: &str,
        value: Variant,
    ) -> Result<(), BusError> {
        self.request(|reply| BridgeCommand::Set {
            caller,
            path: path.to_string(),
            interface: interface.to_string(),
            property: property.to_string(),
            value,
            reply,
        })
        .await
    }

    /// Invoke one method.
    ///
    /// # Errors
    /// Returns error if the call is rejected or the task has stopped.
    pub async fn call_method(
        &self,
        caller: Caller,
        path: &str,
        interface: &str,
        method: &str,
        args: Vec<Variant>,
    ) -> Result<Vec<Variant>, BusError> {
        self.request(|reply| BridgeCommand::Call {
            caller,
            path: path.to_string(),
            interface: interface.to_string(),
            method: method.to_string(),
            args,
            reply,
        })
        .await
    }

    /// Introspection XML for `path`.
    ///
    /// # Errors
    /// Returns error if nothing lives at `path` or the task has stopped.
    pub async fn introspect(&self, path: &str) -> Result<String, BusError> {
        self.request(|reply| BridgeCommand::Introspect {
            path: path.to_string(),
            reply,
        })
        .await
    }

    /// Change the core on the bridge task and wait for the resulting signals.
    ///
    /// # Errors
    /// Returns error if the task has stopped.
    pub async fn mutate<R, F>(&self, apply: F) -> Result<R, BusError>
    where
        R: Send + 'static,
        F: FnOnce(&mut ServerCore) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let apply = Box::new(move |core: &mut ServerCore| {
            let _ = tx.send(apply(core));
        });
        self.command_tx
            .send(BridgeCommand::Mutate { apply })
            .map_err(|_| gone())?;
        rx.await.map_err(|_| gone())
    }

    /// Stop the task, tear the registry down and return the core.
    ///
    /// # Errors
    /// Returns error if the task had already stopped.
    pub async fn shutdown(self) -> Result<ServerCore, BusError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(BridgeCommand::Shutdown { reply })
            .map_err(|_| gone())?;
        rx.await.map_err(|_| gone())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> BridgeCommand,
    ) -> Result<T, BusError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx.send(command(reply)).map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }
}

async fn run(mut bridge: Bridge, mut command_rx: mpsc::UnboundedReceiver<BridgeCommand>) {
    info!("bridge task started");
    while let Some(command) = command_rx.recv().await {
        debug!(?command, "bridge command");
        match command {
            BridgeCommand::Get {
                caller,
                path,
                interface,
                property,
                reply,
            } => {
                let _ = reply.send(bridge.get_property(&caller, &path, &interface, &property));
            }
            BridgeCommand::GetAll {
                caller,
                path,
                interface,
                reply,
            } => {
                let _ = reply.send(bridge.get_all(&caller, &path, &interface));
            }
            BridgeCommand::Set {
                caller,
                path,
                interface,
                property,
                value,
                reply,
            } => {
                let _ = reply.send(bridge.set_property(
                    &caller, &path, &interface, &property, &value,
                ));
            }
            BridgeCommand::Call {
                caller,
                path,
                interface,
                method,
                args,
                reply,
            } => {
                let _ = reply.send(bridge.call_method(&caller, &path, &interface, &method, &args));
            }
            BridgeCommand::Introspect { path, reply } => {
                let _ = reply.send(bridge.introspect(&path));
            }
            BridgeCommand::Mutate { apply } => bridge.mutate(apply),
            BridgeCommand::Shutdown { reply } => {
                let _ = reply.send(bridge.shutdown());
                info!("bridge task stopped");
                return;
            }
        }
    }
    bridge.shutdown();
    info!("bridge task stopped, all handles dropped");
}
