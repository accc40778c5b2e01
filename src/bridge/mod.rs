//! Object registry and change notification on top of the server core.
//!
//! [`Bridge`] owns the core, the proxy registry and the signal sink. Every
//! request runs to completion against the core, after which the core's event
//! queue is drained so proxies and signals are in step before the next
//! request is served.

mod actor;
pub mod dispatch;
pub mod interface;
pub mod invariant;
pub mod notifier;
pub mod path;
pub mod proxy;
pub mod registry;

use std::sync::{Arc, Mutex};

pub use actor::BridgeHandle;
pub use invariant::InvariantViolation;
pub use notifier::{Cached, Notifier};
pub use path::CORE_PATH;
pub use proxy::{BusObject, CallContext, INTERFACE_REVISION, MethodReply, ReadContext};
pub use registry::{EntityKind, NotFound, ProxyRef, Registry};
use tracing::{debug, instrument, warn};

use crate::{
    bus::{BusError, Caller, ListenerRegistry, SharedListeners, SignalSink, Variant},
    config::BridgeConfig,
    server::ServerCore,
};

/// The core, its bus objects and the signals they emit.
#[derive(Debug)]
pub struct Bridge {
    core: ServerCore,
    registry: Registry,
    listeners: SharedListeners,
    config: BridgeConfig,
}

impl Bridge {
    /// Bridge over `core` emitting to `sink`, with its own listener table.
    pub fn new(core: ServerCore, config: BridgeConfig, sink: Arc<dyn SignalSink>) -> Self {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        Self::with_listeners(core, config, sink, listeners)
    }

    /// Bridge sharing `listeners` with a bus adapter.
    ///
    /// Entities already in `core` get proxies without any signal.
    pub fn with_listeners(
        mut core: ServerCore,
        config: BridgeConfig,
        sink: Arc<dyn SignalSink>,
        listeners: SharedListeners,
    ) -> Self {
        let registry = Registry::new(&mut core, Notifier::new(sink));
        let mut bridge = Self {
            core,
            registry,
            listeners,
            config,
        };
        bridge.process_events();
        debug!(objects = bridge.registry.len(), "bridge ready");
        bridge
    }

    /// Server core.
    pub fn core(&self) -> &ServerCore {
        &self.core
    }

    /// Live proxies.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Signal subscriptions.
    pub fn listeners(&self) -> &SharedListeners {
        &self.listeners
    }

    /// Policy switches.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Change the core directly, then bring proxies and signals up to date.
    pub fn mutate<R>(&mut self, apply: impl FnOnce(&mut ServerCore) -> R) -> R {
        let result = apply(&mut self.core);
        self.process_events();
        result
    }

    /// Route every queued core event. Returns how many were routed.
    pub fn process_events(&mut self) -> usize {
        let mut routed = 0;
        while let Some(event) = self.core.hooks_mut().next_event() {
            routed += 1;
            if let Err(violation) = self.registry.handle_event(&mut self.core, event) {
                invariant::report(&violation);
            }
        }
        routed
    }

    /// Read one property. An empty `interface` searches every interface.
    ///
    /// # Errors
    /// Returns error if the member is unknown or the property has no value.
    #[instrument(skip_all, fields(path = %path, property = %property))]
    pub fn get_property(
        &self,
        caller: &Caller,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<Variant, BusError> {
        dispatch::get_property(&self.read_context(caller), path, interface, property)
    }

    /// Read every available property of `interface`.
    ///
    /// # Errors
    /// Returns error if the object or interface is unknown.
    #[instrument(skip_all, fields(path = %path, interface = %interface))]
    pub fn get_all(
        &self,
        caller: &Caller,
        path: &str,
        interface: &str,
    ) -> Result<Vec<(String, Variant)>, BusError> {
        dispatch::get_all(&self.read_context(caller), path, interface)
    }

    /// Write one property and route the events it caused.
    ///
    /// # Errors
    /// Returns error if the property is unknown or read-only, or the value is
    /// rejected.
    #[instrument(skip_all, fields(path = %path, property = %property))]
    pub fn set_property(
        &mut self,
        caller: &Caller,
        path: &str,
        interface: &str,
        property: &str,
        value: &Variant,
    ) -> Result<(), BusError> {
        let mut ctx = CallContext {
            registry: &self.registry,
            core: &mut self.core,
            caller,
            config: &self.config,
            listeners: &self.listeners,
        };
        let result = dispatch::set_property(&mut ctx, path, interface, property, value);
        if let Err(e) = &result {
            warn!(error = %e, "property write rejected");
        }
        self.process_events();
        result
    }

    /// Invoke one method and route the events it caused.
    ///
    /// A call that creates an object replies with the new object's path.
    ///
    /// # Errors
    /// Returns error if the method is unknown, the arguments are rejected, or
    /// the core refuses the call.
    #[instrument(skip_all, fields(path = %path, method = %method))]
    pub fn call_method(
        &mut self,
        caller: &Caller,
        path: &str,
        interface: &str,
        method: &str,
        args: &[Variant],
    ) -> Result<Vec<Variant>, BusError> {
        let mut ctx = CallContext {
            registry: &self.registry,
            core: &mut self.core,
            caller,
            config: &self.config,
            listeners: &self.listeners,
        };
        let reply = dispatch::call_method(&mut ctx, path, interface, method, args);
        self.process_events();

        match reply {
            Ok(MethodReply::Empty) => Ok(Vec::new()),
            Ok(MethodReply::Values(values)) => Ok(values),
            Ok(MethodReply::NewObject(kind, index)) => self
                .registry
                .path_of(kind, index)
                .map(|p| vec![Variant::path(p)])
                .ok_or_else(|| BusError::failed(format!("{kind} {index} has no object path."))),
            Err(e) => {
                warn!(error = %e, "method call rejected");
                Err(e)
            }
        }
    }

    /// Introspection XML for `path`.
    ///
    /// # Errors
    /// Returns error if nothing lives at `path`.
    pub fn introspect(&self, path: &str) -> Result<String, BusError> {
        dispatch::introspect(&self.registry, path)
    }

    /// Tear every proxy down and hand the core back.
    pub fn shutdown(mut self) -> ServerCore {
        self.process_events();
        self.registry.teardown(&mut self.core);
        debug!("bridge shut down");
        self.core
    }

    fn read_context<'a>(&'a self, caller: &'a Caller) -> ReadContext<'a> {
        ReadContext {
            registry: &self.registry,
            core: &self.core,
            caller,
        }
    }
}
