//! Bus-side objects mirroring core entities.
//!
//! Each proxy owns a handle to its entity, the hook subscriptions it needs,
//! and the last values it announced. Property reads go to the live entity;
//! signals are driven by comparing new values with the announced ones.

mod card;
mod client;
mod core_object;
mod device;
mod module;
mod sample;
mod stream;

pub use card::{CardProxy, ProfileProxy};
pub use client::ClientProxy;
pub use core_object::{CoreObject, INTERFACE_REVISION};
pub use device::{DeviceProxy, PortProxy};
pub use module::ModuleProxy;
pub use sample::SampleProxy;
pub use stream::StreamProxy;

use super::{
    interface::InterfaceSpec,
    invariant::InvariantViolation,
    notifier::Notifier,
    registry::{EntityKind, Registry},
};
use crate::{
    bus::{BusError, Caller, ErrorKind, SharedListeners, Variant},
    config::BridgeConfig,
    server::{CoreEvent, Hook, HookSlot, HookTable, Proplist, ServerCore},
};

/// Hook subscriptions held by one proxy.
#[derive(Debug, Default)]
pub struct HookSlots {
    slots: Vec<(Hook, HookSlot)>,
}

impl HookSlots {
    /// Connect one slot per hook.
    pub fn connect(table: &mut HookTable, hooks: &[Hook]) -> Self {
        Self {
            slots: hooks.iter().map(|&hook| (hook, table.connect(hook))).collect(),
        }
    }

    /// Whether one of the slots listens on `hook`.
    pub fn covers(&self, hook: Hook) -> bool {
        self.slots.iter().any(|(h, _)| *h == hook)
    }

    /// Number of held slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slots are held.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Disconnect every slot.
    ///
    /// All slots are released even when one of them fails.
    ///
    /// # Errors
    /// Returns the first slot the table no longer knew about.
    pub fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation> {
        let mut result = Ok(());
        for (hook, slot) in self.slots.drain(..) {
            if !table.disconnect(slot) && result.is_ok() {
                result = Err(InvariantViolation::StaleSubscription { hook });
            }
        }
        result
    }
}

/// What a property read may look at.
#[derive(Debug)]
pub struct ReadContext<'a> {
    /// Live proxies
    pub registry: &'a Registry,
    /// Server core
    pub core: &'a ServerCore,
    /// Requesting connection
    pub caller: &'a Caller,
}

/// What a property write or method call may touch.
#[derive(Debug)]
pub struct CallContext<'a> {
    /// Live proxies
    pub registry: &'a Registry,
    /// Server core
    pub core: &'a mut ServerCore,
    /// Requesting connection
    pub caller: &'a Caller,
    /// Policy switches
    pub config: &'a BridgeConfig,
    /// Signal subscriptions
    pub listeners: &'a SharedListeners,
}

/// Result of a successful method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodReply {
    /// No output arguments
    Empty,
    /// Output arguments in order
    Values(Vec<Variant>),
    /// Path of an object the call created, known once events are drained
    NewObject(EntityKind, u32),
}

impl MethodReply {
    /// Reply with one output argument.
    pub fn value(value: impl Into<Variant>) -> Self {
        Self::Values(vec![value.into()])
    }
}

/// Object reachable on the bus.
pub trait BusObject {
    /// Object path.
    fn path(&self) -> &str;

    /// Interfaces in introspection order.
    fn interfaces(&self) -> &'static [&'static InterfaceSpec];

    /// Read `property` of `interface`.
    ///
    /// # Errors
    /// Returns an unavailable error for conditional properties without a value.
    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError>;

    /// Write `property` of `interface`. `value` already has the declared type.
    ///
    /// # Errors
    /// Returns error if the value fails validation or the core refuses it.
    fn set(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        _value: &Variant,
        _ctx: &mut CallContext<'_>,
    ) -> Result<(), BusError> {
        Err(BusError::read_only(interface.name, property))
    }

    /// Invoke `method` of `interface`. `args` already match the declared inputs.
    ///
    /// # Errors
    /// Returns error if the arguments fail validation or the core refuses the call.
    fn call(
        &self,
        interface: &'static InterfaceSpec,
        method: &str,
        _args: &[Variant],
        _ctx: &mut CallContext<'_>,
    ) -> Result<MethodReply, BusError> {
        Err(unknown_method(interface, method))
    }

    /// Paths of objects nested below this one.
    fn children(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Proxy that reacts to core events.
pub trait Subscriber: BusObject {
    /// Subscriptions held by the proxy.
    fn slots(&self) -> &HookSlots;

    /// React to `event`. Returns whether the event concerned this proxy.
    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool;

    /// Release every subscription.
    ///
    /// # Errors
    /// Returns error if a subscription was already gone.
    fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation>;
}

/// Path of the module that owns an entity, if it still has a proxy.
pub(crate) fn owner_module(
    ctx: &ReadContext<'_>,
    owner: Option<u32>,
    path: &str,
) -> Result<Variant, BusError> {
    owner
        .and_then(|index| ctx.registry.path_of(EntityKind::Module, index))
        .map(Variant::path)
        .ok_or_else(|| BusError::unavailable(format!("{path} doesn't have an owner module.")))
}

/// Error for a property missing from an interface table.
pub(crate) fn unknown_property(interface: &InterfaceSpec, property: &str) -> BusError {
    BusError::new(
        ErrorKind::UnknownProperty,
        format!("{}.{property}: No such property", interface.name),
    )
}

/// Error for a method missing from an interface table.
pub(crate) fn unknown_method(interface: &InterfaceSpec, method: &str) -> BusError {
    BusError::new(
        ErrorKind::UnknownMethod,
        format!("{}.{method}: No such method", interface.name),
    )
}

/// Encode a property list.
pub(crate) fn proplist_variant(proplist: &Proplist) -> Variant {
    Variant::from(proplist)
}

/// Typed accessors for arguments whose signature dispatch already checked.
pub(crate) mod input {
    use crate::{
        bus::{BusError, Variant},
        server::Proplist,
    };

    fn mismatch(index: usize, expected: &str) -> BusError {
        BusError::invalid_args(format!("Argument {index} is not of type {expected}."))
    }

    pub(crate) fn u32(args: &[Variant], index: usize) -> Result<u32, BusError> {
        args.get(index)
            .and_then(Variant::as_u32)
            .ok_or_else(|| mismatch(index, "u"))
    }

    pub(crate) fn bool(args: &[Variant], index: usize) -> Result<bool, BusError> {
        args.get(index)
            .and_then(Variant::as_bool)
            .ok_or_else(|| mismatch(index, "b"))
    }

    pub(crate) fn str(args: &[Variant], index: usize) -> Result<&str, BusError> {
        args.get(index)
            .and_then(Variant::as_str)
            .ok_or_else(|| mismatch(index, "s"))
    }

    pub(crate) fn path(args: &[Variant], index: usize) -> Result<&str, BusError> {
        args.get(index)
            .and_then(Variant::as_object_path)
            .ok_or_else(|| mismatch(index, "o"))
    }

    pub(crate) fn u32_array(args: &[Variant], index: usize) -> Result<&[u32], BusError> {
        args.get(index)
            .and_then(Variant::as_u32_array)
            .ok_or_else(|| mismatch(index, "au"))
    }

    pub(crate) fn str_array(args: &[Variant], index: usize) -> Result<&[String], BusError> {
        args.get(index)
            .and_then(Variant::as_str_array)
            .ok_or_else(|| mismatch(index, "as"))
    }

    pub(crate) fn path_array(args: &[Variant], index: usize) -> Result<&[String], BusError> {
        args.get(index)
            .and_then(Variant::as_path_array)
            .ok_or_else(|| mismatch(index, "ao"))
    }

    pub(crate) fn bytes(args: &[Variant], index: usize) -> Result<&[u8], BusError> {
        args.get(index)
            .and_then(Variant::as_bytes)
            .ok_or_else(|| mismatch(index, "ay"))
    }

    pub(crate) fn proplist(args: &[Variant], index: usize) -> Result<Proplist, BusError> {
        let list = args
            .get(index)
            .and_then(Variant::as_proplist)
            .ok_or_else(|| mismatch(index, "a{say}"))?;
        let result = match list.iter().find(|(key, _)| !Proplist::key_valid(key)) {
            Some((key, _)) => Err(BusError::invalid_args(format!(
                "Invalid property list key: '{}'",
                key.escape_debug()
            ))),
            None => Ok(()),
        };
        result.map(|()| list)
    }
}
