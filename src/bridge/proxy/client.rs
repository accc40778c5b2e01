use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, Subscriber, input, owner_module,
    proplist_variant, unknown_method, unknown_property,
};
use crate::{
    bridge::{
        interface::{
            CLIENT_INTERFACE, InterfaceSpec, PROPERTY_LIST_UPDATED, arg, method, ro, signal,
        },
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CLIENT_TAG, CORE_PATH, object_path},
    },
    bus::{BusError, Signal, Variant},
    server::{
        ClientData, CoreEvent, EntityRef, Hook, HookTable, Proplist, StreamKind, UpdateMode,
    },
};

static CLIENT: InterfaceSpec = InterfaceSpec {
    name: CLIENT_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Driver", "s"),
        ro("OwnerModule", "o"),
        ro("PlaybackStreams", "ao"),
        ro("RecordStreams", "ao"),
        ro("PropertyList", "a{say}"),
    ],
    methods: &[
        method("Kill", &[], &[]),
        method(
            "UpdateProperties",
            &[arg("property_list", "a{say}"), arg("update_mode", "u")],
            &[],
        ),
        method("RemoveProperties", &[arg("keys", "as")], &[]),
    ],
    signals: &[
        PROPERTY_LIST_UPDATED,
        signal(
            "ClientEvent",
            &[arg("name", "s"), arg("property_list", "a{say}")],
        ),
    ],
};

static CLIENT_INTERFACES: [&InterfaceSpec; 1] = [&CLIENT];

const CLIENT_HOOKS: &[Hook] = &[Hook::ClientProplistChanged, Hook::ClientEvent];

/// Bus object of one connected client.
#[derive(Debug)]
pub struct ClientProxy {
    index: u32,
    path: String,
    client: EntityRef<ClientData>,
    slots: HookSlots,
    proplist: Cached<Proplist>,
}

impl ClientProxy {
    /// Proxy for `client`, subscribed to its change hooks.
    pub fn new(client: EntityRef<ClientData>, hooks: &mut HookTable) -> Self {
        let (index, proplist) = {
            let data = client.read();
            (data.index, data.proplist.clone())
        };
        Self {
            index,
            path: object_path(CORE_PATH, CLIENT_TAG, index),
            client,
            slots: HookSlots::connect(hooks, CLIENT_HOOKS),
            proplist: Cached::new(proplist),
        }
    }

    /// Core index of the client.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl BusObject for ClientProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &CLIENT_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.client.read();
        Ok(match property {
            "Index" => self.index.into(),
            "Driver" => data.driver.as_str().into(),
            "OwnerModule" => return owner_module(ctx, data.owner_module, &self.path),
            "PlaybackStreams" => Variant::PathArray(
                ctx.registry.client_streams(self.index, StreamKind::Playback),
            ),
            "RecordStreams" => {
                Variant::PathArray(ctx.registry.client_streams(self.index, StreamKind::Record))
            }
            "PropertyList" => proplist_variant(&data.proplist),
            _ => return Err(unknown_property(interface, property)),
        })
    }

    fn call(
        &self,
        interface: &'static InterfaceSpec,
        method: &str,
        args: &[Variant],
        ctx: &mut CallContext<'_>,
    ) -> Result<MethodReply, BusError> {
        match method {
            "Kill" => ctx.core.remove_client(self.index)?,
            "UpdateProperties" => {
                let proplist = input::proplist(args, 0)?;
                let code = input::u32(args, 1)?;
                let mode = UpdateMode::from_code(code)
                    .ok_or_else(|| BusError::invalid_args(format!("Invalid update mode: {code}")))?;
                ctx.core.update_client_proplist(self.index, mode, &proplist)?;
            }
            "RemoveProperties" => {
                let keys = input::str_array(args, 0)?;
                ctx.core.remove_client_properties(self.index, keys)?;
            }
            _ => return Err(unknown_method(interface, method)),
        }
        Ok(MethodReply::Empty)
    }
}

impl Subscriber for ClientProxy {
    fn slots(&self) -> &HookSlots {
        &self.slots
    }

    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool {
        match event {
            CoreEvent::ClientProplistChanged(index) if *index == self.index => {
                let proplist = self.client.read().proplist.clone();
                notifier.apply(
                    &self.path,
                    CLIENT_INTERFACE,
                    "PropertyListUpdated",
                    &mut self.proplist,
                    proplist,
                    proplist_variant,
                );
                true
            }
            CoreEvent::ClientEvent { client, name, data } if *client == self.index => {
                notifier.emit(
                    Signal::new(&self.path, CLIENT_INTERFACE, "ClientEvent")
                        .with_arg(name.as_str())
                        .with_arg(data),
                );
                true
            }
            _ => false,
        }
    }

    fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation> {
        self.slots.release(table)
    }
}
