use indexmap::IndexMap;

use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, Subscriber, input, owner_module,
    proplist_variant, unknown_method, unknown_property,
};
use crate::{
    bridge::{
        interface::{
            DEVICE_INTERFACE, DEVICE_PORT_INTERFACE, InterfaceSpec, PROPERTY_LIST_UPDATED,
            SINK_INTERFACE, SOURCE_INTERFACE, arg, method, ro, rw, signal,
        },
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CORE_PATH, ChildCounter, PORT_TAG, device_tag, object_path},
        registry::EntityKind,
    },
    bus::{BusError, Signal, Variant},
    server::{
        ChannelVolumes, CoreEvent, DeviceData, DeviceFlags, DeviceId, DeviceKind, DeviceState,
        EntityRef, Hook, HookTable, PortData, Proplist,
    },
};

static DEVICE: InterfaceSpec = InterfaceSpec {
    name: DEVICE_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Name", "s"),
        ro("Driver", "s"),
        ro("OwnerModule", "o"),
        ro("Card", "o"),
        ro("SampleFormat", "u"),
        ro("SampleRate", "u"),
        ro("Channels", "au"),
        rw("Volume", "au"),
        ro("HasFlatVolume", "b"),
        ro("HasConvertibleToDecibelVolume", "b"),
        ro("BaseVolume", "u"),
        ro("VolumeSteps", "u"),
        rw("Mute", "b"),
        ro("HasHardwareVolume", "b"),
        ro("HasHardwareMute", "b"),
        ro("ConfiguredLatency", "t"),
        ro("HasDynamicLatency", "b"),
        ro("Latency", "t"),
        ro("IsHardwareDevice", "b"),
        ro("IsNetworkDevice", "b"),
        ro("State", "u"),
        ro("Ports", "ao"),
        rw("ActivePort", "o"),
        ro("PropertyList", "a{say}"),
    ],
    methods: &[
        method("Suspend", &[arg("suspend", "b")], &[]),
        method("GetPortByName", &[arg("name", "s")], &[arg("port", "o")]),
    ],
    signals: &[
        signal("VolumeUpdated", &[arg("volume", "au")]),
        signal("MuteUpdated", &[arg("muted", "b")]),
        signal("StateUpdated", &[arg("state", "u")]),
        signal("ActivePortUpdated", &[arg("port", "o")]),
        PROPERTY_LIST_UPDATED,
    ],
};

static SINK: InterfaceSpec = InterfaceSpec {
    name: SINK_INTERFACE,
    properties: &[ro("MonitorSource", "o")],
    methods: &[],
    signals: &[],
};

static SOURCE: InterfaceSpec = InterfaceSpec {
    name: SOURCE_INTERFACE,
    properties: &[ro("MonitorOfSink", "o")],
    methods: &[],
    signals: &[],
};

static DEVICE_PORT: InterfaceSpec = InterfaceSpec {
    name: DEVICE_PORT_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Name", "s"),
        ro("Description", "s"),
        ro("Priority", "u"),
        ro("Available", "u"),
    ],
    methods: &[],
    signals: &[signal("AvailableChanged", &[arg("available", "u")])],
};

static SINK_INTERFACES: [&InterfaceSpec; 2] = [&DEVICE, &SINK];
static SOURCE_INTERFACES: [&InterfaceSpec; 2] = [&DEVICE, &SOURCE];
static PORT_INTERFACES: [&InterfaceSpec; 1] = [&DEVICE_PORT];

const DEVICE_HOOKS: &[Hook] = &[
    Hook::DeviceStateChanged,
    Hook::DeviceVolumeChanged,
    Hook::DeviceMuteChanged,
    Hook::DevicePortChanged,
    Hook::DeviceProplistChanged,
    Hook::PortAvailableChanged,
];

/// Bus object of one device port.
#[derive(Debug)]
pub struct PortProxy {
    index: u32,
    path: String,
    port: EntityRef<PortData>,
    available: Cached<u32>,
}

impl PortProxy {
    fn new(port: EntityRef<PortData>, counter: &mut ChildCounter, device_path: &str) -> Self {
        let (index, path) = counter.allocate(device_path, PORT_TAG);
        let available = Cached::new(port.read().available.code());
        Self {
            index,
            path,
            port,
            available,
        }
    }

    /// Number of the port below its device.
    pub fn index(&self) -> u32 {
        self.index
    }

    fn on_available_changed(&mut self, notifier: &Notifier) {
        let available = self.port.read().available.code();
        notifier.apply(
            &self.path,
            DEVICE_PORT_INTERFACE,
            "AvailableChanged",
            &mut self.available,
            available,
            |a| Variant::U32(*a),
        );
    }
}

impl BusObject for PortProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &PORT_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        _ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.port.read();
        Ok(match property {
            "Index" => self.index.into(),
            "Name" => data.name.as_str().into(),
            "Description" => data.description.as_str().into(),
            "Priority" => data.priority.into(),
            "Available" => data.available.code().into(),
            _ => return Err(unknown_property(interface, property)),
        })
    }
}

/// Bus object of one sink or source, parent of its port objects.
#[derive(Debug)]
pub struct DeviceProxy {
    id: DeviceId,
    path: String,
    device: EntityRef<DeviceData>,
    slots: HookSlots,
    ports: IndexMap<String, PortProxy>,
    volume: Cached<ChannelVolumes>,
    mute: Cached<bool>,
    state: Cached<DeviceState>,
    active_port: Cached<Option<String>>,
    proplist: Cached<Proplist>,
}

impl DeviceProxy {
    /// Proxy for `device`, subscribed to its change hooks.
    pub fn new(device: EntityRef<DeviceData>, hooks: &mut HookTable) -> Self {
        let data = device.read().clone();
        let id = DeviceId {
            kind: data.kind,
            index: data.index,
        };
        let path = object_path(CORE_PATH, device_tag(id.kind), id.index);
        let mut counter = ChildCounter::default();
        let ports = data
            .ports
            .iter()
            .map(|port| {
                let name = port.read().name.clone();
                (name, PortProxy::new(port.clone(), &mut counter, &path))
            })
            .collect();

        Self {
            id,
            device,
            slots: HookSlots::connect(hooks, DEVICE_HOOKS),
            ports,
            volume: Cached::new(data.volume),
            mute: Cached::new(data.mute),
            state: Cached::new(data.state),
            active_port: Cached::new(data.active_port),
            proplist: Cached::new(data.proplist),
            path,
        }
    }

    /// Kind and core index of the device.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Core index of the owning card.
    pub fn card(&self) -> Option<u32> {
        self.device.read().card
    }

    /// Port object at `path`.
    pub fn port_at(&self, path: &str) -> Option<&PortProxy> {
        self.ports.values().find(|p| p.path == path)
    }

    fn port_path_of(&self, name: Option<&str>) -> Option<String> {
        name.and_then(|n| self.ports.get(n)).map(|p| p.path.clone())
    }

    fn linked_device(&self, ctx: &ReadContext<'_>, data: &DeviceData) -> Result<Variant, BusError> {
        let kind = match self.id.kind {
            DeviceKind::Sink => DeviceKind::Source,
            DeviceKind::Source => DeviceKind::Sink,
        };
        data.monitor
            .and_then(|index| ctx.registry.path_of(EntityKind::Device(kind), index))
            .map(Variant::path)
            .ok_or_else(|| match self.id.kind {
                DeviceKind::Sink => {
                    BusError::unavailable(format!("{} has no monitor source.", self.path))
                }
                DeviceKind::Source => BusError::unavailable(format!(
                    "{} is not a monitor source.",
                    self.path
                )),
            })
    }

    fn emit_port_changed(&mut self, notifier: &Notifier) {
        let active = self.device.read().active_port.clone();
        let path = self.port_path_of(active.as_deref());
        if self.active_port.replace(active) {
            if let Some(path) = path {
                notifier.emit(
                    Signal::new(&self.path, DEVICE_INTERFACE, "ActivePortUpdated")
                        .with_arg(Variant::path(path)),
                );
            }
        }
    }
}

impl BusObject for DeviceProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        match self.id.kind {
            DeviceKind::Sink => &SINK_INTERFACES,
            DeviceKind::Source => &SOURCE_INTERFACES,
        }
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.device.read();
        Ok(match property {
            "Index" => self.id.index.into(),
            "Name" => data.name.as_str().into(),
            "Driver" => data.driver.as_str().into(),
            "OwnerModule" => return owner_module(ctx, data.owner_module, &self.path),
            "Card" => data
                .card
                .and_then(|card| ctx.registry.path_of(EntityKind::Card, card))
                .map(Variant::path)
                .ok_or_else(|| {
                    BusError::unavailable(format!("{} doesn't belong to any card.", self.path))
                })?,
            "SampleFormat" => data.sample_spec.format.code().into(),
            "SampleRate" => data.sample_spec.rate.into(),
            "Channels" => data.channel_map.as_slice().to_vec().into(),
            "Volume" => data.volume.as_slice().to_vec().into(),
            "HasFlatVolume" => data.flags.contains(DeviceFlags::FLAT_VOLUME).into(),
            "HasConvertibleToDecibelVolume" => {
                data.flags.contains(DeviceFlags::DECIBEL_VOLUME).into()
            }
            "BaseVolume" => data.base_volume.into(),
            "VolumeSteps" => data.volume_steps.into(),
            "Mute" => data.mute.into(),
            "HasHardwareVolume" => data.flags.contains(DeviceFlags::HW_VOLUME_CTRL).into(),
            "HasHardwareMute" => data.flags.contains(DeviceFlags::HW_MUTE_CTRL).into(),
            "ConfiguredLatency" => data.configured_latency.into(),
            "HasDynamicLatency" => data.flags.contains(DeviceFlags::DYNAMIC_LATENCY).into(),
            "Latency" => {
                if !data.flags.contains(DeviceFlags::LATENCY) {
                    return Err(BusError::unavailable(format!(
                        "{} doesn't support latency querying.",
                        self.path
                    )));
                }
                data.latency.into()
            }
            "IsHardwareDevice" => data.flags.contains(DeviceFlags::HARDWARE).into(),
            "IsNetworkDevice" => data.flags.contains(DeviceFlags::NETWORK).into(),
            "State" => data.state.code().into(),
            "Ports" => Variant::PathArray(self.children()),
            "ActivePort" => self
                .port_path_of(data.active_port.as_deref())
                .map(Variant::path)
                .ok_or_else(|| {
                    BusError::unavailable(format!("{} doesn't have any ports.", self.path))
                })?,
            "PropertyList" => proplist_variant(&data.proplist),
            "MonitorSource" | "MonitorOfSink" => return self.linked_device(ctx, &data),
            _ => return Err(unknown_property(interface, property)),
        })
    }

    fn set(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        value: &Variant,
        ctx: &mut CallContext<'_>,
    ) -> Result<(), BusError> {
        match property {
            "Volume" => {
                let values = value.as_u32_array().unwrap_or_default();
                if values.is_empty() {
                    return Err(BusError::invalid_args("Empty volume array."));
                }
                let channels = self.device.read().channel_map.channels();
                let volume = ChannelVolumes::fit(values, channels)?;
                ctx.core.set_device_volume(self.id, volume)?;
            }
            "Mute" => {
                let mute = value.as_bool().unwrap_or_default();
                ctx.core.set_device_mute(self.id, mute)?;
            }
            "ActivePort" => {
                if self.ports.is_empty() {
                    return Err(BusError::unavailable(format!(
                        "{} doesn't have any ports.",
                        self.path
                    )));
                }
                let path = value.as_object_path().unwrap_or_default();
                let name = self
                    .port_at(path)
                    .map(|p| p.port.read().name.clone())
                    .ok_or_else(|| BusError::not_found(format!("{path}: No such port.")))?;
                ctx.core.set_active_port(self.id, &name)?;
            }
            _ => return Err(BusError::read_only(interface.name, property)),
        }
        Ok(())
    }

    fn call(
        &self,
        interface: &'static InterfaceSpec,
        method: &str,
        args: &[Variant],
        ctx: &mut CallContext<'_>,
    ) -> Result<MethodReply, BusError> {
        match method {
            "Suspend" => {
                ctx.core.suspend_device(self.id, input::bool(args, 0)?)?;
                Ok(MethodReply::Empty)
            }
            "GetPortByName" => {
                let name = input::str(args, 0)?;
                let port = self
                    .ports
                    .get(name)
                    .ok_or_else(|| BusError::not_found(format!("{name}: No such port.")))?;
                Ok(MethodReply::value(Variant::path(&port.path)))
            }
            _ => Err(unknown_method(interface, method)),
        }
    }

    fn children(&self) -> Vec<String> {
        self.ports.values().map(|p| p.path.clone()).collect()
    }
}

impl Subscriber for DeviceProxy {
    fn slots(&self) -> &HookSlots {
        &self.slots
    }

    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool {
        match event {
            CoreEvent::DeviceVolumeChanged(id) if *id == self.id => {
                let volume = self.device.read().volume.clone();
                notifier.apply(
                    &self.path,
                    DEVICE_INTERFACE,
                    "VolumeUpdated",
                    &mut self.volume,
                    volume,
                    |v| Variant::U32Array(v.as_slice().to_vec()),
                );
                true
            }
            CoreEvent::DeviceMuteChanged(id) if *id == self.id => {
                let mute = self.device.read().mute;
                notifier.apply(
                    &self.path,
                    DEVICE_INTERFACE,
                    "MuteUpdated",
                    &mut self.mute,
                    mute,
                    |m| Variant::Bool(*m),
                );
                true
            }
            CoreEvent::DeviceStateChanged(id) if *id == self.id => {
                let state = self.device.read().state;
                notifier.apply(
                    &self.path,
                    DEVICE_INTERFACE,
                    "StateUpdated",
                    &mut self.state,
                    state,
                    |s| Variant::U32(s.code()),
                );
                true
            }
            CoreEvent::DevicePortChanged(id) if *id == self.id => {
                self.emit_port_changed(notifier);
                true
            }
            CoreEvent::DeviceProplistChanged(id) if *id == self.id => {
                let proplist = self.device.read().proplist.clone();
                notifier.apply(
                    &self.path,
                    DEVICE_INTERFACE,
                    "PropertyListUpdated",
                    &mut self.proplist,
                    proplist,
                    proplist_variant,
                );
                true
            }
            CoreEvent::PortAvailableChanged(port) => {
                match self.ports.values_mut().find(|p| p.port.ptr_eq(port)) {
                    Some(proxy) => {
                        proxy.on_available_changed(notifier);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation> {
        self.slots.release(table)
    }
}
