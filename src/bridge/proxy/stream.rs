use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, Subscriber, input, owner_module,
    proplist_variant, unknown_method, unknown_property,
};
use crate::{
    bridge::{
        interface::{
            InterfaceSpec, PROPERTY_LIST_UPDATED, STREAM_INTERFACE, arg, method, ro, rw, signal,
        },
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CORE_PATH, device_tag, object_path, stream_tag},
        registry::EntityKind,
    },
    bus::{BusError, Signal, Variant},
    server::{
        ChannelVolumes, CoreEvent, EntityRef, Hook, HookTable, Proplist, StreamData, StreamId,
        StreamKind,
    },
};

static STREAM: InterfaceSpec = InterfaceSpec {
    name: STREAM_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Driver", "s"),
        ro("OwnerModule", "o"),
        ro("Client", "o"),
        ro("Device", "o"),
        ro("SampleFormat", "u"),
        ro("SampleRate", "u"),
        ro("Channels", "au"),
        rw("Volume", "au"),
        rw("Mute", "b"),
        ro("BufferLatency", "t"),
        ro("DeviceLatency", "t"),
        ro("ResampleMethod", "s"),
        ro("PropertyList", "a{say}"),
    ],
    methods: &[
        method("Move", &[arg("device", "o")], &[]),
        method("Kill", &[], &[]),
    ],
    signals: &[
        signal("DeviceUpdated", &[arg("device", "o")]),
        signal("SampleRateUpdated", &[arg("sample_rate", "u")]),
        signal("VolumeUpdated", &[arg("volume", "au")]),
        signal("MuteUpdated", &[arg("muted", "b")]),
        PROPERTY_LIST_UPDATED,
        signal(
            "StreamEvent",
            &[arg("name", "s"), arg("property_list", "a{say}")],
        ),
    ],
};

static STREAM_INTERFACES: [&InterfaceSpec; 1] = [&STREAM];

const STREAM_HOOKS: &[Hook] = &[
    Hook::StreamMoved,
    Hook::StreamVolumeChanged,
    Hook::StreamMuteChanged,
    Hook::StreamRateChanged,
    Hook::StreamProplistChanged,
    Hook::StreamEvent,
];

/// Bus object of one playback or record stream.
#[derive(Debug)]
pub struct StreamProxy {
    id: StreamId,
    path: String,
    stream: EntityRef<StreamData>,
    slots: HookSlots,
    device: Cached<u32>,
    rate: Cached<u32>,
    volume: Cached<ChannelVolumes>,
    mute: Cached<bool>,
    proplist: Cached<Proplist>,
}

impl StreamProxy {
    /// Proxy for `stream`, subscribed to its change hooks.
    pub fn new(stream: EntityRef<StreamData>, hooks: &mut HookTable) -> Self {
        let data = stream.read().clone();
        let id = StreamId {
            kind: data.kind,
            index: data.index,
        };

        Self {
            id,
            path: object_path(CORE_PATH, stream_tag(id.kind), id.index),
            stream,
            slots: HookSlots::connect(hooks, STREAM_HOOKS),
            device: Cached::new(data.device),
            rate: Cached::new(data.sample_spec.rate),
            volume: Cached::new(data.volume),
            mute: Cached::new(data.mute),
            proplist: Cached::new(data.proplist),
        }
    }

    /// Kind and core index of the stream.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Core index of the owning client.
    pub fn client(&self) -> Option<u32> {
        self.stream.read().client
    }

    fn device_path(&self, device: u32) -> String {
        object_path(CORE_PATH, device_tag(self.id.kind.device_kind()), device)
    }

    /// Record streams may lack a volume; playback streams always have one.
    fn volume_available(&self, data: &StreamData) -> Result<(), BusError> {
        if self.id.kind == StreamKind::Record && !data.has_volume {
            return Err(BusError::unavailable(format!(
                "{} doesn't have volume.",
                self.path
            )));
        }
        Ok(())
    }
}

impl BusObject for StreamProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &STREAM_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.stream.read();
        Ok(match property {
            "Index" => self.id.index.into(),
            "Driver" => data.driver.as_str().into(),
            "OwnerModule" => return owner_module(ctx, data.owner_module, &self.path),
            "Client" => data
                .client
                .and_then(|client| ctx.registry.path_of(EntityKind::Client, client))
                .map(Variant::path)
                .ok_or_else(|| {
                    BusError::unavailable(format!(
                        "{} isn't associated to any client.",
                        self.path
                    ))
                })?,
            "Device" => Variant::path(self.device_path(data.device)),
            "SampleFormat" => data.sample_spec.format.code().into(),
            "SampleRate" => data.sample_spec.rate.into(),
            "Channels" => data.channel_map.as_slice().to_vec().into(),
            "Volume" => {
                self.volume_available(&data)?;
                data.volume.as_slice().to_vec().into()
            }
            "Mute" => {
                self.volume_available(&data)?;
                data.mute.into()
            }
            "BufferLatency" => data.buffer_latency.into(),
            "DeviceLatency" => data.device_latency.into(),
            "ResampleMethod" => data.resample_method.as_str().into(),
            "PropertyList" => proplist_variant(&data.proplist),
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
                let channels = {
                    let data = self.stream.read();
                    self.volume_available(&data)?;
                    if !data.volume_writable {
                        return Err(BusError::access_denied(format!(
                            "{}: Volume is not writable.",
                            self.path
                        )));
                    }
                    data.channel_map.channels()
                };
                let values = value.as_u32_array().unwrap_or_default();
                if values.is_empty() {
                    return Err(BusError::invalid_args("Empty volume array."));
                }
                let volume = ChannelVolumes::fit(values, channels)?;
                ctx.core.set_stream_volume(self.id, volume)?;
            }
            "Mute" => {
                self.volume_available(&self.stream.read())?;
                ctx.core.set_stream_mute(self.id, value.as_bool().unwrap_or_default())?;
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
            "Move" => {
                let path = input::path(args, 0)?;
                let kind = EntityKind::Device(self.id.kind.device_kind());
                let device = ctx.registry.lookup_by_path(kind, path)?.index();
                ctx.core.move_stream(self.id, device)?;
                Ok(MethodReply::Empty)
            }
            "Kill" => {
                ctx.core.remove_stream(self.id)?;
                Ok(MethodReply::Empty)
            }
            _ => Err(unknown_method(interface, method)),
        }
    }
}

impl Subscriber for StreamProxy {
    fn slots(&self) -> &HookSlots {
        &self.slots
    }

    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool {
        let data = match event {
            CoreEvent::StreamMoved(id)
            | CoreEvent::StreamVolumeChanged(id)
            | CoreEvent::StreamMuteChanged(id)
            | CoreEvent::StreamRateChanged(id)
            | CoreEvent::StreamProplistChanged(id)
                if *id == self.id =>
            {
                self.stream.read().clone()
            }
            CoreEvent::StreamEvent { stream, name, data } if *stream == self.id => {
                notifier.emit(
                    Signal::new(&self.path, STREAM_INTERFACE, "StreamEvent")
                        .with_arg(name.as_str())
                        .with_arg(data),
                );
                return true;
            }
            _ => return false,
        };

        match event {
            CoreEvent::StreamMoved(_) => {
                let path = self.device_path(data.device);
                notifier.apply(
                    &self.path,
                    STREAM_INTERFACE,
                    "DeviceUpdated",
                    &mut self.device,
                    data.device,
                    |_| Variant::path(path),
                );
            }
            CoreEvent::StreamVolumeChanged(_) => {
                notifier.apply(
                    &self.path,
                    STREAM_INTERFACE,
                    "VolumeUpdated",
                    &mut self.volume,
                    data.volume,
                    |v| Variant::U32Array(v.as_slice().to_vec()),
                );
            }
            CoreEvent::StreamMuteChanged(_) => {
                notifier.apply(
                    &self.path,
                    STREAM_INTERFACE,
                    "MuteUpdated",
                    &mut self.mute,
                    data.mute,
                    |m| Variant::Bool(*m),
                );
            }
            CoreEvent::StreamRateChanged(_) => {
                notifier.apply(
                    &self.path,
                    STREAM_INTERFACE,
                    "SampleRateUpdated",
                    &mut self.rate,
                    data.sample_spec.rate,
                    |r| Variant::U32(*r),
                );
            }
            _ => {
                notifier.apply(
                    &self.path,
                    STREAM_INTERFACE,
                    "PropertyListUpdated",
                    &mut self.proplist,
                    data.proplist,
                    proplist_variant,
                );
            }
        }
        true
    }

    fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation> {
        self.slots.release(table)
    }
}
