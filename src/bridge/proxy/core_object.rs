use std::sync::PoisonError;

use tracing::{debug, info};

use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, input, unknown_method,
    unknown_property,
};
use crate::{
    bridge::{
        interface::{CORE_INTERFACE, InterfaceSpec, arg, method, ro, rw, signal},
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CORE_PATH, device_tag, object_path},
        registry::EntityKind,
    },
    bus::{BusError, Signal, Variant},
    server::{
        ChannelMap, ChannelVolumes, CoreEvent, DeviceKind, Hook, HookTable, NewSample,
        SampleContents, SampleFormat, SampleSpec, ServerCore, StreamKind, VolumeError, modargs,
        sample_spec::{SAMPLE_BYTES_MAX, rate_valid},
    },
};

/// Revision of the core interface.
pub const INTERFACE_REVISION: u32 = 0;

static CORE: InterfaceSpec = InterfaceSpec {
    name: CORE_INTERFACE,
    properties: &[
        ro("InterfaceRevision", "u"),
        ro("Name", "s"),
        ro("Version", "s"),
        ro("IsLocal", "b"),
        ro("Username", "s"),
        ro("Hostname", "s"),
        rw("DefaultChannels", "au"),
        rw("DefaultSampleFormat", "u"),
        rw("DefaultSampleRate", "u"),
        rw("AlternateSampleRate", "u"),
        ro("Cards", "ao"),
        ro("Sinks", "ao"),
        rw("FallbackSink", "o"),
        ro("Sources", "ao"),
        rw("FallbackSource", "o"),
        ro("PlaybackStreams", "ao"),
        ro("RecordStreams", "ao"),
        ro("Samples", "ao"),
        ro("Modules", "ao"),
        ro("Clients", "ao"),
        ro("MyClient", "o"),
        ro("Extensions", "as"),
    ],
    methods: &[
        method("GetCardByName", &[arg("name", "s")], &[arg("card", "o")]),
        method("GetSinkByName", &[arg("name", "s")], &[arg("sink", "o")]),
        method("GetSourceByName", &[arg("name", "s")], &[arg("source", "o")]),
        method("GetSampleByName", &[arg("name", "s")], &[arg("sample", "o")]),
        method(
            "UploadSample",
            &[
                arg("name", "s"),
                arg("sample_format", "u"),
                arg("sample_rate", "u"),
                arg("channels", "au"),
                arg("default_volume", "au"),
                arg("property_list", "a{say}"),
                arg("data", "ay"),
            ],
            &[arg("sample", "o")],
        ),
        method(
            "LoadModule",
            &[arg("name", "s"), arg("arguments", "a{ss}")],
            &[arg("module", "o")],
        ),
        method("Exit", &[], &[]),
        method(
            "ListenForSignal",
            &[arg("signal", "s"), arg("objects", "ao")],
            &[],
        ),
        method("StopListeningForSignal", &[arg("signal", "s")], &[]),
    ],
    signals: &[
        signal("NewCard", &[arg("card", "o")]),
        signal("CardRemoved", &[arg("card", "o")]),
        signal("NewSink", &[arg("sink", "o")]),
        signal("SinkRemoved", &[arg("sink", "o")]),
        signal("FallbackSinkUpdated", &[arg("sink", "o")]),
        signal("FallbackSinkUnset", &[]),
        signal("NewSource", &[arg("source", "o")]),
        signal("SourceRemoved", &[arg("source", "o")]),
        signal("FallbackSourceUpdated", &[arg("source", "o")]),
        signal("FallbackSourceUnset", &[]),
        signal("NewPlaybackStream", &[arg("playback_stream", "o")]),
        signal("PlaybackStreamRemoved", &[arg("playback_stream", "o")]),
        signal("NewRecordStream", &[arg("record_stream", "o")]),
        signal("RecordStreamRemoved", &[arg("record_stream", "o")]),
        signal("NewSample", &[arg("sample", "o")]),
        signal("SampleRemoved", &[arg("sample", "o")]),
        signal("NewModule", &[arg("module", "o")]),
        signal("ModuleRemoved", &[arg("module", "o")]),
        signal("NewClient", &[arg("client", "o")]),
        signal("ClientRemoved", &[arg("client", "o")]),
        signal("NewExtension", &[arg("extension", "s")]),
        signal("ExtensionRemoved", &[arg("extension", "s")]),
    ],
};

static CORE_INTERFACES: [&InterfaceSpec; 1] = [&CORE];

const CORE_HOOKS: &[Hook] = &[
    Hook::DefaultSinkChanged,
    Hook::DefaultSourceChanged,
    Hook::ExtensionRegistered,
    Hook::ExtensionUnregistered,
];

/// The root object: server facts, entity lists, defaults and the
/// sample, module and listener entry points.
#[derive(Debug)]
pub struct CoreObject {
    slots: HookSlots,
    fallback_sink: Cached<Option<u32>>,
    fallback_source: Cached<Option<u32>>,
}

impl CoreObject {
    /// Root object subscribed to default device and extension hooks.
    pub fn new(core: &mut ServerCore) -> Self {
        let fallback_sink = Cached::new(core.default_sink());
        let fallback_source = Cached::new(core.default_source());
        Self {
            slots: HookSlots::connect(core.hooks_mut(), CORE_HOOKS),
            fallback_sink,
            fallback_source,
        }
    }

    /// Subscriptions held by the root object.
    pub fn slots(&self) -> &HookSlots {
        &self.slots
    }

    /// React to a default device or extension event.
    pub fn handle(&mut self, event: &CoreEvent, core: &ServerCore, notifier: &Notifier) -> bool {
        match event {
            CoreEvent::DefaultSinkChanged => {
                if self.fallback_sink.replace(core.default_sink()) {
                    announce_fallback(notifier, DeviceKind::Sink, *self.fallback_sink.get());
                }
                true
            }
            CoreEvent::DefaultSourceChanged => {
                if self.fallback_source.replace(core.default_source()) {
                    announce_fallback(notifier, DeviceKind::Source, *self.fallback_source.get());
                }
                true
            }
            CoreEvent::ExtensionRegistered(name) => {
                notifier.emit(
                    Signal::new(CORE_PATH, CORE_INTERFACE, "NewExtension").with_arg(name.as_str()),
                );
                true
            }
            CoreEvent::ExtensionUnregistered(name) => {
                notifier.emit(
                    Signal::new(CORE_PATH, CORE_INTERFACE, "ExtensionRemoved")
                        .with_arg(name.as_str()),
                );
                true
            }
            _ => false,
        }
    }

    /// Release every subscription.
    ///
    /// # Errors
    /// Returns error if a subscription was already gone.
    pub fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation> {
        self.slots.release(table)
    }

    fn fallback(&self, kind: DeviceKind) -> Result<Variant, BusError> {
        let fallback = match kind {
            DeviceKind::Sink => self.fallback_sink.get(),
            DeviceKind::Source => self.fallback_source.get(),
        };
        fallback
            .map(|index| Variant::path(object_path(CORE_PATH, device_tag(kind), index)))
            .ok_or_else(|| no_fallback(kind))
    }

    fn set_fallback(
        &self,
        kind: DeviceKind,
        value: &Variant,
        ctx: &mut CallContext<'_>,
    ) -> Result<(), BusError> {
        let current = match kind {
            DeviceKind::Sink => self.fallback_sink.get(),
            DeviceKind::Source => self.fallback_source.get(),
        };
        if current.is_none() {
            return Err(no_fallback(kind));
        }
        let path = value.as_object_path().unwrap_or_default();
        let index = ctx.registry.lookup_by_path(EntityKind::Device(kind), path)?.index();
        ctx.core.set_default_device(kind, Some(index))?;
        Ok(())
    }
}

fn no_fallback(kind: DeviceKind) -> BusError {
    match kind {
        DeviceKind::Sink => {
            BusError::unavailable("There are no sinks, and therefore no fallback sink either.")
        }
        DeviceKind::Source => BusError::unavailable(
            "There are no sources, and therefore no fallback source either.",
        ),
    }
}

fn announce_fallback(notifier: &Notifier, kind: DeviceKind, fallback: Option<u32>) {
    let signal = match (kind, fallback) {
        (DeviceKind::Sink, Some(index)) => {
            Signal::new(CORE_PATH, CORE_INTERFACE, "FallbackSinkUpdated")
                .with_arg(Variant::path(object_path(CORE_PATH, device_tag(kind), index)))
        }
        (DeviceKind::Sink, None) => Signal::new(CORE_PATH, CORE_INTERFACE, "FallbackSinkUnset"),
        (DeviceKind::Source, Some(index)) => {
            Signal::new(CORE_PATH, CORE_INTERFACE, "FallbackSourceUpdated")
                .with_arg(Variant::path(object_path(CORE_PATH, device_tag(kind), index)))
        }
        (DeviceKind::Source, None) => {
            Signal::new(CORE_PATH, CORE_INTERFACE, "FallbackSourceUnset")
        }
    };
    notifier.emit(signal);
}

fn format_of(code: u32) -> Result<SampleFormat, BusError> {
    SampleFormat::from_code(code)
        .ok_or_else(|| BusError::invalid_args(format!("Invalid sample format: {code}")))
}

fn checked_rate(rate: u32) -> Result<u32, BusError> {
    if !rate_valid(rate) {
        return Err(BusError::invalid_args(format!("Invalid sample rate: {rate}")));
    }
    Ok(rate)
}

/// Validate an upload request in the order clients rely on.
fn upload_request(args: &[Variant]) -> Result<NewSample, BusError> {
    let name = input::str(args, 0)?;
    let format = format_of(input::u32(args, 1)?)?;
    let rate = checked_rate(input::u32(args, 2)?)?;
    let channel_map = ChannelMap::new(input::u32_array(args, 3)?.to_vec())?;
    let channels = channel_map.channels();

    let volumes = input::u32_array(args, 4)?;
    let default_volume = if volumes.is_empty() {
        None
    } else {
        if volumes.len() != channels {
            return Err(VolumeError::ChannelMismatch {
                expected: channels,
                actual: volumes.len(),
            }
            .into());
        }
        Some(ChannelVolumes::new(volumes.to_vec())?)
    };

    let proplist = input::proplist(args, 5)?;
    let data = input::bytes(args, 6)?;
    let sample_spec = SampleSpec {
        format,
        rate,
        channels: u8::try_from(channels).unwrap_or(u8::MAX),
    };
    if data.is_empty() {
        return Err(BusError::invalid_args("Empty data."));
    }
    if data.len() > SAMPLE_BYTES_MAX {
        return Err(BusError::invalid_args("Too big sample."));
    }
    if data.len() % sample_spec.frame_size() != 0 {
        return Err(BusError::invalid_args(
            "The sample length in bytes doesn't divide with the frame size.",
        ));
    }

    Ok(NewSample {
        name: name.to_string(),
        contents: SampleContents {
            sample_spec,
            channel_map,
            data: data.to_vec(),
        },
        default_volume,
        proplist,
    })
}

fn by_name(
    ctx: &CallContext<'_>,
    kind: EntityKind,
    index: Option<u32>,
    name: &str,
) -> Result<MethodReply, BusError> {
    let path = index
        .and_then(|index| ctx.registry.path_of(kind, index))
        .ok_or_else(|| BusError::not_found(format!("No such {kind}: {name}")))?;
    Ok(MethodReply::value(Variant::path(path)))
}

impl BusObject for CoreObject {
    fn path(&self) -> &str {
        CORE_PATH
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &CORE_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let info = ctx.core.info();
        let registry = ctx.registry;
        Ok(match property {
            "InterfaceRevision" => INTERFACE_REVISION.into(),
            "Name" => info.name.as_str().into(),
            "Version" => info.version.as_str().into(),
            "IsLocal" => info.is_local.into(),
            "Username" => info.username.as_str().into(),
            "Hostname" => info.hostname.as_str().into(),
            "DefaultChannels" => ctx.core.default_channel_map().as_slice().to_vec().into(),
            "DefaultSampleFormat" => ctx.core.default_sample_spec().format.code().into(),
            "DefaultSampleRate" => ctx.core.default_sample_spec().rate.into(),
            "AlternateSampleRate" => ctx.core.alternate_sample_rate().into(),
            "Cards" => Variant::PathArray(registry.list_paths(EntityKind::Card)),
            "Sinks" => {
                Variant::PathArray(registry.list_paths(EntityKind::Device(DeviceKind::Sink)))
            }
            "FallbackSink" => return self.fallback(DeviceKind::Sink),
            "Sources" => {
                Variant::PathArray(registry.list_paths(EntityKind::Device(DeviceKind::Source)))
            }
            "FallbackSource" => return self.fallback(DeviceKind::Source),
            "PlaybackStreams" => {
                Variant::PathArray(registry.list_paths(EntityKind::Stream(StreamKind::Playback)))
            }
            "RecordStreams" => {
                Variant::PathArray(registry.list_paths(EntityKind::Stream(StreamKind::Record)))
            }
            "Samples" => Variant::PathArray(registry.list_paths(EntityKind::Sample)),
            "Modules" => Variant::PathArray(registry.list_paths(EntityKind::Module)),
            "Clients" => Variant::PathArray(registry.list_paths(EntityKind::Client)),
            "MyClient" => ctx
                .caller
                .client
                .and_then(|client| registry.path_of(EntityKind::Client, client))
                .map(Variant::path)
                .ok_or_else(|| {
                    BusError::unavailable("This connection isn't associated with any client.")
                })?,
            "Extensions" => Variant::StrArray(ctx.core.extensions().to_vec()),
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
            "DefaultChannels" => {
                let positions = value.as_u32_array().unwrap_or_default().to_vec();
                ctx.core.set_default_channel_map(ChannelMap::new(positions)?);
            }
            "DefaultSampleFormat" => {
                let format = format_of(value.as_u32().unwrap_or(u32::MAX))?;
                ctx.core.set_default_sample_format(format);
            }
            "DefaultSampleRate" => {
                let rate = checked_rate(value.as_u32().unwrap_or_default())?;
                ctx.core.set_default_sample_rate(rate);
            }
            "AlternateSampleRate" => {
                let rate = checked_rate(value.as_u32().unwrap_or_default())?;
                ctx.core.set_alternate_sample_rate(rate);
            }
            "FallbackSink" => self.set_fallback(DeviceKind::Sink, value, ctx)?,
            "FallbackSource" => self.set_fallback(DeviceKind::Source, value, ctx)?,
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
            "GetCardByName" => {
                let name = input::str(args, 0)?;
                by_name(ctx, EntityKind::Card, ctx.core.card_by_name(name), name)
            }
            "GetSinkByName" => {
                let name = input::str(args, 0)?;
                let index = ctx.core.device_by_name(DeviceKind::Sink, name);
                by_name(ctx, EntityKind::Device(DeviceKind::Sink), index, name)
            }
            "GetSourceByName" => {
                let name = input::str(args, 0)?;
                let index = ctx.core.device_by_name(DeviceKind::Source, name);
                by_name(ctx, EntityKind::Device(DeviceKind::Source), index, name)
            }
            "GetSampleByName" => {
                let name = input::str(args, 0)?;
                by_name(ctx, EntityKind::Sample, ctx.core.sample_by_name(name), name)
            }
            "UploadSample" => {
                let sample = upload_request(args)?;
                debug!(name = %sample.name, bytes = sample.contents.data.len(), "sample upload");
                let index = ctx.core.add_sample(sample);
                Ok(MethodReply::NewObject(EntityKind::Sample, index))
            }
            "LoadModule" => {
                if ctx.config.disallow_module_loading {
                    return Err(BusError::access_denied("Module loading is disabled."));
                }
                let name = input::str(args, 0)?;
                let arguments = args
                    .get(1)
                    .and_then(Variant::as_str_dict)
                    .ok_or_else(|| BusError::invalid_args("Argument 1 is not of type a{ss}."))?;
                let rendered =
                    modargs::format(arguments.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
                let index = ctx
                    .core
                    .load_module(name, &rendered)
                    .map_err(|e| BusError::failed(format!("Failed to load module: {e}")))?;
                Ok(MethodReply::NewObject(EntityKind::Module, index))
            }
            "Exit" => {
                if ctx.config.disallow_exit {
                    return Err(BusError::access_denied("Exiting is disabled."));
                }
                info!(connection = %ctx.caller.connection, "exit requested over the bus");
                ctx.core.request_exit();
                Ok(MethodReply::Empty)
            }
            "ListenForSignal" => {
                let signal = input::str(args, 0)?;
                let objects = input::path_array(args, 1)?.to_vec();
                let signal = (!signal.is_empty()).then_some(signal);
                ctx.listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listen(&ctx.caller.connection, signal, objects);
                debug!(connection = %ctx.caller.connection, ?signal, "listening");
                Ok(MethodReply::Empty)
            }
            "StopListeningForSignal" => {
                let signal = input::str(args, 0)?;
                let signal = (!signal.is_empty()).then_some(signal);
                let removed = ctx
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .stop_listening(&ctx.caller.connection, signal);
                debug!(connection = %ctx.caller.connection, ?signal, removed, "stopped listening");
                Ok(MethodReply::Empty)
            }
            _ => Err(unknown_method(interface, method)),
        }
    }
}
