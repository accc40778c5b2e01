use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, Subscriber, input,
    proplist_variant, unknown_method, unknown_property,
};
use crate::{
    bridge::{
        interface::{
            InterfaceSpec, PROPERTY_LIST_UPDATED, SAMPLE_INTERFACE, arg, method, ro,
        },
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CORE_PATH, SAMPLE_TAG, object_path},
        registry::EntityKind,
    },
    bus::{BusError, Variant},
    server::{
        CoreEvent, DeviceKind, EntityRef, Hook, HookTable, Proplist, SampleData,
        volume::VOLUME_MAX,
    },
};

static SAMPLE: InterfaceSpec = InterfaceSpec {
    name: SAMPLE_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Name", "s"),
        ro("SampleFormat", "u"),
        ro("SampleRate", "u"),
        ro("Channels", "au"),
        ro("DefaultVolume", "au"),
        ro("Duration", "t"),
        ro("Bytes", "u"),
        ro("PropertyList", "a{say}"),
    ],
    methods: &[
        method(
            "Play",
            &[arg("volume", "u"), arg("property_list", "a{say}")],
            &[],
        ),
        method(
            "PlayToSink",
            &[
                arg("sink", "o"),
                arg("volume", "u"),
                arg("property_list", "a{say}"),
            ],
            &[],
        ),
        method("Remove", &[], &[]),
    ],
    signals: &[PROPERTY_LIST_UPDATED],
};

static SAMPLE_INTERFACES: [&InterfaceSpec; 1] = [&SAMPLE];

const SAMPLE_HOOKS: &[Hook] = &[Hook::SampleChanged];

/// Bus object of one sample cache entry.
#[derive(Debug)]
pub struct SampleProxy {
    index: u32,
    path: String,
    sample: EntityRef<SampleData>,
    slots: HookSlots,
    proplist: Cached<Proplist>,
}

impl SampleProxy {
    /// Proxy for `sample`, subscribed to its change hook.
    pub fn new(sample: EntityRef<SampleData>, hooks: &mut HookTable) -> Self {
        let (index, proplist) = {
            let data = sample.read();
            (data.index, data.proplist.clone())
        };
        Self {
            index,
            path: object_path(CORE_PATH, SAMPLE_TAG, index),
            sample,
            slots: HookSlots::connect(hooks, SAMPLE_HOOKS),
            proplist: Cached::new(proplist),
        }
    }

    /// Core index of the sample.
    pub fn index(&self) -> u32 {
        self.index
    }

    fn not_loaded(&self) -> BusError {
        BusError::unavailable(format!("{} is not loaded.", self.path))
    }
}

fn checked_volume(volume: u32) -> Result<u32, BusError> {
    if volume > VOLUME_MAX {
        return Err(BusError::invalid_args(format!("Invalid volume: {volume}")));
    }
    Ok(volume)
}

impl BusObject for SampleProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &SAMPLE_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        _ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.sample.read();
        let contents = data.contents.as_ref();
        Ok(match property {
            "Index" => self.index.into(),
            "Name" => data.name.as_str().into(),
            "SampleFormat" => contents
                .map(|c| Variant::from(c.sample_spec.format.code()))
                .ok_or_else(|| self.not_loaded())?,
            "SampleRate" => contents
                .map(|c| Variant::from(c.sample_spec.rate))
                .ok_or_else(|| self.not_loaded())?,
            "Channels" => contents
                .map(|c| Variant::from(c.channel_map.as_slice().to_vec()))
                .ok_or_else(|| self.not_loaded())?,
            "DefaultVolume" => data
                .default_volume
                .as_ref()
                .map(|v| Variant::from(v.as_slice().to_vec()))
                .ok_or_else(|| {
                    BusError::unavailable(format!("{} doesn't have default volume.", self.path))
                })?,
            "Duration" => contents
                .map(|c| Variant::from(c.sample_spec.bytes_to_usec(c.data.len())))
                .ok_or_else(|| self.not_loaded())?,
            "Bytes" => contents
                .map(|c| Variant::from(u32::try_from(c.data.len()).unwrap_or(u32::MAX)))
                .ok_or_else(|| self.not_loaded())?,
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
            "Play" => {
                let volume = checked_volume(input::u32(args, 0)?)?;
                let proplist = input::proplist(args, 1)?;
                ctx.core.play_sample(self.index, None, volume, proplist)?;
            }
            "PlayToSink" => {
                let sink = ctx
                    .registry
                    .lookup_by_path(EntityKind::Device(DeviceKind::Sink), input::path(args, 0)?)?
                    .index();
                let volume = checked_volume(input::u32(args, 1)?)?;
                let proplist = input::proplist(args, 2)?;
                ctx.core.play_sample(self.index, Some(sink), volume, proplist)?;
            }
            "Remove" => ctx.core.remove_sample(self.index)?,
            _ => return Err(unknown_method(interface, method)),
        }
        Ok(MethodReply::Empty)
    }
}

impl Subscriber for SampleProxy {
    fn slots(&self) -> &HookSlots {
        &self.slots
    }

    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool {
        match event {
            CoreEvent::SampleChanged(index) if *index == self.index => {
                let proplist = self.sample.read().proplist.clone();
                notifier.apply(
                    &self.path,
                    SAMPLE_INTERFACE,
                    "PropertyListUpdated",
                    &mut self.proplist,
                    proplist,
                    proplist_variant,
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
