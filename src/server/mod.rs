//! In-process model of the audio server core.
//!
//! Holds every live entity, applies mutations and fires a [`CoreEvent`] on
//! the matching [`Hook`] for each one. Events fired while nobody listens on
//! their hook are discarded.

mod cards;
mod clients;
mod devices;
/// Shared entity handle.
pub mod entity;
/// Core mutation errors.
pub mod error;
/// Hook subscriptions and events.
pub mod hooks;
/// Module argument strings.
pub mod modargs;
mod modules;
/// Property lists.
pub mod proplist;
mod samples;
/// Sample formats and specs.
pub mod sample_spec;
mod streams;
/// Entity data types.
pub mod types;
/// Channel volumes and maps.
pub mod volume;

use std::env;

use indexmap::IndexMap;
use tracing::debug;

pub use cards::NewCard;
pub use clients::NewClient;
pub use devices::NewDevice;
pub use entity::EntityRef;
pub use error::CoreError;
pub use hooks::{CoreEvent, Hook, HookSlot, HookTable};
pub use proplist::{Proplist, UpdateMode};
pub use samples::{NewSample, SamplePlayback};
pub use sample_spec::{SampleFormat, SampleSpec};
pub use streams::NewStream;
pub use types::*;
pub use volume::{ChannelMap, ChannelVolumes, VolumeError};

/// Static facts about the running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server implementation name
    pub name: String,
    /// Server version
    pub version: String,
    /// User the server runs as
    pub username: String,
    /// Host the server runs on
    pub hostname: String,
    /// Whether the server is on this machine
    pub is_local: bool,
}

impl ServerInfo {
    /// Describe a local server, taking user and host from the environment.
    pub fn local(name: impl Into<String>, version: impl Into<String>) -> Self {
        let username = env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let hostname = env::var("HOSTNAME")
            .ok()
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|h| h.trim().to_string())
            })
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            name: name.into(),
            version: version.into(),
            username,
            hostname,
            is_local: true,
        }
    }
}

#[derive(Debug, Default)]
struct IndexCounters {
    card: u32,
    sink: u32,
    source: u32,
    playback: u32,
    record: u32,
    sample: u32,
    module: u32,
    client: u32,
}

fn take_next(counter: &mut u32) -> u32 {
    let index = *counter;
    *counter += 1;
    index
}

/// Server core: entity tables, name registry, defaults and hooks.
#[derive(Debug)]
pub struct ServerCore {
    info: ServerInfo,
    cards: IndexMap<u32, EntityRef<CardData>>,
    sinks: IndexMap<u32, EntityRef<DeviceData>>,
    sources: IndexMap<u32, EntityRef<DeviceData>>,
    playback_streams: IndexMap<u32, EntityRef<StreamData>>,
    record_streams: IndexMap<u32, EntityRef<StreamData>>,
    samples: IndexMap<u32, EntityRef<SampleData>>,
    modules: IndexMap<u32, EntityRef<ModuleData>>,
    clients: IndexMap<u32, EntityRef<ClientData>>,
    counters: IndexCounters,
    default_sink: Option<u32>,
    default_source: Option<u32>,
    default_sample_spec: SampleSpec,
    default_channel_map: ChannelMap,
    alternate_sample_rate: u32,
    extensions: Vec<String>,
    playbacks: Vec<SamplePlayback>,
    hooks: HookTable,
    exit_requested: bool,
}

impl ServerCore {
    /// Empty core.
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            cards: IndexMap::new(),
            sinks: IndexMap::new(),
            sources: IndexMap::new(),
            playback_streams: IndexMap::new(),
            record_streams: IndexMap::new(),
            samples: IndexMap::new(),
            modules: IndexMap::new(),
            clients: IndexMap::new(),
            counters: IndexCounters::default(),
            default_sink: None,
            default_source: None,
            default_sample_spec: SampleSpec::default(),
            default_channel_map: ChannelMap::stereo(),
            alternate_sample_rate: 48_000,
            extensions: Vec::new(),
            playbacks: Vec::new(),
            hooks: HookTable::default(),
            exit_requested: false,
        }
    }

    /// Server facts.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Hook table.
    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Hook table, for connecting and draining.
    pub fn hooks_mut(&mut self) -> &mut HookTable {
        &mut self.hooks
    }

    fn fire(&mut self, event: CoreEvent) {
        self.hooks.fire(event);
    }

    /// Current default sink.
    pub fn default_sink(&self) -> Option<u32> {
        self.default_sink
    }

    /// Current default source.
    pub fn default_source(&self) -> Option<u32> {
        self.default_source
    }

    /// Make `sink` the default sink.
    ///
    /// # Errors
    /// Returns error if `sink` names no live sink.
    pub fn set_default_sink(&mut self, sink: Option<u32>) -> Result<(), CoreError> {
        if let Some(index) = sink.filter(|index| !self.sinks.contains_key(index)) {
            return Err(CoreError::NoSuchEntity {
                kind: "sink",
                index,
            });
        }
        if self.default_sink != sink {
            debug!(?sink, "default sink changed");
            self.default_sink = sink;
            self.fire(CoreEvent::DefaultSinkChanged);
        }
        Ok(())
    }

    /// Make `source` the default source.
    ///
    /// # Errors
    /// Returns error if `source` names no live source.
    pub fn set_default_source(&mut self, source: Option<u32>) -> Result<(), CoreError> {
        if let Some(index) = source.filter(|index| !self.sources.contains_key(index)) {
            return Err(CoreError::NoSuchEntity {
                kind: "source",
                index,
            });
        }
        if self.default_source != source {
            debug!(?source, "default source changed");
            self.default_source = source;
            self.fire(CoreEvent::DefaultSourceChanged);
        }
        Ok(())
    }

    pub(crate) fn set_default_device(
        &mut self,
        kind: DeviceKind,
        index: Option<u32>,
    ) -> Result<(), CoreError> {
        match kind {
            DeviceKind::Sink => self.set_default_sink(index),
            DeviceKind::Source => self.set_default_source(index),
        }
    }

    /// Default format and rate for new streams.
    pub fn default_sample_spec(&self) -> SampleSpec {
        self.default_sample_spec
    }

    /// Default channel map for new streams.
    pub fn default_channel_map(&self) -> &ChannelMap {
        &self.default_channel_map
    }

    /// Change the default channel map.
    pub fn set_default_channel_map(&mut self, map: ChannelMap) {
        self.default_sample_spec.channels = u8::try_from(map.channels()).unwrap_or(u8::MAX);
        self.default_channel_map = map;
    }

    /// Change the default sample format.
    pub fn set_default_sample_format(&mut self, format: SampleFormat) {
        self.default_sample_spec.format = format;
    }

    /// Change the default sample rate. The caller validates the rate.
    pub fn set_default_sample_rate(&mut self, rate: u32) {
        self.default_sample_spec.rate = rate;
    }

    /// Rate used when the default rate does not fit a device.
    pub fn alternate_sample_rate(&self) -> u32 {
        self.alternate_sample_rate
    }

    /// Change the alternate sample rate. The caller validates the rate.
    pub fn set_alternate_sample_rate(&mut self, rate: u32) {
        self.alternate_sample_rate = rate;
    }

    /// Registered bus extensions.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Register a bus extension. Returns `false` if already registered.
    pub fn register_extension(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.extensions.contains(&name) {
            return false;
        }
        self.extensions.push(name.clone());
        self.fire(CoreEvent::ExtensionRegistered(name));
        true
    }

    /// Unregister a bus extension. Returns `false` if it was not registered.
    pub fn unregister_extension(&mut self, name: &str) -> bool {
        let Some(position) = self.extensions.iter().position(|e| e == name) else {
            return false;
        };
        let name = self.extensions.remove(position);
        self.fire(CoreEvent::ExtensionUnregistered(name));
        true
    }

    /// Ask the server to shut down.
    pub fn request_exit(&mut self) {
        debug!("exit requested");
        self.exit_requested = true;
    }

    /// Whether shutdown was requested.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Live card.
    pub fn card(&self, index: u32) -> Option<&EntityRef<CardData>> {
        self.cards.get(&index)
    }

    /// All cards in creation order.
    pub fn cards(&self) -> impl Iterator<Item = &EntityRef<CardData>> {
        self.cards.values()
    }

    /// Live sink or source.
    pub fn device(&self, id: DeviceId) -> Option<&EntityRef<DeviceData>> {
        self.device_table(id.kind).get(&id.index)
    }

    /// All devices of one kind in creation order.
    pub fn devices(&self, kind: DeviceKind) -> impl Iterator<Item = &EntityRef<DeviceData>> {
        self.device_table(kind).values()
    }

    fn device_table(&self, kind: DeviceKind) -> &IndexMap<u32, EntityRef<DeviceData>> {
        match kind {
            DeviceKind::Sink => &self.sinks,
            DeviceKind::Source => &self.sources,
        }
    }

    fn device_table_mut(&mut self, kind: DeviceKind) -> &mut IndexMap<u32, EntityRef<DeviceData>> {
        match kind {
            DeviceKind::Sink => &mut self.sinks,
            DeviceKind::Source => &mut self.sources,
        }
    }

    /// Live stream.
    pub fn stream(&self, id: StreamId) -> Option<&EntityRef<StreamData>> {
        self.stream_table(id.kind).get(&id.index)
    }

    /// All streams of one kind in creation order.
    pub fn streams(&self, kind: StreamKind) -> impl Iterator<Item = &EntityRef<StreamData>> {
        self.stream_table(kind).values()
    }

    fn stream_table(&self, kind: StreamKind) -> &IndexMap<u32, EntityRef<StreamData>> {
        match kind {
            StreamKind::Playback => &self.playback_streams,
            StreamKind::Record => &self.record_streams,
        }
    }

    fn stream_table_mut(&mut self, kind: StreamKind) -> &mut IndexMap<u32, EntityRef<StreamData>> {
        match kind {
            StreamKind::Playback => &mut self.playback_streams,
            StreamKind::Record => &mut self.record_streams,
        }
    }

    /// Live sample cache entry.
    pub fn sample(&self, index: u32) -> Option<&EntityRef<SampleData>> {
        self.samples.get(&index)
    }

    /// All sample cache entries in creation order.
    pub fn samples(&self) -> impl Iterator<Item = &EntityRef<SampleData>> {
        self.samples.values()
    }

    /// Loaded module.
    pub fn module(&self, index: u32) -> Option<&EntityRef<ModuleData>> {
        self.modules.get(&index)
    }

    /// All modules in load order.
    pub fn modules(&self) -> impl Iterator<Item = &EntityRef<ModuleData>> {
        self.modules.values()
    }

    /// Connected client.
    pub fn client(&self, index: u32) -> Option<&EntityRef<ClientData>> {
        self.clients.get(&index)
    }

    /// All clients in connection order.
    pub fn clients(&self) -> impl Iterator<Item = &EntityRef<ClientData>> {
        self.clients.values()
    }

    /// Card registered under `name`.
    pub fn card_by_name(&self, name: &str) -> Option<u32> {
        self.cards
            .iter()
            .find(|(_, card)| card.read().name == name)
            .map(|(&index, _)| index)
    }

    /// Device registered under `name`.
    pub fn device_by_name(&self, kind: DeviceKind, name: &str) -> Option<u32> {
        self.device_table(kind)
            .iter()
            .find(|(_, device)| device.read().name == name)
            .map(|(&index, _)| index)
    }

    /// Sample cache entry registered under `name`.
    pub fn sample_by_name(&self, name: &str) -> Option<u32> {
        self.samples
            .iter()
            .find(|(_, sample)| sample.read().name == name)
            .map(|(&index, _)| index)
    }

    /// `name`, or `name.N` for the first free `N` when it is taken.
    fn unique_name(&self, name: &str, taken: impl Fn(&str) -> bool) -> String {
        if !taken(name) {
            return name.to_string();
        }
        (2u32..)
            .map(|n| format!("{name}.{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

#[cfg(test)]
mod tests;
