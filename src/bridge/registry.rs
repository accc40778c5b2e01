//! Live proxies, indexed by core identity and by object path.

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use super::{
    interface::CORE_INTERFACE,
    invariant::{self, InvariantViolation},
    notifier::Notifier,
    path::{
        CARD_TAG, CLIENT_TAG, CORE_PATH, MODULE_TAG, SAMPLE_TAG, device_tag, object_path,
        stream_tag,
    },
    proxy::{
        BusObject, CardProxy, ClientProxy, CoreObject, DeviceProxy, HookSlots, ModuleProxy,
        SampleProxy, StreamProxy, Subscriber,
    },
};
use crate::{
    bus::{BusError, Signal, Variant},
    server::{
        CardData, ClientData, CoreEvent, DeviceData, DeviceKind, EntityRef, Hook, HookTable,
        ModuleData, SampleData, ServerCore, StreamData, StreamKind,
    },
};

/// Kind of a top-level object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Card
    Card,
    /// Sink or source
    Device(DeviceKind),
    /// Playback or record stream
    Stream(StreamKind),
    /// Sample cache entry
    Sample,
    /// Module
    Module,
    /// Client
    Client,
}

impl EntityKind {
    /// Path tag of the kind.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Card => CARD_TAG,
            Self::Device(kind) => device_tag(kind),
            Self::Stream(kind) => stream_tag(kind),
            Self::Sample => SAMPLE_TAG,
            Self::Module => MODULE_TAG,
            Self::Client => CLIENT_TAG,
        }
    }

    /// Path of the object with core index `index`.
    pub fn path(self, index: u32) -> String {
        object_path(CORE_PATH, self.tag(), index)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(StreamKind::Playback) => write!(f, "playback stream"),
            Self::Stream(StreamKind::Record) => write!(f, "record stream"),
            other => write!(f, "{}", other.tag()),
        }
    }
}

/// Lookup of an object that has no proxy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{key}: No such {kind}.")]
pub struct NotFound {
    /// Kind that was looked up
    pub kind: EntityKind,
    /// Index or path that was looked up
    pub key: String,
}

impl From<NotFound> for BusError {
    fn from(error: NotFound) -> Self {
        BusError::not_found(error.to_string())
    }
}

/// Entity handed over by a creation event.
#[derive(Debug, Clone)]
pub enum NewEntity {
    /// Card
    Card(EntityRef<CardData>),
    /// Sink or source
    Device(EntityRef<DeviceData>),
    /// Playback or record stream
    Stream(EntityRef<StreamData>),
    /// Sample cache entry
    Sample(EntityRef<SampleData>),
    /// Module
    Module(EntityRef<ModuleData>),
    /// Client
    Client(EntityRef<ClientData>),
}

impl NewEntity {
    fn kind_and_index(&self) -> (EntityKind, u32) {
        match self {
            Self::Card(card) => (EntityKind::Card, card.read().index),
            Self::Device(device) => {
                let data = device.read();
                (EntityKind::Device(data.kind), data.index)
            }
            Self::Stream(stream) => {
                let data = stream.read();
                (EntityKind::Stream(data.kind), data.index)
            }
            Self::Sample(sample) => (EntityKind::Sample, sample.read().index),
            Self::Module(module) => (EntityKind::Module, module.read().index),
            Self::Client(client) => (EntityKind::Client, client.read().index),
        }
    }
}

/// Borrowed proxy of any top-level kind.
#[derive(Debug, Clone, Copy)]
pub enum ProxyRef<'a> {
    /// Card
    Card(&'a CardProxy),
    /// Sink or source
    Device(&'a DeviceProxy),
    /// Playback or record stream
    Stream(&'a StreamProxy),
    /// Sample cache entry
    Sample(&'a SampleProxy),
    /// Module
    Module(&'a ModuleProxy),
    /// Client
    Client(&'a ClientProxy),
}

impl<'a> ProxyRef<'a> {
    /// The proxy as a bus object.
    pub fn as_object(self) -> &'a dyn BusObject {
        match self {
            Self::Card(p) => p,
            Self::Device(p) => p,
            Self::Stream(p) => p,
            Self::Sample(p) => p,
            Self::Module(p) => p,
            Self::Client(p) => p,
        }
    }

    /// Object path of the proxy.
    pub fn path(self) -> &'a str {
        self.as_object().path()
    }

    /// Core index of the proxied entity.
    pub fn index(self) -> u32 {
        match self {
            Self::Card(p) => p.index(),
            Self::Device(p) => p.id().index,
            Self::Stream(p) => p.id().index,
            Self::Sample(p) => p.index(),
            Self::Module(p) => p.index(),
            Self::Client(p) => p.index(),
        }
    }
}

const LIFECYCLE_HOOKS: &[Hook] = &[
    Hook::CardPut,
    Hook::CardUnlink,
    Hook::DevicePut,
    Hook::DeviceUnlink,
    Hook::StreamPut,
    Hook::StreamUnlink,
    Hook::SamplePut,
    Hook::SampleUnlink,
    Hook::ModulePut,
    Hook::ModuleUnlink,
    Hook::ClientPut,
    Hook::ClientUnlink,
];

/// Every live proxy plus the root object.
///
/// A proxy exists for exactly the entities the core holds. Creation and
/// removal events keep the two in step and announce the change on the root
/// object; every other event is routed to the proxies subscribed to its hook.
#[derive(Debug)]
pub struct Registry {
    notifier: Notifier,
    lifecycle: HookSlots,
    core_object: CoreObject,
    cards: IndexMap<u32, CardProxy>,
    sinks: IndexMap<u32, DeviceProxy>,
    sources: IndexMap<u32, DeviceProxy>,
    playback_streams: IndexMap<u32, StreamProxy>,
    record_streams: IndexMap<u32, StreamProxy>,
    samples: IndexMap<u32, SampleProxy>,
    modules: IndexMap<u32, ModuleProxy>,
    clients: IndexMap<u32, ClientProxy>,
    paths: HashMap<String, (EntityKind, u32)>,
}

fn register<P: Subscriber>(
    proxies: &mut IndexMap<u32, P>,
    paths: &mut HashMap<String, (EntityKind, u32)>,
    kind: EntityKind,
    index: u32,
    build: impl FnOnce() -> P,
) -> Result<String, InvariantViolation> {
    if proxies.contains_key(&index) {
        return Err(InvariantViolation::DuplicateProxy { kind, index });
    }
    let proxy = build();
    let path = proxy.path().to_string();
    paths.insert(path.clone(), (kind, index));
    proxies.insert(index, proxy);
    Ok(path)
}

fn unregister<P: Subscriber>(
    proxies: &mut IndexMap<u32, P>,
    paths: &mut HashMap<String, (EntityKind, u32)>,
    hooks: &mut HookTable,
    kind: EntityKind,
    index: u32,
) -> Result<String, InvariantViolation> {
    let mut proxy = proxies
        .shift_remove(&index)
        .ok_or(InvariantViolation::MissingProxy { kind, index })?;
    let path = proxy.path().to_string();
    paths.remove(&path);
    let released = proxy.release(hooks);
    drop(proxy);
    released.map(|()| path)
}

fn fan_out<P: Subscriber>(
    proxies: &mut IndexMap<u32, P>,
    event: &CoreEvent,
    notifier: &Notifier,
) -> bool {
    let hook = event.hook();
    let mut handled = false;
    for proxy in proxies.values_mut().filter(|p| p.slots().covers(hook)) {
        handled |= proxy.handle(event, notifier);
    }
    handled
}

impl Registry {
    /// Build proxies for everything the core already holds and subscribe to
    /// creation and removal. No signals are emitted for the initial set.
    pub fn new(core: &mut ServerCore, notifier: Notifier) -> Self {
        let mut registry = Self {
            notifier,
            lifecycle: HookSlots::connect(core.hooks_mut(), LIFECYCLE_HOOKS),
            core_object: CoreObject::new(core),
            cards: IndexMap::new(),
            sinks: IndexMap::new(),
            sources: IndexMap::new(),
            playback_streams: IndexMap::new(),
            record_streams: IndexMap::new(),
            samples: IndexMap::new(),
            modules: IndexMap::new(),
            clients: IndexMap::new(),
            paths: HashMap::new(),
        };

        let mut existing: Vec<NewEntity> = Vec::new();
        existing.extend(core.cards().cloned().map(NewEntity::Card));
        existing.extend(core.devices(DeviceKind::Sink).cloned().map(NewEntity::Device));
        existing.extend(core.devices(DeviceKind::Source).cloned().map(NewEntity::Device));
        existing.extend(core.streams(StreamKind::Playback).cloned().map(NewEntity::Stream));
        existing.extend(core.streams(StreamKind::Record).cloned().map(NewEntity::Stream));
        existing.extend(core.samples().cloned().map(NewEntity::Sample));
        existing.extend(core.modules().cloned().map(NewEntity::Module));
        existing.extend(core.clients().cloned().map(NewEntity::Client));

        for entity in existing {
            if let Err(violation) = registry.on_entity_created(core, entity) {
                invariant::report(&violation);
            }
        }
        debug!(objects = registry.paths.len(), "registry populated");
        registry
    }

    /// Create the proxy for a new entity. Returns its path.
    ///
    /// # Errors
    /// Returns error if the entity already has a proxy.
    pub fn on_entity_created(
        &mut self,
        core: &mut ServerCore,
        entity: NewEntity,
    ) -> Result<String, InvariantViolation> {
        let (kind, index) = entity.kind_and_index();
        let hooks = core.hooks_mut();
        let paths = &mut self.paths;
        let path = match entity {
            NewEntity::Card(card) => register(&mut self.cards, paths, kind, index, || {
                CardProxy::new(card, hooks)
            }),
            NewEntity::Device(device) => {
                let proxies = match kind {
                    EntityKind::Device(DeviceKind::Source) => &mut self.sources,
                    _ => &mut self.sinks,
                };
                register(proxies, paths, kind, index, || DeviceProxy::new(device, hooks))
            }
            NewEntity::Stream(stream) => {
                let proxies = match kind {
                    EntityKind::Stream(StreamKind::Record) => &mut self.record_streams,
                    _ => &mut self.playback_streams,
                };
                register(proxies, paths, kind, index, || StreamProxy::new(stream, hooks))
            }
            NewEntity::Sample(sample) => register(&mut self.samples, paths, kind, index, || {
                SampleProxy::new(sample, hooks)
            }),
            NewEntity::Module(module) => register(&mut self.modules, paths, kind, index, || {
                ModuleProxy::new(module, hooks)
            }),
            NewEntity::Client(client) => register(&mut self.clients, paths, kind, index, || {
                ClientProxy::new(client, hooks)
            }),
        }?;
        trace!(%path, "proxy created");
        Ok(path)
    }

    /// Tear down the proxy of a removed entity. Returns its former path.
    ///
    /// The path is unregistered first, then the hook subscriptions are
    /// released, then the entity handle is dropped.
    ///
    /// # Errors
    /// Returns error if the entity has no proxy or a subscription was already
    /// gone.
    pub fn on_entity_removed(
        &mut self,
        core: &mut ServerCore,
        kind: EntityKind,
        index: u32,
    ) -> Result<String, InvariantViolation> {
        let hooks = core.hooks_mut();
        let paths = &mut self.paths;
        let path = match kind {
            EntityKind::Card => unregister(&mut self.cards, paths, hooks, kind, index),
            EntityKind::Device(DeviceKind::Sink) => {
                unregister(&mut self.sinks, paths, hooks, kind, index)
            }
            EntityKind::Device(DeviceKind::Source) => {
                unregister(&mut self.sources, paths, hooks, kind, index)
            }
            EntityKind::Stream(StreamKind::Playback) => {
                unregister(&mut self.playback_streams, paths, hooks, kind, index)
            }
            EntityKind::Stream(StreamKind::Record) => {
                unregister(&mut self.record_streams, paths, hooks, kind, index)
            }
            EntityKind::Sample => unregister(&mut self.samples, paths, hooks, kind, index),
            EntityKind::Module => unregister(&mut self.modules, paths, hooks, kind, index),
            EntityKind::Client => unregister(&mut self.clients, paths, hooks, kind, index),
        }?;
        trace!(%path, "proxy removed");
        Ok(path)
    }

    /// Route one core event.
    ///
    /// # Errors
    /// Returns error if the event contradicts the set of live proxies.
    #[instrument(level = "trace", skip_all, fields(hook = ?event.hook()))]
    pub fn handle_event(
        &mut self,
        core: &mut ServerCore,
        event: CoreEvent,
    ) -> Result<(), InvariantViolation> {
        let created = match &event {
            CoreEvent::CardPut(card) => Some(NewEntity::Card(card.clone())),
            CoreEvent::DevicePut(device) => Some(NewEntity::Device(device.clone())),
            CoreEvent::StreamPut(stream) => Some(NewEntity::Stream(stream.clone())),
            CoreEvent::SamplePut(sample) => Some(NewEntity::Sample(sample.clone())),
            CoreEvent::ModulePut(module) => Some(NewEntity::Module(module.clone())),
            CoreEvent::ClientPut(client) => Some(NewEntity::Client(client.clone())),
            _ => None,
        };
        if let Some(entity) = created {
            let (kind, _) = entity.kind_and_index();
            let path = self.on_entity_created(core, entity)?;
            self.announce(added_signal(kind), path);
            return Ok(());
        }

        let removed = match &event {
            CoreEvent::CardUnlink(index) => Some((EntityKind::Card, *index)),
            CoreEvent::DeviceUnlink(id) => Some((EntityKind::Device(id.kind), id.index)),
            CoreEvent::StreamUnlink(id) => Some((EntityKind::Stream(id.kind), id.index)),
            CoreEvent::SampleUnlink(index) => Some((EntityKind::Sample, *index)),
            CoreEvent::ModuleUnlink(index) => Some((EntityKind::Module, *index)),
            CoreEvent::ClientUnlink(index) => Some((EntityKind::Client, *index)),
            _ => None,
        };
        if let Some((kind, index)) = removed {
            let path = self.on_entity_removed(core, kind, index)?;
            self.announce(removed_signal(kind), path);
            return Ok(());
        }

        let notifier = &self.notifier;
        let handled = match &event {
            CoreEvent::DefaultSinkChanged
            | CoreEvent::DefaultSourceChanged
            | CoreEvent::ExtensionRegistered(_)
            | CoreEvent::ExtensionUnregistered(_) => {
                self.core_object.slots().covers(event.hook())
                    && self.core_object.handle(&event, core, notifier)
            }
            CoreEvent::CardProfileChanged(_)
            | CoreEvent::CardProfileAdded { .. }
            | CoreEvent::CardProfileRemoved { .. }
            | CoreEvent::CardProfileAvailableChanged(_)
            | CoreEvent::CardProplistChanged(_) => fan_out(&mut self.cards, &event, notifier),
            CoreEvent::DeviceStateChanged(id)
            | CoreEvent::DeviceVolumeChanged(id)
            | CoreEvent::DeviceMuteChanged(id)
            | CoreEvent::DevicePortChanged(id)
            | CoreEvent::DeviceProplistChanged(id) => match id.kind {
                DeviceKind::Sink => fan_out(&mut self.sinks, &event, notifier),
                DeviceKind::Source => fan_out(&mut self.sources, &event, notifier),
            },
            CoreEvent::PortAvailableChanged(_) => {
                let sinks = fan_out(&mut self.sinks, &event, notifier);
                let sources = fan_out(&mut self.sources, &event, notifier);
                sinks || sources
            }
            CoreEvent::StreamMoved(id)
            | CoreEvent::StreamVolumeChanged(id)
            | CoreEvent::StreamMuteChanged(id)
            | CoreEvent::StreamRateChanged(id)
            | CoreEvent::StreamProplistChanged(id)
            | CoreEvent::StreamEvent { stream: id, .. } => match id.kind {
                StreamKind::Playback => fan_out(&mut self.playback_streams, &event, notifier),
                StreamKind::Record => fan_out(&mut self.record_streams, &event, notifier),
            },
            CoreEvent::SampleChanged(_) => fan_out(&mut self.samples, &event, notifier),
            CoreEvent::ModuleProplistChanged(_) => fan_out(&mut self.modules, &event, notifier),
            CoreEvent::ClientProplistChanged(_) | CoreEvent::ClientEvent { .. } => {
                fan_out(&mut self.clients, &event, notifier)
            }
            _ => false,
        };

        if handled {
            Ok(())
        } else {
            Err(InvariantViolation::OrphanEvent { hook: event.hook() })
        }
    }

    fn announce(&self, member: &'static str, path: String) {
        self.notifier
            .emit(Signal::new(CORE_PATH, CORE_INTERFACE, member).with_arg(Variant::path(path)));
    }

    /// Proxy of the entity with core index `index`.
    ///
    /// # Errors
    /// Returns error if no such proxy exists.
    pub fn lookup_by_index(&self, kind: EntityKind, index: u32) -> Result<ProxyRef<'_>, NotFound> {
        let found = match kind {
            EntityKind::Card => self.cards.get(&index).map(ProxyRef::Card),
            EntityKind::Device(DeviceKind::Sink) => self.sinks.get(&index).map(ProxyRef::Device),
            EntityKind::Device(DeviceKind::Source) => {
                self.sources.get(&index).map(ProxyRef::Device)
            }
            EntityKind::Stream(StreamKind::Playback) => {
                self.playback_streams.get(&index).map(ProxyRef::Stream)
            }
            EntityKind::Stream(StreamKind::Record) => {
                self.record_streams.get(&index).map(ProxyRef::Stream)
            }
            EntityKind::Sample => self.samples.get(&index).map(ProxyRef::Sample),
            EntityKind::Module => self.modules.get(&index).map(ProxyRef::Module),
            EntityKind::Client => self.clients.get(&index).map(ProxyRef::Client),
        };
        found.ok_or_else(|| NotFound {
            kind,
            key: index.to_string(),
        })
    }

    /// Proxy of the `kind` object at `path`.
    ///
    /// # Errors
    /// Returns error if no object of that kind lives at `path`.
    pub fn lookup_by_path(&self, kind: EntityKind, path: &str) -> Result<ProxyRef<'_>, NotFound> {
        let not_found = || NotFound {
            kind,
            key: path.to_string(),
        };
        let &(_, index) = self
            .paths
            .get(path)
            .filter(|(k, _)| *k == kind)
            .ok_or_else(not_found)?;
        self.lookup_by_index(kind, index).map_err(|_| not_found())
    }

    /// Path of the object with core index `index`, if it has a proxy.
    pub fn path_of(&self, kind: EntityKind, index: u32) -> Option<&str> {
        self.lookup_by_index(kind, index).ok().map(ProxyRef::path)
    }

    /// Paths of every `kind` object in creation order.
    pub fn list_paths(&self, kind: EntityKind) -> Vec<String> {
        fn collect<P: BusObject>(proxies: &IndexMap<u32, P>) -> Vec<String> {
            proxies.values().map(|p| p.path().to_string()).collect()
        }
        match kind {
            EntityKind::Card => collect(&self.cards),
            EntityKind::Device(DeviceKind::Sink) => collect(&self.sinks),
            EntityKind::Device(DeviceKind::Source) => collect(&self.sources),
            EntityKind::Stream(StreamKind::Playback) => collect(&self.playback_streams),
            EntityKind::Stream(StreamKind::Record) => collect(&self.record_streams),
            EntityKind::Sample => collect(&self.samples),
            EntityKind::Module => collect(&self.modules),
            EntityKind::Client => collect(&self.clients),
        }
    }

    /// Paths of the `kind` devices belonging to `card`.
    pub fn card_devices(&self, card: u32, kind: DeviceKind) -> Vec<String> {
        let proxies = match kind {
            DeviceKind::Sink => &self.sinks,
            DeviceKind::Source => &self.sources,
        };
        proxies
            .values()
            .filter(|p| p.card() == Some(card))
            .map(|p| p.path().to_string())
            .collect()
    }

    /// Paths of the `kind` streams owned by `client`.
    pub fn client_streams(&self, client: u32, kind: StreamKind) -> Vec<String> {
        let proxies = match kind {
            StreamKind::Playback => &self.playback_streams,
            StreamKind::Record => &self.record_streams,
        };
        proxies
            .values()
            .filter(|p| p.client() == Some(client))
            .map(|p| p.path().to_string())
            .collect()
    }

    /// Object at `path`: the root, a top-level proxy or one of their children.
    pub fn resolve(&self, path: &str) -> Option<&dyn BusObject> {
        if path == CORE_PATH {
            return Some(&self.core_object);
        }
        if let Some(&(kind, index)) = self.paths.get(path) {
            return self.lookup_by_index(kind, index).ok().map(ProxyRef::as_object);
        }

        let (parent, _) = path.rsplit_once('/')?;
        match self.paths.get(parent)? {
            (EntityKind::Card, index) => self
                .cards
                .get(index)?
                .profile_at(path)
                .map(|p| p as &dyn BusObject),
            (EntityKind::Device(DeviceKind::Sink), index) => self
                .sinks
                .get(index)?
                .port_at(path)
                .map(|p| p as &dyn BusObject),
            (EntityKind::Device(DeviceKind::Source), index) => self
                .sources
                .get(index)?
                .port_at(path)
                .map(|p| p as &dyn BusObject),
            _ => None,
        }
    }

    /// Paths directly below `path`, for introspection.
    pub fn children_of(&self, path: &str) -> Vec<String> {
        if path == CORE_PATH {
            let mut children: Vec<String> = self.paths.keys().cloned().collect();
            children.sort();
            return children;
        }
        self.resolve(path).map(|o| o.children()).unwrap_or_default()
    }

    /// Number of top-level proxies.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no top-level proxy exists.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Drop every proxy and release every subscription. Emits nothing.
    pub fn teardown(&mut self, core: &mut ServerCore) {
        let mut live: Vec<(EntityKind, u32)> = self.paths.values().copied().collect();
        live.sort_by_key(|&(kind, index)| (teardown_rank(kind), index));
        for (kind, index) in live.into_iter().rev() {
            if let Err(violation) = self.on_entity_removed(core, kind, index) {
                invariant::report(&violation);
            }
        }
        for released in [
            self.core_object.release(core.hooks_mut()),
            self.lifecycle.release(core.hooks_mut()),
        ] {
            if let Err(violation) = released {
                invariant::report(&violation);
            }
        }
        debug!("registry torn down");
    }
}

fn teardown_rank(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Module => 0,
        EntityKind::Client => 1,
        EntityKind::Card => 2,
        EntityKind::Device(_) => 3,
        EntityKind::Stream(_) => 4,
        EntityKind::Sample => 5,
    }
}

fn added_signal(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Card => "NewCard",
        EntityKind::Device(DeviceKind::Sink) => "NewSink",
        EntityKind::Device(DeviceKind::Source) => "NewSource",
        EntityKind::Stream(StreamKind::Playback) => "NewPlaybackStream",
        EntityKind::Stream(StreamKind::Record) => "NewRecordStream",
        EntityKind::Sample => "NewSample",
        EntityKind::Module => "NewModule",
        EntityKind::Client => "NewClient",
    }
}

fn removed_signal(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Card => "CardRemoved",
        EntityKind::Device(DeviceKind::Sink) => "SinkRemoved",
        EntityKind::Device(DeviceKind::Source) => "SourceRemoved",
        EntityKind::Stream(StreamKind::Playback) => "PlaybackStreamRemoved",
        EntityKind::Stream(StreamKind::Record) => "RecordStreamRemoved",
        EntityKind::Sample => "SampleRemoved",
        EntityKind::Module => "ModuleRemoved",
        EntityKind::Client => "ClientRemoved",
    }
}
