use std::collections::{HashMap, VecDeque};

use super::{
    entity::EntityRef,
    proplist::Proplist,
    types::{
        CardData, ClientData, DeviceData, DeviceId, ModuleData, PortData, ProfileData, SampleData,
        StreamData, StreamId,
    },
};

/// Core notification points a subscriber can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hook {
    /// Card became live
    CardPut,
    /// Card is going away
    CardUnlink,
    /// Card switched profile
    CardProfileChanged,
    /// Card gained a profile
    CardProfileAdded,
    /// Card lost a profile
    CardProfileRemoved,
    /// Profile availability flipped
    CardProfileAvailableChanged,
    /// Card properties changed
    CardProplistChanged,
    /// Sink or source became live
    DevicePut,
    /// Sink or source is going away
    DeviceUnlink,
    /// Device run state changed
    DeviceStateChanged,
    /// Device volume changed
    DeviceVolumeChanged,
    /// Device mute changed
    DeviceMuteChanged,
    /// Device switched port
    DevicePortChanged,
    /// Device properties changed
    DeviceProplistChanged,
    /// Port availability changed
    PortAvailableChanged,
    /// Stream became live
    StreamPut,
    /// Stream is going away
    StreamUnlink,
    /// Stream moved to another device
    StreamMoved,
    /// Stream volume changed
    StreamVolumeChanged,
    /// Stream mute changed
    StreamMuteChanged,
    /// Stream sample rate changed
    StreamRateChanged,
    /// Stream properties changed
    StreamProplistChanged,
    /// Stream sent an event
    StreamEvent,
    /// Sample cache entry added
    SamplePut,
    /// Sample cache entry removed
    SampleUnlink,
    /// Sample cache entry changed
    SampleChanged,
    /// Module loaded
    ModulePut,
    /// Module unloaded
    ModuleUnlink,
    /// Module properties changed
    ModuleProplistChanged,
    /// Client connected
    ClientPut,
    /// Client disconnected
    ClientUnlink,
    /// Client properties changed
    ClientProplistChanged,
    /// Client sent an event
    ClientEvent,
    /// Default sink changed
    DefaultSinkChanged,
    /// Default source changed
    DefaultSourceChanged,
    /// Bus extension registered
    ExtensionRegistered,
    /// Bus extension unregistered
    ExtensionUnregistered,
}

/// One notification fired by the core.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// Card became live
    CardPut(EntityRef<CardData>),
    /// Card removed
    CardUnlink(u32),
    /// Card switched profile
    CardProfileChanged(u32),
    /// Card gained a profile
    CardProfileAdded {
        /// Card index
        card: u32,
        /// New profile
        profile: EntityRef<ProfileData>,
    },
    /// Card lost a profile
    CardProfileRemoved {
        /// Card index
        card: u32,
        /// Removed profile
        profile: EntityRef<ProfileData>,
    },
    /// Profile availability flipped
    CardProfileAvailableChanged(EntityRef<ProfileData>),
    /// Card properties changed
    CardProplistChanged(u32),
    /// Device became live
    DevicePut(EntityRef<DeviceData>),
    /// Device removed
    DeviceUnlink(DeviceId),
    /// Device run state changed
    DeviceStateChanged(DeviceId),
    /// Device volume changed
    DeviceVolumeChanged(DeviceId),
    /// Device mute changed
    DeviceMuteChanged(DeviceId),
    /// Device switched port
    DevicePortChanged(DeviceId),
    /// Device properties changed
    DeviceProplistChanged(DeviceId),
    /// Port availability changed
    PortAvailableChanged(EntityRef<PortData>),
    /// Stream became live
    StreamPut(EntityRef<StreamData>),
    /// Stream removed
    StreamUnlink(StreamId),
    /// Stream moved to another device
    StreamMoved(StreamId),
    /// Stream volume changed
    StreamVolumeChanged(StreamId),
    /// Stream mute changed
    StreamMuteChanged(StreamId),
    /// Stream sample rate changed
    StreamRateChanged(StreamId),
    /// Stream properties changed
    StreamProplistChanged(StreamId),
    /// Stream sent an event
    StreamEvent {
        /// Sending stream
        stream: StreamId,
        /// Event name
        name: String,
        /// Event payload
        data: Proplist,
    },
    /// Sample cache entry added
    SamplePut(EntityRef<SampleData>),
    /// Sample cache entry removed
    SampleUnlink(u32),
    /// Sample cache entry changed
    SampleChanged(u32),
    /// Module loaded
    ModulePut(EntityRef<ModuleData>),
    /// Module unloaded
    ModuleUnlink(u32),
    /// Module properties changed
    ModuleProplistChanged(u32),
    /// Client connected
    ClientPut(EntityRef<ClientData>),
    /// Client disconnected
    ClientUnlink(u32),
    /// Client properties changed
    ClientProplistChanged(u32),
    /// Client sent an event
    ClientEvent {
        /// Sending client
        client: u32,
        /// Event name
        name: String,
        /// Event payload
        data: Proplist,
    },
    /// Default sink changed
    DefaultSinkChanged,
    /// Default source changed
    DefaultSourceChanged,
    /// Bus extension registered
    ExtensionRegistered(String),
    /// Bus extension unregistered
    ExtensionUnregistered(String),
}

impl CoreEvent {
    /// Hook this event fires on.
    pub fn hook(&self) -> Hook {
        match self {
            Self::CardPut(_) => Hook::CardPut,
            Self::CardUnlink(_) => Hook::CardUnlink,
            Self::CardProfileChanged(_) => Hook::CardProfileChanged,
            Self::CardProfileAdded { .. } => Hook::CardProfileAdded,
            Self::CardProfileRemoved { .. } => Hook::CardProfileRemoved,
            Self::CardProfileAvailableChanged(_) => Hook::CardProfileAvailableChanged,
            Self::CardProplistChanged(_) => Hook::CardProplistChanged,
            Self::DevicePut(_) => Hook::DevicePut,
            Self::DeviceUnlink(_) => Hook::DeviceUnlink,
            Self::DeviceStateChanged(_) => Hook::DeviceStateChanged,
            Self::DeviceVolumeChanged(_) => Hook::DeviceVolumeChanged,
            Self::DeviceMuteChanged(_) => Hook::DeviceMuteChanged,
            Self::DevicePortChanged(_) => Hook::DevicePortChanged,
            Self::DeviceProplistChanged(_) => Hook::DeviceProplistChanged,
            Self::PortAvailableChanged(_) => Hook::PortAvailableChanged,
            Self::StreamPut(_) => Hook::StreamPut,
            Self::StreamUnlink(_) => Hook::StreamUnlink,
            Self::StreamMoved(_) => Hook::StreamMoved,
            Self::StreamVolumeChanged(_) => Hook::StreamVolumeChanged,
            Self::StreamMuteChanged(_) => Hook::StreamMuteChanged,
            Self::StreamRateChanged(_) => Hook::StreamRateChanged,
            Self::StreamProplistChanged(_) => Hook::StreamProplistChanged,
            Self::StreamEvent { .. } => Hook::StreamEvent,
            Self::SamplePut(_) => Hook::SamplePut,
            Self::SampleUnlink(_) => Hook::SampleUnlink,
            Self::SampleChanged(_) => Hook::SampleChanged,
            Self::ModulePut(_) => Hook::ModulePut,
            Self::ModuleUnlink(_) => Hook::ModuleUnlink,
            Self::ModuleProplistChanged(_) => Hook::ModuleProplistChanged,
            Self::ClientPut(_) => Hook::ClientPut,
            Self::ClientUnlink(_) => Hook::ClientUnlink,
            Self::ClientProplistChanged(_) => Hook::ClientProplistChanged,
            Self::ClientEvent { .. } => Hook::ClientEvent,
            Self::DefaultSinkChanged => Hook::DefaultSinkChanged,
            Self::DefaultSourceChanged => Hook::DefaultSourceChanged,
            Self::ExtensionRegistered(_) => Hook::ExtensionRegistered,
            Self::ExtensionUnregistered(_) => Hook::ExtensionUnregistered,
        }
    }
}

/// Handle to one hook subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookSlot(u64);

/// Hook subscriptions and the queue of events fired while someone listened.
///
/// Events are only queued for hooks with at least one connected slot, so a
/// subscriber that has released its slots receives nothing further.
#[derive(Debug, Default)]
pub struct HookTable {
    next_slot: u64,
    slots: HashMap<HookSlot, Hook>,
    listeners: HashMap<Hook, usize>,
    queue: VecDeque<CoreEvent>,
}

impl HookTable {
    /// Subscribe to `hook`.
    pub fn connect(&mut self, hook: Hook) -> HookSlot {
        let slot = HookSlot(self.next_slot);
        self.next_slot += 1;
        self.slots.insert(slot, hook);
        *self.listeners.entry(hook).or_insert(0) += 1;
        slot
    }

    /// Drop a subscription. Returns `false` if the slot was not connected.
    pub fn disconnect(&mut self, slot: HookSlot) -> bool {
        let Some(hook) = self.slots.remove(&slot) else {
            return false;
        };
        if let Some(count) = self.listeners.get_mut(&hook) {
            *count -= 1;
            if *count == 0 {
                self.listeners.remove(&hook);
            }
        }
        true
    }

    /// Whether any slot listens on `hook`.
    pub fn is_connected(&self, hook: Hook) -> bool {
        self.listeners.contains_key(&hook)
    }

    /// Total connected slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn fire(&mut self, event: CoreEvent) {
        if self.is_connected(event.hook()) {
            self.queue.push_back(event);
        }
    }

    /// Next queued event, oldest first.
    pub fn next_event(&mut self) -> Option<CoreEvent> {
        self.queue.pop_front()
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
