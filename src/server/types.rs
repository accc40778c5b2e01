use bitflags::bitflags;

use super::{
    entity::EntityRef,
    proplist::Proplist,
    sample_spec::SampleSpec,
    volume::{ChannelMap, ChannelVolumes},
};

/// Sink or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    /// Plays audio out
    Sink,
    /// Captures audio in
    Source,
}

/// Playback (sink input) or record (source output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    /// Stream feeding a sink
    Playback,
    /// Stream reading from a source
    Record,
}

impl StreamKind {
    /// Kind of device this stream attaches to.
    pub fn device_kind(self) -> DeviceKind {
        match self {
            Self::Playback => DeviceKind::Sink,
            Self::Record => DeviceKind::Source,
        }
    }
}

/// Device run state, numbered as exposed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DeviceState {
    /// Audio is flowing
    Running = 0,
    /// Opened but idle
    Idle = 1,
    /// Closed
    Suspended = 2,
}

impl DeviceState {
    /// Bus representation.
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Port availability, numbered as exposed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PortAvailable {
    /// Availability cannot be detected
    Unknown = 0,
    /// Nothing plugged in
    No = 1,
    /// Plugged in
    Yes = 2,
}

impl PortAvailable {
    /// Bus representation.
    pub fn code(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// Device capability flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceFlags: u32 {
        /// Volume is applied in hardware
        const HW_VOLUME_CTRL = 0x0001;
        /// Latency can be queried
        const LATENCY = 0x0002;
        /// Backed by real hardware
        const HARDWARE = 0x0004;
        /// Reached over the network
        const NETWORK = 0x0008;
        /// Mute is applied in hardware
        const HW_MUTE_CTRL = 0x0010;
        /// Volume converts to decibels
        const DECIBEL_VOLUME = 0x0020;
        /// Volume follows the loudest stream
        const FLAT_VOLUME = 0x0040;
        /// Latency can be changed at runtime
        const DYNAMIC_LATENCY = 0x0080;
    }
}

/// Sound card with a set of profiles.
#[derive(Debug, Clone)]
pub struct CardData {
    /// Core index
    pub index: u32,
    /// Unique name
    pub name: String,
    /// Implementing driver
    pub driver: String,
    /// Module that created the card
    pub owner_module: Option<u32>,
    /// Profiles in declaration order
    pub profiles: Vec<EntityRef<ProfileData>>,
    /// Name of the active profile
    pub active_profile: Option<String>,
    /// Properties
    pub proplist: Proplist,
}

/// One card profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileData {
    /// Name, unique within the card
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Sinks the profile creates
    pub sinks: u32,
    /// Sources the profile creates
    pub sources: u32,
    /// Higher is preferred
    pub priority: u32,
    /// Whether the profile can be activated
    pub available: bool,
}

/// Sink or source.
#[derive(Debug, Clone)]
pub struct DeviceData {
    /// Core index, unique per kind
    pub index: u32,
    /// Sink or source
    pub kind: DeviceKind,
    /// Unique name
    pub name: String,
    /// Implementing driver
    pub driver: String,
    /// Module that created the device
    pub owner_module: Option<u32>,
    /// Card the device belongs to
    pub card: Option<u32>,
    /// Native sample spec
    pub sample_spec: SampleSpec,
    /// Channel layout
    pub channel_map: ChannelMap,
    /// Current volume
    pub volume: ChannelVolumes,
    /// Mute state
    pub mute: bool,
    /// Hardware reference volume
    pub base_volume: u32,
    /// Distinct hardware volume steps
    pub volume_steps: u32,
    /// Capabilities
    pub flags: DeviceFlags,
    /// Requested latency in microseconds
    pub configured_latency: u64,
    /// Measured latency in microseconds
    pub latency: u64,
    /// Run state
    pub state: DeviceState,
    /// Ports in declaration order
    pub ports: Vec<EntityRef<PortData>>,
    /// Name of the active port
    pub active_port: Option<String>,
    /// For a sink its monitor source; for a source the sink it monitors
    pub monitor: Option<u32>,
    /// Properties
    pub proplist: Proplist,
}

/// Device port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortData {
    /// Name, unique within the device
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Higher is preferred
    pub priority: u32,
    /// Jack detection state
    pub available: PortAvailable,
}

/// Playback or record stream.
#[derive(Debug, Clone)]
pub struct StreamData {
    /// Core index, unique per kind
    pub index: u32,
    /// Playback or record
    pub kind: StreamKind,
    /// Implementing driver
    pub driver: String,
    /// Module that created the stream
    pub owner_module: Option<u32>,
    /// Client that owns the stream
    pub client: Option<u32>,
    /// Index of the sink or source the stream is attached to
    pub device: u32,
    /// Stream sample spec
    pub sample_spec: SampleSpec,
    /// Channel layout
    pub channel_map: ChannelMap,
    /// Current volume
    pub volume: ChannelVolumes,
    /// Whether the stream has a volume at all
    pub has_volume: bool,
    /// Whether clients may change the volume
    pub volume_writable: bool,
    /// Mute state
    pub mute: bool,
    /// Buffer latency in microseconds
    pub buffer_latency: u64,
    /// Device latency in microseconds
    pub device_latency: u64,
    /// Resampler in use
    pub resample_method: String,
    /// Properties
    pub proplist: Proplist,
}

/// Decoded sample cache contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleContents {
    /// Format of `data`
    pub sample_spec: SampleSpec,
    /// Channel layout of `data`
    pub channel_map: ChannelMap,
    /// Raw audio
    pub data: Vec<u8>,
}

/// Sample cache entry.
#[derive(Debug, Clone)]
pub struct SampleData {
    /// Core index
    pub index: u32,
    /// Unique name
    pub name: String,
    /// Audio, absent while a lazy entry is not loaded
    pub contents: Option<SampleContents>,
    /// Volume applied on playback
    pub default_volume: Option<ChannelVolumes>,
    /// File a lazy entry loads from
    pub lazy_file: Option<String>,
    /// Properties
    pub proplist: Proplist,
}

/// Loaded module.
#[derive(Debug, Clone)]
pub struct ModuleData {
    /// Core index
    pub index: u32,
    /// Module name
    pub name: String,
    /// Argument string the module was loaded with
    pub arguments: String,
    /// Reference count, when the module tracks one
    pub usage_counter: Option<u32>,
    /// Properties
    pub proplist: Proplist,
}

/// Connected client.
#[derive(Debug, Clone)]
pub struct ClientData {
    /// Core index
    pub index: u32,
    /// Implementing driver
    pub driver: String,
    /// Module that accepted the client
    pub owner_module: Option<u32>,
    /// Properties
    pub proplist: Proplist,
}

/// Identifies a sink or source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    /// Sink or source
    pub kind: DeviceKind,
    /// Core index within the kind
    pub index: u32,
}

impl DeviceId {
    /// Sink `index`.
    pub fn sink(index: u32) -> Self {
        Self {
            kind: DeviceKind::Sink,
            index,
        }
    }

    /// Source `index`.
    pub fn source(index: u32) -> Self {
        Self {
            kind: DeviceKind::Source,
            index,
        }
    }
}

/// Identifies a playback or record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId {
    /// Playback or record
    pub kind: StreamKind,
    /// Core index within the kind
    pub index: u32,
}

impl StreamId {
    /// Playback stream `index`.
    pub fn playback(index: u32) -> Self {
        Self {
            kind: StreamKind::Playback,
            index,
        }
    }

    /// Record stream `index`.
    pub fn record(index: u32) -> Self {
        Self {
            kind: StreamKind::Record,
            index,
        }
    }
}
