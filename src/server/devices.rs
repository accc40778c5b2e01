use tracing::debug;

use super::{
    ChannelMap, ChannelVolumes, CoreError, CoreEvent, DeviceFlags, DeviceId, DeviceKind,
    DeviceState, EntityRef, Proplist, SampleSpec, ServerCore, StreamId, StreamKind, UpdateMode,
    take_next,
    types::{DeviceData, PortAvailable, PortData},
    volume::VOLUME_NORM,
};

/// Description of a sink or source to create.
#[derive(Debug, Clone, Default)]
pub struct NewDevice {
    /// Requested name, made unique on collision
    pub name: String,
    /// Implementing driver
    pub driver: String,
    /// Module creating the device
    pub owner_module: Option<u32>,
    /// Card the device belongs to
    pub card: Option<u32>,
    /// Native sample spec
    pub sample_spec: SampleSpec,
    /// Channel layout
    pub channel_map: ChannelMap,
    /// Initial volume; 100% on every channel when absent
    pub volume: Option<ChannelVolumes>,
    /// Initial mute state
    pub mute: bool,
    /// Capabilities
    pub flags: DeviceFlags,
    /// Distinct hardware volume steps
    pub volume_steps: u32,
    /// Requested latency in microseconds
    pub configured_latency: u64,
    /// Ports in declaration order
    pub ports: Vec<PortData>,
    /// Initially active port
    pub active_port: Option<String>,
    /// Properties
    pub proplist: Proplist,
}

impl ServerCore {
    fn device_ref(&self, id: DeviceId) -> Result<&EntityRef<DeviceData>, CoreError> {
        self.device(id).ok_or(CoreError::NoSuchEntity {
            kind: kind_name(id.kind),
            index: id.index,
        })
    }

    /// Create a device and fire [`CoreEvent::DevicePut`].
    ///
    /// A sink gets a monitor source, which is put first. The first device of
    /// a kind becomes the default.
    ///
    /// # Errors
    /// Returns error if the active port is not one of the ports, or the
    /// initial volume does not match the channel map.
    pub fn add_device(&mut self, kind: DeviceKind, new: NewDevice) -> Result<u32, CoreError> {
        if let Some(active) = &new.active_port {
            if !new.ports.iter().any(|p| &p.name == active) {
                return Err(CoreError::NoSuchPort(active.clone()));
            }
        }
        let channels = new.channel_map.channels();
        let volume = match new.volume.clone() {
            Some(volume) if volume.channels() != channels => {
                return Err(CoreError::Volume(super::VolumeError::ChannelMismatch {
                    expected: channels,
                    actual: volume.channels(),
                }));
            }
            Some(volume) => volume,
            None => ChannelVolumes::uniform(channels, VOLUME_NORM)?,
        };

        let index = match kind {
            DeviceKind::Sink => take_next(&mut self.counters.sink),
            DeviceKind::Source => take_next(&mut self.counters.source),
        };

        let monitor = match kind {
            DeviceKind::Sink => Some(self.put_monitor_source(index, &new)?),
            DeviceKind::Source => None,
        };

        let name = self.unique_name(&new.name, |n| self.device_by_name(kind, n).is_some());
        let active_port = new
            .active_port
            .or_else(|| new.ports.iter().max_by_key(|p| p.priority).map(|p| p.name.clone()));
        let device = EntityRef::new(DeviceData {
            index,
            kind,
            name,
            driver: new.driver,
            owner_module: new.owner_module,
            card: new.card,
            sample_spec: new.sample_spec,
            channel_map: new.channel_map,
            volume,
            mute: new.mute,
            base_volume: VOLUME_NORM,
            volume_steps: new.volume_steps,
            flags: new.flags,
            configured_latency: new.configured_latency,
            latency: 0,
            state: DeviceState::Idle,
            ports: new.ports.into_iter().map(EntityRef::new).collect(),
            active_port,
            monitor,
            proplist: new.proplist,
        });

        self.put_device(device)?;
        Ok(index)
    }

    fn put_monitor_source(&mut self, sink: u32, new: &NewDevice) -> Result<u32, CoreError> {
        let index = take_next(&mut self.counters.source);
        let name = format!("{}.monitor", new.name);
        let name = self.unique_name(&name, |n| {
            self.device_by_name(DeviceKind::Source, n).is_some()
        });
        let description = new
            .proplist
            .get_str(super::proplist::keys::DEVICE_DESCRIPTION)
            .unwrap_or(&new.name);
        let proplist = Proplist::new().with_str(
            super::proplist::keys::DEVICE_DESCRIPTION,
            &format!("Monitor of {description}"),
        );

        let monitor = EntityRef::new(DeviceData {
            index,
            kind: DeviceKind::Source,
            name,
            driver: new.driver.clone(),
            owner_module: new.owner_module,
            card: new.card,
            sample_spec: new.sample_spec,
            channel_map: new.channel_map.clone(),
            volume: ChannelVolumes::uniform(new.channel_map.channels(), VOLUME_NORM)?,
            mute: false,
            base_volume: VOLUME_NORM,
            volume_steps: 0,
            flags: DeviceFlags::LATENCY | DeviceFlags::DECIBEL_VOLUME,
            configured_latency: new.configured_latency,
            latency: 0,
            state: DeviceState::Idle,
            ports: Vec::new(),
            active_port: None,
            monitor: Some(sink),
            proplist,
        });
        self.put_device(monitor)?;
        Ok(index)
    }

    fn put_device(&mut self, device: EntityRef<DeviceData>) -> Result<(), CoreError> {
        let (kind, index) = {
            let data = device.read();
            (data.kind, data.index)
        };
        debug!(?kind, index, "device added");
        self.device_table_mut(kind).insert(index, device.clone());
        self.fire(CoreEvent::DevicePut(device));

        let current = match kind {
            DeviceKind::Sink => self.default_sink,
            DeviceKind::Source => self.default_source,
        };
        if current.is_none() {
            self.set_default_device(kind, Some(index))?;
        }
        Ok(())
    }

    /// Remove a device, the streams attached to it and, for a sink, its
    /// monitor source.
    ///
    /// When the default device goes away the first remaining device of the
    /// kind takes over.
    ///
    /// # Errors
    /// Returns error if the device does not exist.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<(), CoreError> {
        let device = self.device_ref(id)?.clone();
        let stream_kind = match id.kind {
            DeviceKind::Sink => StreamKind::Playback,
            DeviceKind::Source => StreamKind::Record,
        };

        let attached: Vec<u32> = self
            .streams(stream_kind)
            .filter(|stream| stream.read().device == id.index)
            .map(|stream| stream.read().index)
            .collect();
        for stream in attached {
            self.remove_stream(StreamId {
                kind: stream_kind,
                index: stream,
            })?;
        }

        self.device_table_mut(id.kind).shift_remove(&id.index);
        debug!(kind = ?id.kind, index = id.index, "device removed");
        self.fire(CoreEvent::DeviceUnlink(id));

        let monitor = device.read().monitor;
        match (id.kind, monitor) {
            (DeviceKind::Sink, Some(source)) => {
                if self.device(DeviceId::source(source)).is_some() {
                    self.remove_device(DeviceId::source(source))?;
                }
            }
            (DeviceKind::Source, Some(sink)) => {
                if let Some(sink) = self.device(DeviceId::sink(sink)) {
                    sink.write().monitor = None;
                }
            }
            _ => {}
        }

        let current = match id.kind {
            DeviceKind::Sink => self.default_sink,
            DeviceKind::Source => self.default_source,
        };
        if current == Some(id.index) {
            let fallback = self.device_table(id.kind).keys().next().copied();
            self.set_default_device(id.kind, fallback)?;
        }
        Ok(())
    }

    /// Set device volume and fire [`CoreEvent::DeviceVolumeChanged`].
    ///
    /// # Errors
    /// Returns error if the device does not exist or the channel count differs.
    pub fn set_device_volume(
        &mut self,
        id: DeviceId,
        volume: ChannelVolumes,
    ) -> Result<(), CoreError> {
        {
            let device = self.device_ref(id)?;
            let mut data = device.write();
            let channels = data.channel_map.channels();
            if volume.channels() != channels {
                return Err(CoreError::Volume(super::VolumeError::ChannelMismatch {
                    expected: channels,
                    actual: volume.channels(),
                }));
            }
            data.volume = volume;
        }
        self.fire(CoreEvent::DeviceVolumeChanged(id));
        Ok(())
    }

    /// Set device mute and fire [`CoreEvent::DeviceMuteChanged`].
    ///
    /// # Errors
    /// Returns error if the device does not exist.
    pub fn set_device_mute(&mut self, id: DeviceId, mute: bool) -> Result<(), CoreError> {
        self.device_ref(id)?.write().mute = mute;
        self.fire(CoreEvent::DeviceMuteChanged(id));
        Ok(())
    }

    /// Change the run state; fires only on an actual change.
    ///
    /// # Errors
    /// Returns error if the device does not exist.
    pub fn set_device_state(&mut self, id: DeviceId, state: DeviceState) -> Result<(), CoreError> {
        {
            let mut data = self.device_ref(id)?.write();
            if data.state == state {
                return Ok(());
            }
            data.state = state;
        }
        self.fire(CoreEvent::DeviceStateChanged(id));
        Ok(())
    }

    /// Suspend or resume a device.
    ///
    /// # Errors
    /// Returns error if the device does not exist.
    pub fn suspend_device(&mut self, id: DeviceId, suspend: bool) -> Result<(), CoreError> {
        let state = if suspend {
            DeviceState::Suspended
        } else {
            DeviceState::Idle
        };
        self.set_device_state(id, state)
    }

    /// Switch the active port and fire [`CoreEvent::DevicePortChanged`].
    ///
    /// # Errors
    /// Returns error if the device or port does not exist.
    pub fn set_active_port(&mut self, id: DeviceId, port: &str) -> Result<(), CoreError> {
        {
            let mut data = self.device_ref(id)?.write();
            if !data.ports.iter().any(|p| p.read().name == port) {
                return Err(CoreError::NoSuchPort(port.to_string()));
            }
            data.active_port = Some(port.to_string());
        }
        self.fire(CoreEvent::DevicePortChanged(id));
        Ok(())
    }

    /// Change port availability; fires only on an actual change.
    ///
    /// # Errors
    /// Returns error if the device or port does not exist.
    pub fn set_port_available(
        &mut self,
        id: DeviceId,
        port: &str,
        available: PortAvailable,
    ) -> Result<(), CoreError> {
        let target = self
            .device_ref(id)?
            .read()
            .ports
            .iter()
            .find(|p| p.read().name == port)
            .cloned()
            .ok_or_else(|| CoreError::NoSuchPort(port.to_string()))?;

        if target.read().available == available {
            return Ok(());
        }
        target.write().available = available;
        self.fire(CoreEvent::PortAvailableChanged(target));
        Ok(())
    }

    /// Update device properties.
    ///
    /// # Errors
    /// Returns error if the device does not exist.
    pub fn update_device_proplist(
        &mut self,
        id: DeviceId,
        mode: UpdateMode,
        proplist: &Proplist,
    ) -> Result<(), CoreError> {
        self.device_ref(id)?.write().proplist.update(mode, proplist);
        self.fire(CoreEvent::DeviceProplistChanged(id));
        Ok(())
    }
}

fn kind_name(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Sink => "sink",
        DeviceKind::Source => "source",
    }
}
