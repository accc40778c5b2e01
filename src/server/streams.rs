use tracing::debug;

use super::{
    ChannelMap, ChannelVolumes, CoreError, CoreEvent, DeviceId, EntityRef, Proplist, SampleSpec,
    ServerCore, StreamId, StreamKind, UpdateMode, take_next,
    types::StreamData,
    volume::VOLUME_NORM,
};

/// Description of a stream to create.
#[derive(Debug, Clone)]
pub struct NewStream {
    /// Implementing driver
    pub driver: String,
    /// Module creating the stream
    pub owner_module: Option<u32>,
    /// Owning client
    pub client: Option<u32>,
    /// Sink or source index to attach to
    pub device: u32,
    /// Stream sample spec
    pub sample_spec: SampleSpec,
    /// Channel layout
    pub channel_map: ChannelMap,
    /// Initial volume; 100% on every channel when absent
    pub volume: Option<ChannelVolumes>,
    /// Whether the stream has a volume
    pub has_volume: bool,
    /// Whether clients may change the volume
    pub volume_writable: bool,
    /// Initial mute state
    pub mute: bool,
    /// Resampler in use
    pub resample_method: String,
    /// Properties
    pub proplist: Proplist,
}

impl Default for NewStream {
    fn default() -> Self {
        Self {
            driver: String::new(),
            owner_module: None,
            client: None,
            device: 0,
            sample_spec: SampleSpec::default(),
            channel_map: ChannelMap::stereo(),
            volume: None,
            has_volume: true,
            volume_writable: true,
            mute: false,
            resample_method: "auto".to_string(),
            proplist: Proplist::new(),
        }
    }
}

impl ServerCore {
    fn stream_ref(&self, id: StreamId) -> Result<&EntityRef<StreamData>, CoreError> {
        self.stream(id).ok_or(CoreError::NoSuchEntity {
            kind: kind_name(id.kind),
            index: id.index,
        })
    }

    /// Create a stream attached to a live device.
    ///
    /// # Errors
    /// Returns error if the device or client does not exist, or the initial
    /// volume does not match the channel map.
    pub fn add_stream(&mut self, kind: StreamKind, new: NewStream) -> Result<u32, CoreError> {
        let device = DeviceId {
            kind: kind.device_kind(),
            index: new.device,
        };
        if self.device(device).is_none() {
            return Err(CoreError::NoSuchEntity {
                kind: "device",
                index: new.device,
            });
        }
        if let Some(client) = new.client.filter(|c| self.client(*c).is_none()) {
            return Err(CoreError::NoSuchEntity {
                kind: "client",
                index: client,
            });
        }

        let channels = new.channel_map.channels();
        let volume = match new.volume {
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
            StreamKind::Playback => take_next(&mut self.counters.playback),
            StreamKind::Record => take_next(&mut self.counters.record),
        };
        let stream = EntityRef::new(StreamData {
            index,
            kind,
            driver: new.driver,
            owner_module: new.owner_module,
            client: new.client,
            device: new.device,
            sample_spec: new.sample_spec,
            channel_map: new.channel_map,
            volume,
            has_volume: new.has_volume,
            volume_writable: new.volume_writable,
            mute: new.mute,
            buffer_latency: 0,
            device_latency: 0,
            resample_method: new.resample_method,
            proplist: new.proplist,
        });

        debug!(?kind, index, "stream added");
        self.stream_table_mut(kind).insert(index, stream.clone());
        self.fire(CoreEvent::StreamPut(stream));
        Ok(index)
    }

    /// Remove a stream.
    ///
    /// # Errors
    /// Returns error if the stream does not exist.
    pub fn remove_stream(&mut self, id: StreamId) -> Result<(), CoreError> {
        self.stream_ref(id)?;
        self.stream_table_mut(id.kind).shift_remove(&id.index);
        debug!(kind = ?id.kind, index = id.index, "stream removed");
        self.fire(CoreEvent::StreamUnlink(id));
        Ok(())
    }

    /// Attach a stream to another device of the matching kind.
    ///
    /// # Errors
    /// Returns error if the stream or device does not exist.
    pub fn move_stream(&mut self, id: StreamId, device: u32) -> Result<(), CoreError> {
        let target = DeviceId {
            kind: id.kind.device_kind(),
            index: device,
        };
        if self.device(target).is_none() {
            return Err(CoreError::MoveFailed {
                stream: id.index,
                device,
            });
        }
        {
            let mut data = self.stream_ref(id)?.write();
            if data.device == device {
                return Ok(());
            }
            data.device = device;
        }
        self.fire(CoreEvent::StreamMoved(id));
        Ok(())
    }

    /// Set stream volume and fire [`CoreEvent::StreamVolumeChanged`].
    ///
    /// # Errors
    /// Returns error if the stream does not exist, has no volume, or the
    /// channel count differs.
    pub fn set_stream_volume(
        &mut self,
        id: StreamId,
        volume: ChannelVolumes,
    ) -> Result<(), CoreError> {
        {
            let mut data = self.stream_ref(id)?.write();
            if !data.has_volume {
                return Err(CoreError::NoVolume(id.index));
            }
            let channels = data.channel_map.channels();
            if volume.channels() != channels {
                return Err(CoreError::Volume(super::VolumeError::ChannelMismatch {
                    expected: channels,
                    actual: volume.channels(),
                }));
            }
            data.volume = volume;
        }
        self.fire(CoreEvent::StreamVolumeChanged(id));
        Ok(())
    }

    /// Set stream mute and fire [`CoreEvent::StreamMuteChanged`].
    ///
    /// # Errors
    /// Returns error if the stream does not exist.
    pub fn set_stream_mute(&mut self, id: StreamId, mute: bool) -> Result<(), CoreError> {
        self.stream_ref(id)?.write().mute = mute;
        self.fire(CoreEvent::StreamMuteChanged(id));
        Ok(())
    }

    /// Change the stream sample rate. The caller validates the rate.
    ///
    /// # Errors
    /// Returns error if the stream does not exist.
    pub fn set_stream_rate(&mut self, id: StreamId, rate: u32) -> Result<(), CoreError> {
        self.stream_ref(id)?.write().sample_spec.rate = rate;
        self.fire(CoreEvent::StreamRateChanged(id));
        Ok(())
    }

    /// Update stream properties.
    ///
    /// # Errors
    /// Returns error if the stream does not exist.
    pub fn update_stream_proplist(
        &mut self,
        id: StreamId,
        mode: UpdateMode,
        proplist: &Proplist,
    ) -> Result<(), CoreError> {
        self.stream_ref(id)?.write().proplist.update(mode, proplist);
        self.fire(CoreEvent::StreamProplistChanged(id));
        Ok(())
    }

    /// Deliver a named event from a stream.
    ///
    /// # Errors
    /// Returns error if the stream does not exist.
    pub fn send_stream_event(
        &mut self,
        id: StreamId,
        name: impl Into<String>,
        data: Proplist,
    ) -> Result<(), CoreError> {
        self.stream_ref(id)?;
        self.fire(CoreEvent::StreamEvent {
            stream: id,
            name: name.into(),
            data,
        });
        Ok(())
    }
}

fn kind_name(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Playback => "playback stream",
        StreamKind::Record => "record stream",
    }
}
