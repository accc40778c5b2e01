/// Maximum number of channels in a channel map or volume.
pub const CHANNELS_MAX: usize = 32;

/// Channel positions are numbered `0..CHANNEL_POSITION_MAX`.
pub const CHANNEL_POSITION_MAX: u32 = 51;

/// Volume value that means 100%.
pub const VOLUME_NORM: u32 = 0x10000;

/// Volume value that means silence.
pub const VOLUME_MUTED: u32 = 0;

/// Largest valid volume value.
pub const VOLUME_MAX: u32 = u32::MAX / 2;

/// Per-channel volume in raw server units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelVolumes {
    volumes: Vec<u32>,
}

impl ChannelVolumes {
    /// Create a volume from one value per channel.
    ///
    /// # Errors
    /// Returns error if the list is empty, has too many channels or holds a
    /// value above [`VOLUME_MAX`].
    pub fn new(volumes: Vec<u32>) -> Result<Self, VolumeError> {
        if volumes.is_empty() {
            return Err(VolumeError::Empty);
        }
        if volumes.len() > CHANNELS_MAX {
            return Err(VolumeError::TooManyChannels {
                channels: volumes.len(),
            });
        }
        for (channel, &volume) in volumes.iter().enumerate() {
            if volume > VOLUME_MAX {
                return Err(VolumeError::InvalidVolume { channel, volume });
            }
        }
        Ok(Self { volumes })
    }

    /// Same volume on every channel.
    ///
    /// # Errors
    /// Returns error if `channels` is zero or too large, or `volume` is invalid.
    pub fn uniform(channels: usize, volume: u32) -> Result<Self, VolumeError> {
        Self::new(vec![volume; channels])
    }

    /// Build a volume for a `channels`-wide entity from a client-supplied list.
    ///
    /// A single value applies to every channel; otherwise the list must match
    /// the channel count exactly.
    ///
    /// # Errors
    /// Returns error if the list is empty, has the wrong length or holds an
    /// invalid value.
    pub fn fit(values: &[u32], channels: usize) -> Result<Self, VolumeError> {
        match values {
            [] => Err(VolumeError::Empty),
            [single] => Self::uniform(channels, *single),
            _ if values.len() != channels => Err(VolumeError::ChannelMismatch {
                expected: channels,
                actual: values.len(),
            }),
            _ => Self::new(values.to_vec()),
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.volumes.len()
    }

    /// Raw per-channel values.
    pub fn as_slice(&self) -> &[u32] {
        &self.volumes
    }

    /// Loudest channel.
    pub fn max(&self) -> u32 {
        self.volumes.iter().copied().max().unwrap_or(VOLUME_MUTED)
    }

    /// Mean across channels.
    pub fn average(&self) -> u32 {
        if self.volumes.is_empty() {
            return VOLUME_MUTED;
        }
        let sum: u64 = self.volumes.iter().map(|&v| u64::from(v)).sum();
        let avg = sum / self.volumes.len() as u64;
        u32::try_from(avg).unwrap_or(VOLUME_MAX)
    }
}

/// Ordered channel positions of a stream, device or sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    positions: Vec<u32>,
}

impl ChannelMap {
    /// Create a channel map.
    ///
    /// # Errors
    /// Returns error if the map is empty, too wide or names an unknown position.
    pub fn new(positions: Vec<u32>) -> Result<Self, VolumeError> {
        if positions.is_empty() {
            return Err(VolumeError::Empty);
        }
        if positions.len() > CHANNELS_MAX {
            return Err(VolumeError::TooManyChannels {
                channels: positions.len(),
            });
        }
        if let Some(&position) = positions.iter().find(|&&p| p >= CHANNEL_POSITION_MAX) {
            return Err(VolumeError::InvalidPosition { position });
        }
        Ok(Self { positions })
    }

    /// Front-left, front-right.
    pub fn stereo() -> Self {
        Self {
            positions: vec![1, 2],
        }
    }

    /// Single mono channel.
    pub fn mono() -> Self {
        Self { positions: vec![0] }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.positions.len()
    }

    /// Raw position codes.
    pub fn as_slice(&self) -> &[u32] {
        &self.positions
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::stereo()
    }
}

/// Volume and channel map errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VolumeError {
    /// No channels given
    #[error("Empty channel array.")]
    Empty,
    /// Channel count above [`CHANNELS_MAX`]
    #[error("Too many channels: {channels}. The maximum is {max}.", max = CHANNELS_MAX)]
    TooManyChannels {
        /// Requested channel count
        channels: usize,
    },
    /// Volume value above [`VOLUME_MAX`]
    #[error("Too large volume value for channel {channel}: {volume}")]
    InvalidVolume {
        /// Channel index
        channel: usize,
        /// Invalid volume value
        volume: u32,
    },
    /// Volume list length does not fit the entity
    #[error("Expected {expected} volume entries, got {actual}.")]
    ChannelMismatch {
        /// Entity channel count
        expected: usize,
        /// Supplied entries
        actual: usize,
    },
    /// Unknown channel position code
    #[error("Invalid channel position: {position}.")]
    InvalidPosition {
        /// Offending position
        position: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_expands_to_all_channels() {
        let volume = ChannelVolumes::fit(&[VOLUME_NORM], 4).unwrap();
        assert_eq!(volume.as_slice(), &[VOLUME_NORM; 4]);
    }

    #[test]
    fn fit_rejects_wrong_length() {
        assert_eq!(
            ChannelVolumes::fit(&[1, 2, 3], 2),
            Err(VolumeError::ChannelMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(ChannelVolumes::fit(&[], 2), Err(VolumeError::Empty));
    }

    #[test]
    fn rejects_values_above_max() {
        let err = ChannelVolumes::new(vec![VOLUME_NORM, VOLUME_MAX + 1]).unwrap_err();
        assert_eq!(
            err,
            VolumeError::InvalidVolume {
                channel: 1,
                volume: VOLUME_MAX + 1
            }
        );
    }

    #[test]
    fn average_does_not_overflow() {
        let volume = ChannelVolumes::new(vec![VOLUME_MAX, VOLUME_MAX]).unwrap();
        assert_eq!(volume.average(), VOLUME_MAX);
        assert_eq!(volume.max(), VOLUME_MAX);
    }

    #[test]
    fn channel_map_limits() {
        assert!(ChannelMap::new(vec![0; CHANNELS_MAX]).is_ok());
        assert_eq!(
            ChannelMap::new(vec![0; CHANNELS_MAX + 1]),
            Err(VolumeError::TooManyChannels {
                channels: CHANNELS_MAX + 1
            })
        );
        assert_eq!(
            ChannelMap::new(vec![1, CHANNEL_POSITION_MAX]),
            Err(VolumeError::InvalidPosition {
                position: CHANNEL_POSITION_MAX
            })
        );
    }
}
