/// Highest accepted sample rate in Hz.
pub const RATE_MAX: u32 = 48_000 * 8;

/// Largest accepted sample cache entry in bytes.
pub const SAMPLE_BYTES_MAX: usize = 16 * 1024 * 1024;

/// Sample encoding, numbered the way the wire protocol numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SampleFormat {
    /// Unsigned 8 bit
    U8 = 0,
    /// 8 bit a-Law
    Alaw = 1,
    /// 8 bit mu-Law
    Ulaw = 2,
    /// Signed 16 bit little endian
    S16Le = 3,
    /// Signed 16 bit big endian
    S16Be = 4,
    /// 32 bit float little endian
    Float32Le = 5,
    /// 32 bit float big endian
    Float32Be = 6,
    /// Signed 32 bit little endian
    S32Le = 7,
    /// Signed 32 bit big endian
    S32Be = 8,
    /// Signed 24 bit packed little endian
    S24Le = 9,
    /// Signed 24 bit packed big endian
    S24Be = 10,
    /// Signed 24 bit in 32 bit little endian
    S24In32Le = 11,
    /// Signed 24 bit in 32 bit big endian
    S24In32Be = 12,
}

impl SampleFormat {
    /// Decode a wire format code.
    pub fn from_code(code: u32) -> Option<Self> {
        let format = match code {
            0 => Self::U8,
            1 => Self::Alaw,
            2 => Self::Ulaw,
            3 => Self::S16Le,
            4 => Self::S16Be,
            5 => Self::Float32Le,
            6 => Self::Float32Be,
            7 => Self::S32Le,
            8 => Self::S32Be,
            9 => Self::S24Le,
            10 => Self::S24Be,
            11 => Self::S24In32Le,
            12 => Self::S24In32Be,
            _ => return None,
        };
        Some(format)
    }

    /// Wire format code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Bytes per sample of one channel.
    pub fn sample_size(self) -> usize {
        match self {
            Self::U8 | Self::Alaw | Self::Ulaw => 1,
            Self::S16Le | Self::S16Be => 2,
            Self::S24Le | Self::S24Be => 3,
            Self::Float32Le
            | Self::Float32Be
            | Self::S32Le
            | Self::S32Be
            | Self::S24In32Le
            | Self::S24In32Be => 4,
        }
    }
}

/// Whether `rate` is an acceptable sample rate.
pub fn rate_valid(rate: u32) -> bool {
    rate > 0 && rate <= RATE_MAX
}

/// Format, rate and channel count of audio data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    /// Sample encoding
    pub format: SampleFormat,
    /// Frames per second
    pub rate: u32,
    /// Channels per frame
    pub channels: u8,
}

impl SampleSpec {
    /// Bytes per frame.
    pub fn frame_size(&self) -> usize {
        self.format.sample_size() * usize::from(self.channels)
    }

    /// Playback time of `bytes` in microseconds.
    pub fn bytes_to_usec(&self, bytes: usize) -> u64 {
        let frame = self.frame_size();
        if frame == 0 || self.rate == 0 {
            return 0;
        }
        let frames = (bytes / frame) as u64;
        frames * 1_000_000 / u64::from(self.rate)
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            format: SampleFormat::S16Le,
            rate: 44_100,
            channels: 2,
        }
    }
}
