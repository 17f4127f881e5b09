//! Error types for opening and running a stream.
//!
//! Every fatal open failure maps to a distinct [`StreamError`] variant.
//! Steady-state disc errors never surface here: the scheduler retries them
//! and they are only logged.

use core::fmt;

use platform::OutOfRangeError;

/// The stream header or its derived geometry is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// Fewer bytes than a full header were supplied.
    Truncated,
    /// The first four bytes are not `VAGi`.
    BadMagic,
    /// The version word is not one of the known interleaved versions.
    UnsupportedVersion(u32),
    /// Interleave size of zero.
    ZeroInterleave,
    /// Per-channel size of zero, so there is nothing to stream.
    EmptyStream,
    /// Sample rate outside what the sound unit can play.
    SampleRate(OutOfRangeError),
    /// More channels than hardware voices.
    TooManyChannels(u16),
    /// The stream is too long to address in 32-bit sectors.
    TooLarge,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("header truncated"),
            Self::BadMagic => f.write_str("not an interleaved VAG file"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported VAG version {v:#x}"),
            Self::ZeroInterleave => f.write_str("interleave size is zero"),
            Self::EmptyStream => f.write_str("stream contains no data"),
            Self::SampleRate(e) => write!(f, "sample rate {} Hz out of range", e.value),
            Self::TooManyChannels(n) => write!(f, "{n} channels exceed the hardware voices"),
            Self::TooLarge => f.write_str("stream too large"),
        }
    }
}

/// The streamer configuration cannot serve the opened stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Buffer size is zero or not a whole number of sectors.
    BufferNotSectorAligned,
    /// Buffer size is not a whole number of chunks, so the drain engine
    /// would lose chunk alignment at the wrap.
    BufferNotChunkAligned {
        /// `interleave * channels` of the opened stream.
        chunk_bytes: u32,
    },
    /// Refill threshold is zero or larger than the buffer.
    ThresholdOutOfRange,
    /// The drain engine holds less than the configured buffer size.
    BufferExceedsEngine {
        /// Bytes the drain engine actually accepted.
        capacity: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferNotSectorAligned => f.write_str("buffer size is not a multiple of 2048"),
            Self::BufferNotChunkAligned { chunk_bytes } => {
                write!(f, "buffer size is not a multiple of the {chunk_bytes}-byte chunk")
            }
            Self::ThresholdOutOfRange => f.write_str("refill threshold must be 1..=buffer sectors"),
            Self::BufferExceedsEngine { capacity } => {
                write!(f, "drain engine only holds {capacity} bytes of the configured buffer")
            }
        }
    }
}

/// Fatal error returned by stream open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// The operation needs an open stream.
    NotOpen,
    /// No file exists at the requested path.
    NotFound,
    /// The file system lookup itself failed.
    Storage,
    /// The drive failed the header read or refused a request during the fill.
    Device,
    /// The drive stopped answering during the initial fill.
    DeviceStalled,
    /// Unusable header.
    Format(FormatError),
    /// Configuration incompatible with the stream.
    Config(ConfigError),
    /// A resume offset beyond the end of the stream.
    ResumeOutOfRange {
        /// Requested sector offset.
        sector: u32,
        /// Stream length in sectors.
        length: u32,
    },
}

impl From<FormatError> for StreamError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<ConfigError> for StreamError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen => f.write_str("no stream open"),
            Self::NotFound => f.write_str("stream file not found"),
            Self::Storage => f.write_str("file system lookup failed"),
            Self::Device => f.write_str("drive error"),
            Self::DeviceStalled => f.write_str("drive stalled during initial fill"),
            Self::Format(e) => write!(f, "bad stream header: {e}"),
            Self::Config(e) => write!(f, "bad streamer config: {e}"),
            Self::ResumeOutOfRange { sector, length } => {
                write!(f, "resume sector {sector} beyond stream length {length}")
            }
        }
    }
}
