//! Interleaved `.VAG` header decoding.
//!
//! The header occupies the first 48 bytes of the file's first sector:
//!
//! ```text
//!  0..4   magic "VAGi"
//!  4..8   version          u32 big-endian
//!  8..12  interleave       u32 little-endian  (bytes per channel per chunk)
//! 12..16  size             u32 big-endian     (bytes per channel)
//! 16..20  sample rate      u32 big-endian
//! 20..30  reserved
//! 30..32  channels         u16 little-endian  (0 means stereo)
//! 32..48  name             NUL padded
//! ```
//!
//! The mixed byte order comes from the authoring tool, which patched the
//! interleave and channel fields into a big-endian mono header. Decoding goes
//! through `from_be_bytes`/`from_le_bytes` so it does not depend on the host.

use platform::{Pitch, SampleRateHz};

use crate::error::FormatError;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 48;

/// File magic of an interleaved VAG.
pub const MAGIC: [u8; 4] = *b"VAGi";

/// Version words written by the known authoring tools.
pub const SUPPORTED_VERSIONS: [u32; 4] = [0x02, 0x03, 0x04, 0x20];

/// Bytes in one SPU-ADPCM block.
pub const ADPCM_BLOCK_BYTES: u32 = 16;

/// Samples decoded from one SPU-ADPCM block.
pub const SAMPLES_PER_BLOCK: u32 = 28;

/// Maximum stored name length.
pub const NAME_LEN: usize = 16;

/// Channel count stored on the wire as 0.
const DEFAULT_CHANNELS: u16 = 2;

/// Stream name decoded from the header.
pub type StreamName = heapless::String<NAME_LEN>;

/// Decoded stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VagHeader {
    /// Format version word.
    pub version: u32,
    /// Bytes per channel per chunk (> 0).
    pub interleave: u32,
    /// Bytes of ADPCM data per channel (> 0).
    pub size: u32,
    /// Playback rate.
    pub sample_rate: SampleRateHz,
    /// Channel count (>= 1; a wire value of 0 is normalized to 2).
    pub channels: u16,
    name: [u8; NAME_LEN],
}

/// Copy `N` bytes starting at `at`.
fn field<const N: usize>(bytes: &[u8; HEADER_SIZE], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = bytes.get(at.saturating_add(i)).copied().unwrap_or(0);
    }
    out
}

impl VagHeader {
    /// Build a header for an interleaved stream, as an authoring tool would.
    #[must_use]
    pub fn new(channels: u16, interleave: u32, size: u32, sample_rate: SampleRateHz) -> Self {
        Self {
            version: 0x20,
            interleave,
            size,
            sample_rate,
            channels,
            name: [0; NAME_LEN],
        }
    }

    /// Attach a name, truncated to 16 bytes.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = [0; NAME_LEN];
        for (slot, byte) in self.name.iter_mut().zip(name.bytes()) {
            *slot = byte;
        }
        self
    }

    /// Decode a header from the start of the file's first sector.
    ///
    /// # Errors
    ///
    /// [`FormatError`] for a short buffer, wrong magic, unknown version, zero
    /// interleave or size, or an unplayable sample rate.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let raw: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(FormatError::Truncated)?;

        if field::<4>(raw, 0) != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = u32::from_be_bytes(field(raw, 4));
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let interleave = u32::from_le_bytes(field(raw, 8));
        if interleave == 0 {
            return Err(FormatError::ZeroInterleave);
        }
        let size = u32::from_be_bytes(field(raw, 12));
        if size == 0 {
            return Err(FormatError::EmptyStream);
        }
        let sample_rate =
            SampleRateHz::new(u32::from_be_bytes(field(raw, 16))).map_err(FormatError::SampleRate)?;

        let channels = match u16::from_le_bytes(field(raw, 30)) {
            0 => DEFAULT_CHANNELS,
            n => n,
        };

        Ok(Self {
            version,
            interleave,
            size,
            sample_rate,
            channels,
            name: field(raw, 32),
        })
    }

    /// Encode back to the on-disc layout.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let fields: [(usize, &[u8]); 7] = [
            (0, &MAGIC),
            (4, &self.version.to_be_bytes()),
            (8, &self.interleave.to_le_bytes()),
            (12, &self.size.to_be_bytes()),
            (16, &self.sample_rate.get().to_be_bytes()),
            (30, &self.channels.to_le_bytes()),
            (32, &self.name),
        ];
        for (at, bytes) in fields {
            if let Some(dst) = out.get_mut(at..at.saturating_add(bytes.len())) {
                dst.copy_from_slice(bytes);
            }
        }
        out
    }

    /// Stream name with trailing NULs removed. Non-UTF-8 names decode as
    /// empty.
    pub fn name(&self) -> StreamName {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        self.name
            .get(..len)
            .and_then(|b| core::str::from_utf8(b).ok())
            .and_then(|s| StreamName::try_from(s).ok())
            .unwrap_or_default()
    }

    /// Samples per channel.
    pub fn sample_count(&self) -> u32 {
        self.size
            .checked_div(ADPCM_BLOCK_BYTES)
            .unwrap_or(0)
            .saturating_mul(SAMPLES_PER_BLOCK)
    }

    /// Playing time of one pass in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.sample_count())
            .saturating_mul(1000)
            .checked_div(u64::from(self.sample_rate.get()))
            .unwrap_or(0)
    }

    /// Pitch register value for the stream voices.
    pub fn pitch(&self) -> Pitch {
        Pitch::from_sample_rate(self.sample_rate)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn stereo_44k() -> VagHeader {
        VagHeader::new(2, 4096, 40960, SampleRateHz::NATIVE).with_name("theme")
    }

    #[test]
    fn test_mixed_endianness_fields() {
        let raw = stereo_44k().encode();
        // Big-endian size and rate
        assert_eq!(&raw[12..16], &[0x00, 0x00, 0xA0, 0x00]);
        assert_eq!(&raw[16..20], &[0x00, 0x00, 0xAC, 0x44]);
        // Little-endian interleave and channels
        assert_eq!(&raw[8..12], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(&raw[30..32], &[0x02, 0x00]);

        let parsed = VagHeader::parse(&raw).unwrap();
        assert_eq!(parsed.interleave, 4096);
        assert_eq!(parsed.size, 40960);
        assert_eq!(parsed.sample_rate.get(), 44_100);
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.name().as_str(), "theme");
    }

    #[test]
    fn test_wire_channel_zero_means_stereo() {
        let mut raw = stereo_44k().encode();
        raw[30] = 0;
        raw[31] = 0;
        assert_eq!(VagHeader::parse(&raw).unwrap().channels, 2);
    }

    #[test]
    fn test_channel_field_high_byte() {
        let mut raw = stereo_44k().encode();
        raw[30] = 0x00;
        raw[31] = 0x01;
        assert_eq!(VagHeader::parse(&raw).unwrap().channels, 256);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut raw = stereo_44k().encode();
        raw[3] = b'p';
        assert_eq!(VagHeader::parse(&raw), Err(FormatError::BadMagic));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut raw = stereo_44k().encode();
        raw[4..8].copy_from_slice(&7u32.to_be_bytes());
        assert_eq!(VagHeader::parse(&raw), Err(FormatError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_zero_interleave_rejected() {
        let raw = VagHeader::new(2, 0, 40960, SampleRateHz::NATIVE).encode();
        assert_eq!(VagHeader::parse(&raw), Err(FormatError::ZeroInterleave));
    }

    #[test]
    fn test_zero_size_rejected() {
        let raw = VagHeader::new(2, 4096, 0, SampleRateHz::NATIVE).encode();
        assert_eq!(VagHeader::parse(&raw), Err(FormatError::EmptyStream));
    }

    #[test]
    fn test_sample_rate_out_of_range() {
        let mut raw = stereo_44k().encode();
        raw[16..20].copy_from_slice(&96_000u32.to_be_bytes());
        assert!(matches!(
            VagHeader::parse(&raw),
            Err(FormatError::SampleRate(e)) if e.value == 96_000
        ));
    }

    #[test]
    fn test_truncated_header() {
        let raw = stereo_44k().encode();
        assert_eq!(VagHeader::parse(&raw[..47]), Err(FormatError::Truncated));
    }

    #[test]
    fn test_parse_ignores_trailing_sector_bytes() {
        let mut sector = [0xFFu8; 2048];
        sector[..HEADER_SIZE].copy_from_slice(&stereo_44k().encode());
        assert_eq!(VagHeader::parse(&sector).unwrap(), stereo_44k());
    }

    #[test]
    fn test_name_uses_full_sixteen_bytes() {
        let header = stereo_44k().with_name("ABCDEFGHIJKLMNOPQRS");
        assert_eq!(header.name().as_str(), "ABCDEFGHIJKLMNOP");
    }

    #[test]
    fn test_duration() {
        // 40960 bytes = 2560 blocks = 71680 samples; at 44.1 kHz about 1.625 s.
        let header = stereo_44k();
        assert_eq!(header.sample_count(), 71_680);
        assert_eq!(header.duration_ms(), 1_625);
    }
}
