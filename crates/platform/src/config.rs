//! Sound RAM layout and streaming constants
//!
//! Central addresses and defaults shared by the streamer and the drain
//! engine. Reference these constants rather than hardcoding values.

/// Sound RAM address of a 16-byte silent looping ADPCM block.
///
/// Idle voices are parked here so they never trip the sound unit IRQ address
/// used by the chunk playback area.
pub const DUMMY_BLOCK_ADDR: u32 = 0x1000;

/// Sound RAM address of the chunk playback area (right after the dummy block).
pub const STREAM_BUFFER_ADDR: u32 = 0x1010;

/// Default main-RAM ring buffer size in bytes (48 sectors).
pub const RAM_BUFFER_SIZE: usize = 0x18000;

/// Default minimum number of sectors read from the disc at once.
///
/// Larger values waste fewer seeks but need a larger ring buffer to avoid
/// underruns while the drive repositions.
pub const REFILL_THRESHOLD_SECTORS: u32 = 24;

/// Default time in milliseconds a read may stay outstanding before the drive
/// is considered stalled.
///
/// A cold spin-up plus a full-stroke seek stays well under this on real
/// drives.
pub const STALL_TIMEOUT_MS: u64 = 5_000;
