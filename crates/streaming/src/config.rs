//! Streamer configuration
//!
//! Central configuration for buffer sizing and read policy. Defaults match a
//! 48-sector ring buffer refilled 24 sectors at a time, which keeps a
//! double-speed drive ahead of a 44.1 kHz stereo stream across a seek.

use embassy_time::Duration;
use platform::block_device::{SECTOR_SIZE, SECTOR_SIZE_U32};
use platform::config::{
    RAM_BUFFER_SIZE, REFILL_THRESHOLD_SECTORS, STALL_TIMEOUT_MS, STREAM_BUFFER_ADDR,
};

use crate::error::ConfigError;

/// Streamer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamerConfig {
    /// Ring buffer capacity in bytes.
    ///
    /// Must be a whole number of sectors and of chunks.
    pub buffer_size: usize,

    /// Free space in sectors that must be available before a read is issued.
    ///
    /// Larger values mean fewer, longer reads.
    pub refill_threshold_sectors: u32,

    /// Sound RAM address of the chunk playback area.
    pub spu_address: u32,

    /// How long a read may stay outstanding, or the drive stay busy with
    /// foreign work, before it is reported as stalled. Zero disables the
    /// detector.
    pub stall_timeout: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl StreamerConfig {
    /// Standard configuration for a console with 2 MB main RAM.
    pub const fn standard() -> Self {
        Self {
            buffer_size: RAM_BUFFER_SIZE,
            refill_threshold_sectors: REFILL_THRESHOLD_SECTORS,
            spu_address: STREAM_BUFFER_ADDR,
            stall_timeout: Duration::from_millis(STALL_TIMEOUT_MS),
        }
    }

    /// Small footprint configuration: 16-sector buffer refilled 8 sectors at
    /// a time. Suits mono streams and low sample rates.
    pub const fn compact() -> Self {
        Self {
            buffer_size: 0x8000,
            refill_threshold_sectors: 8,
            spu_address: STREAM_BUFFER_ADDR,
            stall_timeout: Duration::from_millis(STALL_TIMEOUT_MS),
        }
    }

    /// Same configuration with a different buffer size.
    #[must_use]
    pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Same configuration with a different refill threshold.
    #[must_use]
    pub const fn with_refill_threshold(mut self, sectors: u32) -> Self {
        self.refill_threshold_sectors = sectors;
        self
    }

    /// Same configuration with a different stall timeout.
    #[must_use]
    pub const fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Ring buffer capacity in whole sectors.
    pub fn buffer_sectors(&self) -> u32 {
        let sectors = self.buffer_size.checked_div(SECTOR_SIZE).unwrap_or(0);
        u32::try_from(sectors).unwrap_or(u32::MAX)
    }

    /// Refill threshold in bytes.
    pub fn refill_threshold_bytes(&self) -> usize {
        usize::try_from(self.refill_threshold_sectors.saturating_mul(SECTOR_SIZE_U32))
            .unwrap_or(usize::MAX)
    }

    /// Check the configuration against a stream with `chunk_bytes`-byte
    /// chunks.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] describing the first violated constraint.
    pub fn validate(&self, chunk_bytes: u32) -> Result<(), ConfigError> {
        if self.buffer_size == 0 || self.buffer_size.checked_rem(SECTOR_SIZE) != Some(0) {
            return Err(ConfigError::BufferNotSectorAligned);
        }
        let chunk = usize::try_from(chunk_bytes).unwrap_or(0);
        if chunk == 0 || self.buffer_size.checked_rem(chunk) != Some(0) {
            return Err(ConfigError::BufferNotChunkAligned { chunk_bytes });
        }
        if self.refill_threshold_sectors == 0
            || self.refill_threshold_sectors > self.buffer_sectors()
        {
            return Err(ConfigError::ThresholdOutOfRange);
        }
        Ok(())
    }
}
