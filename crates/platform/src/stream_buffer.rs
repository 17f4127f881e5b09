//! Interface to the ring-buffer drain engine
//!
//! The drain engine owns a main-RAM ring buffer. The streamer is its only
//! producer: it asks how much room there is, points the drive at the
//! contiguous writable window and commits finished transfers with
//! [`StreamBuffer::feed`]. The engine's sound unit interrupt consumes one
//! chunk (`interleave * channels` bytes) at a time.

use crate::audio_types::SampleRateHz;
use crate::block_device::FeedWindow;
use crate::sound_unit::VoiceMask;

/// One-time configuration handed to the drain engine on every stream open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Sound RAM address of the chunk playback area.
    pub spu_address: u32,
    /// Voices assigned to the stream's channels.
    pub channel_mask: VoiceMask,
    /// Bytes per channel per chunk.
    pub interleave: usize,
    /// Ring buffer capacity in bytes.
    pub buffer_size: usize,
    /// Free space (bytes) at which the engine's own refill hint fires; the
    /// streamer applies its threshold itself and passes 0.
    pub refill_threshold: usize,
    /// Playback rate of every stream voice.
    pub sample_rate: SampleRateHz,
}

/// Drain engine operations used by the streamer
pub trait StreamBuffer {
    /// Reset the ring buffer and drain engine for a new stream.
    fn init(&mut self, config: &StreamConfig);

    /// Total free space in bytes.
    fn refill_length(&self) -> usize;

    /// Contiguous writable region starting at the write cursor.
    fn feed_window(&self) -> FeedWindow;

    /// Commit `bytes` freshly written bytes, advancing the write cursor.
    ///
    /// The advance must be visible to the drain engine before it reads the
    /// region.
    fn feed(&mut self, bytes: usize);

    /// Start draining. `resume` continues from the current read position
    /// instead of restarting the chunk sequence.
    fn start(&mut self, resume: bool);

    /// Stop draining; buffered data is kept.
    fn stop(&mut self);
}
