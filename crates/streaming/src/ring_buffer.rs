//! Const-generic, statically allocated chunk ring.
//!
//! `ChunkRing<N>` is a [`StreamBuffer`] backed by `N` bytes. The streamer is
//! the single producer: the drive writes sectors into the feed window and
//! [`StreamBuffer::feed`] commits them. The single consumer is the chunk
//! drain, which takes exactly one chunk (`interleave * channels` bytes) per
//! sound unit interrupt via [`ChunkRing::drain_chunk`].
//!
//! # Constraints
//!
//! - The active capacity is `min(buffer_size, N)` rounded down to whole
//!   chunks, so the drain never straddles the wrap.
//! - Not interrupt-safe on its own. When the drain runs in an interrupt,
//!   share the ring through [`SharedStreamBuffer`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::{FeedWindow, StreamBuffer, StreamConfig};

/// A fixed-capacity byte ring that drains in whole chunks.
pub struct ChunkRing<const N: usize> {
    buf: [u8; N],
    capacity: usize,
    chunk_bytes: usize,
    /// Offset of the next chunk to drain.
    read: usize,
    /// Offset of the next byte to fill.
    write: usize,
    /// Committed, undrained bytes.
    count: usize,
    playing: bool,
    underruns: u32,
    config: Option<StreamConfig>,
}

impl<const N: usize> ChunkRing<N> {
    /// Create an empty ring using the whole backing store.
    ///
    /// `const` so that rings may live in a `static`.
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            capacity: N,
            chunk_bytes: 0,
            read: 0,
            write: 0,
            count: 0,
            playing: false,
            underruns: 0,
            config: None,
        }
    }

    /// Committed bytes waiting to be drained.
    pub fn available(&self) -> usize {
        self.count
    }

    /// Active capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes per drained chunk (0 before the first `init`).
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// `true` between `start` and `stop`.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Drain attempts that found less than a full chunk while playing.
    pub fn underruns(&self) -> u32 {
        self.underruns
    }

    /// Configuration from the last `init`.
    pub fn config(&self) -> Option<&StreamConfig> {
        self.config.as_ref()
    }

    /// Mutable view of a feed window, for the drive (or a test double) to
    /// write into. `None` if the window lies outside the active capacity.
    pub fn window_mut(&mut self, window: FeedWindow) -> Option<&mut [u8]> {
        let end = window.offset.checked_add(window.len)?;
        if end > self.capacity {
            return None;
        }
        self.buf.get_mut(window.offset..end)
    }

    /// Take the next chunk into `out` (which must hold a full chunk).
    ///
    /// Returns the chunk length, or `None` when stopped, before `init`, when
    /// `out` is too small, or on underrun (counted).
    pub fn drain_chunk(&mut self, out: &mut [u8]) -> Option<usize> {
        if !self.playing || self.chunk_bytes == 0 || out.len() < self.chunk_bytes {
            return None;
        }
        if self.count < self.chunk_bytes {
            self.underruns = self.underruns.saturating_add(1);
            return None;
        }
        let end = self.read.checked_add(self.chunk_bytes)?;
        let src = self.buf.get(self.read..end)?;
        out.get_mut(..self.chunk_bytes)?.copy_from_slice(src);
        self.read = end.checked_rem(self.capacity).unwrap_or(0);
        self.count = self.count.saturating_sub(self.chunk_bytes);
        Some(self.chunk_bytes)
    }
}

impl<const N: usize> Default for ChunkRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> StreamBuffer for ChunkRing<N> {
    fn init(&mut self, config: &StreamConfig) {
        let channels = usize::try_from(config.channel_mask.count_ones()).unwrap_or(0);
        self.chunk_bytes = config.interleave.saturating_mul(channels);
        let size = config.buffer_size.min(N);
        let whole_chunks = size.checked_div(self.chunk_bytes).unwrap_or(0);
        self.capacity = whole_chunks.saturating_mul(self.chunk_bytes);
        self.read = 0;
        self.write = 0;
        self.count = 0;
        self.playing = false;
        self.underruns = 0;
        self.config = Some(*config);
    }

    fn refill_length(&self) -> usize {
        self.capacity.saturating_sub(self.count)
    }

    fn feed_window(&self) -> FeedWindow {
        let to_end = self.capacity.saturating_sub(self.write);
        FeedWindow {
            offset: self.write,
            len: to_end.min(self.refill_length()),
        }
    }

    fn feed(&mut self, bytes: usize) {
        let bytes = bytes.min(self.feed_window().len);
        self.count = self.count.saturating_add(bytes);
        self.write = self.write.saturating_add(bytes).checked_rem(self.capacity).unwrap_or(0);
    }

    fn start(&mut self, resume: bool) {
        if !resume {
            self.underruns = 0;
        }
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }
}

/// A stream buffer shared between the poll loop and an interrupt-context
/// drain.
///
/// Every access runs inside a critical section, so a `feed` is fully visible
/// before the drain can look at the region it covers.
pub struct SharedStreamBuffer<B> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<B>>,
}

impl<B> SharedStreamBuffer<B> {
    /// Wrap a buffer.
    pub const fn new(buffer: B) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(buffer)),
        }
    }

    /// Run `f` with exclusive access to the buffer.
    pub fn lock<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<B: StreamBuffer> StreamBuffer for &SharedStreamBuffer<B> {
    fn init(&mut self, config: &StreamConfig) {
        self.lock(|b| b.init(config));
    }

    fn refill_length(&self) -> usize {
        self.lock(|b| b.refill_length())
    }

    fn feed_window(&self) -> FeedWindow {
        self.lock(|b| b.feed_window())
    }

    fn feed(&mut self, bytes: usize) {
        self.lock(|b| b.feed(bytes));
    }

    fn start(&mut self, resume: bool) {
        self.lock(|b| b.start(resume));
    }

    fn stop(&mut self) {
        self.lock(|b| b.stop());
    }
}
