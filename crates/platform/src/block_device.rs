//! Block device abstraction for sector-addressed bulk reads.
//!
//! The device accepts one outstanding request at a time. A request is
//! submitted without blocking; the device writes the sectors into the feed
//! window it was given and reports the outcome from its interrupt handler by
//! pushing a [`ReadCompletion`] into a [`CompletionQueue`]. The polling side
//! drains the queue on its next tick.
//!
//! ```text
//!   poll tick ──submit_read()──▶ device ──DMA──▶ ring buffer window
//!       ▲                           │
//!       └──── CompletionQueue ◀─────┘ (interrupt context)
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Size of one storage sector (CD-ROM mode 2 form 1 user data) in bytes.
pub const SECTOR_SIZE: usize = 2048;

/// [`SECTOR_SIZE`] as a `u32` for sector arithmetic.
#[allow(clippy::cast_possible_truncation)] // Safety: 2048 fits in u32
pub const SECTOR_SIZE_U32: u32 = SECTOR_SIZE as u32;

/// Completions queued but not yet observed by the polling side.
///
/// One slot serves the outstanding request; the second absorbs a late
/// completion for a request that was already abandoned.
pub const COMPLETION_QUEUE_DEPTH: usize = 2;

/// Interrupt-to-poller hand-off for read completions.
pub type CompletionQueue = Channel<CriticalSectionRawMutex, ReadCompletion, COMPLETION_QUEUE_DEPTH>;

/// Writable region of the stream ring buffer, as a byte offset and length.
///
/// Hardware implementations translate `offset` into a DMA target address
/// relative to the ring buffer base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedWindow {
    /// Byte offset of the first writable byte.
    pub offset: usize,
    /// Number of contiguous writable bytes.
    pub len: usize,
}

impl FeedWindow {
    /// Number of whole sectors that fit in the window.
    #[must_use]
    pub fn sectors(&self) -> u32 {
        u32::try_from(self.len / SECTOR_SIZE).unwrap_or(u32::MAX)
    }
}

/// Identity of one submitted read.
///
/// Tickets are never reused within a streamer's lifetime (modulo `u32`
/// wraparound), so a completion can always be matched to the request it
/// answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Ticket(u32);

impl Ticket {
    /// First ticket handed out by a fresh streamer.
    pub const FIRST: Self = Self(1);

    /// Wrap a raw ticket value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The ticket following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Return the raw ticket value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// A bulk read handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadRequest {
    /// Absolute sector address of the first sector to read.
    pub lba: u32,
    /// Number of sectors to read (always > 0).
    pub sectors: u32,
    /// Destination inside the ring buffer.
    pub window: FeedWindow,
    /// Identity echoed back in the completion.
    pub ticket: Ticket,
}

impl ReadRequest {
    /// Transfer length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        usize::try_from(self.sectors)
            .unwrap_or(usize::MAX)
            .saturating_mul(SECTOR_SIZE)
    }
}

/// Outcome reported by the device for a finished read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadStatus {
    /// All requested sectors were transferred.
    Complete,
    /// The drive reported a read failure; the destination contents are undefined.
    DiskError,
}

/// Message sent from the device's interrupt handler to the polling side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadCompletion {
    /// Ticket of the request this completion answers.
    pub ticket: Ticket,
    /// Transfer outcome.
    pub status: ReadStatus,
}

/// Queue a completion from interrupt context without blocking.
///
/// Returns `false` if the queue was full and the completion was dropped; the
/// poller's stall detector then abandons the request and retries it.
pub fn signal_completion(queue: &CompletionQueue, completion: ReadCompletion) -> bool {
    queue.try_send(completion).is_ok()
}

/// Sector-addressed storage device with a single outstanding request.
pub trait BlockDevice {
    /// Error type
    type Error: core::fmt::Debug;

    /// `true` while the drive is executing a request, including requests
    /// issued by code other than the streamer.
    fn is_busy(&self) -> bool;

    /// Start an asynchronous read. Returns as soon as the drive accepted the
    /// command; the outcome arrives later as a [`ReadCompletion`].
    fn submit_read(&mut self, request: ReadRequest) -> Result<(), Self::Error>;

    /// Read the first `buf.len()` bytes of sector `lba`, waiting for the data.
    ///
    /// Used once per stream open to fetch the header.
    fn read_sector(
        &mut self,
        lba: u32,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}
