//! Read scheduler.
//!
//! Decides once per poll tick whether to issue the next bulk read, and how
//! long it may be. Pure bookkeeping: the caller supplies the drive's busy
//! flag, the ring buffer's free space and feed window, and the current time.
//!
//! ```text
//!            tick: drive idle, free >= threshold, len > 0
//!   ┌──────┐ ─────────────────────────────────────────▶ ┌─────────────┐
//!   │ Idle │                                            │ ReadPending │
//!   └──────┘ ◀───────────────────────────────────────── └─────────────┘
//!      │         completion (matching ticket) or stall
//!      │ cursor wraps, not looping
//!      ▼
//!   ┌──────────┐
//!   │ Finished │
//!   └──────────┘
//! ```
//!
//! The cursor (`next_sector`) always lies in `[0, length_sectors)`. A read
//! never crosses the stream end: the last read before the wrap is shortened
//! and the next one starts again at sector 0.

use embassy_time::{Duration, Instant};
use platform::block_device::SECTOR_SIZE;
use platform::{FeedWindow, ReadRequest, Ticket};

use crate::config::StreamerConfig;
use crate::error::StreamError;
use crate::geometry::StreamGeometry;

/// A submitted read waiting for its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRead {
    /// Ticket the completion must carry.
    pub ticket: Ticket,
    /// Sectors requested.
    pub sectors: u32,
    /// When the read was handed to the drive.
    pub issued_at: Instant,
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No read outstanding.
    Idle,
    /// Exactly one read outstanding.
    ReadPending(PendingRead),
    /// A non-looping stream has been read to its end.
    Finished,
}

/// What one tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Submit this request now.
    Issue(ReadRequest),
    /// A read is still outstanding.
    ReadPending,
    /// The drive is working on something else.
    DeviceBusy,
    /// Not enough free space to be worth a read.
    BelowThreshold,
    /// Free space exists but no whole sector fits the contiguous window.
    NoRoom,
    /// Everything has been read and the stream does not loop.
    EndOfStream,
    /// The drive exceeded the stall timeout. Carries the abandoned read's
    /// ticket, or `None` when the drive was busy with foreign work.
    Stalled(Option<Ticket>),
}

/// Per-stream read scheduler.
#[derive(Debug, Clone)]
pub struct ReadScheduler {
    pub(crate) geometry: StreamGeometry,
    pub(crate) threshold_sectors: u32,
    pub(crate) stall_timeout: Duration,
    pub(crate) looping: bool,
    pub(crate) next_sector: u32,
    pub(crate) state: SchedulerState,
    pub(crate) next_ticket: Ticket,
    busy_since: Option<Instant>,
}

impl ReadScheduler {
    /// Scheduler positioned at the start of the stream.
    pub fn new(geometry: StreamGeometry, config: &StreamerConfig, looping: bool) -> Self {
        Self {
            geometry,
            threshold_sectors: config.refill_threshold_sectors,
            stall_timeout: config.stall_timeout,
            looping,
            next_sector: 0,
            state: SchedulerState::Idle,
            next_ticket: Ticket::FIRST,
            busy_since: None,
        }
    }

    /// Resume reading at stream-relative `sector`.
    ///
    /// # Errors
    ///
    /// [`StreamError::ResumeOutOfRange`] if `sector` is not inside the stream.
    pub fn starting_at(mut self, sector: u32) -> Result<Self, StreamError> {
        if sector >= self.geometry.length_sectors {
            return Err(StreamError::ResumeOutOfRange {
                sector,
                length: self.geometry.length_sectors,
            });
        }
        self.next_sector = sector;
        Ok(self)
    }

    /// Continue a ticket sequence from a previous stream so its late
    /// completions cannot match.
    #[must_use]
    pub fn with_first_ticket(mut self, ticket: Ticket) -> Self {
        self.next_ticket = ticket;
        self
    }

    /// Run one poll tick.
    ///
    /// Checks run in a fixed order: stream end, outstanding read (and its
    /// stall timer), drive busy, refill threshold, then the length clamp. An
    /// [`Decision::Issue`] moves the scheduler to `ReadPending` immediately;
    /// call [`ReadScheduler::revert_issue`] if the drive refuses it.
    pub fn tick(
        &mut self,
        now: Instant,
        device_busy: bool,
        free_bytes: usize,
        window: FeedWindow,
    ) -> Decision {
        match self.state {
            SchedulerState::Finished => Decision::EndOfStream,
            SchedulerState::ReadPending(pending) => {
                if self.timed_out(pending.issued_at, now) {
                    self.state = SchedulerState::Idle;
                    // A drive still busy after the abandon is timed from here.
                    self.busy_since = Some(now);
                    Decision::Stalled(Some(pending.ticket))
                } else {
                    Decision::ReadPending
                }
            }
            SchedulerState::Idle => self.tick_idle(now, device_busy, free_bytes, window),
        }
    }

    fn tick_idle(
        &mut self,
        now: Instant,
        device_busy: bool,
        free_bytes: usize,
        window: FeedWindow,
    ) -> Decision {
        if device_busy {
            let since = *self.busy_since.get_or_insert(now);
            if self.timed_out(since, now) {
                self.busy_since = Some(now);
                return Decision::Stalled(None);
            }
            return Decision::DeviceBusy;
        }
        self.busy_since = None;

        let free_sectors =
            u32::try_from(free_bytes.checked_div(SECTOR_SIZE).unwrap_or(0)).unwrap_or(u32::MAX);
        if free_sectors < self.threshold_sectors {
            return Decision::BelowThreshold;
        }

        let sectors = window.sectors().min(self.remaining_sectors());
        if sectors == 0 {
            return Decision::NoRoom;
        }

        let ticket = self.next_ticket;
        let request = ReadRequest {
            lba: self.geometry.lba_of(self.next_sector),
            sectors,
            window: FeedWindow {
                offset: window.offset,
                len: usize::try_from(sectors).unwrap_or(0).saturating_mul(SECTOR_SIZE),
            },
            ticket,
        };
        self.state = SchedulerState::ReadPending(PendingRead {
            ticket,
            sectors,
            issued_at: now,
        });
        self.next_ticket = ticket.next();
        Decision::Issue(request)
    }

    /// Undo an issue the drive refused. The ticket stays consumed.
    pub fn revert_issue(&mut self, ticket: Ticket) {
        if matches!(self.state, SchedulerState::ReadPending(p) if p.ticket == ticket) {
            self.state = SchedulerState::Idle;
        }
    }

    fn timed_out(&self, since: Instant, now: Instant) -> bool {
        self.stall_timeout.as_ticks() != 0
            && now
                .checked_duration_since(since)
                .is_some_and(|elapsed| elapsed >= self.stall_timeout)
    }

    /// Sectors between the cursor and the stream end.
    pub fn remaining_sectors(&self) -> u32 {
        self.geometry.length_sectors.saturating_sub(self.next_sector)
    }

    /// Stream-relative sector the next read starts at.
    pub fn next_sector(&self) -> u32 {
        self.next_sector
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The outstanding read, if any.
    pub fn pending(&self) -> Option<PendingRead> {
        match self.state {
            SchedulerState::ReadPending(p) => Some(p),
            _ => None,
        }
    }

    /// Ticket the next issued read will carry.
    pub fn next_ticket(&self) -> Ticket {
        self.next_ticket
    }

    /// Geometry of the stream being read.
    pub fn geometry(&self) -> &StreamGeometry {
        &self.geometry
    }

    /// Whether reading wraps back to sector 0 at the end.
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// `true` once a non-looping stream has been read completely.
    pub fn is_finished(&self) -> bool {
        self.state == SchedulerState::Finished
    }
}
