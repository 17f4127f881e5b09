//! Applying finished reads to the scheduler.
//!
//! The drive's interrupt handler only queues a [`ReadCompletion`] (see
//! [`platform::block_device::signal_completion`]); everything here runs on
//! the polling side when the queue is drained, so no two completions for a
//! stream are ever applied concurrently.

use core::fmt;

use platform::block_device::SECTOR_SIZE;
use platform::{ReadCompletion, ReadStatus, Ticket};

use crate::scheduler::{ReadScheduler, SchedulerState};

/// Result of applying a matching completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Data arrived; commit `bytes` to the ring buffer.
    Filled {
        /// Sectors transferred.
        sectors: u32,
        /// Bytes to feed, `sectors * 2048`.
        bytes: usize,
        /// The cursor passed the stream end and restarted at sector 0.
        wrapped: bool,
    },
    /// The drive failed the read; the same region is requested again on a
    /// later tick.
    Retry,
}

/// A completion that does not answer the outstanding read.
///
/// Either nothing is pending (the read was abandoned, or the stream was
/// closed or reopened) or another request is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StaleCompletion {
    /// Ticket carried by the completion.
    pub ticket: Ticket,
    /// Ticket of the read actually pending, if any.
    pub expected: Option<Ticket>,
}

impl fmt::Display for StaleCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(expected) => write!(
                f,
                "completion for ticket {} while ticket {} is pending",
                self.ticket.get(),
                expected.get()
            ),
            None => write!(f, "completion for ticket {} with no read pending", self.ticket.get()),
        }
    }
}

impl ReadScheduler {
    /// Apply a completion.
    ///
    /// On success the cursor advances by the pending length modulo the
    /// stream length; a non-looping stream finishes when it wraps. On a disc
    /// error the cursor is left alone. Either way the scheduler returns to
    /// `Idle`.
    ///
    /// # Errors
    ///
    /// [`StaleCompletion`] if the completion's ticket is not the pending
    /// read's. The scheduler is not modified.
    pub fn complete(
        &mut self,
        completion: ReadCompletion,
    ) -> Result<CompletionOutcome, StaleCompletion> {
        let pending = match self.state {
            SchedulerState::ReadPending(p) if p.ticket == completion.ticket => p,
            SchedulerState::ReadPending(p) => {
                return Err(StaleCompletion {
                    ticket: completion.ticket,
                    expected: Some(p.ticket),
                })
            }
            SchedulerState::Idle | SchedulerState::Finished => {
                return Err(StaleCompletion {
                    ticket: completion.ticket,
                    expected: None,
                })
            }
        };

        self.state = SchedulerState::Idle;
        if completion.status == ReadStatus::DiskError {
            return Ok(CompletionOutcome::Retry);
        }

        let length = self.geometry.length_sectors;
        // pending.sectors <= length - next_sector, so the sum never exceeds length
        let advanced = self.next_sector.saturating_add(pending.sectors);
        let wrapped = advanced >= length;
        self.next_sector = advanced.checked_rem(length).unwrap_or(0);
        if wrapped && !self.looping {
            self.state = SchedulerState::Finished;
        }

        Ok(CompletionOutcome::Filled {
            sectors: pending.sectors,
            bytes: usize::try_from(pending.sectors).unwrap_or(0).saturating_mul(SECTOR_SIZE),
            wrapped,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use embassy_time::Instant;
    use platform::{FeedWindow, ReadRequest};

    use super::*;
    use crate::config::StreamerConfig;
    use crate::geometry::StreamGeometry;
    use crate::scheduler::Decision;

    fn scheduler(length: u32, looping: bool) -> ReadScheduler {
        let geometry = StreamGeometry {
            start_lba: 1001,
            length_sectors: length,
            chunk_count: 10,
            chunk_bytes: 8192,
        };
        ReadScheduler::new(geometry, &StreamerConfig::standard(), looping)
    }

    fn issue(s: &mut ReadScheduler, sectors: usize) -> ReadRequest {
        let window = FeedWindow {
            offset: 0,
            len: sectors * SECTOR_SIZE,
        };
        match s.tick(Instant::from_millis(0), false, window.len, window) {
            Decision::Issue(r) => r,
            other => panic!("expected an issue, got {other:?}"),
        }
    }

    fn ok(ticket: Ticket) -> ReadCompletion {
        ReadCompletion {
            ticket,
            status: ReadStatus::Complete,
        }
    }

    #[test]
    fn test_success_advances_cursor() {
        let mut s = scheduler(40, true);
        let r = issue(&mut s, 30);
        let outcome = s.complete(ok(r.ticket)).unwrap();
        assert_eq!(
            outcome,
            CompletionOutcome::Filled {
                sectors: 30,
                bytes: 30 * 2048,
                wrapped: false
            }
        );
        assert_eq!(s.next_sector(), 30);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_wrap_returns_to_zero() {
        let mut s = scheduler(40, true).starting_at(35).unwrap();
        let r = issue(&mut s, 30);
        let outcome = s.complete(ok(r.ticket)).unwrap();
        assert!(matches!(outcome, CompletionOutcome::Filled { sectors: 5, wrapped: true, .. }));
        assert_eq!(s.next_sector(), 0);
        assert!(!s.is_finished());
    }

    #[test]
    fn test_disc_error_keeps_cursor() {
        let mut s = scheduler(40, true).starting_at(12).unwrap();
        let r = issue(&mut s, 24);
        let outcome = s
            .complete(ReadCompletion {
                ticket: r.ticket,
                status: ReadStatus::DiskError,
            })
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Retry);
        assert_eq!(s.next_sector(), 12);
        // Same region again
        let again = issue(&mut s, 24);
        assert_eq!(again.lba, r.lba);
    }

    #[test]
    fn test_completion_without_pending_is_stale() {
        let mut s = scheduler(40, true);
        let err = s.complete(ok(Ticket::new(9))).unwrap_err();
        assert_eq!(err.expected, None);
        assert_eq!(s.next_sector(), 0);
    }

    #[test]
    fn test_mismatched_ticket_is_stale_and_not_applied() {
        let mut s = scheduler(40, true);
        let r = issue(&mut s, 30);
        let err = s.complete(ok(r.ticket.next())).unwrap_err();
        assert_eq!(err.expected, Some(r.ticket));
        assert_eq!(s.next_sector(), 0);
        assert_eq!(s.pending().unwrap().ticket, r.ticket);
    }

    #[test]
    fn test_non_looping_stream_finishes_at_wrap() {
        let mut s = scheduler(40, false);
        let r = issue(&mut s, 30);
        s.complete(ok(r.ticket)).unwrap();
        let r = issue(&mut s, 30);
        assert_eq!(r.sectors, 10);
        s.complete(ok(r.ticket)).unwrap();
        assert!(s.is_finished());
        let window = FeedWindow { offset: 0, len: 0x18000 };
        assert_eq!(
            s.tick(Instant::from_millis(0), false, window.len, window),
            Decision::EndOfStream
        );
    }

    #[test]
    fn test_stale_message_mentions_ticket() {
        let msg = StaleCompletion {
            ticket: Ticket::new(3),
            expected: None,
        };
        assert!(format!("{msg}").contains("ticket 3"));
    }
}
