//! Property-based tests for geometry and the read scheduler.
//! Drives the scheduler with arbitrary tick/completion sequences and checks
//! the cursor and single-outstanding-read invariants after every step.
#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use embassy_time::{Duration, Instant};
use platform::block_device::SECTOR_SIZE;
use platform::{FeedWindow, ReadCompletion, ReadStatus, SampleRateHz};
use proptest::prelude::*;
use streaming::{
    geometry, Decision, ReadScheduler, SchedulerState, StreamGeometry, StreamerConfig, VagHeader,
};

#[derive(Debug, Clone, Copy)]
enum Step {
    Tick { busy: bool, free_sectors: u32, window_sectors: u32 },
    Complete { ok: bool },
    Stale,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (any::<bool>(), 0u32..64, 0u32..64).prop_map(|(busy, free, window)| Step::Tick {
            busy,
            free_sectors: free,
            window_sectors: window.min(free),
        }),
        3 => any::<bool>().prop_map(|ok| Step::Complete { ok }),
        1 => Just(Step::Stale),
    ]
}

fn stream(length_sectors: u32) -> StreamGeometry {
    StreamGeometry {
        start_lba: 24,
        length_sectors,
        chunk_count: length_sectors,
        chunk_bytes: 2048,
    }
}

fn sectors(n: u32) -> usize {
    n as usize * SECTOR_SIZE
}

proptest::proptest! {
    /// chunk_count * interleave always covers the per-channel size.
    #[test]
    fn geometry_covers_size(
        channels in 1u16..=24,
        interleave in 1u32..=0x10000,
        size in 1u32..=0x0100_0000,
    ) {
        let header = VagHeader::new(channels, interleave, size, SampleRateHz::NATIVE);
        let g = geometry(&header, channels, 500).unwrap();
        prop_assert!(u64::from(g.chunk_count) * u64::from(interleave) >= u64::from(size));
        let data_bytes = u64::from(g.chunk_bytes) * u64::from(g.chunk_count);
        prop_assert!(u64::from(g.length_sectors) * 2048 >= data_bytes);
        prop_assert_eq!(g.start_lba, 501);
        prop_assert_eq!(geometry(&header, channels, 500).unwrap(), g);
    }

    /// Cursor in range, issues bounded, never two outstanding reads, errors
    /// and stale completions never move the cursor.
    #[test]
    fn scheduler_invariants(
        length in 1u32..200,
        start in 0u32..200,
        threshold in 1u32..32,
        steps in proptest::collection::vec(step(), 1..200),
    ) {
        let config = StreamerConfig::standard()
            .with_refill_threshold(threshold)
            .with_stall_timeout(Duration::from_ticks(0));
        let mut s = ReadScheduler::new(stream(length), &config, true)
            .starting_at(start % length)
            .unwrap();
        let now = Instant::from_millis(0);

        for step in steps {
            let before = s.next_sector();
            match step {
                Step::Tick { busy, free_sectors, window_sectors } => {
                    let was_pending = s.pending().is_some();
                    let window = FeedWindow { offset: 0, len: sectors(window_sectors) };
                    match s.tick(now, busy, sectors(free_sectors), window) {
                        Decision::Issue(r) => {
                            prop_assert!(!was_pending, "second issue without a completion");
                            prop_assert!(!busy);
                            prop_assert!(free_sectors >= threshold);
                            prop_assert!(r.sectors > 0);
                            prop_assert!(r.sectors <= window_sectors);
                            prop_assert!(r.sectors <= length - before);
                            prop_assert_eq!(r.lba, 24 + before);
                            prop_assert!(r.window.len <= window.len);
                        }
                        Decision::ReadPending => prop_assert!(was_pending),
                        _ => {}
                    }
                    prop_assert_eq!(s.next_sector(), before);
                }
                Step::Complete { ok } => {
                    if let Some(p) = s.pending() {
                        let status = if ok { ReadStatus::Complete } else { ReadStatus::DiskError };
                        s.complete(ReadCompletion { ticket: p.ticket, status }).unwrap();
                        let expected = if ok { (before + p.sectors) % length } else { before };
                        prop_assert_eq!(s.next_sector(), expected);
                        prop_assert_eq!(s.state(), SchedulerState::Idle);
                    }
                }
                Step::Stale => {
                    let pending = s.pending();
                    let ticket = pending.map_or(s.next_ticket(), |p| p.ticket.next());
                    let stale = s.complete(ReadCompletion { ticket, status: ReadStatus::Complete });
                    prop_assert!(stale.is_err());
                    prop_assert_eq!(s.pending(), pending);
                    prop_assert_eq!(s.next_sector(), before);
                }
            }
            prop_assert!(s.next_sector() < length);
        }
    }

    /// From any resume point the reads up to the wrap cover exactly the rest
    /// of the stream, and every later pass covers the whole stream and ends
    /// back at sector 0.
    #[test]
    fn loop_closure(
        length in 1u32..300,
        start in 0u32..300,
        window in 1u32..64,
        passes in 1u32..4,
    ) {
        let config = StreamerConfig::standard().with_refill_threshold(1);
        let start = start % length;
        let mut s = ReadScheduler::new(stream(length), &config, true)
            .starting_at(start)
            .unwrap();
        let w = FeedWindow { offset: 0, len: sectors(window) };

        let read_one = |s: &mut ReadScheduler| {
            let Decision::Issue(r) = s.tick(Instant::from_millis(0), false, w.len, w) else {
                panic!("idle scheduler with room must issue");
            };
            s.complete(ReadCompletion { ticket: r.ticket, status: ReadStatus::Complete }).unwrap();
            r.sectors
        };

        let mut total = 0u32;
        loop {
            total += read_one(&mut s);
            if s.next_sector() == 0 {
                break;
            }
        }
        prop_assert_eq!(total, length - start);

        for _ in 0..passes {
            let mut pass = 0u32;
            loop {
                pass += read_one(&mut s);
                if s.next_sector() == 0 {
                    break;
                }
            }
            prop_assert_eq!(pass, length);
        }
    }
}
