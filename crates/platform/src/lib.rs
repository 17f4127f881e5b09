//! Hardware Abstraction Layer (HAL) for SPU disc streaming
//!
//! This crate provides trait-based abstractions for the hardware a stream
//! touches, enabling development and testing without a console or a disc.
//!
//! # Architecture Layers
//!
//! ```text
//! Hosting application (per-frame poll loop)
//!         ↓
//! Streaming core (streaming crate)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (CD-ROM controller, SPU registers, drain engine)
//! ```
//!
//! # Abstractions
//!
//! - [`BlockDevice`] - Sector reads with one outstanding request
//! - [`Storage`] - File lookup on the disc file system
//! - [`SoundUnit`] - SPU voice registers
//! - [`StreamBuffer`] - Ring buffer / chunk drain engine
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{BlockDevice, FeedWindow, ReadRequest, Ticket};
//!
//! fn issue<D: BlockDevice>(drive: &mut D, window: FeedWindow) -> Result<(), D::Error> {
//!     if drive.is_busy() {
//!         return Ok(());
//!     }
//!     drive.submit_read(ReadRequest {
//!         lba: 24,
//!         sectors: window.sectors(),
//!         window,
//!         ticket: Ticket::FIRST,
//!     })
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // single-threaded poll loop, Send bounds not needed

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod audio_types;
pub mod block_device;
pub mod config;
pub mod mocks;
pub mod sound_unit;
pub mod storage;
pub mod stream_buffer;

// Re-export main high-level traits
pub use block_device::{BlockDevice, CompletionQueue, FeedWindow, ReadCompletion, ReadRequest};
pub use block_device::{ReadStatus, Ticket, SECTOR_SIZE};
pub use sound_unit::{SoundUnit, VoiceMask};
pub use storage::{FileEntry, Storage};
pub use stream_buffer::{StreamBuffer, StreamConfig};

// Re-export newtypes
pub use audio_types::{OutOfRangeError, Pan, Pitch, SampleRateHz, StereoVolume, VoiceVolume};
