//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests and in the `xtask simulate`
//! host simulation.

#![cfg(any(test, feature = "std"))]

use std::string::String;
use std::vec::Vec;

use crate::audio_types::{Pitch, StereoVolume};
use crate::block_device::{
    signal_completion, BlockDevice, CompletionQueue, ReadCompletion, ReadRequest, ReadStatus,
    Ticket, SECTOR_SIZE,
};
use crate::sound_unit::{SoundUnit, VoiceMask, VOICE_COUNT};
use crate::storage::{FileEntry, Storage};

/// Errors reported by [`MockDisc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockDiscError {
    /// A request was submitted while another one was still executing.
    Busy,
    /// The requested sector lies beyond the end of the disc image.
    OutOfRange,
    /// Submissions are being rejected (see [`MockDisc::set_reject_submissions`]).
    Rejected,
}

/// Mock CD-ROM drive backed by an in-memory sector image.
///
/// By default a submitted read stays in flight until the test calls
/// [`complete`](MockDisc::complete) or [`fail`](MockDisc::fail), which lets a
/// test interleave completions with poll ticks exactly. With
/// [`auto_complete`](MockDisc::auto_complete) every read finishes instantly
/// (without copying data), which is what a blocking `open` needs.
pub struct MockDisc<'q> {
    image: Vec<u8>,
    in_flight: Option<ReadRequest>,
    submitted: Vec<ReadRequest>,
    external_busy: bool,
    reject_submissions: bool,
    auto_complete: Option<&'q CompletionQueue>,
}

impl<'q> MockDisc<'q> {
    /// Create an empty disc.
    pub fn new() -> Self {
        Self {
            image: Vec::new(),
            in_flight: None,
            submitted: Vec::new(),
            external_busy: false,
            reject_submissions: false,
            auto_complete: None,
        }
    }

    /// Place `data` on the disc starting at sector `lba`.
    #[must_use]
    pub fn with_file(mut self, lba: u32, data: &[u8]) -> Self {
        let start = sector_offset(lba);
        let end = start.saturating_add(data.len());
        if self.image.len() < end {
            self.image.resize(end, 0);
        }
        if let Some(dst) = self.image.get_mut(start..end) {
            dst.copy_from_slice(data);
        }
        self
    }

    /// Finish every read immediately by pushing a `Complete` into `queue`.
    #[must_use]
    pub fn auto_complete(mut self, queue: &'q CompletionQueue) -> Self {
        self.auto_complete = Some(queue);
        self
    }

    /// Pretend another subsystem is using the drive.
    pub fn set_external_busy(&mut self, busy: bool) {
        self.external_busy = busy;
    }

    /// Make [`BlockDevice::submit_read`] fail with [`MockDiscError::Rejected`].
    pub fn set_reject_submissions(&mut self, reject: bool) {
        self.reject_submissions = reject;
    }

    /// The request currently executing, if any.
    pub fn in_flight(&self) -> Option<ReadRequest> {
        self.in_flight
    }

    /// Every request accepted so far, oldest first.
    pub fn submitted(&self) -> &[ReadRequest] {
        &self.submitted
    }

    /// Finish the in-flight read successfully.
    ///
    /// Copies the requested sectors into `dest` (the ring buffer window the
    /// request targeted) and queues a `Complete` completion.
    pub fn complete(&mut self, queue: &CompletionQueue, dest: &mut [u8]) -> Option<Ticket> {
        let request = self.in_flight.take()?;
        let start = sector_offset(request.lba);
        for (i, slot) in dest.iter_mut().take(request.byte_len()).enumerate() {
            *slot = self.image.get(start.saturating_add(i)).copied().unwrap_or(0);
        }
        finish(queue, request.ticket, ReadStatus::Complete)
    }

    /// Finish the in-flight read with a disc error.
    pub fn fail(&mut self, queue: &CompletionQueue) -> Option<Ticket> {
        let request = self.in_flight.take()?;
        finish(queue, request.ticket, ReadStatus::DiskError)
    }

    /// Drop the in-flight read without reporting anything (drive reset after a hang).
    pub fn reset_drive(&mut self) -> Option<ReadRequest> {
        self.in_flight.take()
    }
}

impl Default for MockDisc<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for MockDisc<'_> {
    type Error = MockDiscError;

    fn is_busy(&self) -> bool {
        self.external_busy || self.in_flight.is_some()
    }

    fn submit_read(&mut self, request: ReadRequest) -> Result<(), Self::Error> {
        if self.reject_submissions {
            return Err(MockDiscError::Rejected);
        }
        if self.is_busy() {
            return Err(MockDiscError::Busy);
        }
        self.submitted.push(request);
        match self.auto_complete {
            Some(queue) => {
                let completion = ReadCompletion {
                    ticket: request.ticket,
                    status: ReadStatus::Complete,
                };
                if !signal_completion(queue, completion) {
                    return Err(MockDiscError::Busy);
                }
            }
            None => self.in_flight = Some(request),
        }
        Ok(())
    }

    async fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = sector_offset(lba);
        let len = buf.len().min(SECTOR_SIZE);
        let src = self
            .image
            .get(start..start.saturating_add(len))
            .ok_or(MockDiscError::OutOfRange)?;
        if let Some(dst) = buf.get_mut(..len) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }
}

fn finish(queue: &CompletionQueue, ticket: Ticket, status: ReadStatus) -> Option<Ticket> {
    signal_completion(queue, ReadCompletion { ticket, status }).then_some(ticket)
}

fn sector_offset(lba: u32) -> usize {
    usize::try_from(lba)
        .unwrap_or(usize::MAX)
        .saturating_mul(SECTOR_SIZE)
}

/// Mock disc directory: a fixed path → location table.
pub struct MockFilesystem {
    files: Vec<(String, FileEntry)>,
}

impl MockFilesystem {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Register a file.
    #[must_use]
    pub fn with_file(mut self, path: &str, entry: FileEntry) -> Self {
        self.files.push((String::from(path), entry));
        self
    }
}

impl Default for MockFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MockFilesystem {
    type Error = core::convert::Infallible;

    async fn find_file(&mut self, path: &str) -> Result<Option<FileEntry>, Self::Error> {
        Ok(self
            .files
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, entry)| *entry))
    }
}

/// Register state of one mock voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceRegisters {
    /// Sound RAM start address.
    pub address: u32,
    /// Pitch register.
    pub pitch: Pitch,
    /// Volume register pair.
    pub volume: StereoVolume,
    /// `true` after key on, `false` after key off.
    pub keyed_on: bool,
}

impl VoiceRegisters {
    const RESET: Self = Self {
        address: 0,
        pitch: Pitch::NATIVE,
        volume: StereoVolume::SILENT,
        keyed_on: false,
    };
}

/// Mock sound unit: records all register writes for test assertions.
pub struct MockSoundUnit {
    voices: [VoiceRegisters; VOICE_COUNT],
    key_events: Vec<(bool, VoiceMask)>,
}

impl MockSoundUnit {
    /// Create a sound unit with every voice keyed off and silent.
    pub fn new() -> Self {
        Self {
            voices: [VoiceRegisters::RESET; VOICE_COUNT],
            key_events: Vec::new(),
        }
    }

    /// Register state of `voice`, or `None` if out of range.
    pub fn voice(&self, voice: usize) -> Option<&VoiceRegisters> {
        self.voices.get(voice)
    }

    /// Key on/off writes in order: `(true, mask)` for key on.
    pub fn key_events(&self) -> &[(bool, VoiceMask)] {
        &self.key_events
    }

    fn for_each_in_mask(&mut self, mask: VoiceMask, mut f: impl FnMut(&mut VoiceRegisters)) {
        for (index, voice) in self.voices.iter_mut().enumerate() {
            if mask.checked_shr(u32::try_from(index).unwrap_or(u32::MAX)).unwrap_or(0) & 1 == 1 {
                f(voice);
            }
        }
    }
}

impl Default for MockSoundUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundUnit for MockSoundUnit {
    fn key_off(&mut self, mask: VoiceMask) {
        self.key_events.push((false, mask));
        self.for_each_in_mask(mask, |v| v.keyed_on = false);
    }

    fn key_on(&mut self, mask: VoiceMask) {
        self.key_events.push((true, mask));
        self.for_each_in_mask(mask, |v| v.keyed_on = true);
    }

    fn set_voice_address(&mut self, voice: usize, spu_address: u32) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.address = spu_address;
        }
    }

    fn set_voice_pitch(&mut self, voice: usize, pitch: Pitch) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.pitch = pitch;
        }
    }

    fn set_voice_volume(&mut self, voice: usize, volume: StereoVolume) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.volume = volume;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::block_device::FeedWindow;

    fn request(lba: u32, sectors: u32, ticket: u32) -> ReadRequest {
        ReadRequest {
            lba,
            sectors,
            window: FeedWindow {
                offset: 0,
                len: 2 * SECTOR_SIZE,
            },
            ticket: Ticket::new(ticket),
        }
    }

    #[test]
    fn test_mock_disc_single_outstanding_request() {
        let mut disc = MockDisc::new().with_file(10, &[0xAB; SECTOR_SIZE * 2]);

        disc.submit_read(request(10, 2, 1)).unwrap();
        assert!(disc.is_busy());
        assert_eq!(disc.submit_read(request(12, 1, 2)), Err(MockDiscError::Busy));
        assert_eq!(disc.submitted().len(), 1);
    }

    #[test]
    fn test_mock_disc_complete_copies_sectors() {
        let queue = CompletionQueue::new();
        let mut disc = MockDisc::new().with_file(3, &[0x5A; SECTOR_SIZE]);
        disc.submit_read(request(3, 1, 7)).unwrap();

        let mut dest = [0u8; SECTOR_SIZE];
        assert_eq!(disc.complete(&queue, &mut dest), Some(Ticket::new(7)));
        assert!(dest.iter().all(|&b| b == 0x5A));
        assert!(!disc.is_busy());

        let completion = queue.try_receive().unwrap();
        assert_eq!(completion.ticket, Ticket::new(7));
        assert_eq!(completion.status, ReadStatus::Complete);
    }

    #[test]
    fn test_mock_disc_fail_reports_disk_error() {
        let queue = CompletionQueue::new();
        let mut disc = MockDisc::new();
        disc.submit_read(request(0, 1, 3)).unwrap();
        disc.fail(&queue).unwrap();
        assert_eq!(queue.try_receive().unwrap().status, ReadStatus::DiskError);
    }

    #[test]
    fn test_mock_disc_auto_complete() {
        let queue = CompletionQueue::new();
        let mut disc = MockDisc::new().auto_complete(&queue);
        disc.submit_read(request(0, 1, 9)).unwrap();
        assert!(!disc.is_busy());
        assert_eq!(queue.try_receive().unwrap().ticket, Ticket::new(9));
    }

    #[tokio::test]
    async fn test_mock_disc_read_sector_prefix() {
        let mut data = [0u8; SECTOR_SIZE];
        data[..4].copy_from_slice(b"VAGi");
        let mut disc = MockDisc::new().with_file(20, &data);

        let mut header = [0u8; 4];
        disc.read_sector(20, &mut header).await.unwrap();
        assert_eq!(&header, b"VAGi");
        assert_eq!(
            disc.read_sector(99, &mut header).await,
            Err(MockDiscError::OutOfRange)
        );
    }

    #[tokio::test]
    async fn test_mock_filesystem_lookup() {
        let entry = FileEntry { lba: 24, size: 4096 };
        let mut fs = MockFilesystem::new().with_file("\\MUSIC.VAG;1", entry);
        assert_eq!(fs.find_file("\\MUSIC.VAG;1").await.unwrap(), Some(entry));
        assert_eq!(fs.find_file("\\OTHER.VAG;1").await.unwrap(), None);
    }

    #[test]
    fn test_mock_sound_unit_key_masks() {
        let mut spu = MockSoundUnit::new();
        spu.key_on(0b101);
        assert!(spu.voice(0).unwrap().keyed_on);
        assert!(!spu.voice(1).unwrap().keyed_on);
        assert!(spu.voice(2).unwrap().keyed_on);

        spu.key_off(0b001);
        assert!(!spu.voice(0).unwrap().keyed_on);
        assert_eq!(spu.key_events(), &[(true, 0b101), (false, 0b001)]);
    }
}
