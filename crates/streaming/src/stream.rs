//! Playback control.
//!
//! [`Streamer`] ties the pieces together: it opens a stream (lookup, header,
//! geometry, voices, ring buffer), fills the buffer, and afterwards is fed
//! once per frame from the hosting loop. Completions queued by the drive's
//! interrupt handler are applied at the start of every [`Streamer::feed`].
//!
//! ```text
//! open ──▶ load ──▶ fill ──▶ start ──▶ feed, feed, feed ... ──▶ stop / close
//! ```
//!
//! Reopening or closing while a read is in flight is safe: the streamer's
//! ticket counter outlives each stream, so the late completion no longer
//! matches anything and is discarded.

use embassy_futures::yield_now;
use embassy_time::Instant;
use platform::{
    BlockDevice, CompletionQueue, FileEntry, ReadCompletion, ReadRequest, SoundUnit, Storage,
    StreamBuffer,
    StreamConfig, Ticket, VoiceMask,
};

use crate::channels;
use crate::completion::{CompletionOutcome, StaleCompletion};
use crate::config::StreamerConfig;
use crate::error::{ConfigError, StreamError};
use crate::geometry::{geometry, StreamGeometry};
use crate::header::{StreamName, VagHeader, HEADER_SIZE};
use crate::log::{log_debug, log_info, log_warn};
use crate::scheduler::{Decision, ReadScheduler};

/// Facts about the open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Decoded header.
    pub header: VagHeader,
    /// Placement on disc.
    pub geometry: StreamGeometry,
    /// Where the file was found.
    pub file: FileEntry,
    /// Voices playing the stream.
    pub channel_mask: VoiceMask,
    /// Whether reading wraps at the end.
    pub looping: bool,
}

impl StreamInfo {
    /// Stream name from the header.
    pub fn name(&self) -> StreamName {
        self.header.name()
    }

    /// Playing time of one pass in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.header.duration_ms()
    }

    /// Playing time of one pass in whole seconds.
    pub fn duration_secs(&self) -> u32 {
        self.header
            .sample_count()
            .checked_div(self.header.sample_rate.get())
            .unwrap_or(0)
    }
}

/// What one [`Streamer::feed`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// No stream is open.
    Closed,
    /// A read was submitted.
    Issued(ReadRequest),
    /// Waiting for the outstanding read.
    ReadPending,
    /// The drive is busy with foreign work.
    DeviceBusy,
    /// The buffer is too full for a read.
    BelowThreshold,
    /// No whole sector fits the contiguous feed window.
    NoRoom,
    /// A non-looping stream has been read completely.
    EndOfStream,
    /// The drive exceeded the stall timeout; an outstanding read was
    /// abandoned and will be reissued.
    Stalled,
    /// The drive refused the request; it is retried on the next tick.
    SubmitFailed,
}

impl FeedOutcome {
    /// `true` while the drive is (or was just asked to be) working for the
    /// stream, i.e. the caller should keep polling soon.
    pub fn is_working(&self) -> bool {
        matches!(self, Self::Issued(_) | Self::ReadPending | Self::DeviceBusy)
    }
}

/// Counters kept across the streamer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Reads accepted by the drive.
    pub reads_issued: u32,
    /// Sectors committed to the ring buffer.
    pub sectors_read: u64,
    /// Reads that failed with a disc error and were retried.
    pub disc_errors: u32,
    /// Completions discarded as stale.
    pub stale_completions: u32,
    /// Stall timeouts.
    pub stalls: u32,
    /// Requests the drive refused.
    pub submit_failures: u32,
}

struct ActiveStream {
    info: StreamInfo,
    scheduler: ReadScheduler,
}

/// Disc-to-ring-buffer audio streamer.
///
/// Owns the drive, the sound unit and the drain engine handle. Generic over
/// the platform traits so the same code runs on hardware and against the
/// mocks.
pub struct Streamer<'q, D, U, B> {
    device: D,
    spu: U,
    buffer: B,
    queue: &'q CompletionQueue,
    config: StreamerConfig,
    active: Option<ActiveStream>,
    next_ticket: Ticket,
    stats: StreamStats,
}

impl<'q, D, U, B> Streamer<'q, D, U, B>
where
    D: BlockDevice,
    U: SoundUnit,
    B: StreamBuffer,
{
    /// Create a streamer and reset every voice to silence.
    ///
    /// `queue` must be the queue the drive's interrupt handler signals.
    pub fn new(
        device: D,
        mut spu: U,
        buffer: B,
        queue: &'q CompletionQueue,
        config: StreamerConfig,
    ) -> Self {
        channels::reset_voices(&mut spu);
        Self {
            device,
            spu,
            buffer,
            queue,
            config,
            active: None,
            next_ticket: Ticket::FIRST,
            stats: StreamStats::default(),
        }
    }

    /// Open the stream at `path` and fill the ring buffer from the start.
    ///
    /// Blocks (yielding between polls) until the buffer is full. Playback
    /// does not begin until [`Streamer::start`].
    ///
    /// # Errors
    ///
    /// See [`Streamer::load`] and [`Streamer::fill`].
    pub async fn open<S: Storage>(
        &mut self,
        fs: &mut S,
        path: &str,
        looping: bool,
    ) -> Result<StreamInfo, StreamError> {
        self.open_at(fs, path, looping, 0).await
    }

    /// Like [`Streamer::open`], resuming at stream-relative sector
    /// `start_sector`.
    ///
    /// # Errors
    ///
    /// See [`Streamer::load`] and [`Streamer::fill`].
    pub async fn open_at<S: Storage>(
        &mut self,
        fs: &mut S,
        path: &str,
        looping: bool,
        start_sector: u32,
    ) -> Result<StreamInfo, StreamError> {
        let info = self.load(fs, path, looping, start_sector).await?;
        if let Err(e) = self.fill().await {
            self.close();
            return Err(e);
        }
        Ok(info)
    }

    /// Open a stream without filling the buffer.
    ///
    /// Closes any open stream, looks up the file, reads and validates the
    /// header, resets and assigns voices and initialises the drain engine.
    ///
    /// # Errors
    ///
    /// - [`StreamError::NotFound`] / [`StreamError::Storage`] from the lookup
    /// - [`StreamError::Device`] if the header read fails
    /// - [`StreamError::Format`] for an unusable header
    /// - [`StreamError::Config`] if the buffer cannot hold the stream's chunks or the
    ///   drain engine cannot hold the buffer
    /// - [`StreamError::ResumeOutOfRange`] for a bad `start_sector`
    pub async fn load<S: Storage>(
        &mut self,
        fs: &mut S,
        path: &str,
        looping: bool,
        start_sector: u32,
    ) -> Result<StreamInfo, StreamError> {
        self.close();
        self.drain_completions();

        let file = match fs.find_file(path).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                log_warn!("stream file not found: {}", path);
                return Err(StreamError::NotFound);
            }
            Err(_) => return Err(StreamError::Storage),
        };

        let mut raw = [0u8; HEADER_SIZE];
        self.device
            .read_sector(file.lba, &mut raw)
            .await
            .map_err(|_| StreamError::Device)?;
        let header = VagHeader::parse(&raw)?;
        let channel_mask = channels::channel_mask(header.channels)?;
        let geometry = geometry(&header, header.channels, file.lba)?;
        self.config.validate(geometry.chunk_bytes)?;
        let scheduler = ReadScheduler::new(geometry, &self.config, looping)
            .starting_at(start_sector)?
            .with_first_ticket(self.next_ticket);

        self.buffer.init(&StreamConfig {
            spu_address: self.config.spu_address,
            channel_mask,
            interleave: usize::try_from(header.interleave).unwrap_or(0),
            buffer_size: self.config.buffer_size,
            refill_threshold: 0,
            sample_rate: header.sample_rate,
        });
        // An engine that clamps the buffer would never reach the threshold.
        let capacity = self.buffer.refill_length();
        if capacity != self.config.buffer_size {
            log_warn!(
                "drain engine holds {} of {} buffer bytes",
                capacity,
                self.config.buffer_size
            );
            return Err(ConfigError::BufferExceedsEngine { capacity }.into());
        }

        channels::reset_voices(&mut self.spu);
        channels::assign_channels(&mut self.spu, header.channels, header.pitch())?;

        let info = StreamInfo {
            header,
            geometry,
            file,
            channel_mask,
            looping,
        };
        log_info!(
            "stream opened: lba {}, {} sectors, {} ch, {} Hz, {} ms",
            geometry.start_lba,
            geometry.length_sectors,
            header.channels,
            header.sample_rate.get(),
            info.duration_ms()
        );
        self.active = Some(ActiveStream { info, scheduler });
        Ok(info)
    }

    /// Feed until the buffer is above the refill threshold.
    ///
    /// # Errors
    ///
    /// [`StreamError::DeviceStalled`] if the drive exceeds the stall timeout,
    /// [`StreamError::Device`] if it refuses a request, and
    /// [`StreamError::NotOpen`] without an open stream.
    pub async fn fill(&mut self) -> Result<(), StreamError> {
        loop {
            match self.feed() {
                FeedOutcome::Closed => return Err(StreamError::NotOpen),
                FeedOutcome::Stalled => return Err(StreamError::DeviceStalled),
                FeedOutcome::SubmitFailed => return Err(StreamError::Device),
                outcome if outcome.is_working() => yield_now().await,
                _ => return Ok(()),
            }
        }
    }

    /// Run one scheduler tick. Call once per frame.
    ///
    /// Applies any queued completions first, then decides whether to issue
    /// the next read. Never blocks.
    pub fn feed(&mut self) -> FeedOutcome {
        self.drain_completions();

        let Some(active) = self.active.as_mut() else {
            return FeedOutcome::Closed;
        };
        let decision = active.scheduler.tick(
            Instant::now(),
            self.device.is_busy(),
            self.buffer.refill_length(),
            self.buffer.feed_window(),
        );

        match decision {
            Decision::Issue(request) => {
                self.next_ticket = request.ticket.next();
                if self.device.submit_read(request).is_ok() {
                    self.stats.reads_issued = self.stats.reads_issued.saturating_add(1);
                    log_debug!(
                        "read {} sectors at lba {} (ticket {})",
                        request.sectors,
                        request.lba,
                        request.ticket.get()
                    );
                    FeedOutcome::Issued(request)
                } else {
                    active.scheduler.revert_issue(request.ticket);
                    self.stats.submit_failures = self.stats.submit_failures.saturating_add(1);
                    log_warn!("drive refused read at lba {}", request.lba);
                    FeedOutcome::SubmitFailed
                }
            }
            Decision::ReadPending => FeedOutcome::ReadPending,
            Decision::DeviceBusy => FeedOutcome::DeviceBusy,
            Decision::BelowThreshold => FeedOutcome::BelowThreshold,
            Decision::NoRoom => FeedOutcome::NoRoom,
            Decision::EndOfStream => FeedOutcome::EndOfStream,
            Decision::Stalled(ticket) => {
                self.stats.stalls = self.stats.stalls.saturating_add(1);
                match ticket {
                    Some(t) => log_warn!("read ticket {} stalled, abandoning", t.get()),
                    None => log_warn!("drive busy past stall timeout"),
                }
                FeedOutcome::Stalled
            }
        }
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.queue.try_receive() {
            self.apply_completion(completion);
        }
    }

    fn apply_completion(&mut self, completion: ReadCompletion) {
        let result = match self.active.as_mut() {
            Some(active) => active.scheduler.complete(completion),
            None => Err(StaleCompletion {
                ticket: completion.ticket,
                expected: None,
            }),
        };

        match result {
            Ok(CompletionOutcome::Filled { sectors, bytes, wrapped }) => {
                self.buffer.feed(bytes);
                self.stats.sectors_read =
                    self.stats.sectors_read.saturating_add(u64::from(sectors));
                if wrapped {
                    log_debug!("stream cursor wrapped after ticket {}", completion.ticket.get());
                }
            }
            Ok(CompletionOutcome::Retry) => {
                self.stats.disc_errors = self.stats.disc_errors.saturating_add(1);
                log_warn!("disc error on ticket {}, retrying", completion.ticket.get());
            }
            Err(stale) => {
                self.stats.stale_completions = self.stats.stale_completions.saturating_add(1);
                log_warn!("discarding stale completion for ticket {}", stale.ticket.get());
            }
        }
    }

    /// Start draining the buffer.
    ///
    /// # Errors
    ///
    /// [`StreamError::NotOpen`] without an open stream.
    pub fn start(&mut self, resume: bool) -> Result<(), StreamError> {
        if self.active.is_none() {
            return Err(StreamError::NotOpen);
        }
        self.buffer.start(resume);
        Ok(())
    }

    /// Stop draining. Buffered data and the read cursor are kept.
    pub fn stop(&mut self) {
        self.buffer.stop();
    }

    /// Stop playback and forget the stream.
    ///
    /// An outstanding read is abandoned; its completion will be discarded.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            self.buffer.stop();
            self.spu.key_off(active.info.channel_mask);
            if let Some(pending) = active.scheduler.pending() {
                log_debug!("abandoning read ticket {}", pending.ticket.get());
            }
            log_info!("stream closed");
        }
    }

    /// The open stream, if any.
    pub fn info(&self) -> Option<&StreamInfo> {
        self.active.as_ref().map(|a| &a.info)
    }

    /// Scheduler of the open stream, if any.
    pub fn scheduler(&self) -> Option<&ReadScheduler> {
        self.active.as_ref().map(|a| &a.scheduler)
    }

    /// `true` while a stream is open.
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// `true` once a non-looping stream has been read completely.
    pub fn is_finished(&self) -> bool {
        self.scheduler().is_some_and(ReadScheduler::is_finished)
    }

    /// Lifetime counters.
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Active configuration.
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// The drive.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the drive, e.g. for a simulation that completes
    /// reads itself.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The sound unit.
    pub fn sound_unit(&self) -> &U {
        &self.spu
    }

    /// The drain engine handle.
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Mutable access to the drain engine handle, e.g. to drain chunks in a
    /// host simulation.
    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    /// Drive and buffer together, for test doubles that complete a read by
    /// copying into the buffer's feed window.
    pub fn parts_mut(&mut self) -> (&mut D, &mut B) {
        (&mut self.device, &mut self.buffer)
    }

    /// Tear down and hand back the drive, sound unit and buffer.
    pub fn release(mut self) -> (D, U, B) {
        self.close();
        (self.device, self.spu, self.buffer)
    }
}
