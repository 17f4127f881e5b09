//! xtask simulate: play a stream through the mock drive on the host.
//!
//! Time is virtual: every iteration is one 60 Hz frame. A read finishes once
//! the simulated seek plus transfer time has elapsed, and the drain takes a
//! chunk whenever a chunk's worth of playback time has accumulated. The
//! report shows whether the chosen buffer size and refill threshold keep the
//! drive ahead of playback.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use platform::block_device::SECTOR_SIZE;
use platform::mocks::{MockDisc, MockFilesystem, MockSoundUnit};
use platform::{CompletionQueue, FileEntry, SampleRateHz, Ticket};
use streaming::header::{ADPCM_BLOCK_BYTES, SAMPLES_PER_BLOCK};
use streaming::{ChunkRing, SharedStreamBuffer, StreamInfo, Streamer, StreamerConfig, VagHeader};
use tracing_subscriber::EnvFilter;

/// Largest ring the simulation can host.
const RING_BYTES: usize = 0x40000;
const FRAME_US: u64 = 16_667;
const FRAMES_PER_SEC: u64 = 60;
/// Sectors per second at single speed.
const SECTORS_PER_SEC_1X: u64 = 75;
const FILE_LBA: u32 = 300;
const STREAM_PATH: &str = "\\SIM.VAG;1";
/// Give up on the initial fill after this many frames.
const FILL_FRAME_LIMIT: u64 = 600;

static RING: SimRing = SharedStreamBuffer::new(ChunkRing::new());

type SimRing = SharedStreamBuffer<ChunkRing<RING_BYTES>>;
type SimStreamer<'q> = Streamer<'q, MockDisc<'q>, MockSoundUnit, &'static SimRing>;

#[derive(clap::Args)]
pub struct Options {
    /// .VAG file to stream (a synthetic stereo stream when omitted)
    #[arg(long)]
    file: Option<PathBuf>,
    /// Seconds of playback to simulate
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    /// Play once instead of looping
    #[arg(long)]
    no_loop: bool,
    /// Ring buffer size in sectors
    #[arg(long, default_value_t = 48)]
    buffer_sectors: u32,
    /// Free sectors required before a read is issued
    #[arg(long, default_value_t = 24)]
    threshold: u32,
    /// Drive speed multiplier (1 = 75 sectors/s)
    #[arg(long, default_value_t = 2)]
    speed: u64,
    /// Seek latency added to every read, in milliseconds
    #[arg(long, default_value_t = 120)]
    seek_ms: u64,
    /// Fail every Nth read with a disc error (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: u32,
}

/// Entry point called from main.rs
pub fn run(options: &Options) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = build_config(options)?;
    let image = match &options.file {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => synthetic_stream(),
    };
    let size = u32::try_from(image.len()).context("stream file larger than 4 GB")?;

    let queue = CompletionQueue::new();
    let disc = MockDisc::new().with_file(FILE_LBA, &image);
    let mut fs = MockFilesystem::new().with_file(STREAM_PATH, FileEntry { lba: FILE_LBA, size });
    let mut streamer = Streamer::new(disc, MockSoundUnit::new(), &RING, &queue, config);

    let looping = !options.no_loop;
    let info = embassy_futures::block_on(streamer.load(&mut fs, STREAM_PATH, looping, 0))
        .map_err(|e| anyhow::anyhow!("cannot open stream: {e}"))?;
    print_stream(&info, &config, options);

    let mut sim = Simulation::new(options, &info)?;

    // Initial fill, with drive latency, before playback starts.
    loop {
        sim.step_drive(&mut streamer, &queue);
        let outcome = streamer.feed();
        if !outcome.is_working() && streamer.device().in_flight().is_none() {
            break;
        }
        if sim.frame >= FILL_FRAME_LIMIT {
            bail!("initial fill did not finish within {FILL_FRAME_LIMIT} frames");
        }
        sim.advance();
    }
    let fill_frames = sim.frame;
    streamer.start(false).map_err(|e| anyhow::anyhow!("cannot start: {e}"))?;

    let last_frame = fill_frames.saturating_add(options.seconds.saturating_mul(FRAMES_PER_SEC));
    while sim.frame < last_frame {
        sim.advance();
        sim.step_drive(&mut streamer, &queue);
        streamer.feed();
        sim.drain();
        if streamer.is_finished() && RING.lock(|ring| ring.available() < ring.chunk_bytes()) {
            tracing::info!("stream finished at frame {}", sim.frame);
            break;
        }
    }
    streamer.close();

    sim.report(&streamer, fill_frames)
}

fn build_config(options: &Options) -> Result<StreamerConfig> {
    let max_sectors = RING_BYTES.checked_div(SECTOR_SIZE).unwrap_or(0);
    let sectors = usize::try_from(options.buffer_sectors)?;
    if sectors == 0 || sectors > max_sectors {
        bail!("--buffer-sectors must be between 1 and {max_sectors}");
    }
    if options.speed == 0 {
        bail!("--speed must be at least 1");
    }
    Ok(StreamerConfig::standard()
        .with_buffer_size(sectors.saturating_mul(SECTOR_SIZE))
        .with_refill_threshold(options.threshold))
}

/// About seventeen seconds of stereo at 44.1 kHz, preceded by a one-sector
/// header. Each data sector is filled with its index modulo 251.
fn synthetic_stream() -> Vec<u8> {
    const INTERLEAVE: u32 = 4096;
    const CHUNKS: u32 = 108;
    let size = CHUNKS.saturating_mul(INTERLEAVE);
    let header = VagHeader::new(2, INTERLEAVE, size, SampleRateHz::NATIVE).with_name("SIMULATION");
    let data_bytes = usize::try_from(size.saturating_mul(2)).unwrap_or(0);

    let mut image = header.encode().to_vec();
    image.resize(SECTOR_SIZE, 0);
    for index in 0..data_bytes.checked_div(SECTOR_SIZE).unwrap_or(0) {
        let stamp = u8::try_from(index.checked_rem(251).unwrap_or(0)).unwrap_or(0);
        image.resize(image.len().saturating_add(SECTOR_SIZE), stamp);
    }
    image
}

fn print_stream(info: &StreamInfo, config: &StreamerConfig, options: &Options) {
    println!("{}", "Simulated stream".bold());
    println!(
        "  {} ch  {} Hz  interleave {}  {} sectors  {} ms",
        info.header.channels,
        info.header.sample_rate.get(),
        info.header.interleave,
        info.geometry.length_sectors,
        info.duration_ms()
    );
    println!(
        "  buffer {} sectors  threshold {}  drive {}x  seek {} ms  {}",
        config.buffer_size.checked_div(SECTOR_SIZE).unwrap_or(0),
        config.refill_threshold_sectors,
        options.speed,
        options.seek_ms,
        if info.looping { "looping" } else { "one-shot" }
    );
}

struct Simulation {
    frame: u64,
    now_us: u64,
    speed: u64,
    seek_us: u64,
    fail_every: u32,
    /// Ticket of the read being timed and when it finishes.
    due: Option<(Ticket, u64)>,
    reads_finished: u32,
    injected_errors: u32,
    chunk_us: u64,
    drain_credit_us: u64,
    chunks_played: u64,
    scratch: Vec<u8>,
}

impl Simulation {
    fn new(options: &Options, info: &StreamInfo) -> Result<Self> {
        let samples = info
            .header
            .interleave
            .checked_div(ADPCM_BLOCK_BYTES)
            .unwrap_or(0)
            .saturating_mul(SAMPLES_PER_BLOCK);
        let rate = u64::from(info.header.sample_rate.get());
        let chunk_us = u64::from(samples)
            .saturating_mul(1_000_000)
            .checked_div(rate)
            .filter(|us| *us > 0)
            .context("chunk shorter than a microsecond")?;
        Ok(Self {
            frame: 0,
            now_us: 0,
            speed: options.speed,
            seek_us: options.seek_ms.saturating_mul(1_000),
            fail_every: options.fail_every,
            due: None,
            reads_finished: 0,
            injected_errors: 0,
            chunk_us,
            drain_credit_us: 0,
            chunks_played: 0,
            scratch: vec![0; usize::try_from(info.geometry.chunk_bytes)?],
        })
    }

    fn advance(&mut self) {
        self.frame = self.frame.saturating_add(1);
        self.now_us = self.now_us.saturating_add(FRAME_US);
    }

    fn read_time_us(&self, sectors: u32) -> u64 {
        let transfer = u64::from(sectors)
            .saturating_mul(1_000_000)
            .checked_div(SECTORS_PER_SEC_1X.saturating_mul(self.speed))
            .unwrap_or(0);
        self.seek_us.saturating_add(transfer)
    }

    /// Finish the in-flight read once its simulated time has elapsed.
    fn step_drive(&mut self, streamer: &mut SimStreamer<'_>, queue: &CompletionQueue) {
        let Some(request) = streamer.device().in_flight() else {
            self.due = None;
            return;
        };
        let due = match self.due {
            Some((ticket, at)) if ticket == request.ticket => at,
            _ => {
                let at = self.now_us.saturating_add(self.read_time_us(request.sectors));
                self.due = Some((request.ticket, at));
                at
            }
        };
        if self.now_us < due {
            return;
        }

        self.due = None;
        self.reads_finished = self.reads_finished.saturating_add(1);
        if self.reads_finished.checked_rem(self.fail_every) == Some(0) {
            self.injected_errors = self.injected_errors.saturating_add(1);
            tracing::debug!("injecting disc error on ticket {}", request.ticket.get());
            streamer.device_mut().fail(queue);
            return;
        }
        RING.lock(|ring| match ring.window_mut(request.window) {
            Some(dest) => {
                streamer.device_mut().complete(queue, dest);
            }
            None => tracing::warn!(
                "read window {}+{} outside the ring",
                request.window.offset,
                request.window.len
            ),
        });
    }

    /// Take every chunk whose playback time has come.
    fn drain(&mut self) {
        self.drain_credit_us = self.drain_credit_us.saturating_add(FRAME_US);
        while self.drain_credit_us >= self.chunk_us {
            self.drain_credit_us = self.drain_credit_us.saturating_sub(self.chunk_us);
            if RING.lock(|ring| ring.drain_chunk(&mut self.scratch)).is_some() {
                self.chunks_played = self.chunks_played.saturating_add(1);
            }
        }
    }

    fn report(&self, streamer: &SimStreamer<'_>, fill_frames: u64) -> Result<()> {
        let stats = streamer.stats();
        let underruns = RING.lock(|ring| ring.underruns());
        let played_ms =
            self.chunks_played.saturating_mul(self.chunk_us).checked_div(1_000).unwrap_or(0);

        println!();
        println!("{}", "Results".bold());
        println!("  initial fill        {} frames", fill_frames);
        println!("  frames simulated    {}", self.frame);
        println!("  chunks played       {} ({} ms)", self.chunks_played, played_ms);
        println!("  reads issued        {}", stats.reads_issued);
        println!("  sectors read        {}", stats.sectors_read);
        println!("  disc errors         {} ({} injected)", stats.disc_errors, self.injected_errors);
        println!("  stale completions   {}", stats.stale_completions);
        println!("  stalls              {}", stats.stalls);
        println!();

        if underruns > 0 {
            bail!("{underruns} underrun(s): the drive fell behind playback");
        }
        println!("{}", "✓ No underruns".green());
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_stream_is_streamable() {
        let image = synthetic_stream();
        let header = VagHeader::parse(&image).unwrap();
        let g = streaming::geometry(&header, header.channels, FILE_LBA).unwrap();
        assert_eq!(image.len(), SECTOR_SIZE * (1 + g.length_sectors as usize));
        assert_eq!(g.start_lba, FILE_LBA + 1);
        StreamerConfig::standard().validate(g.chunk_bytes).unwrap();
    }

    #[test]
    fn synthetic_sectors_are_stamped() {
        let image = synthetic_stream();
        assert_eq!(image[SECTOR_SIZE], 0);
        assert_eq!(image[2 * SECTOR_SIZE], 1);
        assert_eq!(image[2 * SECTOR_SIZE + SECTOR_SIZE - 1], 1);
    }
}
