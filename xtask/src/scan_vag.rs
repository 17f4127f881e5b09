//! xtask scan-vag: list every interleaved `.VAG` under a directory.
//!
//! For each file the header is decoded and the stream geometry computed as
//! the streamer would, so authoring mistakes (wrong interleave, too many
//! channels, chunks that do not fit the default ring buffer) show up before
//! the disc image is built.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use streaming::channels::channel_mask;
use streaming::{
    geometry, FormatError, StreamError, StreamGeometry, StreamerConfig, VagHeader, HEADER_SIZE,
};
use walkdir::WalkDir;

/// One scanned file.
pub(crate) struct VagSummary {
    pub path: PathBuf,
    pub result: Result<(VagHeader, StreamGeometry), StreamError>,
}

/// Entry point called from main.rs
pub fn run(dir: &Path) -> Result<()> {
    println!("Scanning: {}", dir.display());
    let summaries = scan(dir)?;
    println!("Found {} .VAG files", summaries.len());
    println!();

    let mut bad = 0usize;
    for summary in &summaries {
        let name = summary.path.display().to_string();
        match &summary.result {
            Ok((header, g)) => println!(
                "  {} {}  {} ch  {} Hz  interleave {}  {} chunks  {} sectors  {:.3} s",
                "✓".green(),
                name,
                header.channels,
                header.sample_rate.get(),
                header.interleave,
                g.chunk_count,
                g.length_sectors,
                Duration::from_millis(header.duration_ms()).as_secs_f64(),
            ),
            Err(e) => {
                bad = bad.saturating_add(1);
                println!("  {} {}  {}", "✗".red(), name, e);
            }
        }
    }

    println!();
    if bad > 0 {
        anyhow::bail!("{bad} file(s) cannot be streamed with the standard configuration");
    }
    println!("{}", "✓ All files streamable".green());
    Ok(())
}

/// Scan `dir` recursively and summarise every `.vag` file, sorted by path.
pub(crate) fn scan(dir: &Path) -> Result<Vec<VagSummary>> {
    let config = StreamerConfig::standard();
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_vag(entry.path()) {
            continue;
        }
        let header = read_header(entry.path())?;
        out.push(VagSummary {
            path: entry.into_path(),
            result: summarise(&header, &config),
        });
    }
    Ok(out)
}

fn is_vag(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("vag"))
}

/// First header-sized prefix of the file (shorter if the file is).
fn read_header(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    File::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .take(HEADER_SIZE as u64)
        .read_to_end(&mut buf)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(buf)
}

/// Validate a header exactly as `Streamer::load` does, with the file at
/// sector 0.
pub(crate) fn summarise(
    raw: &[u8],
    config: &StreamerConfig,
) -> Result<(VagHeader, StreamGeometry), StreamError> {
    let header = VagHeader::parse(raw)?;
    channel_mask(header.channels)?;
    let g = geometry(&header, header.channels, 0).map_err(StreamError::from)?;
    config.validate(g.chunk_bytes)?;
    Ok((header, g))
}
