//! Stream placement on disc.
//!
//! The file's first sector holds the header; chunks follow from the next
//! sector. Each chunk carries `interleave` bytes for every channel back to
//! back, so one chunk is exactly what the drain engine uploads per interrupt.

use platform::block_device::SECTOR_SIZE_U32;

use crate::error::FormatError;
use crate::header::VagHeader;

/// Where a stream lives and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamGeometry {
    /// Absolute sector of the first chunk.
    pub start_lba: u32,
    /// Stream length in whole sectors (> 0).
    pub length_sectors: u32,
    /// Number of chunks.
    pub chunk_count: u32,
    /// Bytes per chunk, `interleave * channels`.
    pub chunk_bytes: u32,
}

impl StreamGeometry {
    /// Absolute sector of stream-relative sector `offset`.
    #[must_use]
    pub fn lba_of(&self, offset: u32) -> u32 {
        self.start_lba.saturating_add(offset)
    }

    /// Stream length in bytes as read from disc (sector padded).
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.length_sectors).saturating_mul(u64::from(SECTOR_SIZE_U32))
    }
}

/// Compute the geometry of a stream whose file starts at `file_lba`.
///
/// Pure: the same inputs always give the same result.
///
/// # Errors
///
/// [`FormatError::ZeroInterleave`], [`FormatError::EmptyStream`] for headers
/// that were not validated by [`VagHeader::parse`] or a zero `channels`, and
/// [`FormatError::TooLarge`] when the stream does not fit 32-bit sector
/// addressing.
pub fn geometry(
    header: &VagHeader,
    channels: u16,
    file_lba: u32,
) -> Result<StreamGeometry, FormatError> {
    if header.interleave == 0 {
        return Err(FormatError::ZeroInterleave);
    }
    if header.size == 0 || channels == 0 {
        return Err(FormatError::EmptyStream);
    }

    let chunk_count = header.size.div_ceil(header.interleave);
    let chunk_bytes = u32::from(channels)
        .checked_mul(header.interleave)
        .ok_or(FormatError::TooLarge)?;
    let total = u64::from(chunk_bytes).saturating_mul(u64::from(chunk_count));
    let length_sectors = u32::try_from(total.div_ceil(u64::from(SECTOR_SIZE_U32)))
        .map_err(|_| FormatError::TooLarge)?;
    let start_lba = file_lba.checked_add(1).ok_or(FormatError::TooLarge)?;
    // The last sector must be addressable too.
    start_lba
        .checked_add(length_sectors)
        .ok_or(FormatError::TooLarge)?;

    Ok(StreamGeometry {
        start_lba,
        length_sectors,
        chunk_count,
        chunk_bytes,
    })
}
