//! File lookup on the disc file system

/// Location of a file on the disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileEntry {
    /// Sector address of the first sector of the file.
    pub lba: u32,
    /// File size in bytes.
    pub size: u32,
}

/// Storage trait for locating files by path
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;

    /// Look up a file by its ISO 9660 path (e.g. `\MUSIC\TRACK01.VAG;1`).
    ///
    /// Returns `Ok(None)` when no such file exists.
    fn find_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Option<FileEntry>, Self::Error>>;
}
