//! File-backed `BlockDevice` for host builds.
//!
//! `FileBlockDevice` serves an audio image file (the same bytes that would be
//! written raw to the SD card) sector by sector. Used when the `std` feature
//! is enabled (xtask and integration tests only).

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::audio_config::SECTOR_SIZE;
use crate::storage::{BlockDevice, Sector};

/// Error type for local file operations.
#[derive(Debug, thiserror_no_std::Error)]
#[error("local storage error: {0}")]
pub struct LocalStorageError(#[from] pub std::io::Error);

/// Handle of a read issued against a [`FileBlockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReadHandle {
    ok: bool,
}

/// A `BlockDevice` over an image file.
///
/// Asynchronous reads are performed eagerly when issued; a failed read yields
/// a handle that never completes, matching the device contract where a
/// failed transfer is indistinguishable from a slow one.
///
/// # Example
/// ```no_run
/// use platform::storage_local::FileBlockDevice;
/// use platform::BlockDevice;
/// let mut dev = FileBlockDevice::open("audio.img").unwrap();
/// let mut sector = [0u8; 512];
/// dev.read_sync(0, &mut sector).unwrap();
/// ```
pub struct FileBlockDevice {
    file: fs::File,
    sector_count: u64,
}

impl FileBlockDevice {
    /// Open the image at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalStorageError> {
        let file = fs::File::open(path)?;
        let len = file.metadata()?.len();
        let sector_count = len.div_ceil(SECTOR_SIZE as u64);
        Ok(Self { file, sector_count })
    }

    /// Number of sectors in the image, counting a partial trailing sector.
    #[must_use]
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Read one sector; a short trailing sector is zero-padded.
    fn read_sector(&mut self, sector: u32, out: &mut Sector) -> Result<(), LocalStorageError> {
        if u64::from(sector) >= self.sector_count {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        let pos = u64::from(sector).saturating_mul(SECTOR_SIZE as u64);
        self.file.seek(SeekFrom::Start(pos))?;
        out.fill(0);
        let mut filled = 0usize;
        while let Some(rest) = out.get_mut(filled..) {
            if rest.is_empty() {
                break;
            }
            let n = self.file.read(rest)?;
            if n == 0 {
                break;
            }
            filled = filled.saturating_add(n);
        }
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    type Error = LocalStorageError;
    type Handle = FileReadHandle;

    fn read_sync(&mut self, sector: u32, out: &mut Sector) -> Result<(), LocalStorageError> {
        self.read_sector(sector, out)
    }

    fn read_async(&mut self, sector: u32, out: &mut Sector) -> FileReadHandle {
        FileReadHandle { ok: self.read_sector(sector, out).is_ok() }
    }

    fn poll(&mut self, handle: FileReadHandle) -> bool {
        handle.ok
    }
}
