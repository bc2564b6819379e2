//! Block storage abstraction (SD card in SPI/SDIO mode).

use crate::audio_config::SECTOR_SIZE;

/// One storage sector.
pub type Sector = [u8; SECTOR_SIZE];

/// Sector-addressed block storage.
///
/// The transport itself (SDIO, SPI, a file on the host) is out of scope; the
/// engine only relies on this contract.
pub trait BlockDevice {
    /// Error returned by synchronous reads.
    type Error: core::fmt::Debug;
    /// Opaque token identifying an asynchronous read.
    type Handle: Copy + core::fmt::Debug;

    /// Read `sector` into `out`, blocking until the transfer finishes.
    fn read_sync(&mut self, sector: u32, out: &mut Sector) -> Result<(), Self::Error>;

    /// Start reading `sector` into `out` and return immediately.
    ///
    /// On hardware the transfer is performed by DMA after this call returns:
    /// `out` must be storage that stays in place until [`poll`](Self::poll)
    /// reports completion. Buffer-pool storage satisfies this; a stack array
    /// does not.
    fn read_async(&mut self, sector: u32, out: &mut Sector) -> Self::Handle;

    /// Non-blocking completion check.
    ///
    /// Returns `true` once the read identified by `handle` has landed in its
    /// buffer. A failed transfer is never reported as complete.
    fn poll(&mut self, handle: Self::Handle) -> bool;
}
