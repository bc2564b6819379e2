//! Per-sector metadata footer.

use platform::audio_config::{SECTOR_FOOTER_LEN, SECTOR_FOOTER_OFFSET};
use platform::storage::Sector;

use crate::byte_reader::ByteReader;

/// Decoded trailing 4 bytes of an audio sector.
///
/// Only the low byte is meaningful: the number of valid samples in the
/// sector (0–255). The remaining three bytes are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SectorFooter {
    /// Playable samples in this sector.
    pub sample_count: u8,
}

impl SectorFooter {
    /// Decode the footer of `sector`.
    #[must_use]
    pub fn decode(sector: &Sector) -> Self {
        // The footer lies inside every Sector by construction.
        let sample_count = ByteReader::new(sector, SECTOR_FOOTER_OFFSET).read_u8().unwrap_or(0);
        Self { sample_count }
    }

    /// Encode into the 4-byte on-disk form.
    #[must_use]
    pub fn encode(&self) -> [u8; SECTOR_FOOTER_LEN] {
        [self.sample_count, 0, 0, 0]
    }
}
