//! AudioImageWriter: build a raw card image holding an audio map and tracks.
//!
//! Only compiled with the `std` feature (used by the `pack` xtask) and in tests.
//! Sector 0 holds the map; track sectors follow contiguously in the order the
//! tracks were added. Track ids are assigned positionally from 0.

use std::fs;
use std::path::Path;

use platform::audio_config::{SECTOR_FOOTER_OFFSET, SECTOR_SIZE};
use platform::storage::Sector;

use crate::audio_map::{HEADER_LEN, MAGIC, MAX_SECTOR_MAP_TRACK_ID, RECORD_LEN};
use crate::footer::SectorFooter;

/// Samples that fit in one sector's payload (S16, in front of the footer).
pub const SAMPLES_PER_SECTOR: usize = SECTOR_FOOTER_OFFSET / 2;

/// Error type for `AudioImageWriter` operations.
#[derive(Debug, thiserror_no_std::Error)]
pub enum WriterError {
    /// An I/O error from std::io.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The map sector cannot hold another record.
    #[error("audio map is full (max 61 tracks)")]
    TooManyTracks,
    /// A track needs more sectors than the 16-bit count can express.
    #[error("track needs {0} sectors, limit is 65535")]
    TrackTooLong(usize),
}

/// Encode up to [`SAMPLES_PER_SECTOR`] samples into one sector.
///
/// Extra samples are ignored; the footer records how many were written.
#[must_use]
#[allow(clippy::indexing_slicing)] // Safety: 2*i+1 < 2*SAMPLES_PER_SECTOR = SECTOR_FOOTER_OFFSET
#[allow(clippy::arithmetic_side_effects)] // Safety: i < SAMPLES_PER_SECTOR = 254
pub fn encode_sector(pcm: &[i16]) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    let samples = &pcm[..pcm.len().min(SAMPLES_PER_SECTOR)];
    for (i, s) in samples.iter().enumerate() {
        sector[2 * i..2 * i + 2].copy_from_slice(&s.to_le_bytes());
    }
    // SAMPLES_PER_SECTOR = 254 fits in the 8-bit footer.
    #[allow(clippy::cast_possible_truncation)]
    let footer = SectorFooter { sample_count: samples.len() as u8 };
    sector[SECTOR_FOOTER_OFFSET..].copy_from_slice(&footer.encode());
    sector
}

/// Accumulates tracks and lays them out as a card image.
#[derive(Default)]
pub struct AudioImageWriter {
    tracks: Vec<Vec<Sector>>,
}

impl AudioImageWriter {
    /// Empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track made of pre-encoded sectors. Returns its track id.
    ///
    /// # Errors
    ///
    /// Returns `WriterError::TooManyTracks` when the map sector is full and
    /// `WriterError::TrackTooLong` for more than 65 535 sectors.
    pub fn add_track_sectors(&mut self, sectors: Vec<Sector>) -> Result<u16, WriterError> {
        let id = u16::try_from(self.tracks.len()).map_err(|_| WriterError::TooManyTracks)?;
        if id > MAX_SECTOR_MAP_TRACK_ID {
            return Err(WriterError::TooManyTracks);
        }
        if u16::try_from(sectors.len()).is_err() {
            return Err(WriterError::TrackTooLong(sectors.len()));
        }
        self.tracks.push(sectors);
        Ok(id)
    }

    /// Append a track of mono S16 PCM, split across as many sectors as needed.
    ///
    /// # Errors
    ///
    /// Same as [`add_track_sectors`](Self::add_track_sectors).
    pub fn add_track_pcm(&mut self, pcm: &[i16]) -> Result<u16, WriterError> {
        let sectors = pcm.chunks(SAMPLES_PER_SECTOR).map(encode_sector).collect();
        self.add_track_sectors(sectors)
    }

    /// Number of tracks added so far.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Lay out the image: map in sector 0, then every track's sectors.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // counts bounded by add_track_sectors
    #[allow(clippy::indexing_slicing)] // Safety: at most 61 records, which fit in one sector
    #[allow(clippy::arithmetic_side_effects)] // Safety: offsets bounded by SECTOR_SIZE
    pub fn finish(&self) -> Vec<u8> {
        let mut map = [0u8; SECTOR_SIZE];
        map[..MAGIC.len()].copy_from_slice(MAGIC);
        map[MAGIC.len()..HEADER_LEN].copy_from_slice(&(self.tracks.len() as u16).to_le_bytes());

        let mut image = Vec::new();
        let mut next_sector: u32 = 1;
        for (id, track) in self.tracks.iter().enumerate() {
            let at = HEADER_LEN + id * RECORD_LEN;
            let record = &mut map[at..at + RECORD_LEN];
            record[0..2].copy_from_slice(&(id as u16).to_le_bytes());
            record[2..6].copy_from_slice(&next_sector.to_le_bytes());
            record[6..8].copy_from_slice(&(track.len() as u16).to_le_bytes());
            next_sector = next_sector.saturating_add(track.len() as u32);
        }

        image.extend_from_slice(&map);
        for sector in self.tracks.iter().flatten() {
            image.extend_from_slice(sector);
        }
        image
    }

    /// Write the finished image to `path`.
    ///
    /// # Errors
    ///
    /// Returns `WriterError::Io` if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), WriterError> {
        fs::write(path, self.finish())?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::audio_map::{AudioMap, TrackLocation};

    #[test]
    fn encode_sector_writes_samples_and_count() {
        let sector = encode_sector(&[1, -1, 300]);
        assert_eq!(&sector[..6], &[1, 0, 0xFF, 0xFF, 0x2C, 0x01]);
        assert_eq!(SectorFooter::decode(&sector).sample_count, 3);
    }

    #[test]
    fn encode_sector_caps_at_payload() {
        let pcm = vec![7i16; 400];
        let sector = encode_sector(&pcm);
        assert_eq!(SectorFooter::decode(&sector).sample_count, 254);
    }

    #[test]
    fn tracks_are_laid_out_after_map() {
        let mut w = AudioImageWriter::new();
        assert_eq!(w.add_track_pcm(&vec![1i16; 600]).unwrap(), 0); // 3 sectors
        assert_eq!(w.add_track_pcm(&[2i16; 10]).unwrap(), 1); // 1 sector
        let image = w.finish();
        assert_eq!(image.len(), SECTOR_SIZE * 5);

        let map = AudioMap::parse(&image[..SECTOR_SIZE]).unwrap();
        assert_eq!(map.track_count(), 2);
        assert_eq!(
            map.lookup(0).unwrap(),
            TrackLocation { track_id: 0, first_sector: 1, sector_count: 3 }
        );
        assert_eq!(
            map.lookup(1).unwrap(),
            TrackLocation { track_id: 1, first_sector: 4, sector_count: 1 }
        );
    }

    #[test]
    fn map_sector_limits_track_count() {
        let mut w = AudioImageWriter::new();
        for _ in 0..=MAX_SECTOR_MAP_TRACK_ID {
            w.add_track_sectors(vec![]).unwrap();
        }
        assert!(matches!(w.add_track_sectors(vec![]), Err(WriterError::TooManyTracks)));
    }

    #[test]
    fn empty_track_has_zero_sectors() {
        let mut w = AudioImageWriter::new();
        w.add_track_pcm(&[]).unwrap();
        let image = w.finish();
        let map = AudioMap::parse(&image[..]).unwrap();
        assert_eq!(map.lookup(0).unwrap().sector_count, 0);
    }
}
