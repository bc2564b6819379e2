//! Audio map: the track index stored in the first sector of the card.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [0..16]            magic        b"RETROFIST_AUDIO!"
//! [16..18]           track_count  u16 (informational)
//! [18 + i*8 ..]      record i     (8 bytes each)
//!   +0  track_id      u16
//!   +2  first_sector  u32
//!   +6  sector_count  u16
//! ```
//!
//! Records are addressed by position, not searched: the record for track
//! `id` lives at `18 + id * 8` and must carry `id` in its first field.

use platform::audio_config::SECTOR_SIZE;
use platform::storage::BlockDevice;

use crate::byte_reader::ByteReader;

/// Magic header identifying an audio map.
pub const MAGIC: &[u8; 16] = b"RETROFIST_AUDIO!";

/// Size of the header (magic + track count).
pub const HEADER_LEN: usize = 18;

/// Size of one track record.
pub const RECORD_LEN: usize = 8;

/// Largest track id whose record still fits in a single-sector map.
// (512 - 18) / 8 = 61 records -> ids 0..=60
#[allow(clippy::cast_possible_truncation)] // 60 fits in u16
pub const MAX_SECTOR_MAP_TRACK_ID: u16 = ((SECTOR_SIZE - HEADER_LEN) / RECORD_LEN - 1) as u16;

/// Error variants for audio map operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MapError {
    /// The first 16 bytes are not `RETROFIST_AUDIO!`.
    #[error("audio map magic header mismatch")]
    InvalidFormat,
    /// No record for this track id at its expected position.
    #[error("track {0} is not in the audio map")]
    UnknownTrack(u16),
    /// The record's sector range runs past `u32::MAX`.
    #[error("track {0} sector range overflows")]
    SectorRangeOverflow(u16),
}

/// Where a track lives on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackLocation {
    /// Track identifier.
    pub track_id: u16,
    /// First sector of the track.
    pub first_sector: u32,
    /// Number of consecutive sectors.
    pub sector_count: u16,
}

impl TrackLocation {
    /// Last sector of the track, or `None` if the range does not fit in
    /// a `u32`. An empty track reports `first_sector`.
    #[must_use]
    pub fn last_sector(&self) -> Option<u32> {
        self.first_sector.checked_add(u32::from(self.sector_count.saturating_sub(1)))
    }
}

/// A validated audio map that owns its backing bytes.
///
/// `B` is whatever storage holds the raw map: a `[u8; SECTOR_SIZE]` on
/// hardware, a `Vec<u8>` on the host.
#[derive(Debug, Clone)]
pub struct AudioMap<B> {
    bytes: B,
}

impl<B: AsRef<[u8]>> AudioMap<B> {
    /// Validate the magic header and take ownership of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidFormat`] if the first 16 bytes are not the
    /// magic string (including when `bytes` is shorter than 16 bytes). The
    /// input is dropped in that case.
    pub fn parse(bytes: B) -> Result<Self, MapError> {
        if bytes.as_ref().get(..MAGIC.len()) != Some(MAGIC.as_slice()) {
            warn!("audio map rejected: bad magic header");
            return Err(MapError::InvalidFormat);
        }
        let map = Self { bytes };
        debug!("audio map accepted: {} tracks", map.track_count());
        Ok(map)
    }

    /// Track count from the header. Informational only; lookups do not use it.
    ///
    /// Returns `0` if the map is too short to hold the field.
    #[must_use]
    pub fn track_count(&self) -> u16 {
        ByteReader::new(self.bytes.as_ref(), MAGIC.len()).read_u16().unwrap_or(0)
    }

    /// Resolve `track_id` to its sector range.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::UnknownTrack`] if the record at the track's
    /// position does not fit in the map or carries a different id, and
    /// [`MapError::SectorRangeOverflow`] if its last sector would be past
    /// `u32::MAX`.
    pub fn lookup(&self, track_id: u16) -> Result<TrackLocation, MapError> {
        let offset = usize::from(track_id)
            .checked_mul(RECORD_LEN)
            .and_then(|o| o.checked_add(HEADER_LEN))
            .ok_or(MapError::UnknownTrack(track_id))?;
        let location = read_record(self.bytes.as_ref(), offset)
            .ok_or(MapError::UnknownTrack(track_id))?;
        if location.track_id != track_id {
            return Err(MapError::UnknownTrack(track_id));
        }
        if location.last_sector().is_none() {
            warn!("track {}: sector range overflows", track_id);
            return Err(MapError::SectorRangeOverflow(track_id));
        }
        Ok(location)
    }

    /// Iterate the records the header announces, stopping early at the first
    /// record that does not fit.
    pub fn entries(&self) -> impl Iterator<Item = TrackLocation> + '_ {
        let bytes = self.bytes.as_ref();
        (0..usize::from(self.track_count()))
            .map_while(move |i| {
                let offset = i.checked_mul(RECORD_LEN)?.checked_add(HEADER_LEN)?;
                read_record(bytes, offset)
            })
    }

    /// Raw map bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    /// Give the backing storage back.
    #[must_use]
    pub fn into_inner(self) -> B {
        self.bytes
    }
}

fn read_record(bytes: &[u8], offset: usize) -> Option<TrackLocation> {
    let mut reader = ByteReader::new(bytes, offset);
    Some(TrackLocation {
        track_id: reader.read_u16().ok()?,
        first_sector: reader.read_u32().ok()?,
        sector_count: reader.read_u16().ok()?,
    })
}

// ---------------------------------------------------------------------------
// Loading from storage
// ---------------------------------------------------------------------------

/// Error from [`read_audio_map`].
#[derive(Debug, thiserror_no_std::Error)]
pub enum MapLoadError<E: core::fmt::Debug> {
    /// The sector could not be read.
    #[error("audio map sector read failed: {0:?}")]
    Io(E),
    /// The sector does not hold a valid map.
    #[error("audio map invalid: {0}")]
    Format(MapError),
}

impl<E: core::fmt::Debug> From<MapError> for MapLoadError<E> {
    fn from(e: MapError) -> Self {
        Self::Format(e)
    }
}

/// Read `sector` synchronously and parse it as an audio map.
///
/// A single-sector map holds at most 61 records
/// (track ids `0..=`[`MAX_SECTOR_MAP_TRACK_ID`]).
///
/// # Errors
///
/// Returns [`MapLoadError::Io`] if the read fails and
/// [`MapLoadError::Format`] if the magic header does not match.
pub fn read_audio_map<D: BlockDevice>(
    device: &mut D,
    sector: u32,
) -> Result<AudioMap<[u8; SECTOR_SIZE]>, MapLoadError<D::Error>> {
    let mut raw = [0u8; SECTOR_SIZE];
    device.read_sync(sector, &mut raw).map_err(MapLoadError::Io)?;
    Ok(AudioMap::parse(raw)?)
}
