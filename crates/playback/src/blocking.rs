//! Synchronous single-track playback.
//!
//! Used at bring-up to check the card and the audio path before the pump
//! loop runs: every sector is read with `read_sync` into a buffer obtained
//! with a blocking acquire, then submitted in order.

use core::fmt::Debug;

use library::audio_map::AudioMap;
use library::footer::SectorFooter;
use platform::audio::{AudioBuffer, BufferPool};
use platform::storage::BlockDevice;

/// Errors returned by [`play_track_blocking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum BlockingPlayError<E: Debug> {
    /// The map has no record for this track.
    #[error("track {0} is not in the audio map")]
    UnknownTrack(u16),
    /// A sector read failed.
    #[error("sector read failed: {0:?}")]
    Io(E),
    /// A blocking acquire returned nothing; the pool is shut down.
    #[error("buffer pool closed")]
    PoolClosed,
}

/// Play `track_id` start to finish, blocking on the pool and the device.
///
/// Returns the number of sectors submitted.
///
/// # Errors
///
/// - [`BlockingPlayError::UnknownTrack`] if `map` has no record for the track
/// - [`BlockingPlayError::Io`] on the first failed read; the buffer it was
///   reading into is submitted with zero samples so it returns to the pool
/// - [`BlockingPlayError::PoolClosed`] if the pool hands out nothing
pub fn play_track_blocking<D, P, M>(
    device: &mut D,
    pool: &mut P,
    map: &AudioMap<M>,
    track_id: u16,
) -> Result<u16, BlockingPlayError<D::Error>>
where
    D: BlockDevice,
    P: BufferPool,
    M: AsRef<[u8]>,
{
    let location = map.lookup(track_id).map_err(|_| BlockingPlayError::UnknownTrack(track_id))?;
    info!(
        "blocking playback of track {}: {} sectors from {}",
        track_id, location.sector_count, location.first_sector
    );

    for index in 0..location.sector_count {
        let sector = location.first_sector.saturating_add(u32::from(index));
        let mut buffer = pool.acquire(true).ok_or(BlockingPlayError::PoolClosed)?;
        if let Err(e) = device.read_sync(sector, buffer.sector_mut()) {
            warn!("track {}: sector {} read failed", track_id, sector);
            buffer.set_sample_count(0);
            pool.submit(buffer);
            return Err(BlockingPlayError::Io(e));
        }
        let footer = SectorFooter::decode(buffer.sector());
        buffer.set_sample_count(u32::from(footer.sample_count));
        pool.submit(buffer);
    }
    Ok(location.sector_count)
}
