//! Asynchronous sector reads into pool buffers.
//!
//! A read owns its buffer from the moment it is issued until the engine
//! submits it: pool → [`InFlightRead`] → pool/playback. Nothing else may touch
//! the buffer in between.

use platform::audio::{AudioBuffer, BufferPool};
use platform::storage::BlockDevice;

/// Errors returned by [`begin_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadError {
    /// Every pool buffer is in use. Retry on a later tick.
    #[error("no free audio buffer")]
    NoFreeBuffer,
}

/// An issued, not yet collected, single-sector read.
pub struct InFlightRead<B, H> {
    sector: u32,
    buffer: B,
    handle: H,
}

impl<B: AudioBuffer, H: Copy> InFlightRead<B, H> {
    /// Sector being read.
    pub fn sector(&self) -> u32 {
        self.sector
    }

    /// Non-blocking completion check. The read stays in flight when this
    /// returns `false`.
    pub fn poll<D>(&self, device: &mut D) -> bool
    where
        D: BlockDevice<Handle = H>,
    {
        device.poll(self.handle)
    }

    /// Release the buffer. Only meaningful once [`poll`](Self::poll) has
    /// returned `true`.
    pub fn into_buffer(self) -> B {
        self.buffer
    }
}

/// Acquire a free buffer without blocking and start reading `sector` into it.
///
/// # Errors
///
/// Returns [`ReadError::NoFreeBuffer`] if the pool has nothing free; no read
/// is issued in that case.
pub fn begin_read<D, P>(
    device: &mut D,
    pool: &mut P,
    sector: u32,
) -> Result<InFlightRead<P::Buffer, D::Handle>, ReadError>
where
    D: BlockDevice,
    P: BufferPool,
{
    let mut buffer = pool.acquire(false).ok_or(ReadError::NoFreeBuffer)?;
    let handle = device.read_async(sector, buffer.sector_mut());
    Ok(InFlightRead { sector, buffer, handle })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::mocks::{tagged_sector, MockBlockDevice, MockBufferPool};

    #[test]
    fn begin_read_fills_buffer_and_tracks_completion() {
        let mut dev = MockBlockDevice::new(vec![tagged_sector(0, 0), tagged_sector(42, 9)])
            .manual_completion();
        let mut pool = MockBufferPool::new(1);
        let read = begin_read(&mut dev, &mut pool, 1).unwrap();
        assert_eq!(read.sector(), 1);
        assert!(!read.poll(&mut dev));
        assert!(!read.poll(&mut dev), "a failed poll does not consume the read");
        dev.complete_all();
        assert!(read.poll(&mut dev));
        let buffer = read.into_buffer();
        assert_eq!(&buffer.sector()[..4], &42u32.to_le_bytes());
    }

    #[test]
    fn empty_pool_issues_no_read() {
        let mut dev = MockBlockDevice::new(vec![tagged_sector(0, 0)]);
        let mut pool = MockBufferPool::new(0);
        assert_eq!(begin_read(&mut dev, &mut pool, 0).err(), Some(ReadError::NoFreeBuffer));
        assert!(dev.issued_sectors().is_empty());
    }
}
