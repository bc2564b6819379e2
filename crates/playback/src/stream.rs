//! Per-channel track streaming state machine.
//!
//! ```text
//!          start()                sector_index == sector_count      in_flight == 0
//! [Idle] ──────────▶ [Streaming] ─────────────────────────────▶ [Draining] ──────────▶ [Idle]
//! ```
//!
//! Each channel keeps up to `N` single-sector reads in flight in a circular
//! slot array. Only the slot at `head` is ever checked for completion, so
//! buffers reach the pool in sector order even when a later read lands
//! first. One buffer is collected and at most one read issued per tick.

use library::audio_map::TrackLocation;
use library::footer::SectorFooter;
use platform::audio::{AudioBuffer, BufferPool};
use platform::storage::BlockDevice;

use crate::reader::{begin_read, InFlightRead, ReadError};

/// Channel lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// No track assigned; ready for [`TrackStream::start`].
    Idle,
    /// Issuing and collecting reads.
    Streaming,
    /// Every sector requested; waiting for outstanding reads.
    Draining,
}

/// Errors returned by [`TrackStream::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// The channel still has a track streaming or draining.
    #[error("channel is busy")]
    Busy,
    /// The track's last sector would be past `u32::MAX`.
    #[error("sector range overflows")]
    SectorRangeOverflow,
}

/// A buffer handed to the pool during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubmittedBuffer {
    /// Sector the buffer was filled from.
    pub sector: u32,
    /// Playable samples decoded from the sector footer.
    pub sample_count: u8,
}

/// What one [`TrackStream::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Buffer submitted for playback, if the head read had completed.
    pub submitted: Option<SubmittedBuffer>,
    /// Sector whose read was issued.
    pub issued: Option<u32>,
    /// A read was due but the pool had no free buffer.
    pub backpressure: bool,
    /// The channel went back to `Idle` during this tick.
    pub finished: bool,
}

/// Streaming state of one channel (BGM or SFX).
pub struct TrackStream<D, P, const N: usize>
where
    D: BlockDevice,
    P: BufferPool,
{
    state: ChannelState,
    track_id: u16,
    base_sector: u32,
    sector_count: u16,
    sector_index: u16,
    slots: [Option<InFlightRead<P::Buffer, D::Handle>>; N],
    head: usize,
    in_flight: usize,
}

impl<D, P, const N: usize> TrackStream<D, P, N>
where
    D: BlockDevice,
    P: BufferPool,
{
    const NONZERO_CAPACITY: () = assert!(N > 0, "TrackStream needs at least one slot");

    /// Idle channel with `N` in-flight slots.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO_CAPACITY;
        Self {
            state: ChannelState::Idle,
            track_id: 0,
            base_sector: 0,
            sector_count: 0,
            sector_index: 0,
            slots: core::array::from_fn(|_| None),
            head: 0,
            in_flight: 0,
        }
    }

    /// Begin streaming `location` from its first sector.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Busy`] unless the channel is `Idle`. Reads from
    /// a previous track are never abandoned. Returns
    /// [`StreamError::SectorRangeOverflow`] if the track runs past the last
    /// addressable sector.
    pub fn start(&mut self, location: TrackLocation) -> Result<(), StreamError> {
        if self.state != ChannelState::Idle {
            return Err(StreamError::Busy);
        }
        if location.last_sector().is_none() {
            return Err(StreamError::SectorRangeOverflow);
        }
        debug_assert!(self.in_flight == 0 && self.slots.iter().all(Option::is_none));
        self.track_id = location.track_id;
        self.base_sector = location.first_sector;
        self.sector_count = location.sector_count;
        self.sector_index = 0;
        self.head = 0;
        self.in_flight = 0;
        self.state = ChannelState::Streaming;
        Ok(())
    }

    /// Advance the channel by one step.
    ///
    /// 1. If the head read has completed, submit its buffer.
    /// 2. If sectors remain and a slot is free, issue the next read.
    /// 3. Move to `Draining` / `Idle` as appropriate.
    ///
    /// Never blocks: a pending head read or an empty pool simply defers work
    /// to the next tick.
    pub fn tick(&mut self, device: &mut D, pool: &mut P) -> TickReport {
        let mut report = TickReport::default();
        if self.state == ChannelState::Idle {
            return report;
        }

        report.submitted = self.collect_head(device, pool);

        if self.state == ChannelState::Streaming
            && self.sector_index < self.sector_count
            && self.in_flight < N
        {
            // start() guarantees base_sector + sector_count - 1 fits.
            let sector = self.base_sector.saturating_add(u32::from(self.sector_index));
            match begin_read(device, pool, sector) {
                Ok(read) => {
                    self.push_tail(read);
                    self.sector_index = self.sector_index.saturating_add(1);
                    report.issued = Some(sector);
                }
                Err(ReadError::NoFreeBuffer) => {
                    trace!("track {}: no free buffer for sector {}", self.track_id, sector);
                    report.backpressure = true;
                }
            }
        }

        if self.state == ChannelState::Streaming && self.sector_index >= self.sector_count {
            self.state = ChannelState::Draining;
        }
        if self.state == ChannelState::Draining && self.in_flight == 0 {
            debug!("track {}: all {} sectors submitted", self.track_id, self.sector_count);
            self.state = ChannelState::Idle;
            report.finished = true;
        }
        report
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: head wraps via % N (N > 0); in_flight > 0 checked
    fn collect_head(&mut self, device: &mut D, pool: &mut P) -> Option<SubmittedBuffer> {
        if self.in_flight == 0 {
            return None;
        }
        let slot = self.slots.get_mut(self.head)?;
        if !slot.as_ref().is_some_and(|read| read.poll(device)) {
            return None;
        }
        let read = slot.take()?;
        let sector = read.sector();
        let mut buffer = read.into_buffer();
        let footer = SectorFooter::decode(buffer.sector());
        buffer.set_sample_count(u32::from(footer.sample_count));
        pool.submit(buffer);
        trace!("track {}: sector {} submitted ({} samples)", self.track_id, sector, footer.sample_count);

        self.head = (self.head + 1) % N;
        self.in_flight -= 1;
        Some(SubmittedBuffer { sector, sample_count: footer.sample_count })
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: in_flight < N checked by caller; wraps via % N
    fn push_tail(&mut self, read: InFlightRead<P::Buffer, D::Handle>) {
        let tail = (self.head + self.in_flight) % N;
        if let Some(slot) = self.slots.get_mut(tail) {
            debug_assert!(slot.is_none());
            *slot = Some(read);
            self.in_flight += 1;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Track most recently started on this channel.
    pub fn track_id(&self) -> u16 {
        self.track_id
    }

    /// Sectors requested so far for the current track.
    pub fn sector_index(&self) -> u16 {
        self.sector_index
    }

    /// Sectors in the current track.
    pub fn sector_count(&self) -> u16 {
        self.sector_count
    }

    /// Reads issued but not yet submitted.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Slot capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Every sector requested and every read submitted.
    pub fn is_exhausted(&self) -> bool {
        self.sector_index >= self.sector_count && self.in_flight == 0
    }
}

impl<D, P, const N: usize> Default for TrackStream<D, P, N>
where
    D: BlockDevice,
    P: BufferPool,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use platform::mocks::{tagged_sector, MockBlockDevice, MockBufferPool};

    type Stream<const N: usize> = TrackStream<MockBlockDevice, MockBufferPool, N>;

    /// Image where sector `s` is tagged `s` and reports `s + 1` samples.
    fn device(sectors: u32) -> MockBlockDevice {
        MockBlockDevice::new(
            (0..sectors).map(|s| tagged_sector(s, u8::try_from(s + 1).unwrap())).collect(),
        )
    }

    fn track(first_sector: u32, sector_count: u16) -> TrackLocation {
        TrackLocation { track_id: 7, first_sector, sector_count }
    }

    #[test]
    fn starts_idle() {
        let stream: Stream<3> = Stream::new();
        assert_eq!(stream.state(), ChannelState::Idle);
        assert_eq!(stream.capacity(), 3);
        assert!(stream.is_exhausted());
    }

    #[test]
    fn idle_tick_does_nothing() {
        let mut dev = device(4);
        let mut pool = MockBufferPool::new(3);
        let mut stream: Stream<3> = Stream::new();
        assert_eq!(stream.tick(&mut dev, &mut pool), TickReport::default());
        assert_eq!(pool.acquire_calls(), 0);
    }

    #[test]
    fn fills_capacity_one_read_per_tick_then_waits() {
        let mut dev = device(16).manual_completion();
        let mut pool = MockBufferPool::new(8);
        let mut stream: Stream<3> = Stream::new();
        stream.start(track(10, 5)).unwrap();

        for expected in [10, 11, 12] {
            assert_eq!(stream.tick(&mut dev, &mut pool).issued, Some(expected));
        }
        assert_eq!(stream.in_flight(), 3);
        // Slots full: no fourth read until the head completes.
        assert_eq!(stream.tick(&mut dev, &mut pool).issued, None);
        assert_eq!(dev.issued_sectors(), vec![10, 11, 12]);

        dev.complete_sector(10);
        let report = stream.tick(&mut dev, &mut pool);
        assert_eq!(report.submitted, Some(SubmittedBuffer { sector: 10, sample_count: 11 }));
        assert_eq!(report.issued, Some(13));
    }

    #[test]
    fn submits_in_sector_order_despite_out_of_order_completion() {
        let mut dev = device(8).manual_completion();
        let mut pool = MockBufferPool::recycling(8);
        let mut stream: Stream<3> = Stream::new();
        stream.start(track(2, 5)).unwrap();
        for _ in 0..3 {
            stream.tick(&mut dev, &mut pool);
        }

        // Later reads land first: nothing may be submitted past the head.
        dev.complete_sector(4);
        dev.complete_sector(3);
        for _ in 0..3 {
            assert_eq!(stream.tick(&mut dev, &mut pool).submitted, None);
        }

        dev.complete_all();
        let mut guard = 0;
        while stream.state() != ChannelState::Idle {
            dev.complete_all();
            stream.tick(&mut dev, &mut pool);
            guard += 1;
            assert!(guard < 50, "stream never finished");
        }
        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![2, 3, 4, 5, 6]);
        assert_eq!(dev.issued_sectors(), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn sample_count_comes_from_footer() {
        let mut dev = device(4);
        let mut pool = MockBufferPool::recycling(4);
        let mut stream: Stream<2> = Stream::new();
        stream.start(track(1, 2)).unwrap();
        while stream.state() != ChannelState::Idle {
            stream.tick(&mut dev, &mut pool);
        }
        let counts: Vec<u32> = pool.submissions().iter().map(|s| s.sample_count).collect();
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn drains_before_going_idle() {
        let mut dev = device(4).manual_completion();
        let mut pool = MockBufferPool::recycling(4);
        let mut stream: Stream<3> = Stream::new();
        stream.start(track(0, 2)).unwrap();
        stream.tick(&mut dev, &mut pool);
        assert_eq!(stream.state(), ChannelState::Streaming);
        stream.tick(&mut dev, &mut pool);
        assert_eq!(stream.state(), ChannelState::Draining);
        assert_eq!(stream.start(track(0, 1)), Err(StreamError::Busy));

        dev.complete_all();
        assert!(!stream.tick(&mut dev, &mut pool).finished);
        let last = stream.tick(&mut dev, &mut pool);
        assert!(last.finished);
        assert_eq!(stream.state(), ChannelState::Idle);
        assert!(stream.start(track(0, 1)).is_ok());
        assert_eq!(stream.sector_index(), 0);
    }

    #[test]
    fn empty_track_finishes_without_reads() {
        let mut dev = device(1);
        let mut pool = MockBufferPool::new(1);
        let mut stream: Stream<3> = Stream::new();
        stream.start(track(0, 0)).unwrap();
        let report = stream.tick(&mut dev, &mut pool);
        assert!(report.finished);
        assert_eq!(report.issued, None);
        assert!(dev.issued_sectors().is_empty());
    }

    #[test]
    fn refuses_track_past_last_sector() {
        let mut stream: Stream<3> = Stream::new();
        assert_eq!(stream.start(track(u32::MAX - 1, 4)), Err(StreamError::SectorRangeOverflow));
        assert_eq!(stream.state(), ChannelState::Idle);
        assert!(stream.start(track(u32::MAX - 1, 2)).is_ok());
    }

    #[test]
    fn backpressure_holds_sector_index() {
        let mut dev = device(8);
        let mut pool = MockBufferPool::recycling(4);
        let mut stream: Stream<3> = Stream::new();
        stream.start(track(0, 4)).unwrap();
        pool.set_exhausted(true);
        for _ in 0..5 {
            let report = stream.tick(&mut dev, &mut pool);
            assert!(report.backpressure);
            assert_eq!(stream.sector_index(), 0);
        }
        pool.set_exhausted(false);
        assert_eq!(stream.tick(&mut dev, &mut pool).issued, Some(0));
        assert_eq!(stream.sector_index(), 1);
    }

    #[test]
    fn stalled_head_blocks_only_this_channel() {
        let mut dev = device(8);
        dev.fail_sector(0);
        let mut pool = MockBufferPool::recycling(8);
        let mut stream: Stream<2> = Stream::new();
        stream.start(track(0, 4)).unwrap();
        for _ in 0..10 {
            assert_eq!(stream.tick(&mut dev, &mut pool).submitted, None);
        }
        assert_eq!(stream.in_flight(), 2);
        assert_eq!(stream.sector_index(), 2);
        assert!(pool.submissions().is_empty());
    }

    #[test]
    fn head_wraps_around_slot_array() {
        let mut dev = device(12);
        let mut pool = MockBufferPool::recycling(2);
        let mut stream: Stream<2> = Stream::new();
        stream.start(track(0, 9)).unwrap();
        while stream.state() != ChannelState::Idle {
            stream.tick(&mut dev, &mut pool);
        }
        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, (0..9).collect::<Vec<_>>());
    }
}
