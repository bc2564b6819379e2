//! The audio engine: one owned context driving BGM and SFX.
//!
//! `AudioEngine` holds everything the pump loop touches (the block device,
//! the active audio map, the playlist, the SFX slot and both channel
//! streams) so several engines can coexist and tests can build one per case.
//!
//! The caller drives the engine by calling [`AudioEngine::pump`] more often
//! than one buffer takes to play (see
//! [`StreamFormat::buffer_duration_us`](platform::audio_config::StreamFormat::buffer_duration_us)).
//! A pump never blocks.

use library::audio_map::{read_audio_map, AudioMap, MapError, MapLoadError, TrackLocation};
use platform::audio::BufferPool;
use platform::audio_config::{BUFFERS_PER_CHANNEL, PLAYLIST_CAPACITY, SECTOR_SIZE};
use platform::storage::BlockDevice;

use crate::playlist::{Playlist, PlaylistError};
use crate::sfx::SfxSlot;
use crate::stream::{ChannelState, TickReport, TrackStream};

/// The two playback channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Background music, fed from the playlist.
    Bgm,
    /// Sound effects, fed from the SFX slot.
    Sfx,
}

impl Channel {
    /// Short name for log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bgm => "bgm",
            Self::Sfx => "sfx",
        }
    }
}

/// What one pump did on a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReport {
    /// Track started on this channel during the pump.
    pub started: Option<u16>,
    /// Track dropped because the map has no record for it.
    pub skipped: Option<u16>,
    /// Result of the channel tick.
    pub tick: TickReport,
}

/// What one pump did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PumpReport {
    /// Background music channel.
    pub bgm: ChannelReport,
    /// Sound effect channel.
    pub sfx: ChannelReport,
}

impl PumpReport {
    /// Buffers handed to the pool across both channels.
    pub fn submitted(&self) -> usize {
        usize::from(self.bgm.tick.submitted.is_some())
            .saturating_add(usize::from(self.sfx.tick.submitted.is_some()))
    }
}

type Stream<D, P> = TrackStream<D, P, BUFFERS_PER_CHANNEL>;

/// Streaming audio engine.
///
/// `M` is the backing storage of the audio map; it defaults to a single
/// sector as read from the card.
pub struct AudioEngine<D, P, M = [u8; SECTOR_SIZE]>
where
    D: BlockDevice,
    P: BufferPool,
{
    device: D,
    map: Option<AudioMap<M>>,
    playlist: Playlist<PLAYLIST_CAPACITY>,
    sfx: SfxSlot,
    bgm_stream: Stream<D, P>,
    sfx_stream: Stream<D, P>,
}

impl<D, P, M> AudioEngine<D, P, M>
where
    D: BlockDevice,
    P: BufferPool,
    M: AsRef<[u8]>,
{
    /// Engine with no map, an empty looping playlist and both channels idle.
    pub fn new(device: D) -> Self {
        Self {
            device,
            map: None,
            playlist: Playlist::new(),
            sfx: SfxSlot::new(),
            bgm_stream: TrackStream::new(),
            sfx_stream: TrackStream::new(),
        }
    }

    /// Validate `raw` and make it the active map.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidFormat`] on a bad magic header. The
    /// previously active map, if any, stays in place.
    pub fn load_audio_map(&mut self, raw: M) -> Result<(), MapError> {
        match AudioMap::parse(raw) {
            Ok(map) => {
                self.install_audio_map(map);
                Ok(())
            }
            Err(e) => {
                warn!("audio map rejected, keeping previous map: {}", e);
                Err(e)
            }
        }
    }

    /// Make an already validated map the active one.
    pub fn install_audio_map(&mut self, map: AudioMap<M>) {
        info!("audio map installed: {} tracks", map.track_count());
        self.map = Some(map);
    }

    /// Active audio map.
    pub fn audio_map(&self) -> Option<&AudioMap<M>> {
        self.map.as_ref()
    }

    /// Drop every queued BGM track. The track already streaming finishes.
    pub fn playlist_clear(&mut self) {
        self.playlist.clear();
    }

    /// Queue a BGM track. The most recently enqueued track plays first.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::Full`] when the playlist is at capacity.
    pub fn playlist_enqueue(&mut self, track_id: u16) -> Result<(), PlaylistError> {
        self.playlist.enqueue(track_id)
    }

    /// Re-queue each BGM track after it starts.
    pub fn playlist_set_loop(&mut self, looping: bool) {
        self.playlist.set_loop(looping);
    }

    /// Queued BGM tracks.
    pub fn playlist(&self) -> &Playlist<PLAYLIST_CAPACITY> {
        &self.playlist
    }

    /// Ask for a sound effect; see [`SfxSlot::request`].
    pub fn sfx_request(&mut self, track_id: u16, priority: u8) -> bool {
        self.sfx.request(track_id, priority)
    }

    /// Pending SFX request.
    pub fn sfx_slot(&self) -> &SfxSlot {
        &self.sfx
    }

    /// Run one pump cycle.
    ///
    /// 1. An idle BGM channel takes the next playlist entry.
    /// 2. An idle SFX channel takes the pending request.
    /// 3. Both channels tick, whether or not a track started.
    ///
    /// A track missing from the map is logged and skipped; its channel stays
    /// idle until the next pump.
    pub fn pump(&mut self, pool: &mut P) -> PumpReport {
        let mut report = PumpReport::default();

        if self.bgm_stream.state() == ChannelState::Idle {
            if let Some(track_id) = self.playlist.advance() {
                self.assign(Channel::Bgm, track_id, &mut report.bgm);
            }
        }
        if self.sfx_stream.state() == ChannelState::Idle {
            if let Some(request) = self.sfx.take() {
                trace!("sfx request {} (prio {}) taken", request.track_id, request.priority);
                self.assign(Channel::Sfx, request.track_id, &mut report.sfx);
            }
        }

        report.bgm.tick = self.bgm_stream.tick(&mut self.device, pool);
        report.sfx.tick = self.sfx_stream.tick(&mut self.device, pool);
        report
    }

    fn assign(&mut self, channel: Channel, track_id: u16, report: &mut ChannelReport) {
        let location = match self.resolve(track_id) {
            Ok(location) => location,
            Err(e) => {
                warn!("{}: skipping track: {}", channel.name(), e);
                report.skipped = Some(track_id);
                return;
            }
        };
        match self.stream_mut(channel).start(location) {
            Ok(()) => {
                debug!(
                    "{}: track {} started at sector {} ({} sectors)",
                    channel.name(),
                    track_id,
                    location.first_sector,
                    location.sector_count
                );
                report.started = Some(track_id);
            }
            Err(e) => {
                warn!("{}: skipping track {}: {}", channel.name(), track_id, e);
                report.skipped = Some(track_id);
            }
        }
    }

    fn resolve(&self, track_id: u16) -> Result<TrackLocation, MapError> {
        self.map.as_ref().ok_or(MapError::UnknownTrack(track_id))?.lookup(track_id)
    }

    /// Pump until both channels are idle with nothing queued, yielding to the
    /// executor between pumps. Returns the number of pumps run, at most
    /// `max_pumps`.
    ///
    /// With a looping, non-empty playlist the engine never goes idle, so this
    /// only returns once `max_pumps` is reached.
    pub async fn run_until_idle(&mut self, pool: &mut P, max_pumps: usize) -> usize {
        let mut pumps = 0;
        while pumps < max_pumps && !self.is_idle() {
            self.pump(pool);
            pumps = pumps.saturating_add(1);
            embassy_futures::yield_now().await;
        }
        pumps
    }

    /// State of one channel.
    pub fn channel_state(&self, channel: Channel) -> ChannelState {
        self.stream(channel).state()
    }

    /// Streaming state of one channel.
    pub fn stream(&self, channel: Channel) -> &Stream<D, P> {
        match channel {
            Channel::Bgm => &self.bgm_stream,
            Channel::Sfx => &self.sfx_stream,
        }
    }

    fn stream_mut(&mut self, channel: Channel) -> &mut Stream<D, P> {
        match channel {
            Channel::Bgm => &mut self.bgm_stream,
            Channel::Sfx => &mut self.sfx_stream,
        }
    }

    /// Both channels idle, the playlist empty and no SFX pending.
    pub fn is_idle(&self) -> bool {
        self.bgm_stream.state() == ChannelState::Idle
            && self.sfx_stream.state() == ChannelState::Idle
            && self.playlist.is_empty()
            && self.sfx.pending().is_none()
    }

    /// Storage the engine reads from.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the storage, e.g. to swap cards between pumps.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D, P> AudioEngine<D, P>
where
    D: BlockDevice,
    P: BufferPool,
{
    /// Read the audio map from `sector` of the engine's own device and make
    /// it active.
    ///
    /// # Errors
    ///
    /// Returns [`MapLoadError::Io`] if the sector cannot be read and
    /// [`MapLoadError::Format`] on a bad magic header. Either way the
    /// previous map stays active.
    pub fn load_audio_map_from_storage(&mut self, sector: u32) -> Result<(), MapLoadError<D::Error>> {
        match read_audio_map(&mut self.device, sector) {
            Ok(map) => {
                self.install_audio_map(map);
                Ok(())
            }
            Err(e) => {
                warn!("audio map at sector {} not loaded", sector);
                Err(e)
            }
        }
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
    use library::audio_map::MAGIC;
    use platform::mocks::{tagged_sector, MockBlockDevice, MockBufferPool};
    use platform::storage::Sector;

    type Engine = AudioEngine<MockBlockDevice, MockBufferPool, Vec<u8>>;

    fn map_bytes(records: &[(u16, u32, u16)]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&u16::try_from(records.len()).unwrap().to_le_bytes());
        for &(id, sector, count) in records {
            bytes.extend_from_slice(&id.to_le_bytes());
            bytes.extend_from_slice(&sector.to_le_bytes());
            bytes.extend_from_slice(&count.to_le_bytes());
        }
        bytes
    }

    /// Sector `s` is tagged `s` and carries `s % 200 + 1` samples.
    fn sectors(n: u32) -> Vec<Sector> {
        (0..n).map(|s| tagged_sector(s, u8::try_from(s % 200 + 1).unwrap())).collect()
    }

    fn engine(records: &[(u16, u32, u16)]) -> Engine {
        let mut engine = Engine::new(MockBlockDevice::new(sectors(64)));
        engine.load_audio_map(map_bytes(records)).unwrap();
        engine
    }

    fn pump_until_idle(engine: &mut Engine, pool: &mut MockBufferPool) {
        for _ in 0..500 {
            if engine.is_idle() {
                return;
            }
            engine.pump(pool);
        }
        panic!("engine never went idle");
    }

    #[test]
    fn new_engine_is_idle() {
        let engine = Engine::new(MockBlockDevice::new(vec![]));
        assert!(engine.is_idle());
        assert!(engine.audio_map().is_none());
        assert_eq!(engine.channel_state(Channel::Bgm), ChannelState::Idle);
        assert_eq!(engine.channel_state(Channel::Sfx), ChannelState::Idle);
    }

    #[test]
    fn bad_map_keeps_previous_one() {
        let mut engine = engine(&[(0, 1, 2)]);
        let mut bad = map_bytes(&[(0, 9, 9)]);
        bad[0] = b'X';
        assert_eq!(engine.load_audio_map(bad), Err(MapError::InvalidFormat));
        assert_eq!(engine.audio_map().unwrap().lookup(0).unwrap().first_sector, 1);
    }

    #[test]
    fn good_map_replaces_previous_one() {
        let mut engine = engine(&[(0, 1, 2)]);
        engine.load_audio_map(map_bytes(&[(0, 5, 1)])).unwrap();
        assert_eq!(engine.audio_map().unwrap().lookup(0).unwrap().first_sector, 5);
    }

    #[test]
    fn without_map_tracks_are_skipped() {
        let mut engine = Engine::new(MockBlockDevice::new(sectors(4)));
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(0).unwrap();
        let report = engine.pump(&mut pool);
        assert_eq!(report.bgm.skipped, Some(0));
        assert_eq!(report.bgm.started, None);
        assert_eq!(engine.channel_state(Channel::Bgm), ChannelState::Idle);
        assert!(engine.device().issued_sectors().is_empty());
    }

    #[test]
    fn unknown_track_is_skipped_and_next_one_plays() {
        let mut engine = engine(&[(0, 1, 2)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(0).unwrap();
        engine.playlist_enqueue(9).unwrap();

        let first = engine.pump(&mut pool);
        assert_eq!(first.bgm.skipped, Some(9));
        let second = engine.pump(&mut pool);
        assert_eq!(second.bgm.started, Some(0));
        pump_until_idle(&mut engine, &mut pool);
        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![1, 2]);
    }

    #[test]
    fn playlist_plays_most_recent_first() {
        let mut engine = engine(&[(0, 1, 2), (1, 10, 3)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(0).unwrap();
        engine.playlist_enqueue(1).unwrap();
        pump_until_idle(&mut engine, &mut pool);

        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![10, 11, 12, 1, 2]);
        let counts: Vec<u32> = pool.submissions().iter().map(|s| s.sample_count).collect();
        assert_eq!(counts, vec![11, 12, 13, 2, 3]);
    }

    #[test]
    fn looping_playlist_restarts_tracks() {
        let mut engine = engine(&[(0, 1, 1)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_enqueue(0).unwrap();
        let started = (0..20).filter(|_| engine.pump(&mut pool).bgm.started.is_some()).count();
        assert!(started >= 3, "looping track started only {started} times");
        assert!(!engine.is_idle());
    }

    #[test]
    fn bgm_and_sfx_stream_side_by_side() {
        let mut engine = engine(&[(0, 1, 4), (1, 20, 2)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(0).unwrap();
        assert!(engine.sfx_request(1, 3));

        let report = engine.pump(&mut pool);
        assert_eq!(report.bgm.started, Some(0));
        assert_eq!(report.sfx.started, Some(1));
        assert_eq!(report.bgm.tick.issued, Some(1));
        assert_eq!(report.sfx.tick.issued, Some(20));

        pump_until_idle(&mut engine, &mut pool);
        let mut tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![1, 2, 3, 4, 20, 21]);
    }

    #[test]
    fn playing_sfx_is_not_preempted() {
        let mut engine = engine(&[(0, 1, 3), (1, 10, 1), (2, 20, 1)]);
        let mut pool = MockBufferPool::recycling(6);
        assert!(engine.sfx_request(0, 1));
        assert_eq!(engine.pump(&mut pool).sfx.started, Some(0));

        // The running effect keeps the channel; higher priorities only fight
        // over the pending slot.
        assert!(engine.sfx_request(1, 5));
        assert!(engine.sfx_request(2, 9));
        assert!(!engine.sfx_request(1, 9));
        let report = engine.pump(&mut pool);
        assert_eq!(report.sfx.started, None);
        assert_eq!(engine.stream(Channel::Sfx).track_id(), 0);

        pump_until_idle(&mut engine, &mut pool);
        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![1, 2, 3, 20]);
    }

    #[test]
    fn stalled_sfx_does_not_block_bgm() {
        let mut engine = engine(&[(0, 1, 3), (1, 30, 2)]);
        engine.device_mut().fail_sector(30);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(0).unwrap();
        engine.sfx_request(1, 1);

        for _ in 0..20 {
            engine.pump(&mut pool);
        }
        assert_eq!(engine.channel_state(Channel::Bgm), ChannelState::Idle);
        assert_ne!(engine.channel_state(Channel::Sfx), ChannelState::Idle);
        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn sfx_missing_from_map_is_consumed_and_skipped() {
        let mut engine = engine(&[(0, 1, 2)]);
        let mut pool = MockBufferPool::recycling(6);
        assert!(engine.sfx_request(9, 1));

        let report = engine.pump(&mut pool);
        assert_eq!(report.sfx.skipped, Some(9));
        assert_eq!(report.sfx.started, None);
        assert_eq!(engine.channel_state(Channel::Sfx), ChannelState::Idle);
        assert_eq!(engine.sfx_slot().pending(), None);
        assert!(engine.device().issued_sectors().is_empty());
        assert!(engine.is_idle());
    }

    #[test]
    fn track_running_past_last_sector_is_skipped() {
        let mut engine = engine(&[(0, u32::MAX - 1, 4), (1, 1, 2)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(1).unwrap();
        engine.playlist_enqueue(0).unwrap();

        let first = engine.pump(&mut pool);
        assert_eq!(first.bgm.skipped, Some(0));
        assert_eq!(first.bgm.started, None);
        pump_until_idle(&mut engine, &mut pool);
        assert_eq!(engine.device().issued_sectors(), vec![1, 2]);
        let tags: Vec<u32> = pool.submissions().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![1, 2]);
    }

    #[test]
    fn loads_map_from_storage() {
        let mut raw = [0u8; SECTOR_SIZE];
        let bytes = map_bytes(&[(0, 1, 1)]);
        raw[..bytes.len()].copy_from_slice(&bytes);
        let mut image = vec![raw];
        image.extend(sectors(4).into_iter().skip(1));

        let mut engine: AudioEngine<MockBlockDevice, MockBufferPool> =
            AudioEngine::new(MockBlockDevice::new(image));
        engine.load_audio_map_from_storage(0).unwrap();
        assert_eq!(engine.device().sync_reads(), &[0]);
        assert_eq!(engine.audio_map().unwrap().track_count(), 1);

        assert!(matches!(
            engine.load_audio_map_from_storage(99),
            Err(MapLoadError::Io(_))
        ));
        assert!(matches!(
            engine.load_audio_map_from_storage(2),
            Err(MapLoadError::Format(MapError::InvalidFormat))
        ));
        assert!(engine.audio_map().is_some());
    }

    #[tokio::test]
    async fn run_until_idle_stops_when_done() {
        let mut engine = engine(&[(0, 1, 5)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_set_loop(false);
        engine.playlist_enqueue(0).unwrap();
        let pumps = engine.run_until_idle(&mut pool, 100).await;
        assert!(pumps < 100);
        assert!(engine.is_idle());
        assert_eq!(pool.submissions().len(), 5);
    }

    #[tokio::test]
    async fn run_until_idle_is_bounded() {
        let mut engine = engine(&[(0, 1, 1)]);
        let mut pool = MockBufferPool::recycling(6);
        engine.playlist_enqueue(0).unwrap();
        assert_eq!(engine.run_until_idle(&mut pool, 25).await, 25);
    }
}
