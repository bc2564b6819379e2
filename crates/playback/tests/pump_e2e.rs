//! End-to-end pump tests: image written to disk, served by `FileBlockDevice`
//! or the in-memory mock, streamed through `AudioEngine` into a mock pool.

// Test files legitimately index and unwrap; allow at file level.
#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use library::footer::SectorFooter;
use library::writer::{encode_sector, AudioImageWriter, SAMPLES_PER_SECTOR};
use platform::audio_config::{AUDIO_MAP_SECTOR, BUFFER_POOL_SIZE};
use platform::mocks::{MockBlockDevice, MockBufferPool};
use platform::storage_local::FileBlockDevice;
use playback::{AudioEngine, Channel, ChannelState};
use tempfile::TempDir;

/// Two tracks: 3 full sectors then a 1-sector tail of 40 samples, and one
/// 2-sector track.
fn image() -> Vec<u8> {
    let mut w = AudioImageWriter::new();
    w.add_track_pcm(&vec![1i16; SAMPLES_PER_SECTOR * 3 + 40]).unwrap();
    w.add_track_pcm(&vec![2i16; SAMPLES_PER_SECTOR * 2]).unwrap();
    w.finish()
}

fn expected_counts(image: &[u8], first: usize, count: usize) -> Vec<u32> {
    (first..first + count)
        .map(|s| {
            let sector: [u8; 512] = image[s * 512..(s + 1) * 512].try_into().unwrap();
            u32::from(SectorFooter::decode(&sector).sample_count)
        })
        .collect()
}

#[test]
fn both_tracks_play_once_from_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("audio.img");
    let bytes = image();
    std::fs::write(&path, &bytes).unwrap();

    let mut engine: AudioEngine<FileBlockDevice, MockBufferPool> =
        AudioEngine::new(FileBlockDevice::open(&path).unwrap());
    engine.load_audio_map_from_storage(AUDIO_MAP_SECTOR).unwrap();
    engine.playlist_set_loop(false);
    engine.playlist_enqueue(0).unwrap();
    engine.playlist_enqueue(1).unwrap();

    let mut pool = MockBufferPool::recycling(BUFFER_POOL_SIZE);
    let mut pumps = 0;
    while !engine.is_idle() {
        engine.pump(&mut pool);
        pumps += 1;
        assert!(pumps < 1_000);
    }

    // Track 1 was enqueued last so it plays first: sectors 5..7, then 1..5.
    let counts: Vec<u32> = pool.submissions().iter().map(|s| s.sample_count).collect();
    let mut expected = expected_counts(&bytes, 5, 2);
    expected.extend(expected_counts(&bytes, 1, 4));
    assert_eq!(counts, expected);
    assert_eq!(counts, vec![254, 254, 254, 254, 254, 40]);
}

#[test]
fn submissions_follow_sector_order_under_random_latency() {
    let bytes = image();
    // Every read needs a few polls; the channel keeps three in flight.
    let device = MockBlockDevice::from_image(&bytes).with_latency(3);
    let mut engine: AudioEngine<MockBlockDevice, MockBufferPool> = AudioEngine::new(device);
    engine.load_audio_map_from_storage(AUDIO_MAP_SECTOR).unwrap();
    engine.playlist_set_loop(false);
    engine.playlist_enqueue(0).unwrap();

    let mut pool = MockBufferPool::recycling(BUFFER_POOL_SIZE);
    let mut max_in_flight = 0;
    while !engine.is_idle() {
        engine.pump(&mut pool);
        max_in_flight = max_in_flight.max(engine.stream(Channel::Bgm).in_flight());
    }
    assert_eq!(max_in_flight, 3);
    assert_eq!(engine.device().issued_sectors(), vec![1, 2, 3, 4]);
    let counts: Vec<u32> = pool.submissions().iter().map(|s| s.sample_count).collect();
    assert_eq!(counts, vec![254, 254, 254, 40]);
}

#[test]
fn exhausted_pool_defers_reads_without_losing_position() {
    let bytes = image();
    let mut engine: AudioEngine<MockBlockDevice, MockBufferPool> =
        AudioEngine::new(MockBlockDevice::from_image(&bytes));
    engine.load_audio_map_from_storage(AUDIO_MAP_SECTOR).unwrap();
    engine.playlist_set_loop(false);
    engine.playlist_enqueue(0).unwrap();

    let mut pool = MockBufferPool::recycling(BUFFER_POOL_SIZE);
    engine.pump(&mut pool);
    engine.pump(&mut pool);
    let held = engine.stream(Channel::Bgm).sector_index();
    assert_eq!(held, 2);

    pool.set_exhausted(true);
    for _ in 0..10 {
        let report = engine.pump(&mut pool);
        assert_eq!(report.bgm.tick.issued, None);
        assert_eq!(engine.stream(Channel::Bgm).sector_index(), held);
    }
    // Reads already in flight still drain while the pool is dry.
    assert_eq!(engine.stream(Channel::Bgm).in_flight(), 0);
    assert_eq!(engine.channel_state(Channel::Bgm), ChannelState::Streaming);

    pool.set_exhausted(false);
    let report = engine.pump(&mut pool);
    assert_eq!(report.bgm.tick.issued, Some(1 + u32::from(held)));
    while !engine.is_idle() {
        engine.pump(&mut pool);
    }
    assert_eq!(engine.device().issued_sectors(), vec![1, 2, 3, 4]);
    assert_eq!(pool.submissions().len(), 4);
}

#[test]
fn playing_pool_limits_read_ahead() {
    // Buffers stay in playback until drained, as on hardware.
    let mut engine: AudioEngine<MockBlockDevice, MockBufferPool> =
        AudioEngine::new(MockBlockDevice::from_image(&image()));
    engine.load_audio_map_from_storage(AUDIO_MAP_SECTOR).unwrap();
    engine.playlist_set_loop(false);
    engine.playlist_enqueue(0).unwrap();
    let mut pool = MockBufferPool::new(2);

    for _ in 0..10 {
        engine.pump(&mut pool);
    }
    assert_eq!(pool.submissions().len(), 2);
    assert_eq!(pool.playing_count(), 2);

    pool.drain_playback();
    while !engine.is_idle() {
        engine.pump(&mut pool);
        pool.drain_playback();
    }
    assert_eq!(pool.submissions().len(), 4);
}

#[test]
fn handcrafted_sectors_keep_their_footer() {
    let mut w = AudioImageWriter::new();
    w.add_track_sectors(vec![encode_sector(&[5; 7]), encode_sector(&[6; 255])]).unwrap();
    let mut engine: AudioEngine<MockBlockDevice, MockBufferPool> =
        AudioEngine::new(MockBlockDevice::from_image(&w.finish()));
    engine.load_audio_map_from_storage(AUDIO_MAP_SECTOR).unwrap();
    assert!(engine.sfx_request(0, 1));
    let mut pool = MockBufferPool::recycling(2);
    while !engine.is_idle() {
        engine.pump(&mut pool);
    }
    let counts: Vec<u32> = pool.submissions().iter().map(|s| s.sample_count).collect();
    assert_eq!(counts, vec![7, 254]);
}
