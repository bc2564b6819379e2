//! End-to-end tests: AudioImageWriter → disk → FileBlockDevice → AudioMap.
//!
//! No mocks. Uses tempfiles. Tests the complete lookup path as it runs on real
//! hardware (with FileBlockDevice substituting for the SD card).

// Test files legitimately index and unwrap; allow at file level.
#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use library::footer::SectorFooter;
use library::writer::{AudioImageWriter, SAMPLES_PER_SECTOR};
use library::{read_audio_map, MapError, MapLoadError, TrackLocation};
use platform::audio_config::{AUDIO_MAP_SECTOR, SECTOR_SIZE};
use platform::storage_local::FileBlockDevice;
use platform::BlockDevice;
use tempfile::TempDir;

fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| i16::try_from(i % 1000).unwrap()).collect()
}

fn write_image(tmp: &TempDir, tracks: &[usize]) -> std::path::PathBuf {
    let mut w = AudioImageWriter::new();
    for &len in tracks {
        w.add_track_pcm(&ramp(len)).unwrap();
    }
    let path = tmp.path().join("audio.img");
    w.write_to(&path).unwrap();
    path
}

#[test]
fn e2e_map_resolves_every_track() {
    let tmp = TempDir::new().unwrap();
    let path = write_image(&tmp, &[SAMPLES_PER_SECTOR * 3, 10, SAMPLES_PER_SECTOR + 1]);
    let mut dev = FileBlockDevice::open(&path).unwrap();
    let map = read_audio_map(&mut dev, AUDIO_MAP_SECTOR).unwrap();

    assert_eq!(map.track_count(), 3);
    let locations: Vec<_> = map.entries().collect();
    assert_eq!(
        locations,
        vec![
            TrackLocation { track_id: 0, first_sector: 1, sector_count: 3 },
            TrackLocation { track_id: 1, first_sector: 4, sector_count: 1 },
            TrackLocation { track_id: 2, first_sector: 5, sector_count: 2 },
        ]
    );
    assert_eq!(dev.sector_count(), 7);
}

#[test]
fn e2e_last_sector_of_track_reports_partial_count() {
    let tmp = TempDir::new().unwrap();
    let path = write_image(&tmp, &[SAMPLES_PER_SECTOR + 5]);
    let mut dev = FileBlockDevice::open(&path).unwrap();
    let map = read_audio_map(&mut dev, AUDIO_MAP_SECTOR).unwrap();
    let loc = map.lookup(0).unwrap();

    let mut sector = [0u8; SECTOR_SIZE];
    dev.read_sync(loc.first_sector, &mut sector).unwrap();
    assert_eq!(usize::from(SectorFooter::decode(&sector).sample_count), SAMPLES_PER_SECTOR);
    dev.read_sync(loc.first_sector + 1, &mut sector).unwrap();
    assert_eq!(SectorFooter::decode(&sector).sample_count, 5);
}

#[test]
fn e2e_unknown_track_after_last_record() {
    let tmp = TempDir::new().unwrap();
    let path = write_image(&tmp, &[10, 10]);
    let mut dev = FileBlockDevice::open(&path).unwrap();
    let map = read_audio_map(&mut dev, AUDIO_MAP_SECTOR).unwrap();
    // Record 2 is zero-filled: its id field reads 0, not 2.
    assert_eq!(map.lookup(2), Err(MapError::UnknownTrack(2)));
}

#[test]
fn e2e_non_audio_image_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("garbage.img");
    std::fs::write(&path, vec![0x55u8; SECTOR_SIZE * 2]).unwrap();
    let mut dev = FileBlockDevice::open(&path).unwrap();
    assert!(matches!(
        read_audio_map(&mut dev, AUDIO_MAP_SECTOR),
        Err(MapLoadError::Format(MapError::InvalidFormat))
    ));
}
