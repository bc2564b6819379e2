//! xtask inspect: dump the audio map of an image and check its tracks.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use library::{read_audio_map, SectorFooter, TrackLocation};
use platform::audio_config::{AUDIO_MAP_SECTOR, SECTOR_SIZE};
use platform::storage_local::FileBlockDevice;
use platform::BlockDevice;

/// One map record plus what the image actually holds for it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TrackReport {
    pub location: TrackLocation,
    /// Sum of the footer sample counts.
    pub samples: u64,
    /// The record points past the end of the image.
    pub truncated: bool,
}

/// Entry point called from main.rs
pub fn run(image: &Path) -> Result<()> {
    let tracks = inspect(image)?;
    println!();
    println!("{}", format!("🔍 {}: {} tracks", image.display(), tracks.len()).cyan().bold());
    for track in &tracks {
        let loc = track.location;
        let line = format!(
            "  track {:>3}  sectors {:>6}..{:<6}  {:>9} samples",
            loc.track_id,
            loc.first_sector,
            u64::from(loc.first_sector).saturating_add(u64::from(loc.sector_count)),
            track.samples
        );
        if track.truncated {
            println!("{}", format!("{line}  ✗ past end of image").red());
        } else {
            println!("{line}");
        }
    }
    if tracks.iter().any(|t| t.truncated) {
        bail!("image is truncated");
    }
    Ok(())
}

pub(crate) fn inspect(image: &Path) -> Result<Vec<TrackReport>> {
    let mut device = FileBlockDevice::open(image)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("opening {}", image.display()))?;
    let map = read_audio_map(&mut device, AUDIO_MAP_SECTOR)
        .map_err(|e| anyhow!("{e}"))
        .context("reading audio map")?;

    let mut reports = Vec::new();
    let mut sector = [0u8; SECTOR_SIZE];
    for location in map.entries() {
        let end = u64::from(location.first_sector).saturating_add(u64::from(location.sector_count));
        let truncated = end > device.sector_count();
        let mut samples = 0u64;
        if !truncated {
            for index in 0..location.sector_count {
                let at = location.first_sector.saturating_add(u32::from(index));
                device
                    .read_sync(at, &mut sector)
                    .map_err(|e| anyhow!("{e}"))
                    .with_context(|| format!("reading sector {at}"))?;
                samples = samples.saturating_add(u64::from(SectorFooter::decode(&sector).sample_count));
            }
        }
        reports.push(TrackReport { location, samples, truncated });
    }
    Ok(reports)
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
    use library::writer::AudioImageWriter;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reports_every_track() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image.bin");
        let mut w = AudioImageWriter::new();
        w.add_track_pcm(&vec![0i16; 300]).unwrap();
        w.add_track_pcm(&[0i16; 5]).unwrap();
        w.write_to(&path).unwrap();

        let tracks = inspect(&path).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].samples, 300);
        assert_eq!(tracks[0].location.sector_count, 2);
        assert_eq!(tracks[1].samples, 5);
        assert!(tracks.iter().all(|t| !t.truncated));
        assert!(run(&path).is_ok());
    }

    #[test]
    fn flags_records_past_the_end() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image.bin");
        let mut w = AudioImageWriter::new();
        w.add_track_pcm(&vec![0i16; 600]).unwrap();
        let mut image = w.finish();
        image.truncate(SECTOR_SIZE * 2);
        fs::write(&path, image).unwrap();

        let tracks = inspect(&path).unwrap();
        assert!(tracks[0].truncated);
        assert!(run(&path).is_err());
    }

    #[test]
    fn rejects_image_without_map() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.bin");
        fs::write(&path, vec![0u8; SECTOR_SIZE]).unwrap();
        assert!(inspect(&path).is_err());
    }
}
