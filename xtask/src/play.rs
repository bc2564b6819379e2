//! xtask play: run the streaming engine against an image on disk.
//!
//! The image is served by `FileBlockDevice`; submitted buffers go to a mock
//! pool that plays them out instantly, so the run measures what the engine
//! would hand to the DAC, not real time.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use platform::audio_config::{StreamFormat, AUDIO_MAP_SECTOR, BUFFER_POOL_SIZE};
use platform::mocks::MockBufferPool;
use platform::storage_local::FileBlockDevice;
use playback::{AudioEngine, Channel};

pub struct PlayOptions {
    /// BGM tracks in enqueue order.
    pub tracks: Vec<u16>,
    /// Sound effect and its priority.
    pub sfx: Option<(u16, u8)>,
    pub looping: bool,
    pub max_pumps: usize,
}

/// Outcome of a simulated run.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub pumps: usize,
    pub buffers: usize,
    pub samples: u64,
    /// `(channel, track)` in start order.
    pub started: Vec<(Channel, u16)>,
    pub skipped: Vec<u16>,
    /// Pumps on which some channel found no free buffer.
    pub backpressure_pumps: usize,
    /// Stopped at `max_pumps` rather than going idle.
    pub truncated: bool,
}

/// Entry point called from main.rs
pub fn run(image: &Path, options: &PlayOptions) -> Result<()> {
    println!();
    println!("{}", format!("▶ Streaming {}...", image.display()).cyan().bold());
    let summary = simulate(image, options)?;

    for (channel, track) in &summary.started {
        println!("  {} track {}", channel.name().dimmed(), track);
    }
    for track in &summary.skipped {
        println!("{}", format!("  ✗ track {track} skipped (not in map)").yellow());
    }

    let format = StreamFormat::default();
    let seconds = summary.samples as f64 / f64::from(format.sample_rate_hz);
    println!(
        "{}",
        format!(
            "  ✓ {} buffers, {} samples ({:.2}s of audio) in {} pumps",
            summary.buffers, summary.samples, seconds, summary.pumps
        )
        .green()
    );
    if summary.backpressure_pumps > 0 {
        println!("  {} pumps hit backpressure", summary.backpressure_pumps);
    }
    if summary.truncated {
        println!("{}", format!("  ⚠ stopped after {} pumps", summary.pumps).yellow());
    }
    Ok(())
}

pub(crate) fn simulate(image: &Path, options: &PlayOptions) -> Result<Summary> {
    let device = FileBlockDevice::open(image)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("opening {}", image.display()))?;
    let mut engine: AudioEngine<FileBlockDevice, MockBufferPool> = AudioEngine::new(device);
    engine
        .load_audio_map_from_storage(AUDIO_MAP_SECTOR)
        .map_err(|e| anyhow!("{e}"))
        .context("loading audio map")?;

    engine.playlist_set_loop(options.looping);
    for &track in &options.tracks {
        engine.playlist_enqueue(track).map_err(|e| anyhow!("track {track}: {e}"))?;
    }
    if let Some((track, priority)) = options.sfx {
        engine.sfx_request(track, priority);
    }

    let mut pool = MockBufferPool::recycling(BUFFER_POOL_SIZE);
    let mut summary = Summary::default();
    while !engine.is_idle() {
        if summary.pumps >= options.max_pumps {
            summary.truncated = true;
            break;
        }
        let report = engine.pump(&mut pool);
        summary.pumps = summary.pumps.saturating_add(1);
        for (channel, channel_report) in [(Channel::Bgm, report.bgm), (Channel::Sfx, report.sfx)] {
            if let Some(track) = channel_report.started {
                summary.started.push((channel, track));
            }
            if let Some(track) = channel_report.skipped {
                summary.skipped.push(track);
            }
        }
        if report.bgm.tick.backpressure || report.sfx.tick.backpressure {
            summary.backpressure_pumps = summary.backpressure_pumps.saturating_add(1);
        }
    }

    summary.buffers = pool.submissions().len();
    summary.samples = pool.submissions().iter().map(|s| u64::from(s.sample_count)).sum();
    Ok(summary)
}
