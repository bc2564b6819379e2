//! xtask pack: build a card image from raw PCM files.
//!
//! Each input becomes one track, ids assigned in argument order. Directories
//! are walked recursively and their `.pcm`/`.raw` files added in file-name
//! order. Sector 0 of the image holds the audio map.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use library::writer::{AudioImageWriter, SAMPLES_PER_SECTOR};
use walkdir::WalkDir;

const PCM_EXTENSIONS: &[&str] = &["pcm", "raw"];

/// Entry point called from main.rs
pub fn run(inputs: &[PathBuf], out: &Path) -> Result<()> {
    let files = collect_inputs(inputs)?;
    if files.is_empty() {
        bail!("no PCM files found");
    }

    println!();
    println!("{}", format!("📦 Packing {} tracks...", files.len()).cyan().bold());
    let writer = build_image(&files)?;
    writer
        .write_to(out)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("writing {}", out.display()))?;
    println!("{}", format!("  ✓ Written to {}", out.display()).green());
    Ok(())
}

/// Expand directories into their PCM files; plain files are kept as given.
pub(crate) fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_pcm(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn is_pcm(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    PCM_EXTENSIONS.contains(&ext.as_str())
}

/// Decode raw S16LE mono samples.
pub(crate) fn read_pcm(path: &Path) -> Result<Vec<i16>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() % 2 != 0 {
        bail!("{}: odd byte count {}, expected 16-bit samples", path.display(), bytes.len());
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| <[u8; 2]>::try_from(pair).map(i16::from_le_bytes))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(samples)
}

/// Add every file as a track, printing one line per track.
pub(crate) fn build_image(files: &[PathBuf]) -> Result<AudioImageWriter> {
    let mut writer = AudioImageWriter::new();
    for path in files {
        let pcm = read_pcm(path)?;
        let id = writer
            .add_track_pcm(&pcm)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("adding {}", path.display()))?;
        let sectors = pcm.len().div_ceil(SAMPLES_PER_SECTOR);
        println!(
            "  {} {:>3}  {:>6} sectors  {:>9} samples  {}",
            "track".dimmed(),
            id,
            sectors,
            pcm.len(),
            path.display()
        );
    }
    Ok(writer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use library::AudioMap;
    use platform::audio_config::SECTOR_SIZE;
    use std::fs;
    use tempfile::TempDir;

    fn write_pcm(path: &Path, samples: &[i16]) {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn read_pcm_decodes_little_endian() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.pcm");
        fs::write(&path, [0x01u8, 0x00, 0xFF, 0xFF]).unwrap();
        assert_eq!(read_pcm(&path).unwrap(), vec![1, -1]);
    }

    #[test]
    fn read_pcm_rejects_odd_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("odd.pcm");
        fs::write(&path, [0x01u8, 0x00, 0x02]).unwrap();
        assert!(read_pcm(&path).is_err());
    }

    #[test]
    fn directories_expand_to_sorted_pcm_files() {
        let tmp = TempDir::new().unwrap();
        write_pcm(&tmp.path().join("b.pcm"), &[1]);
        write_pcm(&tmp.path().join("a.raw"), &[1]);
        fs::write(tmp.path().join("notes.txt"), b"skip").unwrap();
        let files = collect_inputs(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<String> =
            files.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["a.raw", "b.pcm"]);
    }

    #[test]
    fn packed_image_has_map_and_tracks() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("0.pcm");
        let second = tmp.path().join("1.pcm");
        write_pcm(&first, &vec![3i16; SAMPLES_PER_SECTOR + 1]);
        write_pcm(&second, &[4i16; 10]);
        let out = tmp.path().join("image.bin");
        run(&[first, second], &out).unwrap();

        let image = fs::read(&out).unwrap();
        assert_eq!(image.len(), SECTOR_SIZE * 4);
        let map = AudioMap::parse(&image[..SECTOR_SIZE]).unwrap();
        assert_eq!(map.track_count(), 2);
        assert_eq!(map.lookup(1).unwrap().first_sector, 3);
    }

    #[test]
    fn empty_input_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(run(&[tmp.path().to_path_buf()], &tmp.path().join("x.bin")).is_err());
    }
}
