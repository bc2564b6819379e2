// Desktop tooling: unwrap/expect/panic acceptable outside the device crates.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod inspect;
mod pack;
mod play;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Sector audio image tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a card image from raw PCM files (S16 little-endian, mono)
    Pack {
        /// Output image path
        #[arg(long)]
        out: PathBuf,
        /// PCM files or directories of `.pcm`/`.raw` files, in track-id order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print the audio map of an image and check every track
    Inspect {
        /// Image to read
        image: PathBuf,
    },
    /// Stream tracks from an image through the engine into a simulated pool
    Play {
        /// Image to read
        image: PathBuf,
        /// BGM tracks, enqueued in the given order (the last one plays first)
        #[arg(long = "track", num_args = 1..)]
        tracks: Vec<u16>,
        /// Sound effect to request before the first pump
        #[arg(long)]
        sfx: Option<u16>,
        /// Priority of the `--sfx` request
        #[arg(long, default_value_t = 1)]
        sfx_priority: u8,
        /// Keep re-queueing BGM tracks
        #[arg(long = "loop")]
        looping: bool,
        /// Stop after this many pumps
        #[arg(long, default_value_t = 100_000)]
        max_pumps: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack { out, inputs } => pack::run(&inputs, &out),
        Commands::Inspect { image } => inspect::run(&image),
        Commands::Play { image, tracks, sfx, sfx_priority, looping, max_pumps } => {
            let options = play::PlayOptions {
                tracks,
                sfx: sfx.map(|id| (id, sfx_priority)),
                looping,
                max_pumps,
            };
            play::run(&image, &options)
        }
    }
}
