//! Audio map parsing, sector footers and image building.
//!
//! # Modules
//!
//! - [`byte_reader`]: bounds-checked little-endian cursor
//! - [`audio_map`]: `AudioMap` validation and track lookup
//! - [`footer`]: per-sector sample-count footer
//! - [`writer`]: `AudioImageWriter` (std only)

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

#[macro_use]
mod fmt;

pub mod audio_map;
pub mod byte_reader;
pub mod footer;

#[cfg(any(test, feature = "std"))]
pub mod writer;

// Top-level re-exports for convenience
pub use audio_map::{read_audio_map, AudioMap, MapError, MapLoadError, TrackLocation, MAGIC};
pub use byte_reader::{ByteReader, ByteReaderError};
pub use footer::SectorFooter;
