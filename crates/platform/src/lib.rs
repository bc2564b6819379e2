//! Collaborator interfaces for the sector-streaming audio engine.
//!
//! The engine never talks to hardware directly. It consumes two collaborators
//! through the traits defined here, so the same streaming code runs on the
//! device and on the host:
//!
//! ```text
//! block storage ──read_async──▶ engine ──submit──▶ buffer pool ──▶ I²S / DMA
//!        ▲                        │
//!        └────────poll────────────┘
//! ```
//!
//! # Abstraction Levels
//!
//! - [`BlockDevice`] - fixed-size sector reads, synchronous and asynchronous
//! - [`BufferPool`] / [`AudioBuffer`] - acquire/submit contract of the
//!   hardware-facing sample buffers
//! - [`audio_config`] - compile-time stream geometry shared by every crate
//!
//! # Features
//!
//! - `std`: file-backed [`storage_local::FileBlockDevice`] and the [`mocks`]
//! - `defmt`: `defmt::Format` derives on all platform types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod audio;
pub mod audio_config;
pub mod storage;

#[cfg(feature = "std")]
pub mod storage_local;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use audio::{AudioBuffer, BufferPool};
pub use audio_config::{StreamFormat, SECTOR_SIZE};
pub use storage::{BlockDevice, Sector};
