//! Streaming audio playback: playlist, SFX slot, per-channel sector streams
//! and the pump loop that drives them.
//!
//! # Modules
//!
//! - [`playlist`]: bounded BGM queue with optional looping
//! - [`sfx`]: single pending sound-effect request, priority-preemptable
//! - [`reader`]: non-blocking sector read into a pool buffer
//! - [`stream`]: per-channel `Idle → Streaming → Draining` state machine
//! - [`engine`]: `AudioEngine`, the owned context and pump loop
//! - [`blocking`]: synchronous single-track playback for bring-up

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

#[macro_use]
mod fmt;

pub mod blocking;
pub mod engine;
pub mod playlist;
pub mod reader;
pub mod sfx;
pub mod stream;

pub use blocking::{play_track_blocking, BlockingPlayError};
pub use engine::{AudioEngine, Channel, ChannelReport, PumpReport};
pub use playlist::{Playlist, PlaylistError};
pub use reader::{begin_read, InFlightRead, ReadError};
pub use sfx::{SfxRequest, SfxSlot};
pub use stream::{ChannelState, StreamError, SubmittedBuffer, TickReport, TrackStream};
