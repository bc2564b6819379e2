//! Stream geometry for the sector-streaming audio engine.
//!
//! Every constant here describes the device build: an I²S DAC fed with
//! 16-bit mono PCM at 12 kHz, one storage sector per audio buffer.
//!
//! # Sector layout
//!
//! ```text
//! [0 .. 508)    PCM payload (S16 LE, up to 254 samples)
//! [508]         valid sample count (u8)
//! [509 .. 512)  reserved
//! ```
//!
//! The footer count is a single byte, so at most 255 samples per sector are
//! ever reported as playable even though the buffer itself holds
//! [`SAMPLES_PER_BUFFER`] samples.

/// Size of one storage sector in bytes. One sector fills exactly one buffer.
pub const SECTOR_SIZE: usize = 512;

/// Trailing metadata bytes at the end of every audio sector.
pub const SECTOR_FOOTER_LEN: usize = 4;

/// Byte offset of the sector footer.
pub const SECTOR_FOOTER_OFFSET: usize = SECTOR_SIZE - SECTOR_FOOTER_LEN;

/// Capacity of one audio buffer in samples.
pub const SAMPLES_PER_BUFFER: usize = 256;

/// Output sample rate in Hz.
pub const SAMPLE_RATE_HZ: u32 = 12_000;

/// Number of output channels (mono).
pub const CHANNEL_COUNT: u8 = 1;

/// Bytes per sample frame (S16 mono).
pub const SAMPLE_STRIDE: u8 = 2;

/// In-flight read slots per streaming channel.
pub const BUFFERS_PER_CHANNEL: usize = 3;

/// Buffers in the shared pool: one set for BGM, one for SFX.
pub const BUFFER_POOL_SIZE: usize = BUFFERS_PER_CHANNEL * 2;

/// Sector holding the audio map.
pub const AUDIO_MAP_SECTOR: u32 = 0;

/// Maximum number of queued BGM tracks.
pub const PLAYLIST_CAPACITY: usize = 32;

/// PCM format handed to the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamFormat {
    /// Sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Number of channels (1 = mono, 2 = stereo).
    pub channels: u8,
    /// Bytes per sample frame.
    pub sample_stride: u8,
    /// Buffer capacity in samples.
    pub samples_per_buffer: u16,
}

impl StreamFormat {
    /// Playback time of one full buffer in microseconds.
    ///
    /// The pump loop must run at least this often or the pool drains.
    /// Returns `0` for a zero sample rate.
    #[must_use]
    pub fn buffer_duration_us(&self) -> u32 {
        let us = u64::from(self.samples_per_buffer)
            .saturating_mul(1_000_000)
            .checked_div(u64::from(self.sample_rate_hz))
            .unwrap_or(0);
        u32::try_from(us).unwrap_or(u32::MAX)
    }
}

impl Default for StreamFormat {
    #[allow(clippy::cast_possible_truncation)] // SAMPLES_PER_BUFFER = 256 fits in u16
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            channels: CHANNEL_COUNT,
            sample_stride: SAMPLE_STRIDE,
            samples_per_buffer: SAMPLES_PER_BUFFER as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_sits_at_end_of_sector() {
        assert_eq!(SECTOR_FOOTER_OFFSET, 508);
        assert_eq!(SECTOR_FOOTER_OFFSET + SECTOR_FOOTER_LEN, SECTOR_SIZE);
    }

    #[test]
    fn pool_covers_both_channels() {
        assert_eq!(BUFFER_POOL_SIZE, 6);
    }

    #[test]
    fn default_buffer_lasts_21ms() {
        // 256 samples at 12 kHz = 21.333 ms
        assert_eq!(StreamFormat::default().buffer_duration_us(), 21_333);
    }

    #[test]
    fn zero_sample_rate_has_zero_duration() {
        let fmt = StreamFormat { sample_rate_hz: 0, ..StreamFormat::default() };
        assert_eq!(fmt.buffer_duration_us(), 0);
    }
}
