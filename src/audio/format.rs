//! # Audio Format Description
//!
//! The gateway accepts exactly one raw PCM layout. This module names it and
//! offers the small amount of arithmetic the rest of the pipeline needs
//! (bytes per sample, byte rate, durations).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sample layout of a PCM stream.
///
/// ## Rust Concepts:
/// - **Copy**: three small integers, so the struct is copied instead of moved
/// - **const fn**: lets us build the supported format as a compile-time constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Width of one sample in bits
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Mono, 16-bit signed little-endian, 16 kHz. The only layout we accept.
    pub const PCM16_MONO_16K: AudioFormat = AudioFormat::new(16_000, 1, 16);

    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// True only for [`AudioFormat::PCM16_MONO_16K`].
    pub fn is_supported(&self) -> bool {
        *self == Self::PCM16_MONO_16K
    }

    /// Bytes occupied by one sample frame (all channels).
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    /// Bytes of audio per second of playback.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Playback duration of `byte_len` bytes in this format.
    pub fn duration_of(&self, byte_len: usize) -> Duration {
        let byte_rate = self.byte_rate() as u64;
        if byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(byte_len as u64 * 1_000_000 / byte_rate)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::PCM16_MONO_16K
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz / {} ch / {}-bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}
