//! # Audio Ingestion Module
//!
//! Everything between "bytes arrived on the socket" and "a WAVE file is ready
//! for transcription".
//!
//! ## Key Components:
//! - **Scanner**: accumulates chunks and detects the `END_STREAM` marker
//! - **Container**: wraps raw PCM into a RIFF/WAVE container and reads it back
//! - **Spool**: scoped temporary file holding the container during transcription
//! - **Format**: the one PCM layout the gateway accepts
//!
//! ## Audio Format Requirements:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers

pub mod container;    // WAVE assembly and parsing
pub mod format;       // Fixed PCM layout
pub mod scanner;      // Chunk accumulation and marker detection
pub mod spool;        // Temporary file staging
