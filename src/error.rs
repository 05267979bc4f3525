//! # Error Handling
//!
//! Error types for each failure class a session can meet. None of them ever
//! reaches the client as a protocol error: the session controller matches on
//! them and turns every failure into one of the fixed reply strings.
//!
//! ## Error Categories:
//! - **TransportError**: the connection went away or delivered a broken frame
//! - **EncodingError**: the buffered audio cannot become a valid container
//! - **RecognitionError**: the transcription collaborator failed
//! - **GenerationError**: the response-generation collaborator failed
//!
//! ## Rust Concepts:
//! - **enum per failure class**: the type says which stage failed, so the
//!   controller can pick the right fallback with a `match`
//! - **From trait**: lets `?` convert library errors (reqwest, io) for us
//! - **std::error::Error**: makes the types usable with `anyhow` and `tracing`

use crate::audio::format::AudioFormat;
use std::fmt;

/// The connection can no longer carry messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer (or the connection actor) is gone
    Closed,
    /// A frame violated the WebSocket framing rules
    MalformedFrame(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "Connection closed"),
            TransportError::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failures of the container assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// No PCM bytes at all
    Empty,
    /// 16-bit samples need an even number of bytes
    OddLength(usize),
    /// Anything but mono / 16-bit / 16 kHz
    UnsupportedFormat(AudioFormat),
    /// Too many bytes for a RIFF size field
    TooLarge(usize),
    /// A container could not be written or read back
    InvalidContainer(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::Empty => write!(f, "Encoding error: no PCM data"),
            EncodingError::OddLength(len) => write!(
                f,
                "Encoding error: {} bytes is not a whole number of 16-bit samples",
                len
            ),
            EncodingError::UnsupportedFormat(format) => {
                write!(f, "Encoding error: unsupported format {}", format)
            }
            EncodingError::TooLarge(len) => {
                write!(f, "Encoding error: {} bytes exceeds the container limit", len)
            }
            EncodingError::InvalidContainer(msg) => {
                write!(f, "Encoding error: invalid container: {}", msg)
            }
        }
    }
}

impl std::error::Error for EncodingError {}

impl From<hound::Error> for EncodingError {
    fn from(err: hound::Error) -> Self {
        EncodingError::InvalidContainer(err.to_string())
    }
}

/// Failures of the transcription collaborator.
#[derive(Debug)]
pub enum RecognitionError {
    /// Request could not be sent or the body could not be read
    Http(String),
    /// The service answered with a non-success status
    Status { status: u16, body: String },
    /// The response body was not what the API promises
    InvalidResponse(String),
    /// The spooled audio file could not be read
    Io(std::io::Error),
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionError::Http(msg) => write!(f, "Recognition request failed: {}", msg),
            RecognitionError::Status { status, body } => {
                write!(f, "Recognition service returned {}: {}", status, body)
            }
            RecognitionError::InvalidResponse(msg) => {
                write!(f, "Recognition response invalid: {}", msg)
            }
            RecognitionError::Io(err) => write!(f, "Recognition input unreadable: {}", err),
        }
    }
}

impl std::error::Error for RecognitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecognitionError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RecognitionError::InvalidResponse(err.to_string())
        } else {
            RecognitionError::Http(err.to_string())
        }
    }
}

impl From<std::io::Error> for RecognitionError {
    fn from(err: std::io::Error) -> Self {
        RecognitionError::Io(err)
    }
}

/// Failures of the response-generation collaborator.
#[derive(Debug)]
pub enum GenerationError {
    /// Request could not be sent or the body could not be read
    Http(String),
    /// The service answered with a non-success status
    Status { status: u16, body: String },
    /// The response carried no usable answer
    InvalidResponse(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Http(msg) => write!(f, "Generation request failed: {}", msg),
            GenerationError::Status { status, body } => {
                write!(f, "Generation service returned {}: {}", status, body)
            }
            GenerationError::InvalidResponse(msg) => {
                write!(f, "Generation response invalid: {}", msg)
            }
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenerationError::InvalidResponse(err.to_string())
        } else {
            GenerationError::Http(err.to_string())
        }
    }
}
