//! # Frame Buffer and Marker Scanner
//!
//! Accumulates the chunks of one utterance and watches for the in-band
//! `END_STREAM` marker that terminates it.
//!
//! ## Scanning Rules:
//! - **Text `END_STREAM`**: utterance complete, nothing appended
//! - **Other text**: out-of-band message, ignored
//! - **Binary chunk containing the marker**: bytes before the first occurrence
//!   are audio, bytes after it are dropped, utterance complete
//! - **Any other binary chunk**: appended as audio
//!
//! A marker split across two chunks is not recognised. Clients send the
//! marker as its own final chunk (or at the tail of the last one), so only a
//! marker wholly inside one chunk is looked for.

use std::fmt;
use tracing::debug;

/// The termination marker, as raw ASCII bytes.
pub const END_STREAM_MARKER: &[u8] = b"END_STREAM";

/// One transport-delivered unit of an utterance.
#[derive(Debug, Clone, Copy)]
pub enum Chunk<'a> {
    /// Binary WebSocket message: PCM bytes, possibly carrying the marker
    Binary(&'a [u8]),
    /// Text WebSocket message: either the marker or an out-of-band message
    Text(&'a str),
}

/// Why an utterance could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The stream ended before any audio arrived
    NoData,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::NoData => write!(f, "no data"),
        }
    }
}

/// Result of feeding one chunk to the scanner.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    /// Keep receiving
    Continue,
    /// The utterance is finished; carries every audio byte received
    Complete(Vec<u8>),
    /// The utterance cannot be used
    Malformed(MalformedReason),
}

/// Append-only buffer for one utterance plus the marker search.
///
/// ## Ownership:
/// The scanner owns the accumulated bytes. On completion the buffer is moved
/// out in the [`Decision::Complete`] variant, so the audio is never copied.
#[derive(Debug, Default)]
pub struct FrameScanner {
    buffer: Vec<u8>,
    chunks_seen: usize,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed the next chunk, in arrival order.
    pub fn observe(&mut self, chunk: Chunk<'_>) -> Decision {
        self.chunks_seen += 1;

        match chunk {
            Chunk::Text(text) if text.as_bytes() == END_STREAM_MARKER => {
                debug!(
                    chunks = self.chunks_seen,
                    bytes = self.buffer.len(),
                    "Text end-of-stream marker received"
                );
                Decision::Complete(std::mem::take(&mut self.buffer))
            }
            Chunk::Text(text) => {
                debug!(len = text.len(), "Ignoring out-of-band text message");
                Decision::Continue
            }
            Chunk::Binary(data) => match find_marker(data) {
                Some(position) => {
                    let dropped = data.len() - position - END_STREAM_MARKER.len();
                    self.buffer.extend_from_slice(&data[..position]);
                    debug!(
                        chunks = self.chunks_seen,
                        bytes = self.buffer.len(),
                        dropped_after_marker = dropped,
                        "Binary end-of-stream marker received"
                    );
                    Decision::Complete(std::mem::take(&mut self.buffer))
                }
                None => {
                    self.buffer.extend_from_slice(data);
                    Decision::Continue
                }
            },
        }
    }

    /// The transport ended before a marker was seen.
    ///
    /// Whatever was buffered is still a usable utterance; an empty buffer is not.
    pub fn finish(self) -> Decision {
        if self.buffer.is_empty() {
            Decision::Malformed(MalformedReason::NoData)
        } else {
            Decision::Complete(self.buffer)
        }
    }
}

/// Position of the first marker occurrence inside `data`.
fn find_marker(data: &[u8]) -> Option<usize> {
    if data.len() < END_STREAM_MARKER.len() {
        return None;
    }
    data.windows(END_STREAM_MARKER.len())
        .position(|window| window == END_STREAM_MARKER)
}
