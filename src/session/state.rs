//! # Session States
//!
//! ```text
//! Accepting → Receiving → Assembling → Transcribing → Responding → Closing → Closed
//! ```
//! Any state may jump straight to `Responding` (with a fixed reply) or to
//! `Closing`. `Closed` is terminal.

use std::fmt;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, controller not yet running
    Accepting,
    /// Waiting for chunks and scanning for the marker
    Receiving,
    /// Building and spooling the audio container
    Assembling,
    /// Waiting for the transcription collaborator
    Transcribing,
    /// Choosing and sending the single reply
    Responding,
    /// Releasing resources and closing the connection
    Closing,
    /// Done
    Closed,
}

impl SessionState {
    /// Lower-case name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Accepting => "accepting",
            SessionState::Receiving => "receiving",
            SessionState::Assembling => "assembling",
            SessionState::Transcribing => "transcribing",
            SessionState::Responding => "responding",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
