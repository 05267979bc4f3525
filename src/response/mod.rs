//! # Response Generation Module
//!
//! Turns a recognised utterance into the short spoken-style answer sent back
//! to the client. Like transcription, this is an external collaborator behind
//! a narrow trait; [`chat`] holds the chat-completion implementation.
//!
//! Keeping answers short (about ten words) is the collaborator's job, done
//! through its system prompt. The session never truncates replies.

pub mod chat;        // Chat completion client

use crate::error::GenerationError;
use async_trait::async_trait;

pub use chat::ChatResponder;

/// Produces a reply for non-empty recognised text.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String, GenerationError>;
}
