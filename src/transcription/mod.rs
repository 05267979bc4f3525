//! # Transcription Module
//!
//! Speech-to-text is an external collaborator. The session controller only
//! knows the [`Transcriber`] trait; the production implementation in
//! [`engine`] talks to an OpenAI-compatible Whisper endpoint.
//!
//! ## Contract:
//! - **Input**: a spooled, finished WAVE container
//! - **Output**: best-effort transcript; an empty string means "nothing
//!   understood" and is not an error
//! - **Failure**: [`RecognitionError`], which the session downgrades to an
//!   empty transcript

pub mod engine;      // Whisper HTTP client

use crate::audio::spool::ArtifactFile;
use crate::error::RecognitionError;
use async_trait::async_trait;

pub use engine::WhisperTranscriber;

/// Converts one utterance into text.
///
/// ## Rust Concepts:
/// - **#[async_trait]**: trait methods can be `async` and still be used
///   behind `Arc<dyn Transcriber>`
/// - **Send + Sync**: one instance is shared by every session task
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &ArtifactFile) -> Result<String, RecognitionError>;
}
