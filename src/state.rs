//! # Application State
//!
//! The only things sessions have in common: the loaded configuration and the
//! handles of the two collaborators. Everything here is immutable after
//! startup, so sessions share it without any lock.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: many connection actors hold the same collaborator instance
//! - **Memory safety**: the instance lives until the last session drops its handle
//!
//! ### Trait objects (`Arc<dyn Transcriber>`)
//! - **Purpose**: sessions call "some transcriber" without knowing which one
//! - **Testing**: unit tests inject stubs through the same field the server
//!   fills with HTTP clients, so no process-wide client exists anywhere

use crate::config::AppConfig;
use crate::response::{ChatResponder, Responder};
use crate::transcription::{Transcriber, WhisperTranscriber};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

/// Handles to the two external services a session calls, in order.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub responder: Arc<dyn Responder>,
}

impl Collaborators {
    pub fn new(transcriber: Arc<dyn Transcriber>, responder: Arc<dyn Responder>) -> Self {
        Self {
            transcriber,
            responder,
        }
    }

    /// HTTP clients for the configured OpenAI-compatible API, sharing one
    /// connection pool.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.collaborators.request_timeout())
            .build()
            .context("Failed to build HTTP client for collaborators")?;

        Ok(Self::new(
            Arc::new(WhisperTranscriber::new(client.clone(), &config.collaborators)),
            Arc::new(ChatResponder::new(client, &config.collaborators)),
        ))
    }
}

/// State handed to every connection.
///
/// ## Rust Concepts:
/// - **#[derive(Clone)]**: cloning copies two `Arc`s and the config, which is
///   what actix does once per worker thread
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub collaborators: Collaborators,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        Self {
            config: Arc::new(config),
            collaborators,
            start_time: Instant::now(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
