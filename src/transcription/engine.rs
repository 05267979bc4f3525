//! # Whisper Transcription Client
//!
//! Uploads the spooled WAVE file to `{base_url}/audio/transcriptions` as a
//! multipart form and returns the `text` field of the JSON answer.

use crate::audio::spool::ArtifactFile;
use crate::config::CollaboratorsConfig;
use crate::error::RecognitionError;
use crate::transcription::Transcriber;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

/// Whisper speech recognition over HTTP.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: String,
}

/// The subset of the transcription response we read.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    /// Build a client sharing `client`'s connection pool and timeouts.
    pub fn new(client: reqwest::Client, config: &CollaboratorsConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/audio/transcriptions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.transcription_model.clone(),
            language: config.language.clone(),
        }
    }

    #[cfg(test)]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &ArtifactFile) -> Result<String, RecognitionError> {
        let started = Instant::now();

        let wav = tokio::fs::read(audio.path()).await?;
        let file_name = audio
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("utterance.wav")
            .to_string();

        let form = Form::new()
            .part("file", Part::bytes(wav).file_name(file_name).mime_str("audio/wav")?)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        let text = body.text.trim().to_string();

        debug!(
            model = %self.model,
            audio_ms = audio.artifact().duration().as_millis() as u64,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "Transcription finished"
        );

        Ok(text)
    }
}
