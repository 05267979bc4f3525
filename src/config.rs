//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP__ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl blocks**: Add methods to structs
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform environment variables (HOST, PORT, GROQ_API_KEY)
//! 2. Prefixed environment variables (APP__SERVER__PORT, APP__AUDIO__MIN_AUDIO_BYTES, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use crate::audio::format::AudioFormat;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each section maps to one concern of the gateway (listening socket, audio
/// ingestion, downstream services, reply wording), so an operator can
/// override one group without touching the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioSettings,
    pub collaborators: CollaboratorsConfig,
    pub replies: RepliesConfig,
}

/// Listening socket and WebSocket transport settings.
///
/// ## Fields:
/// - `host`: IP address to bind ("0.0.0.0" accepts connections from devices on the network)
/// - `port`: TCP port number to listen on
/// - `max_frame_bytes`: largest single WebSocket frame accepted
/// - `heartbeat_interval_secs`: how often a protocol ping is sent
/// - `client_timeout_secs`: silence (no frame, no pong) after which the client is dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

/// Audio ingestion settings.
///
/// The format fields exist so a deployment can state what its clients send;
/// anything but 16 kHz / mono / 16-bit is refused at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Utterances shorter than this are answered with the "no audio" reply.
    /// 3200 bytes is 0.1 s at 16 kHz / 16-bit mono.
    pub min_audio_bytes: usize,
    /// Idle time allowed between two inbound chunks
    pub receive_timeout_secs: u64,
    /// Directory for spooled WAVE files; empty means the OS temp directory
    pub spool_dir: String,
}

/// Transcription and response-generation service settings.
///
/// Both collaborators speak the OpenAI-compatible HTTP API, Groq by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    pub api_key: String,
    pub base_url: String,
    pub transcription_model: String,
    /// ISO 639-1 language of the spoken audio
    pub language: String,
    pub chat_model: String,
    pub system_prompt: String,
    pub request_timeout_secs: u64,
}

/// Fixed reply strings used when no generated answer is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepliesConfig {
    /// Nothing (or too little) audio arrived before the marker
    pub no_audio: String,
    /// The transcript was empty
    pub unrecognized: String,
    /// Response generation (or spooling) failed
    pub processing_failed: String,
    /// The buffered audio could not be turned into a container
    pub invalid_audio: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),   // Microcontrollers connect over the LAN
                port: 8080,
                max_frame_bytes: 1024 * 1024,  // 1 MiB per frame
                heartbeat_interval_secs: 10,
                client_timeout_secs: 30,
            },
            audio: AudioSettings {
                sample_rate: 16_000,
                channels: 1,
                bits_per_sample: 16,
                min_audio_bytes: 3_200,
                receive_timeout_secs: 30,
                spool_dir: String::new(),
            },
            collaborators: CollaboratorsConfig {
                api_key: String::new(),
                base_url: "https://api.groq.com/openai/v1".to_string(),
                transcription_model: "whisper-large-v3".to_string(),
                language: "ru".to_string(),
                chat_model: "llama-3.3-70b-versatile".to_string(),
                system_prompt: "Ты голосовой ассистент. Отвечай очень кратко, не более 10 слов. \
                                СТРОГО только латинскими буквами (транслитом)"
                    .to_string(),
                request_timeout_secs: 30,
            },
            replies: RepliesConfig {
                no_audio: "No audio received".to_string(),
                unrecognized: "Could not recognize speech".to_string(),
                processing_failed: "Error processing request".to_string(),
                invalid_audio: "Invalid audio format".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP__
    /// 4. Handle special cases for HOST, PORT and GROQ_API_KEY
    ///
    /// ## Environment Variable Examples:
    /// - `APP__SERVER__PORT=3000`: Override server port
    /// - `APP__AUDIO__RECEIVE_TIMEOUT_SECS=10`: Shorter idle timeout
    /// - `APP__COLLABORATORS__LANGUAGE=en`: Transcribe English
    /// - `PORT=3000`: Special case for deployment platforms
    /// - `GROQ_API_KEY=...`: Credentials for the default collaborators
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // Double underscore keeps field names like `min_audio_bytes` intact
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(api_key) = env::var("GROQ_API_KEY") {
            settings = settings.set_override("collaborators.api_key", api_key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The audio format is the supported one
    /// - Timeouts and the frame limit are non-zero
    /// - Every fallback reply is non-empty (the client must always get text)
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.max_frame_bytes == 0 {
            return Err(anyhow::anyhow!("Max frame size must be greater than 0"));
        }

        if self.server.heartbeat_interval_secs == 0
            || self.server.client_timeout_secs <= self.server.heartbeat_interval_secs
        {
            return Err(anyhow::anyhow!(
                "Client timeout must be longer than a non-zero heartbeat interval"
            ));
        }

        let format = self.audio.format();
        if !format.is_supported() {
            return Err(anyhow::anyhow!(
                "Unsupported audio format {}; only {} is accepted",
                format,
                AudioFormat::PCM16_MONO_16K
            ));
        }

        if self.audio.receive_timeout_secs == 0 || self.collaborators.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than 0"));
        }

        let replies = [
            &self.replies.no_audio,
            &self.replies.unrecognized,
            &self.replies.processing_failed,
            &self.replies.invalid_audio,
        ];
        if replies.iter().any(|reply| reply.trim().is_empty()) {
            return Err(anyhow::anyhow!("Reply strings cannot be empty"));
        }

        Ok(())
    }
}

impl AudioSettings {
    /// The configured PCM layout.
    pub fn format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }

    /// Resolved spool directory.
    pub fn spool_dir(&self) -> PathBuf {
        if self.spool_dir.is_empty() {
            env::temp_dir()
        } else {
            PathBuf::from(&self.spool_dir)
        }
    }
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

impl CollaboratorsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
