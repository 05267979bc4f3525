//! # Session Controller
//!
//! Drives one connection from the first audio chunk to the single reply:
//!
//! 1. **Receiving**: feed frames to the [`FrameScanner`] until the marker,
//!    the end of the inbound stream or the receive timeout
//! 2. **Assembling**: wrap the PCM in a WAVE container and spool it to disk
//! 3. **Transcribing**: hand the file to the [`Transcriber`](crate::transcription::Transcriber)
//! 4. **Responding**: ask the [`Responder`](crate::response::Responder) for an
//!    answer, or pick a fixed reply
//! 5. **Closing**: send exactly one reply, then close the connection
//!
//! Every failure maps to one of the configured fallback replies, so the client
//! always hears back unless it has already gone away.
//!
//! ## Cancellation:
//! Collaborator calls race against [`Transport::closed`]. When the peer
//! disconnects mid-call the call is dropped, the spooled file with it, and no
//! reply is attempted.

use crate::audio::container::assemble;
use crate::audio::format::AudioFormat;
use crate::audio::scanner::{Decision, FrameScanner, MalformedReason};
use crate::audio::spool::ArtifactFile;
use crate::config::{AppConfig, RepliesConfig};
use crate::session::state::SessionState;
use crate::session::transport::Transport;
use crate::state::Collaborators;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Per-session knobs, copied out of [`AppConfig`] when a connection opens.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub format: AudioFormat,
    pub min_audio_bytes: usize,
    pub receive_timeout: Duration,
    pub spool_dir: PathBuf,
    pub replies: RepliesConfig,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            format: config.audio.format(),
            min_audio_bytes: config.audio.min_audio_bytes,
            receive_timeout: config.audio.receive_timeout(),
            spool_dir: config.audio.spool_dir(),
            replies: config.replies.clone(),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub id: Uuid,
    /// PCM bytes received before the marker
    pub audio_bytes: usize,
    /// The reply that was chosen, `None` when the session was abandoned
    pub reply: Option<String>,
    pub final_state: SessionState,
    /// States visited, from `Accepting` to the final one
    pub path: Vec<SessionState>,
}

/// How the pipeline ended.
enum Outcome {
    Reply(String),
    /// The peer went away while a collaborator was working
    Abandoned,
}

/// State machine for one connection.
pub struct SessionController<T: Transport> {
    id: Uuid,
    transport: T,
    collaborators: Collaborators,
    settings: SessionSettings,
    state: SessionState,
    /// Every state entered so far, in order
    path: Vec<SessionState>,
    audio_bytes: usize,
    closed: bool,
}

impl<T: Transport> SessionController<T> {
    pub fn new(id: Uuid, transport: T, collaborators: Collaborators, settings: SessionSettings) -> Self {
        Self {
            id,
            transport,
            collaborators,
            settings,
            state: SessionState::Accepting,
            path: vec![SessionState::Accepting],
            audio_bytes: 0,
            closed: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion and close the connection.
    pub async fn run(mut self) -> SessionReport {
        let span = info_span!("session", id = %self.id);

        async move {
            let started = Instant::now();
            info!("Session started");

            let reply = match self.process().await {
                Outcome::Reply(text) => {
                    // Fixed replies skip the collaborators but still pass through Responding
                    self.transition(SessionState::Responding);
                    self.deliver(&text).await;
                    Some(text)
                }
                Outcome::Abandoned => None,
            };
            self.close().await;

            info!(
                audio_bytes = self.audio_bytes,
                replied = reply.is_some(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Session finished"
            );

            SessionReport {
                id: self.id,
                audio_bytes: self.audio_bytes,
                reply,
                final_state: self.state,
                path: self.path,
            }
        }
        .instrument(span)
        .await
    }

    /// Close the connection. Only the first call reaches the transport.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.transition(SessionState::Closing);
        self.transport.close().await;
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state changed");
            self.state = next;
            self.path.push(next);
        }
    }

    async fn process(&mut self) -> Outcome {
        self.transition(SessionState::Receiving);
        let audio = match self.receive().await {
            Ok(audio) => audio,
            Err(reason) => {
                info!(%reason, "Stream ended without audio");
                return Outcome::Reply(self.settings.replies.no_audio.clone());
            }
        };
        self.audio_bytes = audio.len();

        self.transition(SessionState::Assembling);
        if audio.is_empty() || audio.len() < self.settings.min_audio_bytes {
            info!(
                bytes = audio.len(),
                min_bytes = self.settings.min_audio_bytes,
                "Utterance too short"
            );
            return Outcome::Reply(self.settings.replies.no_audio.clone());
        }

        let artifact = match assemble(&audio, self.settings.format) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(error = %err, "Could not assemble audio container");
                return Outcome::Reply(self.settings.replies.invalid_audio.clone());
            }
        };
        drop(audio);
        debug!(
            samples = artifact.sample_count(),
            duration_ms = artifact.duration().as_millis() as u64,
            "Audio container assembled"
        );

        let staged = match ArtifactFile::stage(artifact, &self.settings.spool_dir) {
            Ok(staged) => staged,
            Err(err) => {
                error!(error = %err, dir = %self.settings.spool_dir.display(), "Could not spool audio");
                return Outcome::Reply(self.settings.replies.processing_failed.clone());
            }
        };

        self.transition(SessionState::Transcribing);
        // Collaborator first, then the disconnect signal
        let transcript = tokio::select! {
            biased;
            result = self.collaborators.transcriber.transcribe(&staged) => result,
            _ = self.transport.closed() => {
                warn!("Client disconnected during transcription");
                return Outcome::Abandoned;
            }
        };
        if let Err(err) = staged.release() {
            warn!(error = %err, "Could not remove spooled audio");
        }

        let text = transcript.unwrap_or_else(|err| {
            warn!(error = %err, "Transcription failed");
            String::new()
        });

        self.transition(SessionState::Responding);
        if text.trim().is_empty() {
            info!("No speech recognized");
            return Outcome::Reply(self.settings.replies.unrecognized.clone());
        }
        info!(transcript = %text, "Speech recognized");

        let generated = tokio::select! {
            biased;
            result = self.collaborators.responder.respond(&text) => result,
            _ = self.transport.closed() => {
                warn!("Client disconnected during response generation");
                return Outcome::Abandoned;
            }
        };

        match generated {
            Ok(reply) if !reply.trim().is_empty() => Outcome::Reply(reply),
            Ok(_) => {
                warn!("Response generator returned an empty reply");
                Outcome::Reply(self.settings.replies.processing_failed.clone())
            }
            Err(err) => {
                warn!(error = %err, "Response generation failed");
                Outcome::Reply(self.settings.replies.processing_failed.clone())
            }
        }
    }

    /// Collect one utterance.
    async fn receive(&mut self) -> Result<Vec<u8>, MalformedReason> {
        let mut scanner = FrameScanner::new();

        loop {
            let frame = match timeout(self.settings.receive_timeout, self.transport.recv()).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(bytes = scanner.buffered_len(), "Inbound stream ended before marker");
                    return settle(scanner.finish()).unwrap_or(Err(MalformedReason::NoData));
                }
                Err(_) => {
                    warn!(
                        timeout_secs = self.settings.receive_timeout.as_secs_f64(),
                        bytes = scanner.buffered_len(),
                        "No audio chunk within receive timeout"
                    );
                    return settle(scanner.finish()).unwrap_or(Err(MalformedReason::NoData));
                }
            };

            if let Some(result) = settle(scanner.observe(frame.as_chunk())) {
                return result;
            }
        }
    }

    async fn deliver(&mut self, reply: &str) {
        self.transition(SessionState::Closing);
        match self.transport.send_text(reply.to_string()).await {
            Ok(()) => info!(reply, "Reply sent"),
            Err(err) => warn!(error = %err, "Reply could not be delivered"),
        }
    }
}

fn settle(decision: Decision) -> Option<Result<Vec<u8>, MalformedReason>> {
    match decision {
        Decision::Continue => None,
        Decision::Complete(audio) => Some(Ok(audio)),
        Decision::Malformed(reason) => Some(Err(reason)),
    }
}
