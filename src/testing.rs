//! Test doubles shared by unit tests: scripted transports, stub
//! collaborators and a local HTTP server speaking the subset of the
//! OpenAI-compatible API the collaborators call.

use crate::audio::spool::ArtifactFile;
use crate::config::CollaboratorsConfig;
use crate::error::{GenerationError, RecognitionError, TransportError};
use crate::response::Responder;
use crate::session::transport::{Frame, Transport};
use crate::state::Collaborators;
use crate::transcription::Transcriber;
use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MOCK_API_KEY: &str = "test-key";

/// What a [`ScriptedTransport`] does once its frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEnd {
    /// `recv` returns `None`
    Disconnect,
    /// `recv` never resolves
    Stall,
}

/// Shared view of everything a [`ScriptedTransport`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct TransportRecorder {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl TransportRecorder {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Transport replaying a fixed list of inbound frames.
pub struct ScriptedTransport {
    frames: VecDeque<Frame>,
    end: ScriptEnd,
    peer_gone: bool,
    recorder: TransportRecorder,
}

impl ScriptedTransport {
    pub fn new(frames: Vec<Frame>, end: ScriptEnd) -> Self {
        Self {
            frames: frames.into(),
            end,
            peer_gone: false,
            recorder: TransportRecorder::default(),
        }
    }

    /// Binary chunks followed by the marker as a text frame.
    pub fn utterance(chunks: Vec<Vec<u8>>) -> Self {
        let mut frames: Vec<Frame> = chunks.into_iter().map(Frame::Binary).collect();
        frames.push(Frame::Text("END_STREAM".to_string()));
        Self::new(frames, ScriptEnd::Stall)
    }

    /// Report the peer as gone from the start, so `closed()` resolves at once.
    pub fn with_peer_gone(mut self) -> Self {
        self.peer_gone = true;
        self
    }

    pub fn recorder(&self) -> TransportRecorder {
        self.recorder.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn recv(&mut self) -> Option<Frame> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(frame);
        }
        match self.end {
            ScriptEnd::Disconnect => None,
            ScriptEnd::Stall => std::future::pending().await,
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.peer_gone {
            return Err(TransportError::Closed);
        }
        self.recorder.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn closed(&mut self) {
        if !self.peer_gone {
            std::future::pending::<()>().await;
        }
    }
}

/// What a [`StubTranscriber`] saw on one call.
#[derive(Debug, Clone)]
pub struct TranscribeCall {
    pub path: PathBuf,
    pub file_existed: bool,
    pub pcm_len: usize,
    pub sample_count: usize,
}

#[derive(Debug, Clone)]
pub enum StubTranscript {
    Text(String),
    Fail,
    Hang,
}

pub struct StubTranscriber {
    outcome: StubTranscript,
    calls: Mutex<Vec<TranscribeCall>>,
}

impl StubTranscriber {
    pub fn new(outcome: StubTranscript) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(StubTranscript::Text(text.to_string()))
    }

    pub fn calls(&self) -> Vec<TranscribeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio: &ArtifactFile) -> Result<String, RecognitionError> {
        self.calls.lock().unwrap().push(TranscribeCall {
            path: audio.path().to_path_buf(),
            file_existed: audio.path().exists(),
            pcm_len: audio.artifact().pcm().len(),
            sample_count: audio.artifact().sample_count(),
        });
        match &self.outcome {
            StubTranscript::Text(text) => Ok(text.clone()),
            StubTranscript::Fail => Err(RecognitionError::Http("connection refused".to_string())),
            StubTranscript::Hang => std::future::pending().await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StubReply {
    Text(String),
    Fail,
}

pub struct StubResponder {
    outcome: StubReply,
    prompts: Mutex<Vec<String>>,
}

impl StubResponder {
    pub fn new(outcome: StubReply) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(StubReply::Text(text.to_string()))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for StubResponder {
    async fn respond(&self, text: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(text.to_string());
        match &self.outcome {
            StubReply::Text(reply) => Ok(reply.clone()),
            StubReply::Fail => Err(GenerationError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
        }
    }
}

pub fn collaborators(
    transcriber: &Arc<StubTranscriber>,
    responder: &Arc<StubResponder>,
) -> Collaborators {
    Collaborators::new(transcriber.clone(), responder.clone())
}

/// Local stand-in for the transcription and chat-completion endpoints.
///
/// - `POST /v1/audio/transcriptions` answers `" привет "` for any upload
///   containing a RIFF container
/// - `POST /v1/chat/completions` answers "Здравствуйте", or an empty message
///   when the user prompt is "silence"
///
/// Both reject any bearer token other than [`MOCK_API_KEY`] with 401.
pub struct MockApi {
    addr: SocketAddr,
    handle: ServerHandle,
}

impl MockApi {
    pub async fn start() -> Self {
        let server = HttpServer::new(|| {
            App::new()
                .route("/v1/audio/transcriptions", web::post().to(mock_transcriptions))
                .route("/v1/chat/completions", web::post().to(mock_chat))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock api");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self { addr, handle }
    }

    /// Collaborator settings pointing at this server.
    pub fn config(&self) -> CollaboratorsConfig {
        let mut config = crate::config::AppConfig::default().collaborators;
        config.base_url = format!("http://{}/v1", self.addr);
        config.api_key = MOCK_API_KEY.to_string();
        config.request_timeout_secs = 5;
        config
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

fn authorized(req: &HttpRequest) -> bool {
    req.headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {}", MOCK_API_KEY))
        .unwrap_or(false)
}

async fn mock_transcriptions(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().json(json!({"error": {"message": "Invalid API Key"}}));
    }
    if !body.windows(4).any(|window| window == b"RIFF") {
        return HttpResponse::BadRequest().json(json!({"error": {"message": "no audio file"}}));
    }
    HttpResponse::Ok().json(json!({"text": " привет "}))
}

async fn mock_chat(req: HttpRequest, body: web::Json<serde_json::Value>) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().json(json!({"error": {"message": "Invalid API Key"}}));
    }
    let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
    let content = if prompt == "silence" { "" } else { "Здравствуйте" };
    HttpResponse::Ok().json(json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}
