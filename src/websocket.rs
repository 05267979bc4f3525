//! # WebSocket Voice Endpoint
//!
//! Clients connect to `/ws`, stream one utterance of raw PCM and receive one
//! text reply before the server closes the connection.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: Client upgrades `GET /ws`; no handshake message is expected
//! 2. **Audio Streaming**: Binary messages carry 16-bit little-endian 16 kHz mono PCM
//! 3. **End of utterance**: A text message `END_STREAM`, or the same bytes inside
//!    a binary message (anything after them is discarded)
//! 4. **Reply**: Exactly one text message, then a normal close frame
//!
//! ## Actor ↔ Session bridge:
//! Each connection is a [`VoiceWebSocket`] actor. When it starts it spawns a
//! [`SessionController`] task and connects to it through two channels:
//! ```text
//! client ──frames──▶ actor ──Frame──▶ session task
//! client ◀──text/close── actor ◀──Outbound── session task
//! ```
//! The actor owns the socket and the heartbeat; the task owns the
//! utterance. When the actor stops, the outbound receiver is dropped and the
//! task sees the peer as gone.

use crate::error::TransportError;
use crate::session::{ChannelTransport, Frame, Outbound, SessionController, SessionSettings};
use crate::state::AppState;
use actix::prelude::*;
use actix_http::ws::Item;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound commands a session can queue. It only ever sends a reply and a
/// close, so a small bound is plenty.
const OUTBOUND_CAPACITY: usize = 4;

/// Reassembles WebSocket messages split into continuation frames.
#[derive(Debug)]
pub struct MessageAssembler {
    partial: Option<Partial>,
    max_message_bytes: usize,
}

#[derive(Debug)]
struct Partial {
    is_text: bool,
    data: Vec<u8>,
}

impl MessageAssembler {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            partial: None,
            max_message_bytes,
        }
    }

    /// Feed one continuation item; returns the message once its last frame arrives.
    pub fn push(&mut self, item: Item) -> Result<Option<Frame>, TransportError> {
        match item {
            Item::FirstText(_) | Item::FirstBinary(_) if self.partial.is_some() => {
                self.partial = None;
                Err(TransportError::MalformedFrame(
                    "new message started before the previous one finished".to_string(),
                ))
            }
            Item::FirstText(data) => {
                self.begin(true, &data)?;
                Ok(None)
            }
            Item::FirstBinary(data) => {
                self.begin(false, &data)?;
                Ok(None)
            }
            Item::Continue(data) => {
                self.append(&data)?;
                Ok(None)
            }
            Item::Last(data) => {
                self.append(&data)?;
                let Some(Partial { is_text, data }) = self.partial.take() else {
                    return Err(TransportError::MalformedFrame(
                        "final fragment without a first frame".to_string(),
                    ));
                };
                if is_text {
                    String::from_utf8(data).map(|text| Some(Frame::Text(text))).map_err(|_| {
                        TransportError::MalformedFrame("text message is not valid UTF-8".to_string())
                    })
                } else {
                    Ok(Some(Frame::Binary(data)))
                }
            }
        }
    }

    fn begin(&mut self, is_text: bool, data: &[u8]) -> Result<(), TransportError> {
        self.partial = Some(Partial {
            is_text,
            data: Vec::new(),
        });
        self.append(data)
    }

    fn append(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let Some(partial) = self.partial.as_mut() else {
            return Err(TransportError::MalformedFrame(
                "continuation without a first frame".to_string(),
            ));
        };
        if partial.data.len() + data.len() > self.max_message_bytes {
            self.partial = None;
            return Err(TransportError::MalformedFrame(format!(
                "message exceeds {} bytes",
                self.max_message_bytes
            )));
        }
        partial.data.extend_from_slice(data);
        Ok(())
    }
}

/// WebSocket actor for one voice connection.
///
/// ## Actor Model:
/// Uses Actix's actor system where each WebSocket connection is an independent actor.
/// The actor never blocks: audio is forwarded to the session task as soon as it
/// arrives and replies come back as a stream the actor subscribes to.
pub struct VoiceWebSocket {
    /// Session id, also used as the log span id
    id: Uuid,

    /// Shared configuration and collaborator handles
    state: AppState,

    /// Sender half of the inbound frame channel; `None` once the inbound side ended
    inbound: Option<mpsc::UnboundedSender<Frame>>,

    assembler: MessageAssembler,

    /// Last time anything (frame or pong) arrived from the client
    last_heartbeat: Instant,

    /// Set once a close frame has been queued
    closing: bool,
}

impl VoiceWebSocket {
    pub fn new(state: AppState) -> Self {
        let max_message_bytes = state.config.server.max_frame_bytes;
        Self {
            id: Uuid::new_v4(),
            state,
            inbound: None,
            assembler: MessageAssembler::new(max_message_bytes),
            last_heartbeat: Instant::now(),
            closing: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Send protocol pings and drop clients that stopped answering.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let interval = self.state.config.server.heartbeat_interval();
        let client_timeout = self.state.config.server.client_timeout();

        ctx.run_interval(interval, move |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > client_timeout {
                warn!(session = %act.id, "WebSocket heartbeat timeout, closing connection");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Hand a complete message to the session.
    fn forward(&mut self, frame: Frame) {
        let Some(inbound) = &self.inbound else {
            debug!(session = %self.id, "Dropping frame received after end of stream");
            return;
        };
        if inbound.send(frame).is_err() {
            debug!(session = %self.id, "Session no longer receiving");
            self.inbound = None;
        }
    }

    /// End the inbound side; the session treats it as end-of-stream.
    fn end_inbound(&mut self) {
        self.inbound = None;
    }

    fn shutdown(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.closing {
            return;
        }
        self.closing = true;
        self.end_inbound();
        ctx.close(Some(ws::CloseCode::Normal.into()));
        ctx.stop();
    }
}

impl Actor for VoiceWebSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Called when the WebSocket connection starts.
    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session = %self.id, "WebSocket connection started");
        self.start_heartbeat(ctx);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.inbound = Some(inbound_tx);
        ctx.add_stream(ReceiverStream::new(outbound_rx));

        let controller = SessionController::new(
            self.id,
            ChannelTransport::new(inbound_rx, outbound_tx),
            self.state.collaborators.clone(),
            SessionSettings::from_config(&self.state.config),
        );

        tokio::spawn(async move {
            let report = controller.run().await;
            debug!(
                session = %report.id,
                audio_bytes = report.audio_bytes,
                replied = report.reply.is_some(),
                final_state = %report.final_state,
                path = ?report.path,
                "Session task finished"
            );
        });
    }

    /// Called when the WebSocket connection stops.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(session = %self.id, "WebSocket connection stopped");
    }
}

/// Handle incoming WebSocket messages.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for VoiceWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        self.last_heartbeat = Instant::now();

        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.forward(Frame::Binary(data.to_vec()));
            }
            Ok(ws::Message::Text(text)) => {
                self.forward(Frame::Text(text.to_string()));
            }
            Ok(ws::Message::Continuation(item)) => match self.assembler.push(item) {
                Ok(Some(frame)) => self.forward(frame),
                Ok(None) => {}
                Err(err) => {
                    warn!(session = %self.id, error = %err, "Ending inbound stream");
                    self.end_inbound();
                }
            },
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                info!(session = %self.id, ?reason, "Client closed WebSocket");
                self.end_inbound();
                ctx.close(reason);
                self.closing = true;
                ctx.stop();
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(session = %self.id, error = %err, "WebSocket protocol error");
                self.end_inbound();
                ctx.stop();
            }
        }
    }
}

/// Commands from the session task.
impl StreamHandler<Outbound> for VoiceWebSocket {
    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match msg {
            Outbound::Reply(text) => {
                if !self.closing {
                    ctx.text(text);
                }
            }
            Outbound::Close => self.shutdown(ctx),
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // The session task is gone; nothing else will be sent
        self.shutdown(ctx);
    }
}

/// WebSocket endpoint handler.
///
/// ## HTTP to WebSocket Upgrade:
/// This function handles the initial HTTP request and upgrades it to a WebSocket connection.
/// The frame size limit comes from `server.max_frame_bytes`.
pub async fn voice_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let actor = VoiceWebSocket::new(state.get_ref().clone());
    info!(
        session = %actor.id(),
        peer = ?req.connection_info().peer_addr(),
        "New WebSocket connection request"
    );

    ws::WsResponseBuilder::new(actor, &req, stream)
        .frame_size(state.config.server.max_frame_bytes)
        .start()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(voice_websocket));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::Collaborators;
    use crate::testing::{collaborators, MockApi, StubResponder, StubTranscriber};
    use actix_web::web::Bytes;
    use actix_web::{App, HttpServer};
    use futures_util::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    /// How long a test client waits for the server before failing.
    const TEST_DEADLINE: Duration = Duration::from_secs(10);

    async fn start_server(state: AppState) -> (SocketAddr, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (addr, handle)
    }

    /// Send `messages`, then collect text replies until the server closes.
    async fn exchange(addr: SocketAddr, messages: Vec<Message>) -> Vec<String> {
        let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        for message in messages {
            socket.send(message).await.unwrap();
        }

        let mut replies = Vec::new();
        loop {
            match tokio::time::timeout(TEST_DEADLINE, socket.next()).await.unwrap() {
                Some(Ok(Message::Text(text))) => replies.push(text.to_string()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
        replies
    }

    fn utterance(chunks: usize) -> Vec<Message> {
        let mut messages: Vec<Message> = (0..chunks)
            .map(|_| Message::Binary(vec![1u8; 3_200].into()))
            .collect();
        messages.push(Message::Text("END_STREAM".into()));
        messages
    }

    #[test]
    fn test_assembler_joins_fragments() {
        let mut assembler = MessageAssembler::new(1024);
        assert_eq!(assembler.push(Item::FirstBinary(Bytes::from_static(b"ab"))), Ok(None));
        assert_eq!(assembler.push(Item::Continue(Bytes::from_static(b"cd"))), Ok(None));
        assert_eq!(
            assembler.push(Item::Last(Bytes::from_static(b"ef"))),
            Ok(Some(Frame::Binary(b"abcdef".to_vec())))
        );

        assert_eq!(assembler.push(Item::FirstText(Bytes::from_static(b"END_"))), Ok(None));
        assert_eq!(
            assembler.push(Item::Last(Bytes::from_static(b"STREAM"))),
            Ok(Some(Frame::Text("END_STREAM".to_string())))
        );
    }

    #[test]
    fn test_assembler_rejects_bad_sequences() {
        let mut assembler = MessageAssembler::new(1024);
        assert!(assembler.push(Item::Continue(Bytes::from_static(b"x"))).is_err());
        assert!(assembler.push(Item::Last(Bytes::from_static(b"x"))).is_err());

        assert_eq!(assembler.push(Item::FirstBinary(Bytes::from_static(b"a"))), Ok(None));
        assert!(assembler.push(Item::FirstText(Bytes::from_static(b"b"))).is_err());

        assert_eq!(assembler.push(Item::FirstText(Bytes::from_static(&[0xff]))), Ok(None));
        assert!(assembler.push(Item::Last(Bytes::new())).is_err());
    }

    #[test]
    fn test_assembler_enforces_size_limit() {
        let mut assembler = MessageAssembler::new(4);
        assert_eq!(assembler.push(Item::FirstBinary(Bytes::from_static(b"abc"))), Ok(None));
        assert!(assembler.push(Item::Continue(Bytes::from_static(b"de"))).is_err());
        // The failed message is discarded, a new one may start
        assert_eq!(assembler.push(Item::FirstBinary(Bytes::from_static(b"ab"))), Ok(None));
    }

    #[actix_web::test]
    async fn test_websocket_round_trip_with_stubs() {
        let transcriber = StubTranscriber::text("привет");
        let responder = StubResponder::text("Здравствуйте");
        let state = AppState::new(AppConfig::default(), collaborators(&transcriber, &responder));
        let (addr, handle) = start_server(state).await;

        let replies = exchange(addr, utterance(3)).await;
        assert_eq!(replies, vec!["Здравствуйте".to_string()]);
        assert_eq!(transcriber.calls()[0].pcm_len, 9_600);

        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn test_websocket_marker_only_gets_no_audio_reply() {
        let transcriber = StubTranscriber::text("unused");
        let responder = StubResponder::text("unused");
        let state = AppState::new(AppConfig::default(), collaborators(&transcriber, &responder));
        let (addr, handle) = start_server(state).await;

        let replies = exchange(addr, utterance(0)).await;
        assert_eq!(replies, vec!["No audio received".to_string()]);
        assert!(transcriber.calls().is_empty());

        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn test_websocket_against_http_collaborators() {
        let api = MockApi::start().await;
        let mut config = AppConfig::default();
        config.collaborators = api.config();
        let collaborators = Collaborators::from_config(&config).unwrap();
        let (addr, handle) = start_server(AppState::new(config, collaborators)).await;

        let mut messages = vec![Message::Binary(vec![0u8; 3_200].into())];
        let mut tail = vec![0u8; 3_200];
        tail.extend_from_slice(b"END_STREAM");
        messages.push(Message::Binary(tail.into()));

        let replies = exchange(addr, messages).await;
        assert_eq!(replies, vec!["Здравствуйте".to_string()]);

        handle.stop(false).await;
        api.stop().await;
    }
}
