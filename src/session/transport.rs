//! # Session Transport
//!
//! The session controller never touches a socket. It talks to a
//! [`Transport`]: something that yields inbound frames in arrival order,
//! accepts one text reply, can be closed, and can tell when the peer is gone.
//!
//! [`ChannelTransport`] is the production implementation. The WebSocket
//! actor owns the other ends of its two channels:
//! - **inbound** (unbounded): frames from the client; dropping the sender is
//!   end-of-stream
//! - **outbound**: reply and close commands to the actor; the receiver being
//!   dropped means the connection is gone

use crate::audio::scanner::Chunk;
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One message received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Binary(Vec<u8>),
    Text(String),
}

impl Frame {
    /// Borrowed view for the scanner.
    pub fn as_chunk(&self) -> Chunk<'_> {
        match self {
            Frame::Binary(data) => Chunk::Binary(data),
            Frame::Text(text) => Chunk::Text(text),
        }
    }
}

/// Command from a session to its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send this text message
    Reply(String),
    /// Close the connection normally
    Close,
}

/// Connection as seen by the session controller.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound frame; `None` once the inbound side has ended.
    async fn recv(&mut self) -> Option<Frame>;

    /// Send one text message to the client.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Calling it again has no effect.
    async fn close(&mut self);

    /// Resolves once the peer can no longer be reached.
    async fn closed(&mut self);
}

/// [`Transport`] over tokio channels, bridged to a WebSocket actor.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::Sender<Outbound>,
    closed: bool,
}

impl ChannelTransport {
    pub fn new(inbound: mpsc::UnboundedReceiver<Frame>, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            inbound,
            outbound,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(Outbound::Reply(text))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inbound.close();
        // The actor may already be gone; closing is best effort
        let _ = self.outbound.send(Outbound::Close).await;
    }

    async fn closed(&mut self) {
        self.outbound.closed().await
    }
}
