//! # Session Module
//!
//! One session per WebSocket connection. The controller is written against
//! the [`Transport`](transport::Transport) trait so it can be driven by the WebSocket actor in
//! production and by scripted frame lists in tests.

pub mod controller;  // The per-connection state machine
pub mod state;       // Lifecycle states
pub mod transport;   // Frames in, one reply out

pub use controller::{SessionController, SessionSettings};
pub use transport::{ChannelTransport, Frame, Outbound};
