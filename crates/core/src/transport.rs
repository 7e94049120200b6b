//! Transport-neutral messages
//!
//! Both sides of the bridge are websocket-like: they deliver and accept text
//! and binary frames. The relay only sees these aliases, so the server can plug
//! in axum or tungstenite sockets and tests can plug in in-memory channels.

use std::pin::Pin;

use futures::stream::BoxStream;
use futures::Sink;

use crate::Error;

/// A single frame on either transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WireMessage {
    pub fn is_text(&self) -> bool {
        matches!(self, WireMessage::Text(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, WireMessage::Binary(_))
    }

    /// Text payload, if this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireMessage::Text(text) => Some(text),
            WireMessage::Binary(_) => None,
        }
    }
}

/// Incoming half of a transport. The stream ending means the peer closed.
pub type MessageStream = BoxStream<'static, Result<WireMessage, Error>>;

/// Outgoing half of a transport
pub type MessageSink = Pin<Box<dyn Sink<WireMessage, Error = Error> + Send>>;
