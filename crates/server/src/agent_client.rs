//! Speech agent transport
//!
//! The relay only sees a `Transport` (message stream + sink). The connector
//! opens the agent websocket and adapts it; tests substitute in-memory
//! connectors.

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use voice_bridge_config::AgentConfig;
use voice_bridge_core::{Error, MessageSink, MessageStream, WireMessage};
use voice_bridge_relay::Transport;

use crate::ServerError;

/// Opens one agent connection per call
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self) -> Result<Transport, ServerError>;
}

/// Agent over a websocket; the API key is offered as the `token` subprotocol
pub struct WebSocketAgentConnector {
    url: String,
    api_key: Option<String>,
}

impl WebSocketAgentConnector {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.url.clone(), config.api_key.clone())
    }
}

#[async_trait]
impl AgentConnector for WebSocketAgentConnector {
    async fn connect(&self) -> Result<Transport, ServerError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ServerError::AgentConnection(e.to_string()))?;

        if let Some(key) = &self.api_key {
            let protocols = HeaderValue::from_str(&format!("token, {}", key))
                .map_err(|e| ServerError::AgentConnection(format!("invalid api key header: {}", e)))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", protocols);
        }

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ServerError::AgentConnection(e.to_string()))?;
        tracing::info!(url = %self.url, "Connected to speech agent");

        let (sink, stream) = socket.split();

        let incoming: MessageStream = stream
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(WireMessage::Text(text))),
                    Ok(Message::Binary(bytes)) => Some(Ok(WireMessage::Binary(bytes))),
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "Agent sent close");
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(Error::Transport(e.to_string()))),
                })
            })
            .boxed();

        let outgoing: MessageSink = Box::pin(
            sink.with(|message: WireMessage| {
                future::ready(Ok::<_, tokio_tungstenite::tungstenite::Error>(match message {
                    WireMessage::Text(text) => Message::Text(text),
                    WireMessage::Binary(bytes) => Message::Binary(bytes),
                }))
            })
            .sink_map_err(|e| Error::Transport(e.to_string())),
        );

        Ok(Transport::new(incoming, outgoing))
    }
}
