//! Telephony media-stream WebSocket
//!
//! `GET /twilio` upgrades the carrier's connection, opens the agent
//! connection and relays until either side ends the call.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{future, SinkExt, StreamExt};

use voice_bridge_core::{Error, MessageSink, MessageStream, WireMessage};
use voice_bridge_relay::{CallRelay, Transport};

use crate::metrics::{record_error, record_request};
use crate::state::AppState;

pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    record_request("media_stream");
    ws.on_upgrade(move |socket| handle_call(socket, state))
}

/// Adapt an accepted socket into the relay's transport shape
pub fn telephony_transport(socket: WebSocket) -> Transport {
    let (sink, stream) = socket.split();

    let incoming: MessageStream = stream
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(WireMessage::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(WireMessage::Binary(bytes))),
                Ok(_) => None,
                Err(e) => Some(Err(Error::Transport(e.to_string()))),
            })
        })
        .boxed();

    let outgoing: MessageSink = Box::pin(
        sink.with(|message: WireMessage| {
            future::ready(Ok::<_, axum::Error>(match message {
                WireMessage::Text(text) => Message::Text(text),
                WireMessage::Binary(bytes) => Message::Binary(bytes),
            }))
        })
        .sink_map_err(|e| Error::Transport(e.to_string())),
    );

    Transport::new(incoming, outgoing)
}

async fn handle_call(socket: WebSocket, state: AppState) {
    let call_id = uuid::Uuid::new_v4().to_string();
    let mut telephony = telephony_transport(socket);
    tracing::info!(call_id = %call_id, "Telephony media stream connected");

    let agent = match state.connector.connect().await {
        Ok(agent) => agent,
        Err(e) => {
            tracing::error!(call_id = %call_id, error = %e, "Could not connect to speech agent");
            record_error("agent_connect");
            if let Err(e) = telephony.outgoing.close().await {
                tracing::debug!(error = %e, "Telephony close failed");
            }
            return;
        }
    };

    let relay = CallRelay::new(
        call_id.clone(),
        state.relay_config.clone(),
        state.retriever.clone(),
        state.composer.clone(),
    );
    state.sessions.register(relay.observe());

    let summary = relay.run(telephony, agent).await;
    state.sessions.remove(&call_id);

    tracing::info!(
        call_id = %summary.call_id,
        end = summary.end.reason(),
        turns = summary.stats.turns,
        "Call ended"
    );
}
