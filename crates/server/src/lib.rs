//! Voice Bridge Server
//!
//! Telephony media-stream WebSocket, TwiML call entry, outbound call
//! provisioning and operational HTTP endpoints around the call relay.

pub mod agent_client;
pub mod http;
pub mod media_stream;
pub mod metrics;
pub mod sessions;
pub mod state;
pub mod twilio;

pub use agent_client::{AgentConnector, WebSocketAgentConnector};
pub use http::create_router;
pub use metrics::init_metrics;
pub use sessions::{CallInfo, SessionRegistry};
pub use state::AppState;
pub use twilio::{OutboundCaller, TwilioClient};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Agent connection error: {0}")]
    AgentConnection(String),

    #[error("Telephony API error: {0}")]
    Telephony(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::AgentConnection(_) => StatusCode::BAD_GATEWAY,
            ServerError::Telephony(_) => StatusCode::BAD_GATEWAY,
            ServerError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status: StatusCode = self.into();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<voice_bridge_core::Error> for ServerError {
    fn from(err: voice_bridge_core::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}
