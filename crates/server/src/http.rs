//! HTTP Endpoints
//!
//! Call entry (TwiML), outbound calls, live call listing and probes.

use axum::{
    extract::{Form, Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::media_stream::media_stream_handler;
use crate::metrics::{metrics_handler, record_request};
use crate::sessions::CallInfo;
use crate::state::AppState;
use crate::twilio::{media_stream_url, normalize_public_url, voice_response};
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins, state.config.server.cors_enabled);

    Router::new()
        // Telephony
        .route("/twilio", get(media_stream_handler))
        .route("/voice", post(voice_entry))
        .route("/make-call", post(make_call))
        // Live calls
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// CORS for the JSON API
///
/// - disabled: permissive (development only)
/// - no origins configured: localhost:3000
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let mut parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to localhost:3000");
        parsed.push(HeaderValue::from_static("http://localhost:3000"));
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Form fields posted by the carrier when a call is answered
#[derive(Debug, Default, Deserialize)]
struct VoiceForm {
    #[serde(rename = "Direction")]
    direction: Option<String>,
}

/// TwiML call entry: greet by call direction, then connect the media stream
async fn voice_entry(State(state): State<AppState>, form: Option<Form<VoiceForm>>) -> Response {
    record_request("voice");

    let direction = form.and_then(|Form(f)| f.direction);
    let telephony = &state.config.telephony;
    let greeting = if direction.as_deref() == Some("inbound") {
        &telephony.inbound_greeting
    } else {
        &telephony.outbound_greeting
    };

    let Some(public_url) = &state.config.server.public_url else {
        tracing::error!("Call entry requested but server.public_url is not set");
        return (StatusCode::INTERNAL_SERVER_ERROR, "PUBLIC_URL not configured").into_response();
    };

    let xml = voice_response(greeting, &media_stream_url(public_url));
    tracing::debug!(direction = ?direction, "Serving call entry document");
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

#[derive(Debug, Deserialize)]
struct MakeCallRequest {
    to_number: String,
}

/// Place an outbound call that lands on `/voice`
async fn make_call(
    State(state): State<AppState>,
    Json(request): Json<MakeCallRequest>,
) -> Result<Response, ServerError> {
    record_request("make_call");

    let Some(public_url) = &state.config.server.public_url else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Set PUBLIC_URL" })),
        )
            .into_response());
    };

    let to = request.to_number.trim();
    if to.is_empty() {
        return Err(ServerError::InvalidRequest("to_number is required".to_string()));
    }

    let caller = state
        .caller
        .as_ref()
        .ok_or_else(|| ServerError::NotConfigured("telephony credentials".to_string()))?;

    let instructions_url = format!("{}/voice", normalize_public_url(public_url));
    let sid = caller.create_call(to, &instructions_url).await?;

    Ok(Json(serde_json::json!({ "message": "Call started", "sid": sid })).into_response())
}

/// Live calls
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallInfo>, StatusCode> {
    state.sessions.get(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "checks": {
                "retriever": state.retriever.name(),
                "active_calls": state.sessions.count(),
            }
        })),
    )
}

/// Readiness: agent credentials present and the knowledge base reachable
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut ready = true;

    let agent_status = if state.config.agent.api_key.is_some() {
        "ok"
    } else {
        ready = false;
        "missing_api_key"
    };
    checks.insert(
        "agent".to_string(),
        serde_json::json!({ "status": agent_status, "url": state.config.agent.url }),
    );

    let kb_status = match &state.vector_store {
        None => "disabled",
        Some(store) => {
            match tokio::time::timeout(Duration::from_secs(2), store.check_collection()).await {
                Ok(Ok(())) => "ok",
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Knowledge base not ready");
                    ready = false;
                    "error"
                }
                Err(_) => {
                    ready = false;
                    "timeout"
                }
            }
        }
    };
    checks.insert(
        "knowledge_base".to_string(),
        serde_json::json!({ "status": kb_status, "retriever": state.retriever.name() }),
    );

    checks.insert(
        "telephony".to_string(),
        serde_json::json!({
            "public_url": state.config.server.public_url.is_some(),
            "outbound_calls": state.caller.is_some(),
        }),
    );

    let (status, code) = if ready {
        ("ready", StatusCode::OK)
    } else {
        ("not_ready", StatusCode::SERVICE_UNAVAILABLE)
    };

    (code, Json(serde_json::json!({ "status": status, "checks": checks })))
}
