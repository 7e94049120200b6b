//! Telephony provider integration
//!
//! - `TwilioClient` places outbound calls through the REST API
//! - TwiML helpers build the call-entry document that greets the caller and
//!   connects the call's media stream back to this server

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use voice_bridge_config::TelephonyConfig;

use crate::ServerError;

/// Places outbound calls
#[async_trait]
pub trait OutboundCaller: Send + Sync {
    /// Start a call to `to`; the provider fetches call instructions from
    /// `instructions_url`. Returns the provider's call id.
    async fn create_call(&self, to: &str, instructions_url: &str) -> Result<String, ServerError>;
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

pub struct TwilioClient {
    http: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    /// Build from settings; fails if any credential is missing
    pub fn from_config(config: &TelephonyConfig) -> Result<Self, ServerError> {
        let missing = |field: &str| ServerError::NotConfigured(format!("telephony.{}", field));

        let account_sid = config.account_sid.clone().ok_or_else(|| missing("account_sid"))?;
        let auth_token = config.auth_token.clone().ok_or_else(|| missing("auth_token"))?;
        let from_number = config.from_number.clone().ok_or_else(|| missing("from_number"))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    fn calls_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Calls.json", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl OutboundCaller for TwilioClient {
    async fn create_call(&self, to: &str, instructions_url: &str) -> Result<String, ServerError> {
        let form = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Url", instructions_url),
        ];

        let response = self
            .http
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| ServerError::Telephony(format!("Call request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServerError::Telephony(format!("Call creation failed: {} - {}", status, body)));
        }

        let call: CallResource = response
            .json()
            .await
            .map_err(|e| ServerError::Telephony(format!("Failed to parse call response: {}", e)))?;

        tracing::info!(call_sid = %call.sid, to, "Outbound call created");
        Ok(call.sid)
    }
}

/// Base URL with a scheme and no trailing slash; bare hosts get `https://`
pub fn normalize_public_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// WebSocket URL of the media-stream endpoint for a public base URL
pub fn media_stream_url(public_url: &str) -> String {
    let base = normalize_public_url(public_url)
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/twilio", base)
}

/// Call-entry document: greet, then connect the media stream
pub fn voice_response(greeting: &str, stream_url: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response>",
            "<Say>{}</Say>",
            r#"<Connect><Stream url="{}" /></Connect>"#,
            "</Response>"
        ),
        escape_xml(greeting),
        escape_xml(stream_url)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
