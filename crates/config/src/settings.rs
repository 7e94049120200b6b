//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use voice_bridge_core::{DEFAULT_FRAME_SIZE, MAX_CONTEXT_SNIPPETS};

use crate::{AgentConfig, ConfigError, PersonaConfig};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - credentials optional
    #[default]
    Development,
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Per-call relay behaviour
    #[serde(default)]
    pub relay: RelayConfig,

    /// Speech-agent connection
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub persona: PersonaConfig,

    #[serde(default)]
    pub rag: RagConfig,

    /// Telephony REST credentials and greetings
    #[serde(default)]
    pub telephony: TelephonyConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Publicly reachable base URL of this server, used in call instructions
    #[serde(default = "default_public_url")]
    pub public_url: Option<String>,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed origins for the JSON API; localhost:3000 when empty
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_public_url() -> Option<String> {
    std::env::var("PUBLIC_URL").ok().filter(|u| !u.is_empty())
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// What the telephony reader does with a message it cannot decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// End the session
    #[default]
    Terminate,
    /// Log the message and keep reading
    Skip,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Bytes per audio frame sent to the agent
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    #[serde(default)]
    pub decode_error_policy: DecodeErrorPolicy,

    /// Clear caller-side audio when the user starts speaking
    #[serde(default = "default_true")]
    pub barge_in_enabled: bool,
}

fn default_frame_size() -> usize {
    DEFAULT_FRAME_SIZE
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            decode_error_policy: DecodeErrorPolicy::default(),
            barge_in_enabled: true,
        }
    }
}

/// Knowledge retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// When disabled every turn uses the fallback context
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// OpenAI-compatible embeddings base URL
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_api_key")]
    pub embedding_api_key: Option<String>,

    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Number of matches to assemble into context
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Payload field holding the snippet text
    #[serde(default = "default_answer_field")]
    pub answer_field: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
}
fn default_qdrant_endpoint() -> String {
    "http://localhost:6334".to_string()
}
fn default_qdrant_collection() -> String {
    "skillorea-voice".to_string()
}
fn default_top_k() -> usize {
    MAX_CONTEXT_SNIPPETS
}
fn default_answer_field() -> String {
    "answer".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            embedding_api_key: default_embedding_api_key(),
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_collection: default_qdrant_collection(),
            qdrant_api_key: None,
            top_k: default_top_k(),
            answer_field: default_answer_field(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Telephony provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_account_sid")]
    pub account_sid: Option<String>,

    #[serde(default = "default_auth_token")]
    pub auth_token: Option<String>,

    /// Caller id for outbound calls
    #[serde(default = "default_from_number")]
    pub from_number: Option<String>,

    #[serde(default = "default_inbound_greeting")]
    pub inbound_greeting: String,

    #[serde(default = "default_outbound_greeting")]
    pub outbound_greeting: String,
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}
fn default_account_sid() -> Option<String> {
    std::env::var("TWILIO_ACCOUNT_SID").ok().filter(|s| !s.is_empty())
}
fn default_auth_token() -> Option<String> {
    std::env::var("TWILIO_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}
fn default_from_number() -> Option<String> {
    std::env::var("TWILIO_PHONE_NUMBER").ok().filter(|s| !s.is_empty())
}
fn default_inbound_greeting() -> String {
    "Welcome to Skillorea. You are now connected to our AI assistant.".to_string()
}
fn default_outbound_greeting() -> String {
    "Connecting you to Skillorea Voice agent.".to_string()
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            account_sid: default_account_sid(),
            auth_token: default_auth_token(),
            from_number: default_from_number(),
            inbound_greeting: default_inbound_greeting(),
            outbound_greeting: default_outbound_greeting(),
        }
    }
}

impl TelephonyConfig {
    /// Whether outbound calls can be placed
    pub fn has_credentials(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_relay()?;
        self.validate_agent()?;
        self.validate_rag()?;
        self.validate_telephony()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if let Some(url) = &self.server.public_url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "server.public_url".to_string(),
                    message: "Must not be blank when set".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_relay(&self) -> Result<(), ConfigError> {
        if self.relay.frame_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "relay.frame_size".to_string(),
                message: "Frame size must be at least 1 byte".to_string(),
            });
        }

        if self.relay.frame_size != DEFAULT_FRAME_SIZE {
            tracing::warn!(
                frame_size = self.relay.frame_size,
                "Non-default frame size; the agent must be configured for the same cadence"
            );
        }

        Ok(())
    }

    fn validate_agent(&self) -> Result<(), ConfigError> {
        let url = &self.agent.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue {
                field: "agent.url".to_string(),
                message: format!("Must be a ws:// or wss:// URL, got {}", url),
            });
        }

        if self.environment.is_production() && self.agent.api_key.is_none() {
            return Err(ConfigError::MissingField("agent.api_key".to_string()));
        }

        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if !(1..=MAX_CONTEXT_SNIPPETS).contains(&rag.top_k) {
            return Err(ConfigError::InvalidValue {
                field: "rag.top_k".to_string(),
                message: format!(
                    "Must be between 1 and {}, got {}",
                    MAX_CONTEXT_SNIPPETS, rag.top_k
                ),
            });
        }

        if !rag.enabled {
            return Ok(());
        }

        if rag.embedding_endpoint.is_empty() {
            return Err(ConfigError::MissingField("rag.embedding_endpoint".to_string()));
        }

        if rag.qdrant_endpoint.is_empty() {
            return Err(ConfigError::MissingField("rag.qdrant_endpoint".to_string()));
        }

        if rag.answer_field.is_empty() {
            return Err(ConfigError::MissingField("rag.answer_field".to_string()));
        }

        if rag.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.request_timeout_ms".to_string(),
                message: "Timeout must be at least 1ms".to_string(),
            });
        }

        Ok(())
    }

    fn validate_telephony(&self) -> Result<(), ConfigError> {
        if self.environment.is_production() && !self.telephony.has_credentials() {
            return Err(ConfigError::InvalidValue {
                field: "telephony".to_string(),
                message: "account_sid, auth_token and from_number must be set in production"
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (VOICE_BRIDGE prefix, `__` separator)
/// 2. config/{env}.* (if env specified)
/// 3. config/default.*
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings with an explicit config directory
pub fn load_settings_from(config_dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = config_dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = config_dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_BRIDGE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.relay.frame_size, 3200);
        assert_eq!(settings.relay.decode_error_policy, DecodeErrorPolicy::Terminate);
        assert_eq!(settings.rag.top_k, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_relay_validation() {
        let mut settings = Settings::default();
        settings.relay.frame_size = 0;
        assert!(settings.validate_relay().is_err());

        settings.relay.frame_size = 1600;
        assert!(settings.validate_relay().is_ok());
    }

    #[test]
    fn test_rag_top_k_bounds() {
        let mut settings = Settings::default();
        settings.rag.top_k = 0;
        assert!(settings.validate_rag().is_err());
        settings.rag.top_k = 4;
        assert!(settings.validate_rag().is_err());
        settings.rag.top_k = 2;
        assert!(settings.validate_rag().is_ok());
    }

    #[test]
    fn test_disabled_rag_skips_endpoint_checks() {
        let mut settings = Settings::default();
        settings.rag.qdrant_endpoint.clear();
        assert!(settings.validate_rag().is_err());

        settings.rag.enabled = false;
        assert!(settings.validate_rag().is_ok());
    }

    #[test]
    fn test_agent_url_validation() {
        let mut settings = Settings::default();
        settings.agent.url = "https://agent.example.com".to_string();
        assert!(settings.validate_agent().is_err());

        settings.agent.url = "ws://localhost:9000/agent".to_string();
        assert!(settings.validate_agent().is_ok());
    }

    #[test]
    fn test_production_requires_credentials() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.agent.api_key = Some("dg-key".to_string());
        settings.telephony.account_sid = None;
        assert!(settings.validate_telephony().is_err());

        settings.telephony.account_sid = Some("AC123".to_string());
        settings.telephony.auth_token = Some("secret".to_string());
        settings.telephony.from_number = Some("+15550001111".to_string());
        assert!(settings.validate_telephony().is_ok());

        settings.agent.api_key = None;
        assert!(settings.validate_agent().is_err());
    }

    #[test]
    fn test_load_settings_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.yaml")).unwrap();
        writeln!(
            file,
            "server:\n  port: 7070\nrelay:\n  frame_size: 1600\n  decode_error_policy: skip\nrag:\n  enabled: false"
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), None).unwrap();
        assert_eq!(settings.server.port, 7070);
        assert_eq!(settings.relay.frame_size, 1600);
        assert_eq!(settings.relay.decode_error_policy, DecodeErrorPolicy::Skip);
        assert!(!settings.rag.enabled);
    }

    #[test]
    fn test_environment_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.yaml"), "server:\n  port: 7070\n").unwrap();
        std::fs::write(dir.path().join("staging.yaml"), "server:\n  port: 7171\n").unwrap();

        let settings = load_settings_from(dir.path(), Some("staging")).unwrap();
        assert_eq!(settings.server.port, 7171);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.yaml"), "relay:\n  frame_size: 0\n").unwrap();
        assert!(matches!(
            load_settings_from(dir.path(), None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
