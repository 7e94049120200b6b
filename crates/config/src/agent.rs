//! Agent transport configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::ConfigError;

/// Speech-agent connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Websocket endpoint of the agent service
    #[serde(default = "default_agent_url")]
    pub url: String,

    /// API key, offered as the `token` websocket subprotocol
    #[serde(default = "default_agent_api_key")]
    pub api_key: Option<String>,

    /// JSON settings blob sent as the first message after connecting
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
}

fn default_agent_url() -> String {
    "wss://agent.deepgram.com/v1/agent/converse".to_string()
}

fn default_agent_api_key() -> Option<String> {
    std::env::var("DEEPGRAM_API_KEY").ok().filter(|k| !k.is_empty())
}

fn default_settings_path() -> String {
    "config/agent.json".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            api_key: default_agent_api_key(),
            settings_path: default_settings_path(),
        }
    }
}

/// Load the agent settings blob
///
/// The content is passed through untouched; only JSON well-formedness and a
/// top-level object are checked.
pub fn load_agent_settings(path: impl AsRef<Path>) -> Result<Value, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    if !value.is_object() {
        return Err(ConfigError::InvalidValue {
            field: "agent.settings_path".to_string(),
            message: format!("{} must contain a JSON object", path.display()),
        });
    }

    tracing::debug!(path = %path.display(), "Loaded agent settings");
    Ok(value)
}
