//! Configuration management for the voice bridge
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (VOICE_BRIDGE prefix, `__` section separator)
//! - Provider credentials from their conventional variables
//!   (`PUBLIC_URL`, `DEEPGRAM_API_KEY`, `TWILIO_*`, `OPENAI_API_KEY`) as defaults
//!
//! The agent settings blob sent when the agent transport connects is opaque
//! JSON and is loaded separately with [`load_agent_settings`].

pub mod agent;
pub mod persona;
pub mod settings;

pub use agent::{load_agent_settings, AgentConfig};
pub use persona::PersonaConfig;
pub use settings::{
    load_settings, load_settings_from, DecodeErrorPolicy, ObservabilityConfig, RagConfig,
    RelayConfig, RuntimeEnvironment, ServerConfig, Settings, TelephonyConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for voice_bridge_core::Error {
    fn from(err: ConfigError) -> Self {
        voice_bridge_core::Error::Config(err.to_string())
    }
}
