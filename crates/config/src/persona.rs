//! Persona configuration for response injection
//!
//! The persona names the assistant and the organization it speaks for, and the
//! reply it gives when the retrieved context does not answer the question. An
//! optional template file replaces the built-in instruction text entirely.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Placeholder for the caller's question in a custom template
pub const QUESTION_PLACEHOLDER: &str = "{question}";
/// Placeholder for the retrieved context in a custom template
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default = "default_organization")]
    pub organization: String,

    /// What to say when the context has no answer
    #[serde(default = "default_not_found_reply")]
    pub not_found_reply: String,

    /// Custom instruction template (must contain `{question}` and `{context}`)
    #[serde(default)]
    pub instructions_template_path: Option<String>,
}

fn default_assistant_name() -> String {
    "Skillorea AI".to_string()
}

fn default_organization() -> String {
    "Skillorea".to_string()
}

fn default_not_found_reply() -> String {
    "I don’t have that information in my Skillorea knowledge base.".to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            organization: default_organization(),
            not_found_reply: default_not_found_reply(),
            instructions_template_path: None,
        }
    }
}

impl PersonaConfig {
    /// Read the custom template, if one is configured
    pub fn load_template(&self) -> Result<Option<String>, ConfigError> {
        let Some(path) = &self.instructions_template_path else {
            return Ok(None);
        };

        let template = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.clone()))?;
        validate_template(&template)?;
        Ok(Some(template))
    }
}

/// Check that a template interpolates both the question and the context
pub fn validate_template(template: &str) -> Result<(), ConfigError> {
    for placeholder in [QUESTION_PLACEHOLDER, CONTEXT_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(ConfigError::InvalidValue {
                field: "persona.instructions_template_path".to_string(),
                message: format!("template is missing the {} placeholder", placeholder),
            });
        }
    }
    Ok(())
}
