//! Instruction composition
//!
//! Builds the persona-constrained instruction text injected into the agent for
//! each finalized caller utterance.

use voice_bridge_config::persona::{CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER};
use voice_bridge_config::PersonaConfig;

const DEFAULT_TEMPLATE: &str = r#"
You are {assistant_name}, the official voice assistant of the {organization} educational platform.

Your purpose:
- Introduce and promote the {organization}.
- Explain features, benefits, courses, and offerings of {organization}.
- Answer user questions ONLY using the information provided in the retrieved context.
- Do NOT create information that is not present in the context.
- Do NOT use external knowledge outside the context.
- If the user asks something not present in the context, politely say:
  “{not_found_reply}”

Speaking Style:
- Friendly, simple, and clear.
- Sound like an app promoter, not a teacher.
- Keep answers short and direct unless the user asks for details.
- If the user seems confused, re-explain the feature simply.

Rules:
1. ALWAYS base your answer only on the RAG context.
2. NEVER invent or guess.
3. NEVER answer using general knowledge.
4. If context is missing or unrelated, say you don’t have that information.
5. Your identity is ONLY “{assistant_name},” not a tutor or medical/technical expert.

User Question:
{question}

Retrieved Context (your ONLY knowledge):
{context}

Using ONLY the retrieved context, respond as the {organization} app’s voice assistant.
If the context does not contain the answer, clearly state that the information is not available.
"#;

/// Renders question and context into the instruction template
#[derive(Debug, Clone)]
pub struct InstructionComposer {
    template: String,
}

impl InstructionComposer {
    /// Built-in template with persona fields filled in
    pub fn new(persona: &PersonaConfig) -> Self {
        let template = DEFAULT_TEMPLATE
            .replace("{assistant_name}", &persona.assistant_name)
            .replace("{organization}", &persona.organization)
            .replace("{not_found_reply}", &persona.not_found_reply);
        Self { template }
    }

    /// Custom template; must contain `{question}` and `{context}`
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Uses the persona's template file when one is configured
    pub fn from_persona(persona: &PersonaConfig) -> Result<Self, voice_bridge_config::ConfigError> {
        Ok(match persona.load_template()? {
            Some(template) => Self::with_template(template),
            None => Self::new(persona),
        })
    }

    pub fn compose(&self, question: &str, context: &str) -> String {
        render(&self.template, question, context).trim().to_string()
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Single pass substitution, so text inside the question or context is never
/// itself treated as a placeholder.
fn render(template: &str, question: &str, context: &str) -> String {
    let mut out = String::with_capacity(template.len() + question.len() + context.len());
    let mut rest = template;

    loop {
        let next_question = rest.find(QUESTION_PLACEHOLDER);
        let next_context = rest.find(CONTEXT_PLACEHOLDER);

        let (at, placeholder, value) = match (next_question, next_context) {
            (Some(q), Some(c)) if q < c => (q, QUESTION_PLACEHOLDER, question),
            (Some(q), None) => (q, QUESTION_PLACEHOLDER, question),
            (_, Some(c)) => (c, CONTEXT_PLACEHOLDER, context),
            (None, None) => break,
        };

        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + placeholder.len()..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_bridge_core::FALLBACK_CONTEXT;

    #[test]
    fn test_default_template_contents() {
        let composer = InstructionComposer::new(&PersonaConfig::default());
        let text = composer.compose("What courses do you offer?", "Course A info");

        assert!(text.starts_with(
            "You are Skillorea AI, the official voice assistant of the Skillorea educational platform."
        ));
        assert!(text.contains("Your purpose:\n- Introduce and promote the Skillorea."));
        assert!(text.contains("- Explain features, benefits, courses, and offerings of Skillorea."));
        assert!(text.contains("Speaking Style:\n- Friendly, simple, and clear."));
        assert!(text.contains("- Sound like an app promoter, not a teacher."));
        assert!(text.contains("Rules:\n1. ALWAYS base your answer only on the RAG context."));
        assert!(text.contains("5. Your identity is ONLY “Skillorea AI,” not a tutor or medical/technical expert."));
        assert!(text.contains("respond as the Skillorea app’s voice assistant."));
        assert!(text.contains("User Question:\nWhat courses do you offer?"));
        assert!(text.contains("Retrieved Context (your ONLY knowledge):\nCourse A info"));
        assert!(text.contains("“I don’t have that information in my Skillorea knowledge base.”"));
        assert!(!text.contains("{question}"));
        assert!(!text.contains("{context}"));
    }

    #[test]
    fn test_fallback_context_is_embedded() {
        let composer = InstructionComposer::new(&PersonaConfig::default());
        let text = composer.compose("Where is the office?", FALLBACK_CONTEXT);
        assert!(text.contains(FALLBACK_CONTEXT));
    }

    #[test]
    fn test_persona_fields() {
        let persona = PersonaConfig {
            assistant_name: "Ada".to_string(),
            organization: "Acme".to_string(),
            not_found_reply: "No idea.".to_string(),
            instructions_template_path: None,
        };
        let text = InstructionComposer::new(&persona).compose("q", "c");
        assert!(text.starts_with("You are Ada, the official voice assistant of the Acme educational platform."));
        assert!(text.contains("“No idea.”"));
        assert!(text.contains("Your identity is ONLY “Ada,”"));
    }

    #[test]
    fn test_custom_template() {
        let composer = InstructionComposer::with_template("Q={question} C={context} Q again={question}");
        assert_eq!(composer.compose("hi", "ctx"), "Q=hi C=ctx Q again=hi");
    }

    #[test]
    fn test_placeholders_in_values_are_not_expanded() {
        let composer = InstructionComposer::with_template("{question}|{context}");
        assert_eq!(composer.compose("say {context}", "x"), "say {context}|x");
    }
}
