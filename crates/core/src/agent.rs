//! Speech-agent protocol
//!
//! The agent transport multiplexes two kinds of traffic on one socket, told
//! apart by frame type alone: binary frames are synthesized speech, text frames
//! are JSON control events.
//!
//! ## Transcript shapes
//!
//! Control events report user speech in one of two shapes, and extraction tries
//! them in a fixed order:
//!
//! 1. Direct fields: `transcript`, then `text`, with finality in `is_final`.
//! 2. Alternatives list: `alternatives[0].transcript`, then `alternatives[0].text`,
//!    with finality in `alternatives[0].final` or `alternatives[0].is_final`.
//!
//! The correlation id is `response_id`, falling back to `id`. It is echoed
//! back unchanged, so a numeric id stays numeric.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result, WireMessage};

/// Control event type announcing that the caller started talking
pub const USER_STARTED_SPEAKING: &str = "UserStartedSpeaking";

/// Message received from the agent transport
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Synthesized speech, already in the telephone-line encoding
    BinaryAudio(Vec<u8>),
    /// Structured control/transcript event
    ControlEvent(ControlEvent),
}

impl AgentMessage {
    /// Classify a wire frame. Text frames that are not valid JSON fail.
    pub fn from_wire(message: WireMessage) -> Result<Self> {
        match message {
            WireMessage::Binary(bytes) => Ok(AgentMessage::BinaryAudio(bytes)),
            WireMessage::Text(text) => Ok(AgentMessage::ControlEvent(ControlEvent::parse(&text)?)),
        }
    }
}

/// A decoded JSON control event
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    payload: Value,
}

impl ControlEvent {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|e| Error::Decode(format!("agent control event: {}", e)))?;
        Ok(Self { payload })
    }

    /// Value of the `type` field
    pub fn event_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    pub fn is_user_started_speaking(&self) -> bool {
        self.event_type() == Some(USER_STARTED_SPEAKING)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// User speech reported by the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Trimmed transcript text, possibly empty
    pub text: String,
    pub is_final: bool,
    /// Ties a response injection back to this utterance
    pub correlation_id: Option<Value>,
}

impl TranscriptEvent {
    /// Extract transcript fields from a control event
    pub fn extract(event: &ControlEvent) -> Self {
        let payload = event.payload();

        let correlation_id = non_empty_id(payload.get("response_id"))
            .or_else(|| non_empty_id(payload.get("id")));

        let mut text = first_text(payload, &["transcript", "text"]).unwrap_or_default();
        let mut is_final = payload.get("is_final").map(truthy).unwrap_or(false);

        if text.is_empty() {
            if let Some(first) = payload
                .get("alternatives")
                .and_then(Value::as_array)
                .and_then(|alts| alts.first())
            {
                text = first_text(first, &["transcript", "text"]).unwrap_or_default();
                let alt_final = first.get("final").map(truthy).unwrap_or(false)
                    || first.get("is_final").map(truthy).unwrap_or(false);
                if alt_final {
                    is_final = true;
                }
            }
        }

        Self {
            text: text.trim().to_string(),
            is_final,
            correlation_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn first_text(value: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| value.get(*field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty_id(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::String(s) if s.is_empty() => None,
        id @ (Value::String(_) | Value::Number(_)) => Some(id.clone()),
        _ => None,
    }
}

/// JSON truthiness as the agent protocol uses it for flags
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Instruction block that steers the agent's next spoken response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "response.create")]
pub struct ResponseInjection {
    pub response_id: Option<Value>,
    pub instructions: String,
}

impl ResponseInjection {
    pub fn new(response_id: Option<Value>, instructions: impl Into<String>) -> Self {
        Self {
            response_id,
            instructions: instructions.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> ControlEvent {
        ControlEvent::new(value)
    }

    #[test]
    fn test_direct_fields() {
        let t = TranscriptEvent::extract(&event(json!({
            "type": "ConversationText",
            "transcript": "  What courses do you offer? ",
            "is_final": true,
            "response_id": "r1"
        })));
        assert_eq!(t.text, "What courses do you offer?");
        assert!(t.is_final);
        assert_eq!(t.correlation_id, Some(json!("r1")));
    }

    #[test]
    fn test_text_field_and_id_fallback() {
        let t = TranscriptEvent::extract(&event(json!({"text": "hello", "id": "abc"})));
        assert_eq!(t.text, "hello");
        assert!(!t.is_final);
        assert_eq!(t.correlation_id, Some(json!("abc")));
    }

    #[test]
    fn test_numeric_id_kept_as_number() {
        let t = TranscriptEvent::extract(&event(json!({"transcript": "hi", "response_id": 5})));
        assert_eq!(t.correlation_id, Some(json!(5)));

        let json = ResponseInjection::new(t.correlation_id, "x").to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["response_id"], json!(5));

        // Empty string id falls through to `id`
        let t = TranscriptEvent::extract(&event(json!({"text": "hi", "response_id": "", "id": 7})));
        assert_eq!(t.correlation_id, Some(json!(7)));
    }

    #[test]
    fn test_alternatives_shape() {
        let t = TranscriptEvent::extract(&event(json!({
            "alternatives": [{"transcript": "pricing please", "final": true}, {"transcript": "ignored"}]
        })));
        assert_eq!(t.text, "pricing please");
        assert!(t.is_final);
        assert_eq!(t.correlation_id, None);

        let t = TranscriptEvent::extract(&event(json!({
            "alternatives": [{"text": "partial", "is_final": false}]
        })));
        assert_eq!(t.text, "partial");
        assert!(!t.is_final);
    }

    #[test]
    fn test_direct_field_wins_over_alternatives() {
        let t = TranscriptEvent::extract(&event(json!({
            "transcript": "direct",
            "alternatives": [{"transcript": "nested", "final": true}]
        })));
        assert_eq!(t.text, "direct");
        // alternatives are only consulted when the direct fields are empty
        assert!(!t.is_final);
    }

    #[test]
    fn test_no_transcript() {
        let t = TranscriptEvent::extract(&event(json!({"type": "AgentAudioDone"})));
        assert!(t.is_empty());
        let t = TranscriptEvent::extract(&event(json!({"alternatives": []})));
        assert!(t.is_empty());
    }

    #[test]
    fn test_user_started_speaking() {
        assert!(event(json!({"type": "UserStartedSpeaking"})).is_user_started_speaking());
        assert!(!event(json!({"type": "ConversationText"})).is_user_started_speaking());
        assert!(!event(json!([1, 2])).is_user_started_speaking());
    }

    #[test]
    fn test_agent_message_from_wire() {
        assert_eq!(
            AgentMessage::from_wire(WireMessage::Binary(vec![9])).unwrap(),
            AgentMessage::BinaryAudio(vec![9])
        );
        assert!(matches!(
            AgentMessage::from_wire(WireMessage::Text("{\"type\":\"Welcome\"}".into())).unwrap(),
            AgentMessage::ControlEvent(_)
        ));
        assert!(AgentMessage::from_wire(WireMessage::Text("{oops".into())).is_err());
    }

    #[test]
    fn test_response_injection_shape() {
        let json = ResponseInjection::new(Some(json!("r1")), "answer briefly")
            .to_json()
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            json!({"type": "response.create", "response_id": "r1", "instructions": "answer briefly"})
        );

        let json = ResponseInjection::new(None, "x").to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["response_id"], Value::Null);
    }
}
