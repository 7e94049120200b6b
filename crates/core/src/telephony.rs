//! Telephony media-stream protocol
//!
//! Inbound (text frames from the call):
//! ```text
//! {"event": "start", "start": {"streamSid": "MZ..."}}
//! {"event": "media", "media": {"payload": "<base64 audio>"}}
//! {"event": "stop"}
//! ```
//! Outbound (text frames to the call):
//! ```text
//! {"event": "media", "streamSid": "MZ...", "media": {"payload": "<base64 audio>"}}
//! {"event": "clear", "streamSid": "MZ..."}
//! ```
//! The provider also emits bookkeeping events (`connected`, `mark`, `dtmf`).
//! Those parse as [`InboundEvent::Other`] and carry no meaning for the relay.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Event received from the telephony transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Stream started; carries the session identifier
    SessionStart { stream_sid: String },
    /// Caller audio, already base64-decoded
    MediaChunk(Vec<u8>),
    /// Caller hung up or the stream was stopped
    SessionStop,
    /// Well-formed event of a kind the relay does not act on
    Other(String),
}

#[derive(Deserialize)]
struct StartEnvelope {
    start: StartMeta,
}

#[derive(Deserialize)]
struct StartMeta {
    #[serde(rename = "streamSid")]
    stream_sid: String,
}

#[derive(Deserialize)]
struct MediaEnvelope {
    media: MediaPayload,
}

impl InboundEvent {
    /// Parse a telephony text frame
    ///
    /// Fails on invalid JSON, a missing `event` field, missing fields for a
    /// known event, or an undecodable audio payload.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Decode("telephony message has no event field".to_string()))?
            .to_string();

        match event.as_str() {
            "start" => {
                let envelope: StartEnvelope = serde_json::from_value(value)?;
                Ok(InboundEvent::SessionStart {
                    stream_sid: envelope.start.stream_sid,
                })
            }
            "media" => {
                let envelope: MediaEnvelope = serde_json::from_value(value)?;
                let bytes = BASE64.decode(envelope.media.payload.as_bytes())?;
                Ok(InboundEvent::MediaChunk(bytes))
            }
            "stop" => Ok(InboundEvent::SessionStop),
            _ => Ok(InboundEvent::Other(event)),
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &str {
        match self {
            InboundEvent::SessionStart { .. } => "start",
            InboundEvent::MediaChunk(_) => "media",
            InboundEvent::SessionStop => "stop",
            InboundEvent::Other(name) => name,
        }
    }
}

/// Base64 media payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// Event sent to the telephony transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Synthesized speech for the caller
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    /// Discard any audio still buffered toward the caller
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl OutboundEvent {
    /// Wrap raw agent audio in a media envelope
    pub fn media(stream_sid: impl Into<String>, audio: &[u8]) -> Self {
        OutboundEvent::Media {
            stream_sid: stream_sid.into(),
            media: MediaPayload {
                payload: BASE64.encode(audio),
            },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        OutboundEvent::Clear {
            stream_sid: stream_sid.into(),
        }
    }

    /// Serialize for a text frame
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        let event =
            InboundEvent::parse(r#"{"event":"start","start":{"streamSid":"MZ123","callSid":"CA1"}}"#)
                .unwrap();
        assert_eq!(
            event,
            InboundEvent::SessionStart {
                stream_sid: "MZ123".to_string()
            }
        );
    }

    #[test]
    fn test_parse_media_decodes_payload() {
        let payload = BASE64.encode([0xffu8, 0x7f, 0x00]);
        let text = format!(r#"{{"event":"media","media":{{"payload":"{}"}}}}"#, payload);
        let event = InboundEvent::parse(&text).unwrap();
        assert_eq!(event, InboundEvent::MediaChunk(vec![0xff, 0x7f, 0x00]));
    }

    #[test]
    fn test_parse_stop_and_other() {
        assert_eq!(
            InboundEvent::parse(r#"{"event":"stop"}"#).unwrap(),
            InboundEvent::SessionStop
        );
        assert_eq!(
            InboundEvent::parse(r#"{"event":"connected","protocol":"Call"}"#).unwrap(),
            InboundEvent::Other("connected".to_string())
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(InboundEvent::parse("not json"), Err(Error::Decode(_))));
        assert!(matches!(InboundEvent::parse(r#"{"media":{}}"#), Err(Error::Decode(_))));
        assert!(matches!(
            InboundEvent::parse(r#"{"event":"start","start":{}}"#),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            InboundEvent::parse(r#"{"event":"media","media":{"payload":"%%%"}}"#),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_outbound_shapes() {
        let media = OutboundEvent::media("MZ1", &[1, 2, 3]).to_json().unwrap();
        let value: Value = serde_json::from_str(&media).unwrap();
        assert_eq!(value["event"], "media");
        assert_eq!(value["streamSid"], "MZ1");
        assert_eq!(value["media"]["payload"], BASE64.encode([1u8, 2, 3]));

        let clear = OutboundEvent::clear("MZ1").to_json().unwrap();
        let value: Value = serde_json::from_str(&clear).unwrap();
        assert_eq!(value, serde_json::json!({"event": "clear", "streamSid": "MZ1"}));
    }
}
