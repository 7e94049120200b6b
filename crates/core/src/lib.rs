//! Core traits and types for the voice bridge
//!
//! This crate provides foundational types used across all other crates:
//! - Transport-neutral wire messages and stream/sink aliases
//! - Telephony media-stream protocol (inbound/outbound events)
//! - Speech-agent protocol (control events, transcripts, response injection)
//! - Audio frame type
//! - Knowledge retrieval trait
//! - Error types

pub mod agent;
pub mod audio;
pub mod error;
pub mod telephony;
pub mod traits;
pub mod transport;

pub use agent::{AgentMessage, ControlEvent, ResponseInjection, TranscriptEvent, USER_STARTED_SPEAKING};
pub use audio::{AudioFrame, DEFAULT_FRAME_SIZE};
pub use error::{Error, Result};
pub use telephony::{InboundEvent, OutboundEvent};
pub use transport::{MessageSink, MessageStream, WireMessage};

// Trait re-exports
pub use traits::{
    KnowledgeRetriever, RetrievalError, RetrievedContext, FALLBACK_CONTEXT, MAX_CONTEXT_SNIPPETS,
};
