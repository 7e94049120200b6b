//! Turn handling
//!
//! A turn is one finalized caller utterance. For each one the controller
//! retrieves knowledge for the transcript, renders the persona instructions
//! and injects them into the agent as a `response.create` message. Partial
//! and empty transcripts are not turns.

use futures::SinkExt;
use std::sync::Arc;
use std::time::Instant;

use voice_bridge_core::{
    ControlEvent, KnowledgeRetriever, ResponseInjection, Result, RetrievedContext,
    TranscriptEvent, WireMessage,
};

use crate::frame_sender::SharedSink;
use crate::metrics;
use crate::prompt::InstructionComposer;
use crate::session::SessionStats;

#[derive(Clone)]
pub struct TurnController {
    retriever: Arc<dyn KnowledgeRetriever>,
    composer: Arc<InstructionComposer>,
    agent: SharedSink,
    stats: Arc<SessionStats>,
}

impl TurnController {
    pub fn new(
        retriever: Arc<dyn KnowledgeRetriever>,
        composer: Arc<InstructionComposer>,
        agent: SharedSink,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            retriever,
            composer,
            agent,
            stats,
        }
    }

    /// The transcript this event finalizes, if any
    pub fn accept(&self, event: &ControlEvent) -> Option<TranscriptEvent> {
        let transcript = TranscriptEvent::extract(event);
        if transcript.is_empty() || !transcript.is_final {
            return None;
        }
        Some(transcript)
    }

    /// Retrieve, compose and inject the response for a finalized transcript.
    ///
    /// Retrieval failures fall back to the fixed context; only a failed send
    /// on the agent transport is an error.
    pub async fn respond(&self, transcript: TranscriptEvent) -> Result<ResponseInjection> {
        let start = Instant::now();
        let context = match self.retriever.retrieve(&transcript.text).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(
                    retriever = self.retriever.name(),
                    error = %e,
                    "Knowledge retrieval failed, using fallback context"
                );
                RetrievedContext::fallback()
            }
        };
        metrics::record_retrieval_latency(start.elapsed().as_secs_f64());
        if context.is_fallback() {
            self.stats.record_retrieval_fallback();
            metrics::record_retrieval_fallback();
        }

        let instructions = self.composer.compose(&transcript.text, context.as_str());
        let injection = ResponseInjection::new(transcript.correlation_id.clone(), instructions);
        let json = injection.to_json()?;

        {
            let mut sink = self.agent.lock().await;
            sink.send(WireMessage::Text(json)).await?;
        }

        self.stats.record_turn();
        metrics::record_turn();
        tracing::info!(
            response_id = ?injection.response_id,
            snippets = context.snippet_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Injected response instructions"
        );
        Ok(injection)
    }
}
