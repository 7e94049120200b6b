//! Call relay
//!
//! One `CallRelay` per phone call. `run` drives three loops on the current
//! task until the first of them finishes:
//!
//! - telephony reader: carrier messages into the frame queue
//! - frame sender: frame queue onto the agent transport
//! - agent receiver: agent audio back to the caller, control events into
//!   barge-in and turn handling
//!
//! Whichever loop ends first decides the session outcome; the others are
//! dropped, both transports are closed and a summary is returned. On `stop`,
//! frames already queued for the agent are flushed before teardown.

use futures::SinkExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use voice_bridge_config::{DecodeErrorPolicy, RelayConfig};
use voice_bridge_core::{KnowledgeRetriever, MessageSink, MessageStream, WireMessage, DEFAULT_FRAME_SIZE};

use crate::agent_receiver::AgentReceiver;
use crate::barge_in::BargeInHandler;
use crate::frame_sender::{FrameSender, SharedSink};
use crate::metrics;
use crate::prompt::InstructionComposer;
use crate::session::{SessionEnd, SessionHandle, SessionObserver, SessionSummary};
use crate::telephony_reader::TelephonyReader;
use crate::turn::TurnController;

/// Upper bound on sending frames still queued when the caller hangs up
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Both halves of one transport connection
pub struct Transport {
    pub incoming: MessageStream,
    pub outgoing: MessageSink,
}

impl Transport {
    pub fn new(incoming: MessageStream, outgoing: MessageSink) -> Self {
        Self { incoming, outgoing }
    }
}

/// Per-call relay options
#[derive(Debug, Clone)]
pub struct CallRelayConfig {
    pub frame_size: usize,
    pub decode_error_policy: DecodeErrorPolicy,
    pub barge_in_enabled: bool,
    /// Sent to the agent as the first message, when present
    pub agent_settings: Option<Value>,
}

impl Default for CallRelayConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            decode_error_policy: DecodeErrorPolicy::default(),
            barge_in_enabled: true,
            agent_settings: None,
        }
    }
}

impl CallRelayConfig {
    pub fn from_settings(relay: &RelayConfig, agent_settings: Option<Value>) -> Self {
        Self {
            frame_size: relay.frame_size,
            decode_error_policy: relay.decode_error_policy,
            barge_in_enabled: relay.barge_in_enabled,
            agent_settings,
        }
    }
}

pub struct CallRelay {
    config: CallRelayConfig,
    retriever: Arc<dyn KnowledgeRetriever>,
    composer: Arc<InstructionComposer>,
    session: SessionHandle,
}

impl CallRelay {
    pub fn new(
        call_id: impl Into<String>,
        config: CallRelayConfig,
        retriever: Arc<dyn KnowledgeRetriever>,
        composer: Arc<InstructionComposer>,
    ) -> Self {
        Self {
            config,
            retriever,
            composer,
            session: SessionHandle::new(call_id),
        }
    }

    pub fn call_id(&self) -> &str {
        self.session.call_id()
    }

    /// Watch this call's state from elsewhere
    pub fn observe(&self) -> SessionObserver {
        self.session.observe()
    }

    /// Relay until either side ends the session
    pub async fn run(self, telephony: Transport, agent: Transport) -> SessionSummary {
        let Transport {
            incoming: telephony_in,
            outgoing: mut telephony_out,
        } = telephony;
        let Transport {
            incoming: agent_in,
            outgoing: mut agent_out,
        } = agent;

        metrics::record_session_started();
        tracing::info!(
            call_id = %self.session.call_id(),
            retriever = self.retriever.name(),
            frame_size = self.config.frame_size,
            "Call relay started"
        );

        let end = match self.send_agent_settings(&mut agent_out).await {
            Err(end) => end,
            Ok(()) => {
                let agent_out: SharedSink = Arc::new(Mutex::new(agent_out));
                let end = self.relay(telephony_in, &mut telephony_out, agent_in, agent_out.clone()).await;

                let mut sink = agent_out.lock().await;
                if let Err(e) = sink.close().await {
                    tracing::debug!(error = %e, "Agent transport close failed");
                }
                end
            }
        };

        if let Err(e) = telephony_out.close().await {
            tracing::debug!(error = %e, "Telephony transport close failed");
        }
        self.session.close();
        metrics::record_session_ended(end.reason());

        let summary = SessionSummary {
            call_id: self.session.call_id().to_string(),
            stream_sid: self.session.stream_sid(),
            end,
            stats: self.session.stats().snapshot(),
            duration: self.session.elapsed(),
        };
        tracing::info!(
            call_id = %summary.call_id,
            stream_sid = ?summary.stream_sid,
            end = %summary.end,
            frames_to_agent = summary.stats.frames_to_agent,
            audio_to_caller = summary.stats.audio_to_caller,
            turns = summary.stats.turns,
            duration_ms = summary.duration.as_millis() as u64,
            "Call relay finished"
        );
        summary
    }

    async fn send_agent_settings(&self, agent_out: &mut MessageSink) -> Result<(), SessionEnd> {
        let Some(settings) = &self.config.agent_settings else {
            return Ok(());
        };

        agent_out
            .send(WireMessage::Text(settings.to_string()))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to send agent settings");
                SessionEnd::TransportError(e.to_string())
            })
    }

    async fn relay(
        &self,
        telephony_in: MessageStream,
        telephony_out: &mut MessageSink,
        agent_in: MessageStream,
        agent_out: SharedSink,
    ) -> SessionEnd {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let stats = self.session.stats().clone();

        let reader = TelephonyReader::new(
            telephony_in,
            self.config.frame_size,
            frames_tx,
            &self.session,
            self.config.decode_error_policy,
        );
        let sender = FrameSender::new(frames_rx, agent_out.clone(), stats.clone());
        let turns = TurnController::new(
            self.retriever.clone(),
            self.composer.clone(),
            agent_out,
            stats.clone(),
        );
        let receiver = AgentReceiver::new(
            agent_in,
            telephony_out,
            self.session.observe(),
            BargeInHandler::new(self.config.barge_in_enabled, stats.clone()),
            turns,
            stats,
        );

        let reader = reader.run();
        let sender = sender.run();
        let receiver = receiver.run();
        tokio::pin!(reader, sender, receiver);

        tokio::select! {
            end = &mut reader => {
                // Frames cut before `stop` still belong to the call
                if end == SessionEnd::TelephonyStopped {
                    match tokio::time::timeout(FLUSH_TIMEOUT, &mut sender).await {
                        Ok(SessionEnd::TelephonyClosed) => {
                            tracing::debug!(call_id = %self.session.call_id(), "Queued frames flushed");
                        }
                        Ok(other) => {
                            tracing::warn!(call_id = %self.session.call_id(), end = %other, "Frame flush failed");
                        }
                        Err(_) => {
                            tracing::warn!(call_id = %self.session.call_id(), "Frame flush timed out");
                        }
                    }
                }
                end
            }
            end = &mut sender => end,
            end = &mut receiver => end,
        }
    }
}
