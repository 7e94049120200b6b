//! Agent receiver
//!
//! Waits for the stream identifier, then handles everything the agent sends:
//! synthesized audio is wrapped as telephony media and forwarded in order,
//! control events go through barge-in and then turn handling.
//!
//! Turns run concurrently with the receive loop so that a slow retrieval never
//! holds back agent audio. Barge-in is handled inline, before a turn for the
//! same message is started.

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, SinkExt, StreamExt};
use std::sync::Arc;

use voice_bridge_core::{
    AgentMessage, Error, MessageSink, MessageStream, OutboundEvent, ResponseInjection,
    WireMessage,
};

use crate::barge_in::BargeInHandler;
use crate::metrics;
use crate::session::{SessionEnd, SessionObserver, SessionStats};
use crate::turn::TurnController;

type TurnFuture = BoxFuture<'static, Result<ResponseInjection, Error>>;

pub struct AgentReceiver<'a> {
    incoming: MessageStream,
    telephony: &'a mut MessageSink,
    session: SessionObserver,
    barge_in: BargeInHandler,
    turns: TurnController,
    stats: Arc<SessionStats>,
}

impl<'a> AgentReceiver<'a> {
    pub fn new(
        incoming: MessageStream,
        telephony: &'a mut MessageSink,
        session: SessionObserver,
        barge_in: BargeInHandler,
        turns: TurnController,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            incoming,
            telephony,
            session,
            barge_in,
            turns,
            stats,
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        let Some(stream_sid) = self.session.wait_for_stream_sid().await else {
            return SessionEnd::TelephonyClosed;
        };
        tracing::debug!(stream_sid = %stream_sid, "Agent receiver active");

        let mut in_flight: FuturesUnordered<TurnFuture> = FuturesUnordered::new();

        loop {
            tokio::select! {
                message = self.incoming.next() => {
                    let message = match message {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Agent receive failed");
                            return SessionEnd::TransportError(e.to_string());
                        }
                        None => {
                            tracing::info!("Agent transport closed");
                            return SessionEnd::AgentClosed;
                        }
                    };

                    let message = match AgentMessage::from_wire(message) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring undecodable agent message");
                            continue;
                        }
                    };

                    match message {
                        AgentMessage::BinaryAudio(audio) => {
                            if let Err(e) = self.forward_audio(&stream_sid, &audio).await {
                                return SessionEnd::TransportError(e.to_string());
                            }
                        }
                        AgentMessage::ControlEvent(event) => {
                            if let Err(e) = self.barge_in.handle(&event, &stream_sid, self.telephony).await {
                                return SessionEnd::TransportError(e.to_string());
                            }
                            if let Some(transcript) = self.turns.accept(&event) {
                                tracing::debug!(text = %transcript.text, "Final transcript");
                                let turns = self.turns.clone();
                                in_flight.push(async move { turns.respond(transcript).await }.boxed());
                            }
                        }
                    }
                }
                Some(result) = in_flight.next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Response injection failed");
                        return SessionEnd::TransportError(e.to_string());
                    }
                }
            }
        }
    }

    async fn forward_audio(&mut self, stream_sid: &str, audio: &[u8]) -> Result<(), Error> {
        let media = OutboundEvent::media(stream_sid, audio).to_json()?;
        self.telephony.send(WireMessage::Text(media)).await?;
        self.stats.record_audio_to_caller();
        metrics::record_audio_to_caller();
        Ok(())
    }
}
