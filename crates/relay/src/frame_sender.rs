//! Frame sender
//!
//! Drains the outbound frame queue onto the agent transport, one binary
//! message per frame, in queue order.

use futures::SinkExt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use voice_bridge_core::{AudioFrame, MessageSink, WireMessage};

use crate::metrics;
use crate::session::{SessionEnd, SessionStats};

/// Agent sink shared by the frame sender and in-flight turns
pub type SharedSink = Arc<Mutex<MessageSink>>;

pub struct FrameSender {
    frames: mpsc::UnboundedReceiver<AudioFrame>,
    agent: SharedSink,
    stats: Arc<SessionStats>,
}

impl FrameSender {
    pub fn new(
        frames: mpsc::UnboundedReceiver<AudioFrame>,
        agent: SharedSink,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            frames,
            agent,
            stats,
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        while let Some(frame) = self.frames.recv().await {
            let sequence = frame.sequence();
            let result = {
                let mut sink = self.agent.lock().await;
                sink.send(WireMessage::Binary(frame.into_bytes())).await
            };

            if let Err(e) = result {
                tracing::warn!(sequence, error = %e, "Failed to send audio frame to agent");
                return SessionEnd::TransportError(e.to_string());
            }
            self.stats.record_frame_to_agent();
            metrics::record_frame_to_agent();
        }

        // Queue closed: the telephony reader is gone
        SessionEnd::TelephonyClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use voice_bridge_core::Error;

    #[tokio::test]
    async fn test_frames_sent_in_order() {
        let (sink_tx, sink_rx) = futures::channel::mpsc::unbounded::<WireMessage>();
        let sink: MessageSink = Box::pin(sink_tx.sink_map_err(|e| Error::Transport(e.to_string())));
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SessionStats::default());

        for seq in 0..3u64 {
            tx.send(AudioFrame::new(vec![seq as u8; 4], seq)).unwrap();
        }
        drop(tx);

        let end = FrameSender::new(rx, Arc::new(Mutex::new(sink)), stats.clone())
            .run()
            .await;
        assert_eq!(end, SessionEnd::TelephonyClosed);

        let sent: Vec<WireMessage> = sink_rx.collect().await;
        assert_eq!(
            sent,
            vec![
                WireMessage::Binary(vec![0; 4]),
                WireMessage::Binary(vec![1; 4]),
                WireMessage::Binary(vec![2; 4]),
            ]
        );
        assert_eq!(stats.snapshot().frames_to_agent, 3);
    }

    #[tokio::test]
    async fn test_send_failure_ends_session() {
        let (sink_tx, sink_rx) = futures::channel::mpsc::unbounded::<WireMessage>();
        drop(sink_rx);
        let sink: MessageSink = Box::pin(sink_tx.sink_map_err(|e| Error::Transport(e.to_string())));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(AudioFrame::new(vec![0; 4], 0)).unwrap();

        let end = FrameSender::new(rx, Arc::new(Mutex::new(sink)), Arc::new(SessionStats::default()))
            .run()
            .await;
        assert!(matches!(end, SessionEnd::TransportError(_)));
    }
}
