//! Barge-in
//!
//! When the agent reports that the caller started talking, any agent speech
//! still queued on the carrier side is flushed with a `clear` event so the
//! caller is not talked over.

use futures::SinkExt;
use std::sync::Arc;

use voice_bridge_core::{ControlEvent, MessageSink, OutboundEvent, Result, WireMessage};

use crate::metrics;
use crate::session::SessionStats;

#[derive(Debug, Clone)]
pub struct BargeInHandler {
    enabled: bool,
    stats: Arc<SessionStats>,
}

impl BargeInHandler {
    pub fn new(enabled: bool, stats: Arc<SessionStats>) -> Self {
        Self { enabled, stats }
    }

    /// Send `clear` for a user-started-speaking event.
    ///
    /// Returns whether a clear was sent.
    pub async fn handle(
        &self,
        event: &ControlEvent,
        stream_sid: &str,
        telephony: &mut MessageSink,
    ) -> Result<bool> {
        if !self.enabled || !event.is_user_started_speaking() {
            return Ok(false);
        }

        let clear = OutboundEvent::clear(stream_sid).to_json()?;
        telephony.send(WireMessage::Text(clear)).await?;

        self.stats.record_barge_in();
        metrics::record_barge_in();
        tracing::debug!(stream_sid, "Barge-in: cleared caller playback");
        Ok(true)
    }
}
