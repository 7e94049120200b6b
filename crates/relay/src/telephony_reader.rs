//! Telephony reader
//!
//! Consumes the carrier's media stream: publishes the stream identifier on
//! `start`, turns `media` payloads into fixed-size frames for the agent and
//! ends the session on `stop`.

use futures::StreamExt;
use tokio::sync::mpsc;

use voice_bridge_config::DecodeErrorPolicy;
use voice_bridge_core::{AudioFrame, InboundEvent, MessageStream, WireMessage};

use crate::chunk_buffer::ChunkBuffer;
use crate::metrics;
use crate::session::{SessionEnd, SessionHandle};

pub struct TelephonyReader<'a> {
    incoming: MessageStream,
    buffer: ChunkBuffer,
    frames: mpsc::UnboundedSender<AudioFrame>,
    session: &'a SessionHandle,
    policy: DecodeErrorPolicy,
}

impl<'a> TelephonyReader<'a> {
    pub fn new(
        incoming: MessageStream,
        frame_size: usize,
        frames: mpsc::UnboundedSender<AudioFrame>,
        session: &'a SessionHandle,
        policy: DecodeErrorPolicy,
    ) -> Self {
        Self {
            incoming,
            buffer: ChunkBuffer::new(frame_size),
            frames,
            session,
            policy,
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        while let Some(message) = self.incoming.next().await {
            let text = match message {
                Ok(WireMessage::Text(text)) => text,
                Ok(WireMessage::Binary(bytes)) => {
                    tracing::debug!(len = bytes.len(), "Ignoring binary telephony message");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(call_id = %self.session.call_id(), error = %e, "Telephony receive failed");
                    return SessionEnd::TransportError(e.to_string());
                }
            };

            let event = match InboundEvent::parse(&text) {
                Ok(event) => event,
                Err(e) => match self.policy {
                    DecodeErrorPolicy::Terminate => {
                        tracing::warn!(call_id = %self.session.call_id(), error = %e, "Undecodable telephony message, ending session");
                        return SessionEnd::TelephonyDecodeError(e.to_string());
                    }
                    DecodeErrorPolicy::Skip => {
                        tracing::warn!(call_id = %self.session.call_id(), error = %e, "Skipping undecodable telephony message");
                        self.session.stats().record_decode_error();
                        metrics::record_decode_error();
                        continue;
                    }
                }
            };

            match event {
                InboundEvent::SessionStart { stream_sid } => {
                    if self.session.publish_stream_sid(&stream_sid) {
                        tracing::info!(call_id = %self.session.call_id(), stream_sid = %stream_sid, "Media stream started");
                    } else {
                        tracing::warn!(call_id = %self.session.call_id(), stream_sid = %stream_sid, "Duplicate start ignored");
                    }
                }
                InboundEvent::MediaChunk(bytes) => {
                    self.buffer.append(&bytes);
                    for frame in self.buffer.drain() {
                        if self.frames.send(frame).is_err() {
                            return SessionEnd::TransportError("outbound frame queue closed".to_string());
                        }
                    }
                }
                InboundEvent::SessionStop => {
                    tracing::info!(
                        call_id = %self.session.call_id(),
                        frames = self.buffer.frames_emitted(),
                        discarded = self.buffer.remainder().len(),
                        "Media stream stopped"
                    );
                    return SessionEnd::TelephonyStopped;
                }
                InboundEvent::Other(name) => {
                    tracing::trace!(event = %name, "Ignoring telephony event");
                }
            }
        }

        SessionEnd::TelephonyClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use voice_bridge_core::Error;

    fn stream(messages: Vec<Result<WireMessage, Error>>) -> MessageStream {
        futures::stream::iter(messages).boxed()
    }

    fn media(bytes: &[u8]) -> Result<WireMessage, Error> {
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(WireMessage::Text(format!(
            r#"{{"event":"media","media":{{"payload":"{}"}}}}"#,
            payload
        )))
    }

    fn start(sid: &str) -> Result<WireMessage, Error> {
        Ok(WireMessage::Text(format!(
            r#"{{"event":"start","start":{{"streamSid":"{}"}}}}"#,
            sid
        )))
    }

    fn stop() -> Result<WireMessage, Error> {
        Ok(WireMessage::Text(r#"{"event":"stop"}"#.to_string()))
    }

    fn collect(rx: &mut mpsc::UnboundedReceiver<AudioFrame>) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_start_media_stop() {
        let session = SessionHandle::new("call");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let incoming = stream(vec![
            Ok(WireMessage::Text(r#"{"event":"connected","protocol":"Call"}"#.to_string())),
            start("MZ1"),
            media(&[1, 2, 3]),
            media(&[4, 5, 6]),
            media(&[7]),
            stop(),
            media(&[8, 9, 10, 11]),
        ]);

        let end = TelephonyReader::new(incoming, 4, tx, &session, DecodeErrorPolicy::Terminate)
            .run()
            .await;

        assert_eq!(end, SessionEnd::TelephonyStopped);
        assert_eq!(session.stream_sid().as_deref(), Some("MZ1"));
        let frames = collect(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_second_start_keeps_first_sid() {
        let session = SessionHandle::new("call");
        let (tx, _rx) = mpsc::unbounded_channel();
        let incoming = stream(vec![start("MZ1"), start("MZ2")]);

        let end = TelephonyReader::new(incoming, 4, tx, &session, DecodeErrorPolicy::Terminate)
            .run()
            .await;

        assert_eq!(end, SessionEnd::TelephonyClosed);
        assert_eq!(session.stream_sid().as_deref(), Some("MZ1"));
    }

    #[tokio::test]
    async fn test_decode_error_terminates_by_default() {
        let session = SessionHandle::new("call");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let incoming = stream(vec![
            start("MZ1"),
            Ok(WireMessage::Text("not json".to_string())),
            media(&[1, 2, 3, 4]),
        ]);

        let end = TelephonyReader::new(incoming, 4, tx, &session, DecodeErrorPolicy::Terminate)
            .run()
            .await;

        assert!(matches!(end, SessionEnd::TelephonyDecodeError(_)));
        assert!(collect(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_decode_error_skipped_when_configured() {
        let session = SessionHandle::new("call");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let incoming = stream(vec![
            start("MZ1"),
            Ok(WireMessage::Text("not json".to_string())),
            Ok(WireMessage::Text(r#"{"event":"media","media":{"payload":"%%%"}}"#.to_string())),
            media(&[1, 2, 3, 4]),
            stop(),
        ]);

        let end = TelephonyReader::new(incoming, 4, tx, &session, DecodeErrorPolicy::Skip)
            .run()
            .await;

        assert_eq!(end, SessionEnd::TelephonyStopped);
        assert_eq!(collect(&mut rx).len(), 1);
        assert_eq!(session.stats().snapshot().decode_errors, 2);
    }

    #[tokio::test]
    async fn test_transport_error_ends_session() {
        let session = SessionHandle::new("call");
        let (tx, _rx) = mpsc::unbounded_channel();
        let incoming = stream(vec![start("MZ1"), Err(Error::Transport("reset".to_string()))]);

        let end = TelephonyReader::new(incoming, 4, tx, &session, DecodeErrorPolicy::Skip)
            .run()
            .await;

        assert!(matches!(end, SessionEnd::TransportError(_)));
    }
}
