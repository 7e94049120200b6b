//! Per-call session state
//!
//! A `SessionHandle` is owned by the running relay. It publishes the stream
//! identifier (first `start` wins), the lifecycle state and running counters.
//! `SessionObserver`s are cheap clones handed to anything that needs to watch
//! the call: the agent receiver, the session registry, tests.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Connected, no `start` event yet
    Pending,
    /// Stream identifier known, audio flowing
    Active,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SessionEnd {
    /// Telephony sent `stop`
    TelephonyStopped,
    /// Telephony transport closed without `stop`
    TelephonyClosed,
    /// Undecodable telephony message under the terminate policy
    TelephonyDecodeError(String),
    /// Agent transport closed
    AgentClosed,
    /// A send or receive failed on either transport
    TransportError(String),
}

impl SessionEnd {
    /// Stable label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            SessionEnd::TelephonyStopped => "telephony_stopped",
            SessionEnd::TelephonyClosed => "telephony_closed",
            SessionEnd::TelephonyDecodeError(_) => "telephony_decode_error",
            SessionEnd::AgentClosed => "agent_closed",
            SessionEnd::TransportError(_) => "transport_error",
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::TelephonyStopped => write!(f, "telephony stopped"),
            SessionEnd::TelephonyClosed => write!(f, "telephony closed"),
            SessionEnd::TelephonyDecodeError(e) => write!(f, "telephony decode error: {}", e),
            SessionEnd::AgentClosed => write!(f, "agent closed"),
            SessionEnd::TransportError(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// Running counters for one call
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_to_agent: AtomicU64,
    audio_to_caller: AtomicU64,
    barge_ins: AtomicU64,
    turns: AtomicU64,
    retrieval_fallbacks: AtomicU64,
    decode_errors: AtomicU64,
}

impl SessionStats {
    pub fn record_frame_to_agent(&self) {
        self.frames_to_agent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_to_caller(&self) {
        self.audio_to_caller.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_barge_in(&self) {
        self.barge_ins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn(&self) {
        self.turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retrieval_fallback(&self) {
        self.retrieval_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_to_agent: self.frames_to_agent.load(Ordering::Relaxed),
            audio_to_caller: self.audio_to_caller.load(Ordering::Relaxed),
            barge_ins: self.barge_ins.load(Ordering::Relaxed),
            turns: self.turns.load(Ordering::Relaxed),
            retrieval_fallbacks: self.retrieval_fallbacks.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_to_agent: u64,
    pub audio_to_caller: u64,
    pub barge_ins: u64,
    pub turns: u64,
    pub retrieval_fallbacks: u64,
    pub decode_errors: u64,
}

/// Final report returned when a relay finishes
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub call_id: String,
    pub stream_sid: Option<String>,
    pub end: SessionEnd,
    pub stats: StatsSnapshot,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Writer side of a session, owned by the relay
#[derive(Debug)]
pub struct SessionHandle {
    call_id: String,
    started: Instant,
    state: watch::Sender<SessionState>,
    stream_sid: watch::Sender<Option<String>>,
    stats: Arc<SessionStats>,
}

impl SessionHandle {
    pub fn new(call_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionState::Pending);
        let (stream_sid, _) = watch::channel(None);
        Self {
            call_id: call_id.into(),
            started: Instant::now(),
            state,
            stream_sid,
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Record the stream identifier. Returns false if one was already set;
    /// the first value is kept.
    pub fn publish_stream_sid(&self, sid: &str) -> bool {
        let published = self.stream_sid.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(sid.to_string());
            true
        });

        if published {
            self.state.send_if_modified(|state| {
                if *state == SessionState::Pending {
                    *state = SessionState::Active;
                    return true;
                }
                false
            });
        }
        published
    }

    pub fn stream_sid(&self) -> Option<String> {
        self.stream_sid.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> &Arc<SessionStats> {
        &self.stats
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Mark the session closed; wakes every observer still waiting
    pub fn close(&self) {
        self.state.send_replace(SessionState::Closed);
    }

    pub fn observe(&self) -> SessionObserver {
        SessionObserver {
            call_id: self.call_id.clone(),
            state: self.state.subscribe(),
            stream_sid: self.stream_sid.subscribe(),
            stats: self.stats.clone(),
        }
    }
}

/// Read side of a session
#[derive(Debug, Clone)]
pub struct SessionObserver {
    call_id: String,
    state: watch::Receiver<SessionState>,
    stream_sid: watch::Receiver<Option<String>>,
    stats: Arc<SessionStats>,
}

impl SessionObserver {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn stream_sid(&self) -> Option<String> {
        self.stream_sid.borrow().clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait until the stream identifier is known.
    ///
    /// Returns `None` if the session closes (or its handle is dropped) first.
    pub async fn wait_for_stream_sid(&mut self) -> Option<String> {
        loop {
            if let Some(sid) = self.stream_sid.borrow_and_update().clone() {
                return Some(sid);
            }
            if *self.state.borrow_and_update() == SessionState::Closed {
                return None;
            }

            tokio::select! {
                changed = self.stream_sid.changed() => {
                    if changed.is_err() {
                        return self.stream_sid.borrow().clone();
                    }
                }
                changed = self.state.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Wait until the session is closed
    pub async fn closed(&mut self) {
        // An error means the handle is gone, which is closed as well
        let _ = self
            .state
            .wait_for(|state| *state == SessionState::Closed)
            .await;
    }
}
