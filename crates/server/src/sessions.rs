//! Live call registry
//!
//! Tracks the calls currently being relayed so they can be listed over HTTP.
//! Entries are added when a media stream connects and removed when its relay
//! finishes.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use voice_bridge_relay::{SessionObserver, SessionState, StatsSnapshot};

struct ActiveCall {
    observer: SessionObserver,
    started_at: DateTime<Utc>,
}

/// Snapshot of one live call
#[derive(Debug, Clone, Serialize)]
pub struct CallInfo {
    pub call_id: String,
    pub stream_sid: Option<String>,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub stats: StatsSnapshot,
}

#[derive(Default)]
pub struct SessionRegistry {
    calls: RwLock<HashMap<String, ActiveCall>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: SessionObserver) {
        let call_id = observer.call_id().to_string();
        self.calls.write().insert(
            call_id,
            ActiveCall {
                observer,
                started_at: Utc::now(),
            },
        );
        metrics::gauge!("voice_bridge_calls_active").set(self.count() as f64);
    }

    pub fn remove(&self, call_id: &str) -> bool {
        let removed = self.calls.write().remove(call_id).is_some();
        metrics::gauge!("voice_bridge_calls_active").set(self.count() as f64);
        removed
    }

    pub fn get(&self, call_id: &str) -> Option<CallInfo> {
        self.calls.read().get(call_id).map(|call| info(call_id, call))
    }

    /// Live calls, oldest first
    pub fn list(&self) -> Vec<CallInfo> {
        let mut calls: Vec<CallInfo> = self
            .calls
            .read()
            .iter()
            .map(|(id, call)| info(id, call))
            .collect();
        calls.sort_by_key(|c| c.started_at);
        calls
    }

    pub fn count(&self) -> usize {
        self.calls.read().len()
    }
}

fn info(call_id: &str, call: &ActiveCall) -> CallInfo {
    CallInfo {
        call_id: call_id.to_string(),
        stream_sid: call.observer.stream_sid(),
        state: call.observer.state(),
        started_at: call.started_at,
        stats: call.observer.stats(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_bridge_relay::SessionHandle;

    #[test]
    fn test_register_and_remove() {
        let registry = SessionRegistry::new();
        let first = SessionHandle::new("call-1");
        let second = SessionHandle::new("call-2");

        registry.register(first.observe());
        registry.register(second.observe());
        assert_eq!(registry.count(), 2);

        first.publish_stream_sid("MZ1");
        let info = registry.get("call-1").unwrap();
        assert_eq!(info.stream_sid.as_deref(), Some("MZ1"));
        assert_eq!(info.state, SessionState::Active);

        assert!(registry.remove("call-1"));
        assert!(!registry.remove("call-1"));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.list()[0].call_id, "call-2");
        assert_eq!(registry.list()[0].state, SessionState::Pending);
    }
}
