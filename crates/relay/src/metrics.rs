//! Relay metrics
//!
//! Recorded through the `metrics` facade; the server installs the Prometheus
//! exporter. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

/// Zero every series so it shows up before the first call
pub fn register_relay_metrics() {
    gauge!("relay_sessions_active").set(0.0);
    counter!("relay_sessions_total").absolute(0);
    counter!("relay_frames_to_agent_total").absolute(0);
    counter!("relay_audio_to_caller_total").absolute(0);
    counter!("relay_barge_in_total").absolute(0);
    counter!("relay_turns_total").absolute(0);
    counter!("relay_retrieval_fallback_total").absolute(0);
    counter!("relay_decode_errors_total").absolute(0);
}

pub fn record_session_started() {
    counter!("relay_sessions_total").increment(1);
    gauge!("relay_sessions_active").increment(1.0);
}

pub fn record_session_ended(reason: &'static str) {
    gauge!("relay_sessions_active").decrement(1.0);
    counter!("relay_session_end_total", "reason" => reason).increment(1);
}

pub fn record_frame_to_agent() {
    counter!("relay_frames_to_agent_total").increment(1);
}

pub fn record_audio_to_caller() {
    counter!("relay_audio_to_caller_total").increment(1);
}

pub fn record_barge_in() {
    counter!("relay_barge_in_total").increment(1);
}

pub fn record_turn() {
    counter!("relay_turns_total").increment(1);
}

pub fn record_retrieval_fallback() {
    counter!("relay_retrieval_fallback_total").increment(1);
}

pub fn record_decode_error() {
    counter!("relay_decode_errors_total").increment(1);
}

/// Knowledge retrieval latency
pub fn record_retrieval_latency(duration_secs: f64) {
    histogram!("relay_retrieval_latency_seconds").record(duration_secs);
}
