//! Call relay between a telephony media stream and a speech agent
//!
//! Features:
//! - Re-framing of caller audio into fixed-size frames for the agent
//! - Agent audio forwarded to the caller as media events
//! - Barge-in: caller playback cleared when the user starts speaking
//! - Knowledge-grounded response injection for every finalized utterance
//! - Per-call session state, counters and end reason

pub mod agent_receiver;
pub mod barge_in;
pub mod chunk_buffer;
pub mod frame_sender;
pub mod metrics;
pub mod prompt;
pub mod relay;
pub mod session;
pub mod telephony_reader;
pub mod turn;

pub use barge_in::BargeInHandler;
pub use chunk_buffer::ChunkBuffer;
pub use metrics::register_relay_metrics;
pub use prompt::InstructionComposer;
pub use relay::{CallRelay, CallRelayConfig, Transport};
pub use session::{
    SessionEnd, SessionHandle, SessionObserver, SessionState, SessionStats, SessionSummary,
    StatsSnapshot,
};
pub use turn::TurnController;
