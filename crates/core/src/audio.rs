//! Audio frame type
//!
//! The relay never decodes audio. Frames are opaque slices of telephone-line
//! encoded bytes (8kHz mu-law from the telephony side) cut to a fixed length
//! so the agent transport receives a steady cadence.

/// Default frame size in bytes (160 bytes/20ms x 20)
pub const DEFAULT_FRAME_SIZE: usize = 160 * 20;

/// A fixed-length slice of caller audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Vec<u8>,
    sequence: u64,
}

impl AudioFrame {
    /// Create a frame from already-sliced bytes
    pub fn new(data: Vec<u8>, sequence: u64) -> Self {
        Self { data, sequence }
    }

    /// Raw audio bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Position of this frame in the session's outbound order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
