//! Chunk buffer
//!
//! Telephony delivers caller audio in whatever chunk sizes the carrier
//! produces; the agent expects a steady cadence of equal frames. The buffer
//! accumulates bytes and hands out only complete frames, keeping the tail for
//! the next append.

use voice_bridge_core::AudioFrame;

#[derive(Debug)]
pub struct ChunkBuffer {
    frame_size: usize,
    buffer: Vec<u8>,
    next_sequence: u64,
}

impl ChunkBuffer {
    /// A zero frame size is treated as one byte.
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            buffer: Vec::with_capacity(frame_size * 2),
            next_sequence: 0,
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Remove and return every complete frame, in arrival order
    pub fn drain(&mut self) -> Vec<AudioFrame> {
        let complete = self.buffer.len() / self.frame_size;
        if complete == 0 {
            return Vec::new();
        }

        let rest = self.buffer.split_off(complete * self.frame_size);
        let full = std::mem::replace(&mut self.buffer, rest);

        full.chunks_exact(self.frame_size)
            .map(|chunk| {
                let frame = AudioFrame::new(chunk.to_vec(), self.next_sequence);
                self.next_sequence += 1;
                frame
            })
            .collect()
    }

    /// Bytes still waiting for a full frame
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Frames emitted so far
    pub fn frames_emitted(&self) -> u64 {
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic chunk sizes between 1 and `max`
    fn chunk_sizes(seed: u64, count: usize, max: usize) -> Vec<usize> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as usize % max) + 1
            })
            .collect()
    }

    fn audio(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_small_appends_produce_nothing() {
        let mut buffer = ChunkBuffer::new(3200);
        buffer.append(&[0u8; 160]);
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.remainder().len(), 160);
    }

    #[test]
    fn test_exact_frame() {
        let mut buffer = ChunkBuffer::new(3200);
        for _ in 0..20 {
            buffer.append(&[0x7f; 160]);
        }
        let frames = buffer.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 3200);
        assert!(buffer.remainder().is_empty());
    }

    #[test]
    fn test_large_chunk_splits_into_frames() {
        let mut buffer = ChunkBuffer::new(4);
        buffer.append(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let frames = buffer.drain();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(frames[1].as_bytes(), &[5, 6, 7, 8]);
        assert_eq!(frames[0].sequence(), 0);
        assert_eq!(frames[1].sequence(), 1);
        assert_eq!(buffer.remainder(), &[9, 10]);

        buffer.append(&[11, 12]);
        let frames = buffer.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[9, 10, 11, 12]);
        assert_eq!(frames[0].sequence(), 2);
    }

    #[test]
    fn test_multiple_of_frame_size_leaves_nothing() {
        for (seed, frame_size) in [(1u64, 3200usize), (7, 320), (42, 17)] {
            let frame_count = 9;
            let total = frame_size * frame_count;
            let source = audio(total);

            let mut buffer = ChunkBuffer::new(frame_size);
            let mut frames = Vec::new();
            let mut offset = 0;
            for size in chunk_sizes(seed, total, frame_size * 2) {
                if offset >= total {
                    break;
                }
                let end = (offset + size).min(total);
                buffer.append(&source[offset..end]);
                frames.extend(buffer.drain());
                offset = end;
            }

            assert_eq!(frames.len(), frame_count);
            assert!(frames.iter().all(|f| f.len() == frame_size));
            assert!(buffer.remainder().is_empty());
            let joined: Vec<u8> = frames.into_iter().flat_map(AudioFrame::into_bytes).collect();
            assert_eq!(joined, source);
        }
    }

    #[test]
    fn test_frames_plus_remainder_reproduce_input() {
        for seed in 0..20u64 {
            let sizes = chunk_sizes(seed, 40, 700);
            let total: usize = sizes.iter().sum();
            let source = audio(total);

            let mut buffer = ChunkBuffer::new(320);
            let mut output = Vec::new();
            let mut offset = 0;
            for size in sizes {
                buffer.append(&source[offset..offset + size]);
                offset += size;
                for frame in buffer.drain() {
                    assert_eq!(frame.len(), 320);
                    output.extend_from_slice(frame.as_bytes());
                }
            }
            assert!(buffer.remainder().len() < 320);
            output.extend_from_slice(buffer.remainder());
            assert_eq!(output, source);
        }
    }

    #[test]
    fn test_zero_frame_size_is_clamped() {
        let buffer = ChunkBuffer::new(0);
        assert_eq!(buffer.frame_size(), 1);
    }
}
