//! Reusable PCM buffer shared between the engine and the writer.

/// Fixed-capacity buffer of interleaved 16-bit samples.
///
/// Every render call overwrites it in place; only the first
/// `frames * channels` samples of the latest call are meaningful.
pub struct PcmChunk {
    samples: Vec<i16>,
    bytes: Vec<u8>,
    channels: u16,
}

impl PcmChunk {
    /// Allocates room for `capacity_frames` frames of `channels` samples each.
    pub fn new(channels: u16, capacity_frames: usize) -> Self {
        let len = capacity_frames * channels as usize;
        Self {
            samples: vec![0; len],
            bytes: vec![0; len * 2],
            channels,
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Bytes occupied by one frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * std::mem::size_of::<i16>()
    }

    /// Sample storage for the engine to fill.
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Little-endian bytes of the first `frames` frames.
    ///
    /// `frames` is clamped to the capacity.
    pub fn le_bytes(&mut self, frames: usize) -> &[u8] {
        let count = frames.min(self.capacity_frames()) * self.channels as usize;
        for (dst, sample) in self.bytes.chunks_exact_mut(2).zip(&self.samples[..count]) {
            dst.copy_from_slice(&sample.to_le_bytes());
        }
        &self.bytes[..count * 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_and_frame_size() {
        let chunk = PcmChunk::new(2, 2048);
        assert_eq!(chunk.capacity_frames(), 2048);
        assert_eq!(chunk.frame_bytes(), 4);
    }

    #[test]
    fn test_le_bytes_only_covers_valid_frames() {
        let mut chunk = PcmChunk::new(2, 4);
        chunk.samples_mut().copy_from_slice(&[1, -1, 256, 0, 9, 9, 9, 9]);

        assert_eq!(chunk.le_bytes(2), &[1, 0, 0xFF, 0xFF, 0, 1, 0, 0]);
        assert!(chunk.le_bytes(0).is_empty());
        assert_eq!(chunk.le_bytes(100).len(), 16);
    }
}
