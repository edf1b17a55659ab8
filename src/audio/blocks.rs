//! Fixed-size block reader over the sample ring buffer.
//!
//! Timestamps come from the sample clock: frames read (plus frames the
//! producer had to drop) divided by the device rate. This keeps them
//! monotonic and tied to the device rather than to wall-clock scheduling.

use super::ring_buffer::AudioConsumer;
use crate::detect::AudioBlock;

pub struct BlockReader {
    consumer: AudioConsumer,
    /// Scratch block, allocated once.
    block: Vec<f32>,
    sample_rate: f64,
    /// Frames popped from the buffer.
    read: u64,
    /// Frames read plus gaps already passed; the clock in frames.
    clock: u64,
    dropped_seen: u64,
    /// Dropped frames not yet on the clock: `(read position, frames)`.
    pending_gap: Option<(u64, u64)>,
}

impl BlockReader {
    pub fn new(consumer: AudioConsumer, sample_rate: u32, block_frames: usize) -> Self {
        Self {
            consumer,
            block: vec![0.0; block_frames.max(1)],
            sample_rate: f64::from(sample_rate.max(1)),
            read: 0,
            clock: 0,
            dropped_seen: 0,
            pending_gap: None,
        }
    }

    pub fn block_frames(&self) -> usize {
        self.block.len()
    }

    /// Next full block, or `None` if not enough samples are buffered yet.
    pub fn next_block(&mut self) -> Option<AudioBlock<'_>> {
        if self.consumer.available() < self.block.len() {
            return None;
        }

        self.note_drops();

        let read = self.consumer.pop_slice(&mut self.block);
        let timestamp = self.clock as f64 / self.sample_rate;
        self.read += read as u64;
        self.clock += read as u64;

        if let Some((at, frames)) = self.pending_gap {
            if self.read >= at {
                self.clock += frames;
                self.pending_gap = None;
            }
        }

        Some(AudioBlock::new(&self.block[..read], timestamp))
    }

    /// Place newly dropped frames after the samples still buffered. The
    /// producer only drops when the buffer is full, so everything buffered
    /// now was captured before the gap.
    fn note_drops(&mut self) {
        let dropped = self.consumer.dropped();
        let new = dropped.saturating_sub(self.dropped_seen);
        if new == 0 {
            return;
        }
        self.dropped_seen = dropped;

        let at = self.read + self.consumer.available() as u64;
        self.pending_gap = Some(match self.pending_gap {
            Some((earlier, frames)) => (earlier, frames + new),
            None => (at, new),
        });
    }
}
