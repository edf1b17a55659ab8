//! Lock-free SPSC ring buffer for audio samples.
//!
//! Uses the `ringbuf` crate to pass mono f32 samples from the cpal callback
//! thread to the detection thread without locks. Samples that do not fit are
//! dropped and counted so the reader can keep its clock honest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// Producer half. Lives in the cpal audio callback thread.
pub struct AudioProducer {
    inner: ringbuf::HeapProd<f32>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half. Lives in the detection thread.
pub struct AudioConsumer {
    inner: ringbuf::HeapCons<f32>,
    dropped: Arc<AtomicU64>,
}

/// Create a matched producer/consumer pair backed by a lock-free ring buffer.
pub fn audio_ring_buffer(capacity: usize) -> (AudioProducer, AudioConsumer) {
    let rb = HeapRb::<f32>::new(capacity.max(1));
    let (prod, cons) = rb.split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        AudioProducer {
            inner: prod,
            dropped: Arc::clone(&dropped),
        },
        AudioConsumer {
            inner: cons,
            dropped,
        },
    )
}

impl AudioProducer {
    /// Push a slice of samples. Returns how many were written; the rest are
    /// counted as dropped.
    #[cfg(test)]
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        let written = self.inner.push_slice(samples);
        self.record_dropped(samples.len() - written);
        written
    }

    /// Push samples from an iterator without an intermediate buffer.
    pub fn push_iter<I>(&mut self, samples: I) -> usize
    where
        I: ExactSizeIterator<Item = f32>,
    {
        let len = samples.len();
        let written = self.inner.push_iter(samples);
        self.record_dropped(len.saturating_sub(written));
        written
    }

    fn record_dropped(&self, n: usize) {
        if n > 0 {
            self.dropped.fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}

impl AudioConsumer {
    /// Pop up to `buf.len()` samples from the ring buffer into `buf`.
    /// Returns the number of samples actually read.
    pub fn pop_slice(&mut self, buf: &mut [f32]) -> usize {
        self.inner.pop_slice(buf)
    }

    /// Number of samples currently available for reading.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Total samples the producer could not fit since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
