//! Clap listener: Mic -> blocks -> detector -> dispatcher.
//!
//! Owns the cpal stream and the detection thread. The detection thread is
//! the only owner of the [`ClapDetector`] and its pairing window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audio::{self, BlockReader, CaptureError};
use crate::detect::{ClapDetector, DetectionConfig};
use crate::dispatch::{Dispatch, DispatchHandle};

/// Sleep between ring buffer polls when no full block is buffered.
/// Well under one block so detection latency stays at block granularity.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// The running listener.
pub struct ClapListener {
    running: Arc<AtomicBool>,
    /// Must be kept alive for capture to continue.
    _capture_stream: cpal::Stream,
    detection_thread: Option<JoinHandle<()>>,
    device_name: String,
    sample_rate: u32,
    block_frames: usize,
}

impl ClapListener {
    /// Open the input device and start detecting.
    pub fn start(
        config: DetectionConfig,
        device_name: Option<&str>,
        dispatch: DispatchHandle,
    ) -> Result<Self, CaptureError> {
        let capture = audio::resolve_device(device_name)?;
        let (producer, consumer) = audio::audio_ring_buffer(capture.ring_capacity());
        let reader = BlockReader::new(
            consumer,
            capture.native_rate,
            config.block_frames(capture.native_rate),
        );
        let block_frames = reader.block_frames();
        let stream = audio::start_capture(producer, &capture)?;

        let running = Arc::new(AtomicBool::new(true));
        let detector = ClapDetector::new(config);
        let thread_running = Arc::clone(&running);

        let detection_thread = thread::Builder::new()
            .name("clap-detector".into())
            .spawn(move || detection_loop(reader, detector, dispatch, thread_running))
            .map_err(|e| CaptureError::Build(format!("Failed to spawn detection thread: {e}")))?;

        info!(
            block_frames,
            block_ms = config.block_millis(),
            threshold = config.volume_threshold(),
            min_gap = config.timing().min_gap,
            max_window = config.timing().max_pair_window,
            "Clap listener started"
        );

        Ok(Self {
            running,
            _capture_stream: stream,
            detection_thread: Some(detection_thread),
            device_name: capture.device_name,
            sample_rate: capture.native_rate,
            block_frames,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Stop detection and capture. A pending half gesture is discarded.
    pub fn stop(mut self) {
        info!("Stopping clap listener");
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.detection_thread.take() {
            if handle.join().is_err() {
                warn!("Detection thread panicked");
            }
        }
        // Dropping self drops the cpal stream.
    }
}

fn detection_loop(
    mut reader: BlockReader,
    mut detector: ClapDetector,
    dispatch: DispatchHandle,
    running: Arc<AtomicBool>,
) {
    debug!("Detection loop started");

    while running.load(Ordering::Relaxed) {
        if drain_blocks(&mut reader, &mut detector, &dispatch) == 0 {
            thread::sleep(POLL_INTERVAL);
        }
    }

    debug!(window = %detector.window(), "Detection loop stopped");
    detector.reset();
}

/// Process every full block currently buffered. Returns how many were
/// processed.
fn drain_blocks(
    reader: &mut BlockReader,
    detector: &mut ClapDetector,
    dispatch: &DispatchHandle,
) -> usize {
    let mut processed = 0;
    while let Some(block) = reader.next_block() {
        processed += 1;
        if let Some(clap) = detector.process(&block) {
            if dispatch.on_double_clap(clap) == Dispatch::Closed {
                debug!("Dispatcher closed, double clap dropped");
            }
        }
    }
    processed
}
