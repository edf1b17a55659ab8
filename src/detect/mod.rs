//! Clap detection: loudness, loud/quiet classification, and the double-clap
//! state machine, composed by [`ClapDetector`].
//!
//! Everything here is allocation-free and infallible per block so it can run
//! on the real-time side of the pipeline.

pub mod edge;
pub mod gesture;
pub mod loudness;

use tracing::trace;

use crate::config::ConfigError;

pub use gesture::{ClapWindow, DoubleClap};

/// Default loudness threshold (see [`loudness::estimate`] for the scale).
pub const DEFAULT_VOLUME_THRESHOLD: f32 = 40.0;

/// Default minimum spacing between two distinct claps, in seconds.
pub const DEFAULT_MIN_GAP_SECS: f64 = 0.08;

/// Default maximum spacing between the two claps of a gesture, in seconds.
pub const DEFAULT_MAX_PAIR_WINDOW_SECS: f64 = 0.3;

/// Default block length in milliseconds.
pub const DEFAULT_BLOCK_MILLIS: u32 = 10;

/// A block of mono samples and the time (seconds) of its first sample.
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    pub samples: &'a [f32],
    pub timestamp: f64,
}

impl<'a> AudioBlock<'a> {
    pub fn new(samples: &'a [f32], timestamp: f64) -> Self {
        Self { samples, timestamp }
    }
}

/// Loudness of one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessSample {
    /// Always finite and non-negative.
    pub magnitude: f32,
    pub timestamp: f64,
}

/// Pairing window bounds in seconds. `min_gap < max_pair_window`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClapTiming {
    pub min_gap: f64,
    pub max_pair_window: f64,
}

/// Validated detection parameters. Built once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    volume_threshold: f32,
    timing: ClapTiming,
    block_millis: u32,
}

impl DetectionConfig {
    pub fn new(
        volume_threshold: f32,
        min_gap_secs: f64,
        max_pair_window_secs: f64,
        block_millis: u32,
    ) -> Result<Self, ConfigError> {
        if !volume_threshold.is_finite() || volume_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(volume_threshold));
        }
        if !(min_gap_secs.is_finite() && min_gap_secs > 0.0) {
            return Err(ConfigError::NonPositiveDuration {
                field: "minGapSeconds",
                value: min_gap_secs,
            });
        }
        if !(max_pair_window_secs.is_finite() && max_pair_window_secs > 0.0) {
            return Err(ConfigError::NonPositiveDuration {
                field: "maxPairWindowSeconds",
                value: max_pair_window_secs,
            });
        }
        if min_gap_secs >= max_pair_window_secs {
            return Err(ConfigError::GapNotBelowWindow {
                min_gap: min_gap_secs,
                max_pair_window: max_pair_window_secs,
            });
        }
        if block_millis == 0 {
            return Err(ConfigError::ZeroBlockLength);
        }

        Ok(Self {
            volume_threshold,
            timing: ClapTiming {
                min_gap: min_gap_secs,
                max_pair_window: max_pair_window_secs,
            },
            block_millis,
        })
    }

    pub fn volume_threshold(&self) -> f32 {
        self.volume_threshold
    }

    pub fn timing(&self) -> ClapTiming {
        self.timing
    }

    pub fn block_millis(&self) -> u32 {
        self.block_millis
    }

    /// Block length in frames at `sample_rate`, never zero.
    pub fn block_frames(&self, sample_rate: u32) -> usize {
        let frames = u64::from(sample_rate) * u64::from(self.block_millis) / 1000;
        (frames as usize).max(1)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            timing: ClapTiming {
                min_gap: DEFAULT_MIN_GAP_SECS,
                max_pair_window: DEFAULT_MAX_PAIR_WINDOW_SECS,
            },
            block_millis: DEFAULT_BLOCK_MILLIS,
        }
    }
}

/// Per-block clap detector. Owns the pairing window; must live on a single
/// thread.
#[derive(Debug)]
pub struct ClapDetector {
    config: DetectionConfig,
    window: ClapWindow,
}

impl ClapDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            window: ClapWindow::Idle,
        }
    }

    /// Run one block through loudness, threshold, and pairing.
    pub fn process(&mut self, block: &AudioBlock<'_>) -> Option<DoubleClap> {
        let sample = loudness::estimate(block);
        let loud = edge::is_loud(&sample, self.config.volume_threshold);
        let was_idle = self.window.is_idle();

        let clap = gesture::step(&mut self.window, loud, sample.timestamp, &self.config.timing);

        if let (true, Some(at)) = (was_idle, self.window.first_clap_at()) {
            trace!(magnitude = sample.magnitude, at, "First clap candidate");
        }
        clap
    }

    /// Drop any pending clap. Used on shutdown so no half gesture survives.
    pub fn reset(&mut self) {
        self.window = ClapWindow::Idle;
    }

    pub fn window(&self) -> ClapWindow {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 480-sample block whose loudness is well above the default threshold.
    fn loud_block() -> Vec<f32> {
        vec![0.5; 480]
    }

    fn quiet_block() -> Vec<f32> {
        vec![0.001; 480]
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = DetectionConfig::default();
        let built = DetectionConfig::new(
            DEFAULT_VOLUME_THRESHOLD,
            DEFAULT_MIN_GAP_SECS,
            DEFAULT_MAX_PAIR_WINDOW_SECS,
            DEFAULT_BLOCK_MILLIS,
        )
        .unwrap();
        assert_eq!(cfg, built);
    }

    #[test]
    fn test_rejects_gap_not_below_window() {
        let err = DetectionConfig::new(40.0, 0.3, 0.3, 10).unwrap_err();
        assert!(matches!(err, ConfigError::GapNotBelowWindow { .. }));
        let err = DetectionConfig::new(40.0, 0.5, 0.3, 10).unwrap_err();
        assert!(matches!(err, ConfigError::GapNotBelowWindow { .. }));
    }

    #[test]
    fn test_rejects_non_positive_durations() {
        assert!(matches!(
            DetectionConfig::new(40.0, 0.0, 0.3, 10),
            Err(ConfigError::NonPositiveDuration { field: "minGapSeconds", .. })
        ));
        assert!(matches!(
            DetectionConfig::new(40.0, 0.08, -1.0, 10),
            Err(ConfigError::NonPositiveDuration { field: "maxPairWindowSeconds", .. })
        ));
        assert!(matches!(
            DetectionConfig::new(40.0, f64::NAN, 0.3, 10),
            Err(ConfigError::NonPositiveDuration { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_threshold_and_block() {
        assert!(matches!(
            DetectionConfig::new(f32::NAN, 0.08, 0.3, 10),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            DetectionConfig::new(-1.0, 0.08, 0.3, 10),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            DetectionConfig::new(40.0, 0.08, 0.3, 0),
            Err(ConfigError::ZeroBlockLength)
        ));
    }

    #[test]
    fn test_block_frames() {
        let cfg = DetectionConfig::default();
        assert_eq!(cfg.block_frames(48_000), 480);
        assert_eq!(cfg.block_frames(44_100), 441);
        assert_eq!(cfg.block_frames(50), 1);
    }

    #[test]
    fn test_detector_fires_on_double_clap() {
        let mut detector = ClapDetector::new(DetectionConfig::default());
        let loud = loud_block();
        let quiet = quiet_block();

        assert!(detector.process(&AudioBlock::new(&loud, 0.0)).is_none());
        assert_eq!(detector.window().first_clap_at(), Some(0.0));
        for i in 1..15 {
            let ts = i as f64 * 0.01;
            assert!(detector.process(&AudioBlock::new(&quiet, ts)).is_none());
        }
        let clap = detector.process(&AudioBlock::new(&loud, 0.15));
        assert_eq!(clap.map(|c| c.at), Some(0.15));
        assert!(detector.window().is_idle());
    }

    #[test]
    fn test_detector_ignores_quiet_stream() {
        let mut detector = ClapDetector::new(DetectionConfig::default());
        let quiet = quiet_block();
        for i in 0..500 {
            let ts = i as f64 * 0.01;
            assert!(detector.process(&AudioBlock::new(&quiet, ts)).is_none());
        }
        assert!(detector.window().is_idle());
    }

    #[test]
    fn test_reset_discards_pending_clap() {
        let mut detector = ClapDetector::new(DetectionConfig::default());
        let loud = loud_block();
        detector.process(&AudioBlock::new(&loud, 0.0));
        assert!(!detector.window().is_idle());

        detector.reset();
        assert!(detector.window().is_idle());
        // A loud block after reset is a first clap again, not a pair.
        assert!(detector.process(&AudioBlock::new(&loud, 0.15)).is_none());
    }
}
