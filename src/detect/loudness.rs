//! Block loudness estimation.
//!
//! Reduces a block of samples to one scalar: the L2 norm scaled by 10 and
//! truncated, so thresholds read as small whole numbers (40 is a firm clap
//! at ~10 ms blocks).

use super::{AudioBlock, LoudnessSample};

/// Scale applied to the L2 norm before truncation.
const LOUDNESS_SCALE: f32 = 10.0;

/// Compute the loudness of a block.
///
/// Runs in time linear in the block length and never allocates. Empty and
/// silent blocks yield 0. Non-finite samples are skipped.
pub fn estimate(block: &AudioBlock<'_>) -> LoudnessSample {
    let sum_sq: f32 = block
        .samples
        .iter()
        .filter(|s| s.is_finite())
        .map(|s| s * s)
        .sum();
    let magnitude = (sum_sq.sqrt() * LOUDNESS_SCALE).trunc();

    LoudnessSample {
        magnitude: if magnitude.is_finite() { magnitude } else { f32::MAX },
        timestamp: block.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block_is_silent() {
        let sample = estimate(&AudioBlock::new(&[], 1.5));
        assert_eq!(sample.magnitude, 0.0);
        assert_eq!(sample.timestamp, 1.5);
    }

    #[test]
    fn test_silent_block_is_zero() {
        let samples = vec![0.0f32; 480];
        assert_eq!(estimate(&AudioBlock::new(&samples, 0.0)).magnitude, 0.0);
    }

    #[test]
    fn test_norm_is_scaled_and_truncated() {
        // norm of [0.3, 0.4] is 0.5 -> 5.0
        assert_eq!(estimate(&AudioBlock::new(&[0.3, 0.4], 0.0)).magnitude, 5.0);
        // norm of [0.5; 4] is 1.0 -> 10.0
        assert_eq!(estimate(&AudioBlock::new(&[0.5; 4], 0.0)).magnitude, 10.0);
        // norm 0.0999.. truncates to 0
        assert_eq!(estimate(&AudioBlock::new(&[0.099], 0.0)).magnitude, 0.0);
    }

    #[test]
    fn test_sign_does_not_matter() {
        let pos = estimate(&AudioBlock::new(&[0.6, 0.8], 0.0));
        let neg = estimate(&AudioBlock::new(&[-0.6, -0.8], 0.0));
        assert_eq!(pos.magnitude, neg.magnitude);
        assert_eq!(pos.magnitude, 10.0);
    }

    #[test]
    fn test_non_finite_samples_are_skipped() {
        let samples = [f32::NAN, 0.3, f32::INFINITY, 0.4, f32::NEG_INFINITY];
        assert_eq!(estimate(&AudioBlock::new(&samples, 0.0)).magnitude, 5.0);
    }
}
