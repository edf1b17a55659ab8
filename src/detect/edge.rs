//! Loud/quiet classification of a loudness sample.

use super::LoudnessSample;

/// `true` when the sample is strictly above `threshold`.
pub fn is_loud(sample: &LoudnessSample, threshold: f32) -> bool {
    sample.magnitude > threshold
}
