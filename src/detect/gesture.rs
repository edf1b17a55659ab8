//! Double-clap state machine.
//!
//! Fed one `(loud, timestamp)` pair per block. A loud block while idle opens
//! a pairing window; a second loud block more than `min_gap` but no more
//! than `max_pair_window` seconds later completes the gesture.
//!
//! While a clap is pending, exactly one of these fires per block, checked in
//! this order:
//!   1. loud, `elapsed <= min_gap`: still the same clap, slide the window start
//!   2. loud, `elapsed <= max_pair_window`: double clap, back to idle
//!   3. `elapsed > max_pair_window`: window expired, back to idle
//!   4. otherwise: keep waiting

use super::ClapTiming;

/// Slack on the pairing bounds. Sample-clock timestamps are `frames / rate`,
/// and their difference can miss an exact bound by a few ulps.
const BOUND_EPSILON: f64 = 1e-9;

/// Pairing state. `Idle` exactly when no clap is waiting for a partner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClapWindow {
    #[default]
    Idle,
    Pending {
        /// Timestamp (seconds) of the most recent loud block of the first clap.
        first_clap_at: f64,
    },
}

impl ClapWindow {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Pending clap timestamp, if any.
    pub fn first_clap_at(&self) -> Option<f64> {
        match self {
            Self::Idle => None,
            Self::Pending { first_clap_at } => Some(*first_clap_at),
        }
    }
}

impl std::fmt::Display for ClapWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending { first_clap_at } => write!(f, "pending({first_clap_at:.3}s)"),
        }
    }
}

/// A completed double clap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleClap {
    /// When the first clap was last heard.
    pub first_clap_at: f64,
    /// When the second clap was heard.
    pub at: f64,
}

/// Advance the window by one block.
pub fn step(
    window: &mut ClapWindow,
    loud: bool,
    timestamp: f64,
    timing: &ClapTiming,
) -> Option<DoubleClap> {
    let first_clap_at = match *window {
        ClapWindow::Idle => {
            if loud {
                *window = ClapWindow::Pending {
                    first_clap_at: timestamp,
                };
            }
            return None;
        }
        ClapWindow::Pending { first_clap_at } => first_clap_at,
    };

    let elapsed = timestamp - first_clap_at;
    let min_gap = timing.min_gap + BOUND_EPSILON;
    let max_pair_window = timing.max_pair_window + BOUND_EPSILON;

    if loud && elapsed <= min_gap {
        *window = ClapWindow::Pending {
            first_clap_at: timestamp,
        };
        None
    } else if loud && elapsed <= max_pair_window {
        *window = ClapWindow::Idle;
        Some(DoubleClap {
            first_clap_at,
            at: timestamp,
        })
    } else if elapsed > max_pair_window {
        *window = ClapWindow::Idle;
        None
    } else {
        None
    }
}
