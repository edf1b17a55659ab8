//! JSON-line protocol for a supervising process.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (stdout).
//! Commands use `{"command": "<name>", ...}` format (stdin).

pub mod bridge;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Events: clapper -> supervisor (stdout)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum ClapperEvent {
    Starting {},
    Ready {
        device: String,
        sample_rate: u32,
        block_frames: usize,
    },
    DoubleClap {
        first_clap_at: f64,
        at: f64,
    },
    Toggled {
        lights: Vec<u32>,
    },
    /// Triggers dropped because a toggle was already queued.
    Coalesced {
        count: u64,
    },
    Error {
        message: String,
    },
    Pong {},
    AudioDevices {
        input: Vec<String>,
    },
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: supervisor -> clapper (stdin)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum ClapperCommand {
    Ping {},
    ListAudioDevices {},
    Stop {},
}
