//! Light control collaborator.
//!
//! Provides a trait-based abstraction for the toggle action with
//! implementations for:
//! - Philips Hue bridge (local REST API v1)
//! - Dry run (logs only)

mod hue;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::config::BridgeSettings;

pub use hue::HueBridge;

// ── Light Target ────────────────────────────────────────────────────

/// The set of lights a toggle applies to. Opaque to the detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightTarget {
    ids: Vec<u32>,
}

impl LightTarget {
    pub fn new(ids: Vec<u32>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ── Light Control Trait ─────────────────────────────────────────────

pub type ToggleFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ToggleError>> + Send + 'a>>;

/// Common trait for toggle backends (dyn-compatible).
pub trait LightControl: Send + Sync {
    /// Flip every light in `target` to the opposite of its current state.
    ///
    /// No retries: a failure is reported once and the next double clap tries
    /// again from scratch.
    fn toggle<'a>(&'a self, target: &'a LightTarget) -> ToggleFuture<'a>;

    /// Backend display name for logs.
    fn name(&self) -> String;
}

// ── Toggle Error ────────────────────────────────────────────────────

/// Errors from a toggle call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleError {
    /// Request could not be sent or the connection failed.
    Network(String),
    /// Bridge answered with a non-success HTTP status.
    Status(u16),
    /// Bridge answered with an error object.
    Bridge { light: u32, description: String },
    /// Response body did not have the expected shape.
    Malformed(String),
    /// Bridge address uses a scheme other than `http://`.
    InvalidAddress(String),
}

impl std::fmt::Display for ToggleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Light bridge unreachable: {}", msg),
            Self::Status(code) => write!(f, "Light bridge returned HTTP {}", code),
            Self::Bridge { light, description } => {
                write!(f, "Light {} rejected by bridge: {}", light, description)
            }
            Self::Malformed(msg) => write!(f, "Unexpected bridge response: {}", msg),
            Self::InvalidAddress(addr) => {
                write!(f, "Unsupported bridge address {}: only http:// is supported", addr)
            }
        }
    }
}

impl std::error::Error for ToggleError {}

// ── Dry Run ─────────────────────────────────────────────────────────

/// Logs the toggle instead of touching any lights.
#[derive(Debug, Default)]
pub struct DryRun;

impl LightControl for DryRun {
    fn toggle<'a>(&'a self, target: &'a LightTarget) -> ToggleFuture<'a> {
        Box::pin(async move {
            info!(lights = ?target.ids(), "Dry run: would toggle lights");
            Ok(())
        })
    }

    fn name(&self) -> String {
        "dry run".to_string()
    }
}

// ── Factory ─────────────────────────────────────────────────────────

/// Create the light control backend from configuration.
///
/// Falls back to [`DryRun`] when `dry_run` is set or no bridge is configured.
pub fn create_light_control(
    bridge: Option<&BridgeSettings>,
    dry_run: bool,
) -> Result<Arc<dyn LightControl>, ToggleError> {
    match bridge {
        Some(settings) if !dry_run => {
            let hue = HueBridge::new(&settings.address, &settings.username)?;
            Ok(Arc::new(hue))
        }
        _ => Ok(Arc::new(DryRun)),
    }
}
