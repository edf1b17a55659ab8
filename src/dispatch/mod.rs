//! Action dispatcher: runs the toggle off the detection thread.
//!
//! The detection thread holds a [`DispatchHandle`] and calls
//! [`DispatchHandle::on_double_clap`], which never blocks: it tries to put the
//! event into a one-slot channel. A worker task takes events from the slot
//! and awaits the toggle.
//!
//! Policy: one toggle in flight, at most one queued behind it. Triggers that
//! arrive while the slot is full are coalesced into the queued one and only
//! counted. Toggle failures are logged and reported as events, never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::detect::DoubleClap;
use crate::ipc::ClapperEvent;
use crate::lights::{LightControl, LightTarget};

/// Outcome of handing a double clap to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Accepted into the slot.
    Queued,
    /// Slot already full; merged into the pending toggle.
    Coalesced,
    /// Worker is gone (shutting down); dropped.
    Closed,
}

/// Sending side, owned by the detection thread.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DoubleClap>,
    coalesced: Arc<AtomicU64>,
}

impl DispatchHandle {
    /// Hand off a double clap. Wait-free from the caller's view; safe on the
    /// real-time side.
    pub fn on_double_clap(&self, clap: DoubleClap) -> Dispatch {
        match self.tx.try_send(clap) {
            Ok(()) => Dispatch::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                Dispatch::Coalesced
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Dispatch::Closed,
        }
    }
}

/// Create the handle and its receiving end without starting a worker.
pub(crate) fn channel() -> (DispatchHandle, mpsc::Receiver<DoubleClap>, Arc<AtomicU64>) {
    let (tx, rx) = mpsc::channel(1);
    let coalesced = Arc::new(AtomicU64::new(0));
    (
        DispatchHandle {
            tx,
            coalesced: Arc::clone(&coalesced),
        },
        rx,
        coalesced,
    )
}

/// Start the worker task on the current tokio runtime.
///
/// The worker exits when `shutdown` flips (or its sender is dropped), or when
/// every `DispatchHandle` is gone. An in-flight toggle is abandoned on
/// shutdown; a queued one is never started.
pub fn spawn_dispatcher(
    control: Arc<dyn LightControl>,
    target: LightTarget,
    events: mpsc::UnboundedSender<ClapperEvent>,
    shutdown: watch::Receiver<bool>,
) -> (DispatchHandle, JoinHandle<()>) {
    let (handle, rx, coalesced) = channel();
    let task = tokio::spawn(run_worker(control, target, rx, coalesced, events, shutdown));
    (handle, task)
}

async fn run_worker(
    control: Arc<dyn LightControl>,
    target: LightTarget,
    mut rx: mpsc::Receiver<DoubleClap>,
    coalesced: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<ClapperEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(backend = %control.name(), lights = ?target.ids(), "Dispatcher started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let clap = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = rx.recv() => match next {
                Some(clap) => clap,
                None => break,
            },
        };

        info!(first = clap.first_clap_at, at = clap.at, "Double clap, toggling lights");
        let _ = events.send(ClapperEvent::DoubleClap {
            first_clap_at: clap.first_clap_at,
            at: clap.at,
        });

        let result = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!("Shutdown during toggle, abandoning it");
                break;
            }
            result = control.toggle(&target) => result,
        };

        match result {
            Ok(()) => {
                let _ = events.send(ClapperEvent::Toggled {
                    lights: target.ids().to_vec(),
                });
            }
            Err(e) => {
                error!("Toggle failed: {}", e);
                let _ = events.send(ClapperEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        let merged = coalesced.swap(0, Ordering::Relaxed);
        if merged > 0 {
            debug!(count = merged, "Coalesced double claps during toggle");
            let _ = events.send(ClapperEvent::Coalesced { count: merged });
        }
    }

    info!("Dispatcher stopped");
}
