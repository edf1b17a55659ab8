//! clapper: double-clap light switch.
//!
//! Listens to the microphone, detects a double hand-clap, and toggles the
//! configured lights. Progress and detections are reported as JSON lines on
//! stdout; simple commands are accepted as JSON lines on stdin.

mod audio;
mod config;
mod detect;
mod dispatch;
mod ipc;
mod lights;
mod listener;
mod logger;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use config::{load_config, ClapperConfig};
use ipc::bridge::{emit_error, emit_event, spawn_stdin_reader};
use ipc::{ClapperCommand, ClapperEvent};
use lights::LightTarget;
use listener::ClapListener;

#[derive(Parser, Debug)]
#[command(name = "clapper")]
#[command(about = "Double clap to toggle your lights")]
struct Args {
    /// Config file (default: clapper_config.json in the data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Loudness threshold a block must exceed to count as a clap
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Minimum seconds between two distinct claps
    #[arg(long)]
    min_gap: Option<f64>,

    /// Maximum seconds between the two claps of a double clap
    #[arg(long)]
    max_window: Option<f64>,

    /// Block length in milliseconds
    #[arg(long)]
    block_ms: Option<u32>,

    /// Input device name
    #[arg(short, long)]
    device: Option<String>,

    /// Log filter (e.g. "debug"); RUST_LOG takes precedence
    #[arg(short, long)]
    log_level: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log toggles instead of contacting the bridge
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Overlay command-line values on the file config.
    fn apply(&self, cfg: &mut ClapperConfig) {
        let detection = &mut cfg.detection;
        if self.threshold.is_some() {
            detection.volume_threshold = self.threshold;
        }
        if self.min_gap.is_some() {
            detection.min_gap_seconds = self.min_gap;
        }
        if self.max_window.is_some() {
            detection.max_pair_window_seconds = self.max_window;
        }
        if self.block_ms.is_some() {
            detection.block_millis = self.block_ms;
        }
        if self.device.is_some() {
            cfg.audio.input_device = self.device.clone();
        }
        if self.log_level.is_some() {
            cfg.log_level = self.log_level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list_devices {
        for name in audio::list_devices() {
            println!("{}", name);
        }
        return Ok(());
    }

    let (mut cfg, config_problem) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut cfg);

    let _log_guards = logger::init(cfg.log_level.as_deref())?;

    emit_event(&ClapperEvent::Starting {});

    if let Some(problem) = config_problem {
        warn!("{}; using defaults", problem);
        emit_error(&format!("{}; using defaults", problem));
    }

    let detection = cfg
        .detection
        .resolve()
        .context("Invalid detection settings")?;
    info!(?cfg, "Configuration loaded");

    let control = lights::create_light_control(cfg.bridge.as_ref(), args.dry_run)
        .context("Failed to set up light control")?;
    let target = LightTarget::new(
        cfg.bridge
            .as_ref()
            .map(|b| b.lights.clone())
            .unwrap_or_default(),
    );
    if target.is_empty() {
        warn!("No lights configured; double claps will toggle nothing");
    } else {
        info!(count = target.len(), "Lights configured");
    }

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (dispatch, dispatcher_task) =
        dispatch::spawn_dispatcher(Arc::clone(&control), target, events_tx, shutdown_rx);

    let listener = ClapListener::start(detection, cfg.audio.input_device.as_deref(), dispatch)
        .context("Failed to start audio capture")?;

    emit_event(&ClapperEvent::Ready {
        device: listener.device_name().to_string(),
        sample_rate: listener.sample_rate(),
        block_frames: listener.block_frames(),
    });
    info!(backend = %control.name(), "Listening for double claps");

    let mut cmd_rx = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            cmd = cmd_rx.recv(), if stdin_open => {
                match cmd {
                    Some(command) => {
                        if !handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        // Detached or parent gone; keep listening.
                        info!("stdin closed, continuing without commands");
                        stdin_open = false;
                    }
                }
            }
            Some(event) = events_rx.recv() => {
                emit_event(&event);
            }
        }
    }

    emit_event(&ClapperEvent::Stopping {});
    listener.stop();
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_task.await {
        warn!("Dispatcher task ended abnormally: {}", e);
    }

    // Anything the dispatcher reported before stopping.
    while let Ok(event) = events_rx.try_recv() {
        emit_event(&event);
    }

    info!("clapper stopped");
    Ok(())
}

/// Handle a single command. Returns `false` if the main loop should exit.
fn handle_command(cmd: ClapperCommand) -> bool {
    match cmd {
        ClapperCommand::Ping {} => {
            emit_event(&ClapperEvent::Pong {});
        }
        ClapperCommand::ListAudioDevices {} => {
            emit_event(&ClapperEvent::AudioDevices {
                input: audio::list_devices(),
            });
        }
        ClapperCommand::Stop {} => {
            return false;
        }
    }
    true
}
