use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::paths;

/// Default filter when neither `RUST_LOG` nor a level is given.
/// reqwest/hyper internals are noisy at info.
const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

/// Keeps the non-blocking log writers flushing. Hold for the life of `main`.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the structured logging system.
///
/// Sets up:
/// - Console output (stderr): compact human-readable format. Stdout is
///   reserved for JSON-line events.
/// - File output: daily rolling files `{data_dir}/logs/clapper.log.*`,
///   keeping the latest 5. Skipped with a warning if the directory is not
///   writable.
/// - Environment filter: `RUST_LOG`, else `level`, else info.
///
/// Both writers are non-blocking so the detection thread never waits on
/// log I/O.
pub fn init(level: Option<&str>) -> anyhow::Result<LogGuards> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match level {
            Some(level) => EnvFilter::try_new(level)?,
            None => EnvFilter::new(DEFAULT_FILTER),
        },
    };

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_target(true)
        .compact();

    let log_dir = paths::get_log_dir();
    let file_appender = fs::create_dir_all(&log_dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("clapper")
                .filename_suffix("log")
                .max_log_files(5)
                .build(&log_dir)
                .map_err(anyhow::Error::from)
        });

    let mut guards = vec![console_guard];
    let (file_layer, file_error) = match file_appender {
        Ok(appender) => {
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);
            let layer = fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    match file_error {
        None => tracing::info!(log_dir = %log_dir.display(), "Logger initialized"),
        Some(e) => tracing::warn!(
            log_dir = %log_dir.display(),
            "File logging disabled: {}",
            e
        ),
    }

    Ok(LogGuards { _guards: guards })
}
