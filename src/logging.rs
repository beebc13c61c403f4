//! Tracing setup: human-readable stderr output plus the per-run `run.log`.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Cannot open run log {path}: {source}")]
    RunLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tracing subscriber already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// `RUST_LOG` if set, else the application default.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()))
}

/// Create (or truncate) the run log, creating its directory if needed.
pub fn open_run_log(path: &Path) -> Result<File, LoggingError> {
    let err = |source| LoggingError::RunLog {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(err)?;
    }
    File::create(path).map_err(err)
}

/// Install the global subscriber. With `run_log`, every event is also
/// written without ANSI colour codes to that file.
pub fn init_tracing(run_log: Option<&Path>) -> Result<(), LoggingError> {
    let file_layer = match run_log {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(open_run_log(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(())
}
