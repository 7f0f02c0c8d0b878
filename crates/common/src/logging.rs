//! Logging and tracing setup
//!
//! Structured logging via `tracing`. The configured level is the default;
//! `RUST_LOG` overrides it. When a log file is configured the previous file
//! is rotated aside with a timestamp suffix on startup, so every daemon run
//! starts on a fresh file.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LoggerConfig;

/// Initialize tracing for the daemon.
///
/// Never fails: a bad level or an unwritable log file degrades to stdout
/// logging with a complaint, it does not abort startup.
pub fn init_logging(config: &LoggerConfig) {
    let level = parse_level(&config.level);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    let mut rotate_error = None;
    let mut file_writer = None;

    if !config.file.is_empty() {
        match rotate_log(Path::new(&config.file)) {
            Ok(file) => file_writer = Some(Arc::new(file)),
            Err(e) => rotate_error = Some(e),
        }
    }

    match file_writer {
        Some(writer) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    if !config.level.is_empty() && level.is_none() {
        warn!(
            "{} is not a valid log level. Must be one of: DEBUG, INFO, WARN, ERROR, FATAL",
            config.level
        );
    }

    if let Some(e) = rotate_error {
        error!("Can't write to log file {}. Err: {}", config.file, e);
    }

    if !config.fields.is_empty() {
        info!(fields = ?config.fields, "Extra log context fields configured");
    }
}

/// Map a configured level name to a tracing directive. FATAL folds into
/// `error`, which is the closest tracing has.
fn parse_level(level: &str) -> Option<&'static str> {
    if level.eq_ignore_ascii_case("debug") {
        Some("debug")
    } else if level.eq_ignore_ascii_case("info") {
        Some("info")
    } else if level.eq_ignore_ascii_case("warn") {
        Some("warn")
    } else if level.eq_ignore_ascii_case("error") || level.eq_ignore_ascii_case("fatal") {
        Some("error")
    } else {
        None
    }
}

/// Rotate the previous log file aside and create a fresh one.
///
/// An existing file is renamed to `<file>.YYYYMMDD-HHMMSS`. Fails when the
/// parent directory does not exist.
fn rotate_log(path: &Path) -> io::Result<File> {
    if path.exists() {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let rotated = format!("{}.{stamp}", path.display());
        std::fs::rename(path, rotated)?;
    }

    File::create(path)
}
