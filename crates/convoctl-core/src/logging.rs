//! Shared logging initialization.
//!
//! Output goes to stderr so command results on stdout stay clean. The
//! effective filter is built from the `-d/--debug` count, the
//! `--log-level` values, and the `CONVOCTL_LOG` environment variable, in
//! that priority order.

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Invalid `--log-level` values, rejected before any action runs.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("E241: --log-level only allows TRACE, DEBUG, INFO, WARN, or ERROR (got '{0}')")]
pub struct LogLevelError(pub String);

/// Outcome of combining the logging flags.
#[derive(Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// `tracing_subscriber` filter directive.
    pub directive: String,
    /// True when `--debug` overrode an explicit `--log-level` (warning
    /// `W111`, counted by the caller).
    pub debug_overrode_level: bool,
}

/// Build the filter directive.
///
/// One `-d` sets this program's crates to DEBUG; two or more set
/// everything to DEBUG. `--log-level L1 [L2]` sets the program level to
/// `L1` and, when given, the global level to `L2`. `-d` takes precedence
/// over `--log-level`. `env_default` (from `CONVOCTL_LOG`) applies when
/// neither flag is used.
pub fn filter_directive(
    debug: u8,
    log_level: &[String],
    env_default: Option<&str>,
) -> Result<LogConfig, LogLevelError> {
    let mut levels = Vec::with_capacity(log_level.len());
    for raw in log_level {
        let lower = raw.to_ascii_lowercase();
        if !LEVELS.contains(&lower.as_str()) {
            return Err(LogLevelError(raw.clone()));
        }
        levels.push(lower);
    }

    let fallback = env_default.unwrap_or("info").to_ascii_lowercase();

    let global = if debug >= 2 {
        "debug".to_string()
    } else if levels.len() >= 2 {
        levels[1].clone()
    } else {
        "info".to_string()
    };

    let program = if debug >= 1 {
        "debug".to_string()
    } else if let Some(first) = levels.first() {
        first.clone()
    } else {
        fallback
    };

    Ok(LogConfig {
        directive: format!("{global},convoctl={program},convoctl_core={program}"),
        debug_overrode_level: debug > 0 && !levels.is_empty(),
    })
}

/// Initialize process-level tracing with the given filter directive.
///
/// Safe to call multiple times; only the first call installs the
/// subscriber. Best-effort and never returns an error.
pub fn init(directive: &str) {
    if INIT.get().is_some() {
        return;
    }
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
