//! Logging setup for `flowctl` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `FLOWCTL_LOG` environment variable, in `EnvFilter` syntax
//!    (e.g. `warn,engine=debug`)
//! 3. default to `warn`
//!
//! Logs go to stderr so stdout stays machine-readable.

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FLOWCTL_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    match (cli_level, env) {
        (Some(level), _) => Ok(EnvFilter::new(level.as_directive())),
        (None, Some(directives)) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} value {directives:?}")),
        _ => Ok(EnvFilter::new(LogLevel::Warn.as_directive())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_env() {
        let filter = build_filter(Some(LogLevel::Debug), Some("error")).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn env_directives_are_used_when_no_flag() {
        let filter = build_filter(None, Some("warn,engine=debug")).unwrap();
        assert!(filter.to_string().contains("engine=debug"));
    }

    #[test]
    fn blank_env_falls_back_to_warn() {
        assert_eq!(build_filter(None, Some("  ")).unwrap().to_string(), "warn");
        assert_eq!(build_filter(None, None).unwrap().to_string(), "warn");
    }
}
