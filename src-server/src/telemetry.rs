//! Tracing subscriber setup.
//!
//! `RUST_LOG` controls filtering (default `info`). Set
//! `CONTROLMAP_LOG_FORMAT=json` for one JSON object per line. Records from
//! the `log` facade are forwarded into tracing.

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FORMAT_ENV: &str = "CONTROLMAP_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info,tower_http=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber. Call once at startup.
pub fn init(format: LogFormat) -> Result<(), TelemetryError> {
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (json, text) = match format {
        LogFormat::Json => (
            Some(fmt::layer().json().with_target(true).with_current_span(true)),
            None,
        ),
        LogFormat::Text => (None, Some(fmt::layer().with_target(true))),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
