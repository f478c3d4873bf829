//! Logging setup.
//!
//! All output goes to stderr through a `tracing-subscriber` fmt layer:
//! - `RUST_LOG` wins when set
//! - otherwise `PET_KINETICS_LOG` picks the crate level (default `info`)
//! - `PET_KINETICS_LOG_TIMESTAMPS=0` drops timestamps (handy in test logs)
//!
//! Library code only emits events; installing a subscriber is the caller's
//! choice. `init_logging` is safe to call more than once.

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::AppError;

/// Log level filter for the crate's own target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" | "quiet" => Ok(LogLevel::Off),
            other => Err(AppError::config(format!("unknown log level: {other}"))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read `PET_KINETICS_LOG` / `PET_KINETICS_LOG_TIMESTAMPS` (after `.env`).
    ///
    /// Unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var("PET_KINETICS_LOG") {
            if let Ok(level) = raw.parse() {
                cfg.level = level;
            }
        }
        if let Ok(raw) = std::env::var("PET_KINETICS_LOG_TIMESTAMPS") {
            cfg.timestamps = !matches!(raw.trim(), "0" | "false" | "no" | "off");
        }
        cfg
    }
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pet_kinetics={}", config.level)));

    let use_ansi = std::io::stderr().is_terminal();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(use_ansi);

    // try_init: a subscriber may already be installed (tests, host app).
    let _ = if config.timestamps {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.without_time())
            .try_init()
    };
}
