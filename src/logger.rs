//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, before config is loaded, then apply the
//! configured level with [`LogHandle::set_level`].

use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::error::AppError;

/// Handle to the installed filter, used to change the level after startup.
pub struct LogHandle(reload::Handle<EnvFilter, Registry>);

/// Initialise the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence; `level` (`"error"` … `"trace"`) is the
/// fallback.
pub fn init(level: &str) -> Result<LogHandle, AppError> {
    let (filter, handle) = reload::Layer::new(env_filter(level)?);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(LogHandle(handle))
}

impl LogHandle {
    /// Swap in a filter for `level`. `RUST_LOG` still takes precedence.
    pub fn set_level(&self, level: &str) -> Result<(), AppError> {
        self.0
            .reload(env_filter(level)?)
            .map_err(|e| AppError::Logger(format!("failed to apply log level '{level}': {e}")))
    }
}

fn env_filter(level: &str) -> Result<EnvFilter, AppError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}

/// Parse a log level string into a [`LevelFilter`], returning an error on
/// unrecognised values.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}
