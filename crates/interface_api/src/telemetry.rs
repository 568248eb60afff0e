//! Logging setup and runtime log level control

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{
    fmt as tracing_fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::ApiConfig;

/// Levels accepted by the admin endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid level : {}", s)),
        }
    }
}

/// Handle onto the installed filter
#[derive(Clone)]
pub struct LogLevelControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl fmt::Debug for LogLevelControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogLevelControl")
            .field("current", &self.current())
            .finish()
    }
}

impl LogLevelControl {
    pub fn new(handle: reload::Handle<EnvFilter, Registry>) -> Self {
        Self { handle }
    }

    /// Replaces the active filter
    pub fn set_level(&self, level: LogLevel) -> Result<(), reload::Error> {
        self.handle.reload(EnvFilter::new(level.as_str()))
    }

    /// Textual form of the active filter, if the subscriber is still alive
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins over the configured level. Output is JSON in production
/// and human-readable elsewhere.
pub fn init_tracing(config: &ApiConfig) -> Result<LogLevelControl, tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(filter);

    let registry = tracing_subscriber::registry().with(filter_layer);
    if config.is_production() {
        registry
            .with(tracing_fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(tracing_fmt::layer().with_target(true)).try_init()?;
    }

    Ok(LogLevelControl::new(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing_is_case_insensitive() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_reload_swaps_filter() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let control = LogLevelControl::new(handle);

        control.set_level(LogLevel::Error).unwrap();
        assert!(control.current().unwrap().contains("error"));
        drop(layer);
        assert!(control.current().is_none());
    }
}
