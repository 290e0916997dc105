//! Logging initialization
//!
//! | Configuration          | Output                           | Guard |
//! |------------------------|----------------------------------|-------|
//! | no `directory`         | stderr, text or JSON             | No    |
//! | `directory` set        | daily-rotated files, non-blocking | **Yes** |
//!
//! `RUST_LOG` wins over the configured level when set. The guard returned
//! for file logging flushes buffered events on drop and must be held for
//! the life of the process.

use crate::config::{LogFormat, LoggingConfig};
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging setup failure
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The configured level is not a valid filter directive
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter {
        /// The rejected directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// The log directory could not be created
    #[error("cannot create log directory: {0}")]
    Directory(#[from] io::Error),

    /// A global subscriber is already installed
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Keeps the non-blocking file writer alive.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to the configured level.
    ///
    /// # Errors
    ///
    /// Returns [`LoggingError::InvalidFilter`] if neither parses.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::InvalidFilter {
            filter: self.level.clone(),
            reason: e.to_string(),
        })
    }

    /// Install the global subscriber.
    ///
    /// Returns `Some(LoggingGuard)` for file logging (must be held), `None`
    /// for stderr.
    ///
    /// # Errors
    ///
    /// - [`LoggingError::InvalidFilter`] for a bad level
    /// - [`LoggingError::Directory`] if the log directory cannot be created
    /// - [`LoggingError::Install`] if a subscriber is already set
    pub fn init(&self) -> Result<Option<LoggingGuard>, LoggingError> {
        let filter = self.filter()?;

        match &self.directory {
            None => {
                init_stderr(self.format, filter)?;
                Ok(None)
            }
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = tracing_appender::rolling::daily(dir, &self.file_prefix);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let subscriber = tracing_subscriber::registry().with(filter);
                let result = match self.format {
                    LogFormat::Json => subscriber
                        .with(fmt::layer().json().with_writer(writer))
                        .try_init(),
                    LogFormat::Text => subscriber
                        .with(fmt::layer().with_ansi(false).with_writer(writer))
                        .try_init(),
                };
                result.map_err(|e| LoggingError::Install(e.to_string()))?;
                Ok(Some(LoggingGuard { _file_guard: guard }))
            }
        }
    }
}

fn init_stderr(format: LogFormat, filter: EnvFilter) -> Result<(), LoggingError> {
    let subscriber = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        LogFormat::Text => subscriber.with(fmt::layer().with_writer(io::stderr)).try_init(),
    };
    result.map_err(|e| LoggingError::Install(e.to_string()))
}
