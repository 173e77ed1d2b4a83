//! Progress and diagnostics sink for package operations.

use std::fmt;

/// Severity of a message emitted during a package operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl MessageLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives leveled messages from restore and cleanup operations.
pub trait ProjectContext: Send + Sync {
    fn log(&self, level: MessageLevel, message: &str);
}

/// Forwards messages to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingContext;

impl ProjectContext for TracingContext {
    fn log(&self, level: MessageLevel, message: &str) {
        match level {
            MessageLevel::Debug => tracing::debug!("{message}"),
            MessageLevel::Info => tracing::info!("{message}"),
            MessageLevel::Warning => tracing::warn!("{message}"),
            MessageLevel::Error => tracing::error!("{message}"),
        }
    }
}
