use std::fmt;

/// Lifecycle and configuration errors surfaced to the host application.
#[derive(Debug)]
pub enum ObservabilityError {
    /// `start()` called while an observability session is already running.
    AlreadyStarted,
    /// `stop()` called on a session that is not running.
    NotStarted,
    /// `start()` called outside a Tokio runtime.
    NoRuntime,
    Config(String),
    Telemetry(String),
}

impl fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservabilityError::AlreadyStarted => {
                write!(f, "gRPC observability already started in this process")
            }
            ObservabilityError::NotStarted => {
                write!(f, "gRPC observability has not been started")
            }
            ObservabilityError::NoRuntime => {
                write!(f, "gRPC observability must be started inside a Tokio runtime")
            }
            ObservabilityError::Config(msg) => write!(f, "Config error: {msg}"),
            ObservabilityError::Telemetry(msg) => write!(f, "Telemetry error: {msg}"),
        }
    }
}

impl std::error::Error for ObservabilityError {}

/// Failure reported by an [`Exporter`](crate::exporter::Exporter). Logged and
/// swallowed by the export loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    Rejected(String),
    Unavailable(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Rejected(msg) => write!(f, "Export rejected: {msg}"),
            ExportError::Unavailable(msg) => write!(f, "Exporter unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}
