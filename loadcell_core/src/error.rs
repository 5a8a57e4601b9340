use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeighError {
    #[error("malformed payload on {topic}: {reason}")]
    MalformedPayload { topic: String, reason: String },
    #[error("invalid indicator command: {0}")]
    InvalidCommand(String),
    #[error("transport not connected")]
    NotConnected,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("order lookup failed: {0}")]
    LookupFailed(String),
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
    #[error("degenerate target: {0}")]
    DegenerateTarget(String),
    #[error("stale lookup result (ticket {ticket}, current {current:?})")]
    StaleLookup { ticket: u64, current: Option<u64> },
    #[error("invalid state: {0}")]
    State(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl WeighError {
    /// Stable machine-readable name, used in fan-out error events.
    pub fn kind(&self) -> &'static str {
        match self {
            WeighError::MalformedPayload { .. } => "malformed_payload",
            WeighError::InvalidCommand(_) => "invalid_command",
            WeighError::NotConnected => "not_connected",
            WeighError::InvalidInput(_) => "invalid_input",
            WeighError::LookupFailed(_) => "lookup_failed",
            WeighError::PersistenceFailed(_) => "persistence_failed",
            WeighError::DegenerateTarget(_) => "degenerate_target",
            WeighError::StaleLookup { .. } => "stale_lookup",
            WeighError::State(_) => "state",
            WeighError::Transport(_) => "transport",
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing publisher")]
    MissingPublisher,
    #[error("missing fan-out")]
    MissingFanOut,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
