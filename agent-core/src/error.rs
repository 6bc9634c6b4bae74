//! Cross-subsystem error taxonomy (A3, §7).

use thiserror::Error;

/// Stable machine-readable codes surfaced to WebSocket clients and callers,
/// matching §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidJson,
    InvalidInterval,
    ValidationError,
    UnknownMessageType,
    OperationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::InvalidInterval => "INVALID_INTERVAL",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::UnknownMessageType => "UNKNOWN_MESSAGE_TYPE",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    #[error("update_interval must be within [{min}, {max}] ms, got {got}")]
    InvalidInterval { min: u32, max: u32, got: u32 },
    #[error("validation failed: {0}")]
    Field(String),
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::InvalidJson(_) => ErrorCode::InvalidJson,
            ValidationError::InvalidInterval { .. } => ErrorCode::InvalidInterval,
            ValidationError::Field(_) => ErrorCode::ValidationError,
            ValidationError::UnknownMessageType(_) => ErrorCode::UnknownMessageType,
        }
    }
}

/// A failure reported back by the bridge RPC transport's `{ok:false, ...}`
/// envelope (§6).
#[derive(Debug, Error, Clone)]
#[error("bridge call failed: {reason}")]
pub struct BridgeError {
    pub reason: String,
    pub error_code: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ModeTransitionError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    #[error("mode {0} is already active")]
    AlreadyActive(String),
    #[error("current mode {current} (priority {current_priority}) outranks {target}")]
    PriorityTooLow {
        current: String,
        current_priority: i32,
        target: String,
    },
    #[error("handler rejected the transition: {0}")]
    RejectedByHandler(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The top-level error every subsystem boundary ultimately converges to.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    ModeTransition(#[from] ModeTransitionError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("fatal: {0}")]
    Fatal(String),
}
