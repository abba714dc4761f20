//! Error types for the AiCam core.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AicamError>;

/// Error taxonomy shared by every subsystem.
///
/// Structural/API-misuse errors (`InvalidParam`, `NotFound`,
/// `CapacityExceeded`, ...) are returned synchronously and are fatal to
/// that single call only. Per-service lifecycle failures during bulk
/// passes are recorded on the descriptor and surfaced in aggregate
/// stats, never as a hard error from the pass itself. `Timeout` is a
/// normal outcome of readiness waits and must stay distinguishable
/// from hard errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AicamError {
    #[error("Not initialized")]
    NotInitialized,

    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Timeout")]
    Timeout,

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AicamError {
    pub fn code(&self) -> i32 {
        match self {
            AicamError::NotInitialized => -32000,
            AicamError::AlreadyInitialized(_) => -32001,
            AicamError::InvalidParam(_) => -32602,
            AicamError::NotFound(_) => -32004,
            AicamError::DependencyNotReady(_) => -32005,
            AicamError::CapacityExceeded(_) => -32006,
            AicamError::Timeout => -32007,
            AicamError::Unavailable(_) => -32008,
            AicamError::Internal(_) => -32603,
        }
    }
}

impl From<std::io::Error> for AicamError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            AicamError::NotFound(e.to_string())
        } else {
            AicamError::Internal(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AicamError {
    fn from(e: serde_json::Error) -> Self {
        AicamError::Internal(format!("json: {e}"))
    }
}
