//! Lifecycle error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{entity} used after destroy")]
    UseAfterDestroy { entity: &'static str },

    #[error("Remote client unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{0} already initialized")]
    AlreadyInitialized(&'static str),

    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    #[error("Unmapped {kind} value: {value}")]
    UnmappedValue { kind: &'static str, value: i32 },

    #[error("Re-entrant call: {0}")]
    ReentrantCall(&'static str),
}

impl LifecycleError {
    pub fn is_use_after_destroy(&self) -> bool {
        matches!(self, LifecycleError::UseAfterDestroy { .. })
    }
}

/// Failure reported by the IPC transport when talking to a remote client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote process is gone")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<RemoteError> for LifecycleError {
    fn from(err: RemoteError) -> Self {
        LifecycleError::RemoteUnavailable(err.to_string())
    }
}

pub type RemoteResult<T = ()> = std::result::Result<T, RemoteError>;

/// Failure delivered through the failure channel of an asynchronous
/// operation. Never returned synchronously.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {reason}")]
pub struct AsyncFailure {
    pub operation: &'static str,
    pub reason: String,
}

impl AsyncFailure {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

pub type AsyncResult<T> = std::result::Result<T, AsyncFailure>;
