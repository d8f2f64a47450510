//! Navigation error types

use thiserror::Error;
use weblayer_common::LifecycleError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("{operation} not allowed in state {state}")]
    WrongState {
        operation: &'static str,
        state: &'static str,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl NavigationError {
    pub fn is_use_after_destroy(&self) -> bool {
        matches!(self, NavigationError::Lifecycle(e) if e.is_use_after_destroy())
    }
}
