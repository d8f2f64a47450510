//! Download error types

use thiserror::Error;
use weblayer_common::LifecycleError;
use weblayer_storage::StorageError;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Unknown download action: {0}")]
    UnknownAction(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl DownloadError {
    pub fn is_use_after_destroy(&self) -> bool {
        matches!(self, DownloadError::Lifecycle(e) if e.is_use_after_destroy())
    }
}
