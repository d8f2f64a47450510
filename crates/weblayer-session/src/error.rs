//! Session error types

use thiserror::Error;

use weblayer_common::LifecycleError;
use weblayer_download::DownloadError;
use weblayer_navigation::NavigationError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid profile name: {0:?}")]
    InvalidProfileName(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Tab {0} does not belong to this browser")]
    NotInBrowser(i32),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Storage error: {0}")]
    Storage(#[from] weblayer_storage::StorageError),
}

impl SessionError {
    pub fn is_use_after_destroy(&self) -> bool {
        match self {
            SessionError::Lifecycle(err) => err.is_use_after_destroy(),
            SessionError::Navigation(err) => err.is_use_after_destroy(),
            SessionError::Download(err) => err.is_use_after_destroy(),
            _ => false,
        }
    }
}

pub(crate) fn parse_url(raw: &str) -> crate::Result<url::Url> {
    url::Url::parse(raw).map_err(|e| SessionError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
