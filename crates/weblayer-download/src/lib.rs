//! WebLayer Downloads
//!
//! Downloads are created by the engine and announced to the per-profile
//! [`DownloadCallbackProxy`]. Each gets a notification id from the
//! process-wide [`DownloadRegistry`]; notification actions address downloads
//! by that id, so ids are never reused and the counter is persisted.

mod callback_proxy;
mod download;
mod error;
mod registry;

pub use callback_proxy::{AllowDownloadResponder, DownloadCallbackProxy, DownloadClient};
pub use download::{Download, DownloadFailure, DownloadState};
pub use error::DownloadError;
pub use registry::{DownloadAction, DownloadRegistry, IntentOutcome, NEXT_NOTIFICATION_ID_KEY};

pub type Result<T> = std::result::Result<T, DownloadError>;
