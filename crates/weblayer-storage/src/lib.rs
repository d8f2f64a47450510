//! WebLayer Storage Layer
//!
//! SQLite persistence for the little state that has to outlive the process:
//! the download notification id high-water mark and finished downloads that
//! can still be addressed by notification actions after a restart.

mod database;
mod downloads;
mod error;
mod migrations;

pub use database::Database;
pub use downloads::DownloadRecord;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
