//! Core error types

use thiserror::Error;
use weblayer_common::LifecycleError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] weblayer_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] weblayer_session::SessionError),

    #[error("Download error: {0}")]
    Download(#[from] weblayer_download::DownloadError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No engine registered as {0:?}")]
    UnknownEngine(String),

    #[error("Engine {name:?} is already registered")]
    EngineTaken { name: String },

    #[error("Engine failed to start: {0}")]
    EngineStart(#[source] anyhow::Error),

    #[error("Client version {client_major} not supported by implementation {implementation_major}")]
    UnsupportedClient {
        client_major: u32,
        implementation_major: u32,
    },

    #[error("WebLayer not initialized")]
    NotInitialized,

    #[error("WebLayer is shut down")]
    ShutDown,
}

impl CoreError {
    pub fn is_use_after_destroy(&self) -> bool {
        match self {
            CoreError::Lifecycle(e) => e.is_use_after_destroy(),
            CoreError::Session(e) => e.is_use_after_destroy(),
            CoreError::Download(e) => e.is_use_after_destroy(),
            _ => false,
        }
    }
}
