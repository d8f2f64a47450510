//! WebLayer configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use weblayer_common::VersionPolicy;

use crate::error::CoreError;
use crate::Result;

/// Name of the in-process engine that is always registered.
pub const RECORDING_ENGINE: &str = "recording";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of everything WebLayer writes to disk
    pub data_dir: PathBuf,
    /// Path to the database file (download ids and completed downloads)
    pub database_path: PathBuf,
    /// Where the engine leaves crash dumps for the crash reporter
    pub crash_dump_dir: PathBuf,
    /// Key of the engine factory to start
    pub engine: String,
    /// Threads for the runtime behind blocking disk and upload work
    pub worker_threads: usize,
    /// Client version window
    pub version_policy: VersionPolicy,
    /// `tracing` filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("weblayer.db"),
            crash_dump_dir: data_dir.join("Crash Reports"),
            data_dir,
            engine: RECORDING_ENGINE.to_string(),
            worker_threads: 2,
            version_policy: VersionPolicy::default(),
            log_filter: "info".to_string(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("WebLayer"))
            .unwrap_or_else(|| PathBuf::from(".weblayer"))
    }

    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.as_ref().display(), engine = %config.engine, "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(CoreError::Config("worker_threads must be at least 1".to_string()));
        }
        if self.engine.is_empty() {
            return Err(CoreError::Config("engine must not be empty".to_string()));
        }
        let policy = &self.version_policy;
        if policy.min_client_major > policy.implementation_major {
            return Err(CoreError::Config(format!(
                "min_client_major {} is newer than implementation {}",
                policy.min_client_major, policy.implementation_major
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
