//! Engine-owned downloads

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use weblayer_common::{DestroyDiscipline, HandleCell, LifecycleError};
use weblayer_native::codes::{download_error, download_state};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};
use weblayer_storage::DownloadRecord;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    InProgress,
    Complete,
    Failed,
    Cancelled,
    Paused,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::InProgress => "in_progress",
            DownloadState::Complete => "complete",
            DownloadState::Failed => "failed",
            DownloadState::Cancelled => "cancelled",
            DownloadState::Paused => "paused",
        }
    }

    pub fn from_native(code: i32) -> std::result::Result<Self, LifecycleError> {
        match code {
            download_state::IN_PROGRESS => Ok(DownloadState::InProgress),
            download_state::COMPLETE => Ok(DownloadState::Complete),
            download_state::FAILED => Ok(DownloadState::Failed),
            download_state::CANCELLED => Ok(DownloadState::Cancelled),
            download_state::PAUSED => Ok(DownloadState::Paused),
            value => Err(LifecycleError::UnmappedValue {
                kind: "download state",
                value,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Complete | DownloadState::Failed | DownloadState::Cancelled
        )
    }
}

impl std::str::FromStr for DownloadState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(DownloadState::InProgress),
            "complete" => Ok(DownloadState::Complete),
            "failed" => Ok(DownloadState::Failed),
            "cancelled" => Ok(DownloadState::Cancelled),
            "paused" => Ok(DownloadState::Paused),
            _ => Err(format!("Unknown download state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFailure {
    None,
    ServerError,
    SslError,
    ConnectivityError,
    NoSpace,
    FileError,
    Cancelled,
    Other,
}

impl DownloadFailure {
    pub fn from_native(code: i32) -> std::result::Result<Self, LifecycleError> {
        match code {
            download_error::NONE => Ok(DownloadFailure::None),
            download_error::SERVER_ERROR => Ok(DownloadFailure::ServerError),
            download_error::SSL_ERROR => Ok(DownloadFailure::SslError),
            download_error::CONNECTIVITY_ERROR => Ok(DownloadFailure::ConnectivityError),
            download_error::NO_SPACE => Ok(DownloadFailure::NoSpace),
            download_error::FILE_ERROR => Ok(DownloadFailure::FileError),
            download_error::CANCELLED => Ok(DownloadFailure::Cancelled),
            download_error::OTHER => Ok(DownloadFailure::Other),
            value => Err(LifecycleError::UnmappedValue {
                kind: "download error",
                value,
            }),
        }
    }
}

#[derive(Debug)]
struct DownloadProgress {
    state: DownloadState,
    failure: DownloadFailure,
    received_bytes: i64,
    total_bytes: Option<i64>,
    location: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

pub struct Download {
    notification_id: i32,
    handle: HandleCell,
    engine: Arc<dyn NativeEngine>,
    profile_name: String,
    url: Url,
    mime_type: Option<String>,
    started_at: DateTime<Utc>,
    is_transient: bool,
    progress: Mutex<DownloadProgress>,
}

impl Download {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        engine: Arc<dyn NativeEngine>,
        notification_id: i32,
        handle: NativeHandle,
        profile_name: &str,
        url: Url,
        mime_type: Option<String>,
        total_bytes: Option<i64>,
        is_transient: bool,
    ) -> Self {
        Self {
            notification_id,
            handle: HandleCell::new(
                NativeKind::Download.as_str(),
                handle,
                DestroyDiscipline::EngineOwned,
            ),
            engine,
            profile_name: profile_name.to_string(),
            url,
            mime_type,
            started_at: Utc::now(),
            is_transient,
            progress: Mutex::new(DownloadProgress {
                state: DownloadState::InProgress,
                failure: DownloadFailure::None,
                received_bytes: 0,
                total_bytes,
                location: None,
                completed_at: None,
            }),
        }
    }

    fn check(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn notification_id(&self) -> Result<i32> {
        self.check()?;
        Ok(self.notification_id)
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.check()
    }

    pub fn url(&self) -> Result<Url> {
        self.check()?;
        Ok(self.url.clone())
    }

    pub fn mime_type(&self) -> Result<Option<String>> {
        self.check()?;
        Ok(self.mime_type.clone())
    }

    pub fn started_at(&self) -> Result<DateTime<Utc>> {
        self.check()?;
        Ok(self.started_at)
    }

    /// Transient downloads are never persisted and disappear once the user
    /// dismisses them.
    pub fn is_transient(&self) -> Result<bool> {
        self.check()?;
        Ok(self.is_transient)
    }

    pub fn state(&self) -> Result<DownloadState> {
        self.check()?;
        Ok(self.progress.lock().state)
    }

    pub fn failure(&self) -> Result<DownloadFailure> {
        self.check()?;
        Ok(self.progress.lock().failure)
    }

    pub fn received_bytes(&self) -> Result<i64> {
        self.check()?;
        Ok(self.progress.lock().received_bytes)
    }

    pub fn total_bytes(&self) -> Result<Option<i64>> {
        self.check()?;
        Ok(self.progress.lock().total_bytes)
    }

    /// Where the file landed, once complete.
    pub fn location(&self) -> Result<Option<String>> {
        self.check()?;
        Ok(self.progress.lock().location.clone())
    }

    /// Download progress as percentage (0-100)
    pub fn progress(&self) -> Result<f64> {
        self.check()?;
        let progress = self.progress.lock();
        Ok(match progress.total_bytes {
            Some(total) if total > 0 => {
                (progress.received_bytes as f64 / total as f64 * 100.0).min(100.0)
            }
            _ => 0.0,
        })
    }

    pub fn pause(&self) -> Result<()> {
        let handle = self.check()?;
        self.require_state("pause", &[DownloadState::InProgress])?;
        self.engine.pause_download(handle);
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        let handle = self.check()?;
        self.require_state("resume", &[DownloadState::Paused, DownloadState::Failed])?;
        self.engine.resume_download(handle);
        Ok(())
    }

    pub fn cancel(&self) -> Result<()> {
        let handle = self.check()?;
        self.require_state("cancel", &[DownloadState::InProgress, DownloadState::Paused])?;
        self.engine.cancel_download(handle);
        Ok(())
    }

    fn require_state(&self, operation: &str, allowed: &[DownloadState]) -> Result<()> {
        let state = self.progress.lock().state;
        if allowed.contains(&state) {
            return Ok(());
        }
        Err(LifecycleError::InvalidState(format!(
            "cannot {} download {} while {}",
            operation,
            self.notification_id,
            state.as_str()
        ))
        .into())
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    pub(crate) fn raw_id(&self) -> i32 {
        self.notification_id
    }

    pub(crate) fn update_progress(&self, state: DownloadState, received: i64, total: Option<i64>) {
        let mut progress = self.progress.lock();
        progress.state = state;
        progress.received_bytes = received;
        if total.is_some() {
            progress.total_bytes = total;
        }
    }

    pub(crate) fn mark_complete(&self, location: String) {
        let mut progress = self.progress.lock();
        progress.state = DownloadState::Complete;
        if let Some(total) = progress.total_bytes {
            progress.received_bytes = total;
        }
        progress.location = Some(location);
        progress.completed_at = Some(Utc::now());
    }

    pub(crate) fn mark_failed(&self, failure: DownloadFailure) {
        let mut progress = self.progress.lock();
        progress.state = if failure == DownloadFailure::Cancelled {
            DownloadState::Cancelled
        } else {
            DownloadState::Failed
        };
        progress.failure = failure;
    }

    pub(crate) fn on_engine_destroyed(&self) -> bool {
        self.handle.on_engine_destroyed()
    }

    /// The row kept for notification actions after a restart. Only complete,
    /// non-transient downloads have one.
    pub(crate) fn to_record(&self) -> Option<DownloadRecord> {
        if self.is_transient {
            return None;
        }
        let progress = self.progress.lock();
        if progress.state != DownloadState::Complete {
            return None;
        }
        Some(DownloadRecord {
            notification_id: self.notification_id,
            profile_name: self.profile_name.clone(),
            url: self.url.to_string(),
            location: progress.location.clone().unwrap_or_default(),
            mime_type: self.mime_type.clone(),
            total_bytes: progress.total_bytes,
            state: progress.state.as_str().to_string(),
            started_at: self.started_at,
            completed_at: progress.completed_at,
        })
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("notification_id", &self.notification_id)
            .field("handle", &self.handle)
            .field("profile_name", &self.profile_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weblayer_native::{NativeCall, RecordingEngine};

    fn make(transient: bool) -> (Arc<RecordingEngine>, Download) {
        let engine = Arc::new(RecordingEngine::new());
        let handle = engine.mint(NativeKind::Download);
        let download = Download::new(
            engine.clone(),
            1,
            handle,
            "default",
            Url::parse("https://example.com/file.zip").unwrap(),
            Some("application/zip".to_string()),
            Some(1000),
            transient,
        );
        (engine, download)
    }

    #[test]
    fn test_progress() {
        let (_, download) = make(false);
        download.update_progress(DownloadState::InProgress, 500, None);
        assert!((download.progress().unwrap() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_commands_follow_state() {
        let (engine, download) = make(false);
        download.pause().unwrap();
        assert!(download.resume().is_err());
        download.update_progress(DownloadState::Paused, 10, None);
        download.resume().unwrap();
        download.cancel().unwrap();

        download.mark_complete("/downloads/file.zip".to_string());
        assert!(download.cancel().is_err());
        assert_eq!(
            engine.count(|c| matches!(
                c,
                NativeCall::PauseDownload(_)
                    | NativeCall::ResumeDownload(_)
                    | NativeCall::CancelDownload(_)
            )),
            3
        );
    }

    #[test]
    fn test_only_complete_downloads_have_records() {
        let (_, download) = make(false);
        assert!(download.to_record().is_none());
        download.mark_complete("/downloads/file.zip".to_string());
        let record = download.to_record().unwrap();
        assert_eq!(record.state, "complete");
        assert_eq!(record.location, "/downloads/file.zip");

        let (_, transient) = make(true);
        transient.mark_complete("/tmp/x".to_string());
        assert!(transient.to_record().is_none());
    }

    #[test]
    fn test_accessors_fail_after_engine_destroy() {
        let (_, download) = make(false);
        download.on_engine_destroyed();
        assert!(download.notification_id().unwrap_err().is_use_after_destroy());
        assert!(download.handle().unwrap_err().is_use_after_destroy());
        assert!(download.url().unwrap_err().is_use_after_destroy());
        assert!(download.mime_type().unwrap_err().is_use_after_destroy());
        assert!(download.started_at().unwrap_err().is_use_after_destroy());
        assert!(download.is_transient().unwrap_err().is_use_after_destroy());
        assert!(download.state().unwrap_err().is_use_after_destroy());
        assert!(download.failure().unwrap_err().is_use_after_destroy());
        assert!(download.received_bytes().unwrap_err().is_use_after_destroy());
        assert!(download.total_bytes().unwrap_err().is_use_after_destroy());
        assert!(download.location().unwrap_err().is_use_after_destroy());
        assert!(download.progress().unwrap_err().is_use_after_destroy());
        assert!(download.pause().unwrap_err().is_use_after_destroy());
        assert!(download.resume().unwrap_err().is_use_after_destroy());
        assert!(download.cancel().unwrap_err().is_use_after_destroy());
    }

    #[test]
    fn test_state_tables() {
        assert_eq!(
            DownloadState::from_native(download_state::PAUSED).unwrap(),
            DownloadState::Paused
        );
        assert!(DownloadState::from_native(9).is_err());
        assert_eq!(
            DownloadFailure::from_native(download_error::NO_SPACE).unwrap(),
            DownloadFailure::NoSpace
        );
        assert_eq!("complete".parse::<DownloadState>().unwrap(), DownloadState::Complete);
    }
}
