//! Process-wide notification id directory
//!
//! Notification actions arrive as an action string plus a notification id,
//! possibly after the process that started the download has died. Live
//! downloads are looked up in memory; finished ones in storage.

use std::sync::Arc;

use weblayer_common::{IdAllocator, Registry};
use weblayer_storage::Database;

use crate::download::{Download, DownloadState};
use crate::error::DownloadError;
use crate::Result;

/// Settings key holding the next notification id to hand out.
pub const NEXT_NOTIFICATION_ID_KEY: &str = "next_download_notification_id";

const ACTION_PREFIX: &str = "org.chromium.weblayer.downloads.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadAction {
    Pause,
    Resume,
    Cancel,
    Delete,
    Open,
}

impl DownloadAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadAction::Pause => "org.chromium.weblayer.downloads.PAUSE",
            DownloadAction::Resume => "org.chromium.weblayer.downloads.RESUME",
            DownloadAction::Cancel => "org.chromium.weblayer.downloads.CANCEL",
            DownloadAction::Delete => "org.chromium.weblayer.downloads.DELETE",
            DownloadAction::Open => "org.chromium.weblayer.downloads.OPEN",
        }
    }
}

impl std::str::FromStr for DownloadAction {
    type Err = DownloadError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.strip_prefix(ACTION_PREFIX) {
            Some("PAUSE") => Ok(DownloadAction::Pause),
            Some("RESUME") => Ok(DownloadAction::Resume),
            Some("CANCEL") => Ok(DownloadAction::Cancel),
            Some("DELETE") => Ok(DownloadAction::Delete),
            Some("OPEN") => Ok(DownloadAction::Open),
            _ => Err(DownloadError::UnknownAction(s.to_string())),
        }
    }
}

/// What routing an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Applied to a live download.
    Handled,
    /// The host should open this file.
    Open {
        location: String,
        mime_type: Option<String>,
    },
    /// The download record was removed.
    Deleted,
    /// Nothing to act on: unknown id, or an action that no longer applies.
    Ignored,
}

pub struct DownloadRegistry {
    downloads: Registry<i32, Download>,
    ids: IdAllocator,
    db: Database,
}

impl DownloadRegistry {
    /// Resumes the id space from storage.
    pub fn new(db: Database) -> Result<Self> {
        let first = db
            .get_setting_json::<i32>(NEXT_NOTIFICATION_ID_KEY)?
            .unwrap_or(1);
        tracing::debug!(first_id = first, "download registry opened");

        Ok(Self {
            downloads: Registry::new("downloads"),
            ids: IdAllocator::starting_at("download notification", first),
            db,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Hands out the next notification id and persists the high-water mark
    /// before returning it.
    pub fn allocate_id(&self) -> Result<i32> {
        let id = self.ids.next()?;
        self.db
            .set_setting_json(NEXT_NOTIFICATION_ID_KEY, &self.ids.peek_next())?;
        Ok(id)
    }

    pub(crate) fn register(&self, download: Arc<Download>) -> Result<()> {
        Ok(self.downloads.insert(download.raw_id(), download)?)
    }

    pub fn get(&self, notification_id: i32) -> Option<Arc<Download>> {
        self.downloads.get(&notification_id)
    }

    pub fn live_downloads(&self) -> Vec<Arc<Download>> {
        self.downloads.values()
    }

    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    /// Writes a finished download so actions can reach it after a restart.
    pub(crate) fn persist(&self, download: &Download) -> Result<()> {
        if let Some(record) = download.to_record() {
            self.db.save_download(&record)?;
        }
        Ok(())
    }

    /// The engine retired the download. Its persisted record, if any, stays.
    pub(crate) fn on_download_destroyed(&self, notification_id: i32) -> Option<Arc<Download>> {
        let removed = self.downloads.remove(&notification_id)?;
        removed.on_engine_destroyed();
        Some(removed)
    }

    /// Removes a download from both the live map and storage, cancelling it
    /// first if it is still running. Returns whether anything was removed.
    pub fn delete_download(&self, notification_id: i32) -> Result<bool> {
        let mut removed = false;
        if let Some(download) = self.downloads.remove(&notification_id) {
            if let Ok(state) = download.state() {
                if matches!(state, DownloadState::InProgress | DownloadState::Paused) {
                    download.cancel()?;
                }
            }
            removed = true;
        }
        removed |= self.db.delete_download(notification_id)?;
        tracing::info!(notification_id, removed, "download deleted");
        Ok(removed)
    }

    /// Routes a notification action.
    pub fn route_intent(&self, action: &str, notification_id: i32) -> Result<IntentOutcome> {
        let action: DownloadAction = action.parse()?;
        tracing::debug!(action = action.as_str(), notification_id, "routing download action");

        if action == DownloadAction::Delete {
            return Ok(if self.delete_download(notification_id)? {
                IntentOutcome::Deleted
            } else {
                IntentOutcome::Ignored
            });
        }

        if let Some(download) = self.get(notification_id) {
            let state = download.state()?;
            let outcome = match action {
                DownloadAction::Pause if state == DownloadState::InProgress => {
                    download.pause()?;
                    IntentOutcome::Handled
                }
                DownloadAction::Resume
                    if matches!(state, DownloadState::Paused | DownloadState::Failed) =>
                {
                    download.resume()?;
                    IntentOutcome::Handled
                }
                DownloadAction::Cancel
                    if matches!(state, DownloadState::InProgress | DownloadState::Paused) =>
                {
                    download.cancel()?;
                    IntentOutcome::Handled
                }
                DownloadAction::Open if state == DownloadState::Complete => {
                    match download.location()? {
                        Some(location) => IntentOutcome::Open {
                            location,
                            mime_type: download.mime_type()?,
                        },
                        None => IntentOutcome::Ignored,
                    }
                }
                _ => IntentOutcome::Ignored,
            };
            return Ok(outcome);
        }

        // Only opening survives a restart; the engine-side download is gone.
        if action == DownloadAction::Open {
            if let Some(record) = self.db.get_download(notification_id)? {
                return Ok(IntentOutcome::Open {
                    location: record.location,
                    mime_type: record.mime_type,
                });
            }
        }
        tracing::debug!(notification_id, "download action for unknown id ignored");
        Ok(IntentOutcome::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use weblayer_native::{NativeCall, NativeEngine, NativeKind, RecordingEngine};

    fn start(engine: &Arc<RecordingEngine>, registry: &DownloadRegistry) -> Arc<Download> {
        let id = registry.allocate_id().unwrap();
        let download = Arc::new(Download::new(
            engine.clone() as Arc<dyn NativeEngine>,
            id,
            engine.mint(NativeKind::Download),
            "default",
            Url::parse("https://example.com/a.pdf").unwrap(),
            Some("application/pdf".to_string()),
            Some(10),
            false,
        ));
        registry.register(download.clone()).unwrap();
        download
    }

    #[test]
    fn test_ids_survive_restart() {
        let db = Database::open_in_memory().unwrap();
        let first = DownloadRegistry::new(db.clone()).unwrap();
        assert_eq!(first.allocate_id().unwrap(), 1);
        assert_eq!(first.allocate_id().unwrap(), 2);

        let second = DownloadRegistry::new(db).unwrap();
        assert_eq!(second.allocate_id().unwrap(), 3);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(
            "org.chromium.weblayer.downloads.PAUSE"
                .parse::<DownloadAction>()
                .unwrap(),
            DownloadAction::Pause
        );
        assert!("org.chromium.weblayer.downloads.EXPLODE"
            .parse::<DownloadAction>()
            .is_err());
        assert!("PAUSE".parse::<DownloadAction>().is_err());
        assert_eq!(
            DownloadAction::Open.as_str().parse::<DownloadAction>().unwrap(),
            DownloadAction::Open
        );
    }

    #[test]
    fn test_routing_to_live_download() {
        let engine = Arc::new(RecordingEngine::new());
        let registry = DownloadRegistry::new(Database::open_in_memory().unwrap()).unwrap();
        let download = start(&engine, &registry);
        let id = download.notification_id().unwrap();

        assert_eq!(
            registry.route_intent(DownloadAction::Pause.as_str(), id).unwrap(),
            IntentOutcome::Handled
        );
        // Still in progress from the engine's point of view until it says
        // otherwise, so resume does not apply yet.
        assert_eq!(
            registry.route_intent(DownloadAction::Resume.as_str(), id).unwrap(),
            IntentOutcome::Ignored
        );
        assert_eq!(
            registry.route_intent(DownloadAction::Pause.as_str(), 999).unwrap(),
            IntentOutcome::Ignored
        );
        assert_eq!(engine.count(|c| matches!(c, NativeCall::PauseDownload(_))), 1);
    }

    #[test]
    fn test_open_after_restart() {
        let engine = Arc::new(RecordingEngine::new());
        let db = Database::open_in_memory().unwrap();
        let registry = DownloadRegistry::new(db.clone()).unwrap();
        let download = start(&engine, &registry);
        let id = download.notification_id().unwrap();
        download.mark_complete("/downloads/a.pdf".to_string());
        registry.persist(&download).unwrap();
        registry.on_download_destroyed(id);
        assert!(registry.is_empty());

        let restarted = DownloadRegistry::new(db).unwrap();
        assert_eq!(
            restarted.route_intent(DownloadAction::Open.as_str(), id).unwrap(),
            IntentOutcome::Open {
                location: "/downloads/a.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
            }
        );
        assert_eq!(
            restarted.route_intent(DownloadAction::Delete.as_str(), id).unwrap(),
            IntentOutcome::Deleted
        );
        assert_eq!(
            restarted.route_intent(DownloadAction::Open.as_str(), id).unwrap(),
            IntentOutcome::Ignored
        );
    }

    #[test]
    fn test_delete_cancels_running_download() {
        let engine = Arc::new(RecordingEngine::new());
        let registry = DownloadRegistry::new(Database::open_in_memory().unwrap()).unwrap();
        let download = start(&engine, &registry);
        let id = download.notification_id().unwrap();

        assert!(registry.delete_download(id).unwrap());
        assert!(registry.get(id).is_none());
        assert_eq!(engine.count(|c| matches!(c, NativeCall::CancelDownload(_))), 1);
        assert!(!registry.delete_download(id).unwrap());

        // The id is not handed out again.
        assert!(registry.allocate_id().unwrap() > id);
    }
}
