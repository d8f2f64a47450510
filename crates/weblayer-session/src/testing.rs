//! Shared fixture for session tests

use std::sync::Arc;
use std::time::Duration;

use weblayer_common::{TaskRunner, VersionGate, VersionPolicy};
use weblayer_download::DownloadRegistry;
use weblayer_native::RecordingEngine;
use weblayer_storage::Database;

use crate::context::SessionContext;
use crate::profile_manager::ProfileManager;

pub(crate) struct Fixture {
    // Keeps the blocking pool alive for the test.
    _runtime: tokio::runtime::Runtime,
    pub engine: Arc<RecordingEngine>,
    pub ctx: Arc<SessionContext>,
    pub profiles: ProfileManager,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_client(VersionPolicy::default().implementation_major)
    }

    pub fn with_client(client_major: u32) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let engine = Arc::new(RecordingEngine::new());
        let version = Arc::new(VersionGate::with_client(VersionPolicy::default(), client_major));
        let tasks = Arc::new(TaskRunner::new(runtime.handle().clone()));
        let downloads =
            Arc::new(DownloadRegistry::new(Database::open_in_memory().unwrap()).unwrap());
        let ctx = SessionContext::new(engine.clone(), version, tasks, downloads);
        let profiles = ProfileManager::new(ctx.clone());

        Self {
            _runtime: runtime,
            engine,
            ctx,
            profiles,
        }
    }

    /// Drains UI tasks and worker replies until `done` holds.
    pub fn run_until(&self, done: impl FnMut() -> bool) -> bool {
        self.ctx.tasks().run_until(Duration::from_secs(5), done)
    }
}
