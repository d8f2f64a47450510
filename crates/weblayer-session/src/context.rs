//! Process-wide session services
//!
//! One context per [`crate::ProfileManager`]. It carries the engine, the
//! client version gate, the UI task runner and the identity registries that
//! every object in the session tree shares.

use std::sync::Arc;

use weblayer_common::{IdAllocator, Registry, TaskRunner, VersionGate};
use weblayer_download::DownloadRegistry;
use weblayer_native::{NativeEngine, NativeHandle};

use crate::browser::Browser;
use crate::profile::{Profile, ProfileKey};
use crate::tab::Tab;

/// Live browsers keyed by native handle. Observers see a browser removed
/// while it is still readable, after its tabs are gone and its profile
/// reference has been released.
pub type BrowserList = Registry<NativeHandle, Browser>;

pub struct SessionContext {
    engine: Arc<dyn NativeEngine>,
    version: Arc<VersionGate>,
    tasks: Arc<TaskRunner>,
    downloads: Arc<DownloadRegistry>,
    pub(crate) profiles: Registry<ProfileKey, Profile>,
    pub(crate) browsers: BrowserList,
    pub(crate) tabs: Registry<i32, Tab>,
    pub(crate) tab_ids: IdAllocator,
}

impl SessionContext {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        tasks: Arc<TaskRunner>,
        downloads: Arc<DownloadRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            version,
            tasks,
            downloads,
            profiles: Registry::new("profiles"),
            browsers: Registry::new("browsers"),
            tabs: Registry::new("tabs"),
            tab_ids: IdAllocator::new("tab"),
        })
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    pub fn version(&self) -> &Arc<VersionGate> {
        &self.version
    }

    pub fn tasks(&self) -> &Arc<TaskRunner> {
        &self.tasks
    }

    pub fn downloads(&self) -> &Arc<DownloadRegistry> {
        &self.downloads
    }

    pub fn browser_list(&self) -> &BrowserList {
        &self.browsers
    }

    /// The live tab with this id, from any browser.
    pub fn tab(&self, id: i32) -> Option<Arc<Tab>> {
        self.tabs.get(&id)
    }

    pub fn live_tabs(&self) -> Vec<Arc<Tab>> {
        self.tabs.values()
    }
}
