//! Per-tab navigation controller
//!
//! Owns the navigation id map and the page dedup map. Native navigation
//! events arrive here by id; events for an unknown id or for a destroyed
//! controller were queued before teardown and are dropped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use weblayer_common::{
    ClientFeature, ClientSlot, DestroyDiscipline, HandleCell, LifecycleError, RemoteResult,
    VersionGate,
};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind, NativeNavigateParams};

use crate::error::NavigationError;
use crate::navigation::{InterceptDecision, Navigation, NavigationFailure};
use crate::page::Page;
use crate::Result;

pub trait NavigationClient: Send + Sync {
    fn navigation_started(&self, navigation: Arc<Navigation>) -> RemoteResult;
    fn navigation_redirected(&self, navigation: Arc<Navigation>) -> RemoteResult;
    fn ready_to_commit_navigation(&self, navigation: Arc<Navigation>) -> RemoteResult;
    fn navigation_completed(&self, navigation: Arc<Navigation>) -> RemoteResult;
    fn navigation_failed(
        &self,
        navigation: Arc<Navigation>,
        failure: NavigationFailure,
    ) -> RemoteResult;
    fn on_page_destroyed(&self, page: Arc<Page>) -> RemoteResult;
}

/// Decides whether a starting navigation should leave for an external app.
/// Returning `NoDecision` means the decision, if any, is recorded on the
/// navigation later.
pub trait ExternalIntentHandler: Send + Sync {
    fn on_navigation_started(&self, navigation: &Arc<Navigation>) -> InterceptDecision;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateParams {
    pub should_replace_current_entry: bool,
    pub disable_intent_processing: bool,
}

impl From<&NavigateParams> for NativeNavigateParams {
    fn from(params: &NavigateParams) -> Self {
        NativeNavigateParams {
            should_replace_current_entry: params.should_replace_current_entry,
            intent_processing_disabled: params.disable_intent_processing,
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| NavigationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

pub struct NavigationController {
    handle: HandleCell,
    engine: Arc<dyn NativeEngine>,
    version: Arc<VersionGate>,
    client: ClientSlot<dyn NavigationClient>,
    navigations: Mutex<HashMap<i64, Arc<Navigation>>>,
    pages: Mutex<HashMap<NativeHandle, Arc<Page>>>,
    intent_handler: Mutex<Option<Arc<dyn ExternalIntentHandler>>>,
    last_user_gesture: Mutex<Option<DateTime<Utc>>>,
}

impl NavigationController {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        tab: NativeHandle,
    ) -> Self {
        let handle = engine.create(NativeKind::NavigationController, Some(tab));
        tracing::debug!(handle = %handle, tab = %tab, "navigation controller created");

        Self {
            handle: HandleCell::new(
                NativeKind::NavigationController.as_str(),
                handle,
                DestroyDiscipline::Once,
            ),
            engine,
            version,
            client: ClientSlot::shell(NativeKind::NavigationController.as_str()),
            navigations: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            intent_handler: Mutex::new(None),
            last_user_gesture: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn set_client(&self, client: Arc<dyn NavigationClient>) -> Result<()> {
        self.handle.get()?;
        Ok(self.client.set_client(client)?)
    }

    pub fn set_intent_handler(
        &self,
        handler: Option<Arc<dyn ExternalIntentHandler>>,
    ) -> Result<()> {
        self.handle.get()?;
        *self.intent_handler.lock() = handler;
        Ok(())
    }

    /// When the most recent navigation carrying a user gesture started.
    /// Stands in for "last user interaction", which this layer cannot see.
    pub fn last_user_gesture(&self) -> Result<Option<DateTime<Utc>>> {
        self.handle.get()?;
        Ok(*self.last_user_gesture.lock())
    }

    pub fn navigate(&self, url: &str, params: &NavigateParams) -> Result<()> {
        let handle = self.handle.get()?;
        let url = parse_url(url)?;
        tracing::info!(url = %url, "navigate");
        self.engine.navigate(handle, url.as_str(), &params.into());
        Ok(())
    }

    /// Returns false, and does nothing, when there is no back entry.
    pub fn go_back(&self) -> Result<bool> {
        let handle = self.handle.get()?;
        if !self.engine.can_go_back(handle) {
            return Ok(false);
        }
        self.engine.go_back(handle);
        Ok(true)
    }

    pub fn go_forward(&self) -> Result<bool> {
        let handle = self.handle.get()?;
        if !self.engine.can_go_forward(handle) {
            return Ok(false);
        }
        self.engine.go_forward(handle);
        Ok(true)
    }

    pub fn can_go_back(&self) -> Result<bool> {
        let handle = self.handle.get()?;
        Ok(self.engine.can_go_back(handle))
    }

    pub fn can_go_forward(&self) -> Result<bool> {
        let handle = self.handle.get()?;
        Ok(self.engine.can_go_forward(handle))
    }

    pub fn reload(&self) -> Result<()> {
        let handle = self.handle.get()?;
        self.engine.reload(handle);
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        let handle = self.handle.get()?;
        self.engine.stop(handle);
        Ok(())
    }

    pub fn navigation(&self, id: i64) -> Result<Option<Arc<Navigation>>> {
        self.handle.get()?;
        Ok(self.navigations.lock().get(&id).cloned())
    }

    pub fn navigation_count(&self) -> Result<usize> {
        self.handle.get()?;
        Ok(self.navigations.lock().len())
    }

    /// The live page for a native page handle, if one has committed.
    pub fn page(&self, handle: NativeHandle) -> Result<Option<Arc<Page>>> {
        self.handle.get()?;
        Ok(self.pages.lock().get(&handle).cloned())
    }

    pub fn page_count(&self) -> Result<usize> {
        self.handle.get()?;
        Ok(self.pages.lock().len())
    }

    fn is_live(&self) -> bool {
        self.handle.is_alive()
    }

    fn lookup(&self, id: i64, event: &'static str) -> Option<Arc<Navigation>> {
        if !self.is_live() {
            tracing::debug!(navigation_id = id, event, "event for destroyed controller dropped");
            return None;
        }
        let navigation = self.navigations.lock().get(&id).cloned();
        if navigation.is_none() {
            tracing::debug!(navigation_id = id, event, "event for unknown navigation dropped");
        }
        navigation
    }

    /// Same native page, same managed object. Also returns whether the page
    /// was new, so a rejected commit can take it back out.
    fn page_for(&self, handle: NativeHandle, url: &Url) -> (Arc<Page>, bool) {
        let mut pages = self.pages.lock();
        if let Some(page) = pages.get(&handle) {
            return (Arc::clone(page), false);
        }
        let page = Arc::new(Page::new(handle, url.clone()));
        pages.insert(handle, Arc::clone(&page));
        (page, true)
    }

    fn forget_page(&self, handle: NativeHandle) {
        self.pages.lock().remove(&handle);
    }

    pub fn on_native_navigation_started(
        &self,
        id: i64,
        handle: NativeHandle,
        url: &str,
        has_user_gesture: bool,
        is_same_document: bool,
    ) -> Result<Option<Arc<Navigation>>> {
        if !self.is_live() {
            return Ok(None);
        }
        let url = parse_url(url)?;
        let navigation = Arc::new(Navigation::new(
            Arc::clone(&self.engine),
            id,
            handle,
            url,
            has_user_gesture,
            is_same_document,
        ));

        {
            let mut navigations = self.navigations.lock();
            if navigations.contains_key(&id) {
                return Err(LifecycleError::InvalidState(format!(
                    "navigation {} started twice",
                    id
                ))
                .into());
            }
            navigations.insert(id, Arc::clone(&navigation));
        }

        if has_user_gesture {
            *self.last_user_gesture.lock() = Some(Utc::now());
        }

        let handler = self.intent_handler.lock().clone();
        if let Some(handler) = handler {
            let decision = handler.on_navigation_started(&navigation);
            if decision != InterceptDecision::NoDecision {
                if let Err(err) = navigation.record_intercept_decision(decision) {
                    tracing::warn!(
                        navigation_id = id,
                        error = %err,
                        "intercept decision not recorded"
                    );
                }
            }
        }

        let notified = Arc::clone(&navigation);
        self.client
            .notify("navigation_started", move |c| c.navigation_started(notified));
        Ok(Some(navigation))
    }

    pub fn on_native_navigation_redirected(&self, id: i64, url: &str) -> Result<()> {
        let Some(navigation) = self.lookup(id, "redirected") else {
            return Ok(());
        };
        navigation.redirect(parse_url(url)?)?;
        self.client
            .notify("navigation_redirected", move |c| c.navigation_redirected(navigation));
        Ok(())
    }

    pub fn on_native_ready_to_commit(&self, id: i64) -> Result<()> {
        let Some(navigation) = self.lookup(id, "ready_to_commit") else {
            return Ok(());
        };
        navigation.ready_to_commit()?;
        self.client.notify("ready_to_commit_navigation", move |c| {
            c.ready_to_commit_navigation(navigation)
        });
        Ok(())
    }

    pub fn on_native_navigation_completed(
        &self,
        id: i64,
        page: NativeHandle,
        http_status_code: Option<i32>,
    ) -> Result<()> {
        let Some(navigation) = self.lookup(id, "completed") else {
            return Ok(());
        };
        let (committed, created) = self.page_for(page, &navigation.url()?);
        if let Err(err) = navigation.complete(committed, http_status_code) {
            if created {
                self.forget_page(page);
            }
            return Err(err);
        }
        self.client
            .notify("navigation_completed", move |c| c.navigation_completed(navigation));
        Ok(())
    }

    pub fn on_native_navigation_failed(
        &self,
        id: i64,
        error_code: i32,
        http_status_code: Option<i32>,
        error_page: Option<NativeHandle>,
    ) -> Result<()> {
        let Some(navigation) = self.lookup(id, "failed") else {
            return Ok(());
        };
        let failure = NavigationFailure::from_native(error_code)?;
        let (page, created) = match error_page {
            Some(handle) => {
                let (page, created) = self.page_for(handle, &navigation.url()?);
                (Some(page), created.then_some(handle))
            }
            None => (None, None),
        };
        if let Err(err) = navigation.fail(failure, http_status_code, page) {
            if let Some(handle) = created {
                self.forget_page(handle);
            }
            return Err(err);
        }

        let failure = failure.for_client(&self.version)?;
        self.client.notify("navigation_failed", move |c| {
            c.navigation_failed(navigation, failure)
        });
        Ok(())
    }

    /// The engine retired a navigation object.
    pub fn on_native_navigation_destroyed(&self, id: i64) {
        let removed = self.navigations.lock().remove(&id);
        if let Some(navigation) = removed {
            navigation.on_engine_destroyed();
            tracing::debug!(navigation_id = navigation.raw_id(), "navigation destroyed");
        }
    }

    /// The engine retired a page. A connected client is told while the page
    /// is still readable; a shell client never hears of it, since a queued
    /// notice would only be delivered after the page is gone.
    pub fn on_native_page_destroyed(&self, handle: NativeHandle) {
        if !self.is_live() {
            return;
        }
        let Some(page) = self.pages.lock().remove(&handle) else {
            tracing::debug!(page = %handle, "destroy for unknown page dropped");
            return;
        };

        if self.client.is_connected()
            && self
                .version
                .supports(ClientFeature::PageDestroyedNotification)
                .unwrap_or(false)
        {
            let notified = Arc::clone(&page);
            self.client
                .notify("on_page_destroyed", move |c| c.on_page_destroyed(notified));
        }
        page.on_engine_destroyed();
    }

    /// Deletes the native controller. The engine takes its navigations and
    /// pages with it.
    pub fn destroy(&self) -> Result<()> {
        let Some(handle) = self.handle.begin_destroy()? else {
            return Ok(());
        };

        let navigations: Vec<_> = self.navigations.lock().drain().map(|(_, n)| n).collect();
        for navigation in navigations {
            navigation.on_engine_destroyed();
        }
        let pages: Vec<_> = self.pages.lock().drain().map(|(_, p)| p).collect();
        for page in pages {
            page.on_engine_destroyed();
        }
        *self.intent_handler.lock() = None;

        self.engine.delete(NativeKind::NavigationController, handle);
        self.handle.finish_destroy();
        self.client.detach();
        tracing::debug!(handle = %handle, "navigation controller destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
