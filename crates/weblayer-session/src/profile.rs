//! Profiles
//!
//! A profile is shared by every browser created from it and counts them. It
//! can only be destroyed once no browser references it. The "soon" variant
//! of data deletion watches the browser list until the last browser is gone,
//! then finishes on a fresh UI task.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use weblayer_callbacks::{AccessTokenClient, AccessTokenFetcherProxy};
use weblayer_common::{
    AsyncFailure, AsyncResult, DestroyDiscipline, HandleCell, LifecycleError, ObserverId,
    RegistryObserver,
};
use weblayer_download::{DownloadCallbackProxy, DownloadClient};
use weblayer_native::codes::browsing_data;
use weblayer_native::{NativeHandle, NativeKind};

use crate::browser::Browser;
use crate::context::SessionContext;
use crate::cookie_manager::CookieManager;
use crate::error::SessionError;
use crate::prerender::PrerenderController;
use crate::proxy_slot::{self, ProxySlot};
use crate::Result;

const DELETE_DATA: &str = "destroy_and_delete_data_from_disk";

/// Identity of a profile in the [`crate::ProfileManager`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileKey {
    pub name: String,
    pub is_incognito: bool,
}

impl ProfileKey {
    /// The empty name is the default incognito profile whatever the flag
    /// says. Other names must be ASCII word characters unless incognito,
    /// since only persistent profiles name a directory on disk.
    pub fn new(name: &str, is_incognito: bool) -> Result<Self> {
        if name.is_empty() {
            return Ok(Self {
                name: String::new(),
                is_incognito: true,
            });
        }
        if !is_incognito && !is_word(name) {
            return Err(SessionError::InvalidProfileName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            is_incognito,
        })
    }
}

fn is_word(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowsingDataType {
    CookiesAndSiteData,
    Cache,
    SiteSettings,
}

impl BrowsingDataType {
    pub fn to_native(self) -> i32 {
        match self {
            BrowsingDataType::CookiesAndSiteData => browsing_data::COOKIES_AND_SITE_DATA,
            BrowsingDataType::Cache => browsing_data::CACHE,
            BrowsingDataType::SiteSettings => browsing_data::SITE_SETTINGS,
        }
    }
}

type DestroyCallback = Box<dyn FnOnce(AsyncResult<()>) + Send>;

struct PendingDestroy {
    observer: ObserverId,
    callback: DestroyCallback,
}

/// Finishes a deferred data deletion once the profile's last browser has
/// been removed from the browser list.
struct DeferredDestroy {
    profile: Weak<Profile>,
}

impl RegistryObserver<Browser> for DeferredDestroy {
    fn on_removed(&self, browser: &Arc<Browser>) {
        if let Some(profile) = self.profile.upgrade() {
            if browser.uses_profile(&profile) {
                profile.on_browser_removed();
            }
        }
    }
}

pub struct Profile {
    key: ProfileKey,
    handle: HandleCell,
    ctx: Arc<SessionContext>,
    me: Weak<Profile>,
    browsers: AtomicUsize,
    cookie_manager: OnceLock<Arc<CookieManager>>,
    prerender_controller: OnceLock<Arc<PrerenderController>>,
    download_proxy: ProxySlot<DownloadCallbackProxy>,
    access_token_proxy: ProxySlot<AccessTokenFetcherProxy>,
    pending_destroy: Mutex<Option<PendingDestroy>>,
}

impl Profile {
    pub(crate) fn new(ctx: Arc<SessionContext>, key: ProfileKey) -> Arc<Self> {
        let handle = ctx.engine().create(NativeKind::Profile, None);
        tracing::info!(
            profile = %key.name,
            incognito = key.is_incognito,
            handle = %handle,
            "profile created"
        );

        Arc::new_cyclic(|me| Self {
            key,
            handle: HandleCell::new(NativeKind::Profile.as_str(), handle, DestroyDiscipline::Once),
            ctx,
            me: me.clone(),
            browsers: AtomicUsize::new(0),
            cookie_manager: OnceLock::new(),
            prerender_controller: OnceLock::new(),
            download_proxy: Mutex::new(None),
            access_token_proxy: Mutex::new(None),
            pending_destroy: Mutex::new(None),
        })
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn name(&self) -> Result<String> {
        self.handle.get()?;
        Ok(self.key.name.clone())
    }

    pub fn is_incognito(&self) -> Result<bool> {
        self.handle.get()?;
        Ok(self.key.is_incognito)
    }

    pub(crate) fn key(&self) -> &ProfileKey {
        &self.key
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    pub(crate) fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Number of live browsers using this profile.
    pub fn browser_count(&self) -> Result<usize> {
        self.handle.get()?;
        Ok(self.live_browsers())
    }

    pub(crate) fn live_browsers(&self) -> usize {
        self.browsers.load(Ordering::SeqCst)
    }

    pub(crate) fn add_browser_ref(&self) {
        self.browsers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release_browser_ref(&self) {
        let released = self
            .browsers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if released.is_err() {
            tracing::error!(profile = %self.key.name, "browser reference released twice");
        }
    }

    pub fn is_destroy_pending(&self) -> Result<bool> {
        self.handle.get()?;
        Ok(self.destroy_pending())
    }

    fn destroy_pending(&self) -> bool {
        self.pending_destroy.lock().is_some()
    }

    pub fn cookie_manager(&self) -> Result<Arc<CookieManager>> {
        let handle = self.handle.get()?;
        let manager = self.cookie_manager.get_or_init(|| {
            Arc::new(CookieManager::new(
                Arc::clone(self.ctx.engine()),
                Arc::clone(self.ctx.version()),
                handle,
            ))
        });
        Ok(Arc::clone(manager))
    }

    pub fn prerender_controller(&self) -> Result<Arc<PrerenderController>> {
        let handle = self.handle.get()?;
        let controller = self.prerender_controller.get_or_init(|| {
            Arc::new(PrerenderController::new(Arc::clone(self.ctx.engine()), handle))
        });
        Ok(Arc::clone(controller))
    }

    /// Installs, replaces or (with `None`) removes the download client.
    pub fn set_download_client(&self, client: Option<Arc<dyn DownloadClient>>) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.download_proxy,
            client,
            |client| {
                DownloadCallbackProxy::new(
                    Arc::clone(self.ctx.engine()),
                    Arc::clone(self.ctx.downloads()),
                    handle,
                    &self.key.name,
                    client,
                )
            },
            DownloadCallbackProxy::set_client,
            DownloadCallbackProxy::destroy,
        )
    }

    /// The proxy engine download events for this profile go to.
    pub fn download_callback_proxy(&self) -> Result<Option<Arc<DownloadCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.download_proxy.lock().clone())
    }

    pub fn set_access_token_client(
        &self,
        client: Option<Arc<dyn AccessTokenClient>>,
    ) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.access_token_proxy,
            client,
            |client| {
                AccessTokenFetcherProxy::new(
                    Arc::clone(self.ctx.engine()),
                    Arc::clone(self.ctx.version()),
                    handle,
                    client,
                )
            },
            AccessTokenFetcherProxy::set_client,
            AccessTokenFetcherProxy::destroy,
        )
    }

    pub fn access_token_fetcher_proxy(&self) -> Result<Option<Arc<AccessTokenFetcherProxy>>> {
        self.handle.get()?;
        Ok(self.access_token_proxy.lock().clone())
    }

    /// Whether the reply of a background operation still has a profile to
    /// report to.
    fn still_alive(profile: &Weak<Profile>) -> bool {
        profile.upgrade().is_some_and(|p| p.handle.is_alive())
    }

    /// Enumerates the persistence ids of browsers saved for this profile.
    /// Dropped if the profile is destroyed before the answer arrives.
    pub fn browser_persistence_ids(
        &self,
        callback: impl FnOnce(Vec<String>) + Send + 'static,
    ) -> Result<()> {
        self.handle.get()?;
        let engine = Arc::clone(self.ctx.engine());
        let key = self.key.clone();
        let profile = self.me.clone();

        self.ctx.tasks().post_blocking(
            move || engine.browser_persistence_ids(&key.name, key.is_incognito),
            move |ids| {
                if !Self::still_alive(&profile) {
                    tracing::debug!("profile destroyed before persistence ids arrived");
                    return;
                }
                callback(ids);
            },
        );
        Ok(())
    }

    pub fn remove_browser_persistence_storage(
        &self,
        ids: Vec<String>,
        callback: impl FnOnce(AsyncResult<()>) + Send + 'static,
    ) -> Result<()> {
        self.handle.get()?;
        if ids.is_empty() || ids.iter().any(|id| id.is_empty()) {
            return Err(LifecycleError::InvalidArgument(
                "persistence ids must be non-empty".to_string(),
            )
            .into());
        }
        let engine = Arc::clone(self.ctx.engine());
        let key = self.key.clone();
        let profile = self.me.clone();

        self.ctx.tasks().post_blocking(
            move || engine.remove_browser_persistence_storage(&key.name, key.is_incognito, &ids),
            move |removed| {
                if !Self::still_alive(&profile) {
                    return;
                }
                callback(if removed {
                    Ok(())
                } else {
                    Err(AsyncFailure::new(
                        "remove_browser_persistence_storage",
                        "engine could not remove persisted browsers",
                    ))
                });
            },
        );
        Ok(())
    }

    pub fn clear_browsing_data(
        &self,
        data_types: &[BrowsingDataType],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        callback: impl FnOnce(AsyncResult<()>) + Send + 'static,
    ) -> Result<()> {
        self.handle.get()?;
        if data_types.is_empty() {
            let err = LifecycleError::InvalidArgument("no data types to clear".to_string());
            return Err(err.into());
        }
        if from > to {
            return Err(LifecycleError::InvalidArgument(format!(
                "time range starts after it ends: {} > {}",
                from, to
            ))
            .into());
        }
        let types: Vec<i32> = data_types.iter().map(|t| t.to_native()).collect();
        let engine = Arc::clone(self.ctx.engine());
        let key = self.key.clone();
        let profile = self.me.clone();
        tracing::info!(profile = %key.name, types = ?data_types, "clearing browsing data");

        self.ctx.tasks().post_blocking(
            move || {
                engine.clear_browsing_data(
                    &key.name,
                    key.is_incognito,
                    &types,
                    from.timestamp_millis(),
                    to.timestamp_millis(),
                )
            },
            move |cleared| {
                if !Self::still_alive(&profile) {
                    return;
                }
                callback(if cleared {
                    Ok(())
                } else {
                    Err(AsyncFailure::new("clear_browsing_data", "engine reported failure"))
                });
            },
        );
        Ok(())
    }

    fn check_destroyable(&self) -> Result<()> {
        self.handle.get()?;
        let browsers = self.live_browsers();
        if browsers > 0 {
            return Err(LifecycleError::InvalidState(format!(
                "profile {:?} is still used by {} browser(s)",
                self.key.name, browsers
            ))
            .into());
        }
        if self.destroy_pending() {
            return Err(LifecycleError::InvalidState(
                "profile data deletion is already scheduled".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Children first, then the registry broadcast, then the native delete.
    fn teardown(&self) -> Result<()> {
        let Some(handle) = self.handle.begin_destroy()? else {
            return Ok(());
        };

        proxy_slot::clear(&self.download_proxy, DownloadCallbackProxy::destroy);
        proxy_slot::clear(&self.access_token_proxy, AccessTokenFetcherProxy::destroy);
        if let Some(cookies) = self.cookie_manager.get() {
            cookies.destroy();
        }
        if let Some(prerender) = self.prerender_controller.get() {
            prerender.destroy();
        }

        self.ctx.profiles.remove(&self.key);
        self.ctx.engine().delete(NativeKind::Profile, handle);
        self.handle.finish_destroy();
        tracing::info!(profile = %self.key.name, handle = %handle, "profile destroyed");
        Ok(())
    }

    /// Destroys the profile, keeping its data on disk.
    pub fn destroy(&self) -> Result<()> {
        self.check_destroyable()?;
        self.teardown()
    }

    /// Destroys the profile, then deletes its data on a worker. `callback`
    /// runs once, on the UI sequence, after the deletion finished.
    pub fn destroy_and_delete_data_from_disk(
        &self,
        callback: impl FnOnce(AsyncResult<()>) + Send + 'static,
    ) -> Result<()> {
        self.check_destroyable()?;
        self.delete_data_and_destroy(Box::new(callback))
    }

    fn delete_data_and_destroy(&self, callback: DestroyCallback) -> Result<()> {
        self.teardown()?;

        let engine = Arc::clone(self.ctx.engine());
        let db = self.ctx.downloads().database().clone();
        let key = self.key.clone();
        self.ctx.tasks().post_blocking(
            move || {
                if !engine.delete_profile_data(&key.name, key.is_incognito) {
                    return Err(AsyncFailure::new(
                        DELETE_DATA,
                        format!("engine could not delete data for profile {:?}", key.name),
                    ));
                }
                db.delete_downloads_for_profile(&key.name)
                    .map_err(|e| AsyncFailure::new(DELETE_DATA, e.to_string()))?;
                Ok(())
            },
            move |result: AsyncResult<()>| {
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "profile data deletion failed");
                }
                callback(result);
            },
        );
        Ok(())
    }

    /// Like [`Profile::destroy_and_delete_data_from_disk`], but waits for
    /// the browsers still using the profile to be destroyed first.
    pub fn destroy_and_delete_data_from_disk_soon(
        &self,
        callback: impl FnOnce(AsyncResult<()>) + Send + 'static,
    ) -> Result<()> {
        self.handle.get()?;
        if self.destroy_pending() {
            return Err(LifecycleError::InvalidState(
                "profile data deletion is already scheduled".to_string(),
            )
            .into());
        }
        if self.live_browsers() == 0 {
            return self.destroy_and_delete_data_from_disk(callback);
        }
        self.defer_destroy(Box::new(callback));
        Ok(())
    }

    fn defer_destroy(&self, callback: DestroyCallback) {
        let observer = self.ctx.browsers.add_observer(Arc::new(DeferredDestroy {
            profile: self.me.clone(),
        }));
        *self.pending_destroy.lock() = Some(PendingDestroy { observer, callback });
        tracing::info!(
            profile = %self.key.name,
            browsers = self.live_browsers(),
            "profile destroy deferred until its browsers are gone"
        );
    }

    fn on_browser_removed(&self) {
        if self.live_browsers() > 0 {
            return;
        }
        let Some(pending) = self.pending_destroy.lock().take() else {
            return;
        };
        self.ctx.browsers.remove_observer(pending.observer);

        // Finish outside the broadcast; the browser is still mid-destroy.
        let Some(profile) = self.me.upgrade() else {
            return;
        };
        self.ctx
            .tasks()
            .post(move || profile.finish_deferred_destroy(pending.callback));
    }

    fn finish_deferred_destroy(&self, callback: DestroyCallback) {
        if !self.handle.is_alive() {
            callback(Err(AsyncFailure::new(DELETE_DATA, "profile already destroyed")));
            return;
        }
        // A browser may have been created between the broadcast and now.
        if self.live_browsers() > 0 {
            self.defer_destroy(callback);
            return;
        }
        if let Err(err) = self.delete_data_and_destroy(callback) {
            tracing::error!(
                profile = %self.key.name,
                error = %err,
                "deferred profile destroy failed"
            );
        }
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.key.name)
            .field("is_incognito", &self.key.is_incognito)
            .field("browsers", &self.live_browsers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserOptions;
    use crate::testing::Fixture;
    use chrono::Duration;
    use std::sync::atomic::AtomicUsize;
    use weblayer_common::RemoteResult;
    use weblayer_download::{AllowDownloadResponder, Download, DownloadAction, IntentOutcome};
    use weblayer_native::NativeCall;
    use url::Url;

    struct NullDownloads;

    impl DownloadClient for NullDownloads {
        fn intercept_download(
            &self,
            _url: Url,
            _user_agent: String,
            _content_disposition: String,
            _mime_type: String,
            _content_length: i64,
        ) -> RemoteResult<bool> {
            Ok(false)
        }

        fn allow_download(
            &self,
            _url: Url,
            _request_method: String,
            _request_initiator: Option<String>,
            responder: AllowDownloadResponder,
        ) -> RemoteResult {
            responder.respond(true);
            Ok(())
        }

        fn download_started(&self, _download: Arc<Download>) -> RemoteResult {
            Ok(())
        }

        fn download_progress_changed(&self, _download: Arc<Download>) -> RemoteResult {
            Ok(())
        }

        fn download_completed(&self, _download: Arc<Download>) -> RemoteResult {
            Ok(())
        }

        fn download_failed(&self, _download: Arc<Download>) -> RemoteResult {
            Ok(())
        }
    }

    fn deleted(fx: &Fixture, name: &str) -> usize {
        fx.engine.count(|c| {
            matches!(c, NativeCall::DeleteProfileData { profile_name, .. } if profile_name == name)
        })
    }

    #[test]
    fn test_children_created_once_and_destroyed_with_profile() {
        let fx = Fixture::new();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();

        let cookies = profile.cookie_manager().unwrap();
        assert!(Arc::ptr_eq(&cookies, &profile.cookie_manager().unwrap()));
        profile.prerender_controller().unwrap();
        profile.set_download_client(Some(Arc::new(NullDownloads))).unwrap();
        profile.set_download_client(Some(Arc::new(NullDownloads))).unwrap();
        assert_eq!(fx.engine.create_count(NativeKind::DownloadCallbackProxy), 1);

        profile.destroy().unwrap();
        for kind in [
            NativeKind::CookieManager,
            NativeKind::PrerenderController,
            NativeKind::DownloadCallbackProxy,
            NativeKind::Profile,
        ] {
            assert_eq!(fx.engine.delete_count(kind), 1, "{}", kind);
        }
        assert_eq!(fx.engine.invalid_delete_count(), 0);
        assert!(fx.engine.live_handles().is_empty());
    }

    fn start_download(fx: &Fixture, profile: &Profile, path: &str) -> Arc<Download> {
        let proxy = profile.download_callback_proxy().unwrap().unwrap();
        proxy
            .on_native_download_started(
                fx.engine.mint(NativeKind::Download),
                &format!("https://example.com/{}", path),
                None,
                None,
                false,
            )
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_live_downloads_retired_with_their_proxy() {
        let fx = Fixture::new();
        let downloads = fx.ctx.downloads();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();

        profile.set_download_client(Some(Arc::new(NullDownloads))).unwrap();
        let first = start_download(&fx, &profile, "a.zip");
        let first_id = first.notification_id().unwrap();
        profile.set_download_client(None).unwrap();
        assert!(downloads.get(first_id).is_none());
        assert!(first.state().unwrap_err().is_use_after_destroy());

        profile.set_download_client(Some(Arc::new(NullDownloads))).unwrap();
        let second = start_download(&fx, &profile, "b.zip");
        let second_id = second.notification_id().unwrap();
        profile.destroy().unwrap();

        assert!(downloads.is_empty());
        for id in [first_id, second_id] {
            assert_eq!(
                downloads.route_intent(DownloadAction::Pause.as_str(), id).unwrap(),
                IntentOutcome::Ignored
            );
        }
        assert_eq!(fx.engine.count(|c| matches!(c, NativeCall::PauseDownload(_))), 0);
    }

    #[test]
    fn test_accessors_fail_after_destroy() {
        let fx = Fixture::new();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();
        profile.destroy().unwrap();

        assert!(profile.handle().unwrap_err().is_use_after_destroy());
        assert!(profile.cookie_manager().unwrap_err().is_use_after_destroy());
        assert!(profile.prerender_controller().unwrap_err().is_use_after_destroy());
        assert!(profile
            .set_access_token_client(None)
            .unwrap_err()
            .is_use_after_destroy());
        assert!(profile.browser_persistence_ids(|_| {}).unwrap_err().is_use_after_destroy());
        assert!(profile.name().unwrap_err().is_use_after_destroy());
        assert!(profile.is_incognito().unwrap_err().is_use_after_destroy());
        assert!(profile.browser_count().unwrap_err().is_use_after_destroy());
        assert!(profile.is_destroy_pending().unwrap_err().is_use_after_destroy());
        assert!(profile.destroy().unwrap_err().is_use_after_destroy());
        assert_eq!(fx.engine.delete_count(NativeKind::Profile), 1);
    }

    #[test]
    fn test_destroy_refused_while_browsers_remain() {
        let fx = Fixture::new();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();
        let browser = Browser::create(&profile, BrowserOptions::default()).unwrap();

        assert!(matches!(
            profile.destroy(),
            Err(SessionError::Lifecycle(LifecycleError::InvalidState(_)))
        ));
        browser.destroy().unwrap();
        profile.destroy().unwrap();
    }

    #[test]
    fn test_deferred_destroy_waits_for_last_browser() {
        let fx = Fixture::new();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();
        let first = Browser::create(&profile, BrowserOptions::default()).unwrap();
        let second = Browser::create(&profile, BrowserOptions::default()).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let data_deleted_first = Arc::new(Mutex::new(None));
        let (seen, order) = (calls.clone(), data_deleted_first.clone());
        let engine = fx.engine.clone();
        profile
            .destroy_and_delete_data_from_disk_soon(move |result| {
                result.unwrap();
                let deleted = engine.count(|c| matches!(c, NativeCall::DeleteProfileData { .. }));
                *order.lock() = Some(deleted == 1);
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(profile.is_destroy_pending().unwrap());
        assert!(profile
            .destroy_and_delete_data_from_disk_soon(|_| {})
            .is_err());

        first.destroy().unwrap();
        fx.ctx.tasks().run_until_idle();
        assert!(!profile.is_destroyed());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        second.destroy().unwrap();
        assert!(fx.run_until(|| calls.load(Ordering::SeqCst) > 0));
        fx.ctx.tasks().run_until_idle();

        assert!(profile.is_destroyed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*data_deleted_first.lock(), Some(true));
        assert_eq!(deleted(&fx, "work"), 1);
        assert_eq!(fx.ctx.browser_list().observer_count(), 0);
    }

    #[test]
    fn test_immediate_delete_reports_failure() {
        let fx = Fixture::new();
        fx.engine.fail_disk_work_for("broken");
        let profile = fx.profiles.get_or_create_profile("broken", false).unwrap();

        let result = Arc::new(Mutex::new(None));
        let slot = result.clone();
        profile
            .destroy_and_delete_data_from_disk(move |r| *slot.lock() = Some(r))
            .unwrap();
        assert!(profile.is_destroyed());
        assert!(fx.run_until(|| result.lock().is_some()));
        let failure = result.lock().take().unwrap().unwrap_err();
        assert_eq!(failure.operation, "destroy_and_delete_data_from_disk");
    }

    #[test]
    fn test_persistence_ids() {
        let fx = Fixture::new();
        fx.engine
            .set_persistence_ids("work", vec!["a".to_string(), "b".to_string()]);
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();

        let ids = Arc::new(Mutex::new(None));
        let slot = ids.clone();
        profile
            .browser_persistence_ids(move |found| *slot.lock() = Some(found))
            .unwrap();
        assert!(fx.run_until(|| ids.lock().is_some()));
        assert_eq!(ids.lock().clone().unwrap(), vec!["a", "b"]);

        assert!(profile
            .remove_browser_persistence_storage(Vec::new(), |_| {})
            .is_err());
        let removed = Arc::new(Mutex::new(None));
        let slot = removed.clone();
        profile
            .remove_browser_persistence_storage(vec!["a".to_string()], move |r| {
                *slot.lock() = Some(r)
            })
            .unwrap();
        assert!(fx.run_until(|| removed.lock().is_some()));
        assert!(removed.lock().clone().unwrap().is_ok());
    }

    #[test]
    fn test_reply_dropped_after_destroy() {
        let fx = Fixture::new();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();
        let called = Arc::new(AtomicUsize::new(0));
        let seen = called.clone();
        profile
            .browser_persistence_ids(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        profile.destroy().unwrap();

        fx.ctx
            .tasks()
            .run_until(std::time::Duration::from_millis(200), || false);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_browsing_data_validation() {
        let fx = Fixture::new();
        let profile = fx.profiles.get_or_create_profile("work", false).unwrap();
        let now = Utc::now();

        assert!(profile.clear_browsing_data(&[], now, now, |_| {}).is_err());
        assert!(profile
            .clear_browsing_data(&[BrowsingDataType::Cache], now, now - Duration::hours(1), |_| {})
            .is_err());

        let done = Arc::new(Mutex::new(None));
        let slot = done.clone();
        profile
            .clear_browsing_data(
                &[BrowsingDataType::Cache, BrowsingDataType::CookiesAndSiteData],
                now - Duration::hours(1),
                now,
                move |r| *slot.lock() = Some(r),
            )
            .unwrap();
        assert!(fx.run_until(|| done.lock().is_some()));
        let expected = vec![browsing_data::CACHE, browsing_data::COOKIES_AND_SITE_DATA];
        assert_eq!(
            fx.engine.count(|c| matches!(
                c,
                NativeCall::ClearBrowsingData { data_types, .. } if *data_types == expected
            )),
            1
        );
    }
}
