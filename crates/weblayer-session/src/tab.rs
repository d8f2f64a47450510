//! Tabs
//!
//! Every tab has a process-unique id, registered in the session context
//! for its whole life. Its navigation controller is created once, on first
//! use, and lives as long as the tab. Feature callback proxies exist only
//! while the embedder has a client for them.

use parking_lot::Mutex;
use std::sync::{Arc, OnceLock, Weak};
use url::Url;

use weblayer_callbacks::{
    ErrorPageCallbackProxy, ErrorPageClient, ExternalIntentInIncognitoCallbackProxy,
    ExternalIntentInIncognitoClient, FaviconCallbackProxy, FaviconClient, FullscreenCallbackProxy,
    FullscreenClient, GoogleAccountsCallbackProxy, GoogleAccountsClient, MediaStreamCaptureProxy,
    MediaStreamClient, NewTabCallbackProxy, NewTabClient, NewTabType,
};
use weblayer_common::{ClientSlot, DestroyDiscipline, HandleCell, LifecycleError, RemoteResult};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};
use weblayer_navigation::NavigationController;

use crate::browser::Browser;
use crate::context::SessionContext;
use crate::error::parse_url;
use crate::proxy_slot::{self, ProxySlot};
use crate::Result;

pub trait TabClient: Send + Sync {
    fn on_title_updated(&self, title: String) -> RemoteResult;
    fn on_visible_url_changed(&self, url: Url) -> RemoteResult;
    fn on_render_process_gone(&self) -> RemoteResult;
}

#[derive(Default)]
struct FeatureProxies {
    favicon: ProxySlot<FaviconCallbackProxy>,
    fullscreen: ProxySlot<FullscreenCallbackProxy>,
    error_page: ProxySlot<ErrorPageCallbackProxy>,
    new_tab: ProxySlot<NewTabCallbackProxy>,
    google_accounts: ProxySlot<GoogleAccountsCallbackProxy>,
    external_intent: ProxySlot<ExternalIntentInIncognitoCallbackProxy>,
    media_stream: ProxySlot<MediaStreamCaptureProxy>,
}

impl FeatureProxies {
    fn destroy_all(&self) {
        proxy_slot::clear(&self.favicon, FaviconCallbackProxy::destroy);
        proxy_slot::clear(&self.fullscreen, FullscreenCallbackProxy::destroy);
        proxy_slot::clear(&self.error_page, ErrorPageCallbackProxy::destroy);
        proxy_slot::clear(&self.new_tab, NewTabCallbackProxy::destroy);
        proxy_slot::clear(&self.google_accounts, GoogleAccountsCallbackProxy::destroy);
        proxy_slot::clear(
            &self.external_intent,
            ExternalIntentInIncognitoCallbackProxy::destroy,
        );
        proxy_slot::clear(&self.media_stream, MediaStreamCaptureProxy::destroy);
    }
}

pub struct Tab {
    id: i32,
    handle: HandleCell,
    ctx: Arc<SessionContext>,
    browser: Mutex<Weak<Browser>>,
    controller: OnceLock<Arc<NavigationController>>,
    client: ClientSlot<dyn TabClient>,
    title: Mutex<String>,
    visible_url: Mutex<Option<Url>>,
    proxies: FeatureProxies,
}

impl Tab {
    /// Wraps a freshly created native tab and registers it under `id`. The
    /// native tab is deleted again if registration fails.
    pub(crate) fn register(
        ctx: &Arc<SessionContext>,
        id: i32,
        browser: Weak<Browser>,
        handle: NativeHandle,
    ) -> Result<Arc<Self>> {
        let tab = Arc::new(Self {
            id,
            handle: HandleCell::new(NativeKind::Tab.as_str(), handle, DestroyDiscipline::Once),
            ctx: Arc::clone(ctx),
            browser: Mutex::new(browser),
            controller: OnceLock::new(),
            client: ClientSlot::shell(NativeKind::Tab.as_str()),
            title: Mutex::new(String::new()),
            visible_url: Mutex::new(None),
            proxies: FeatureProxies::default(),
        });

        if let Err(err) = ctx.tabs.insert(id, Arc::clone(&tab)) {
            ctx.engine().delete(NativeKind::Tab, handle);
            tab.handle.finish_destroy();
            return Err(err.into());
        }
        tracing::info!(tab_id = id, handle = %handle, "tab created");
        Ok(tab)
    }

    fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.ctx.engine()
    }

    pub(crate) fn raw_id(&self) -> i32 {
        self.id
    }

    pub fn id(&self) -> Result<i32> {
        self.handle.get()?;
        Ok(self.id)
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    pub fn browser(&self) -> Result<Arc<Browser>> {
        self.handle.get()?;
        self.browser.lock().upgrade().ok_or_else(|| {
            LifecycleError::InvalidState(format!("tab {} has no browser", self.id)).into()
        })
    }

    pub(crate) fn set_browser(&self, browser: Weak<Browser>) {
        *self.browser.lock() = browser;
    }

    pub fn set_client(&self, client: Arc<dyn TabClient>) -> Result<()> {
        self.handle.get()?;
        Ok(self.client.set_client(client)?)
    }

    pub fn title(&self) -> Result<String> {
        self.handle.get()?;
        Ok(self.title.lock().clone())
    }

    pub fn visible_url(&self) -> Result<Option<Url>> {
        self.handle.get()?;
        Ok(self.visible_url.lock().clone())
    }

    /// The tab's navigation controller. The same object for the whole life
    /// of the tab.
    pub fn navigation_controller(&self) -> Result<Arc<NavigationController>> {
        let handle = self.handle.get()?;
        let controller = self.controller.get_or_init(|| {
            Arc::new(NavigationController::new(
                Arc::clone(self.engine()),
                Arc::clone(self.ctx.version()),
                handle,
            ))
        });
        Ok(Arc::clone(controller))
    }

    pub fn set_favicon_client(&self, client: Option<Arc<dyn FaviconClient>>) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.favicon,
            client,
            |c| FaviconCallbackProxy::new(Arc::clone(self.engine()), handle, c),
            FaviconCallbackProxy::set_client,
            FaviconCallbackProxy::destroy,
        )
    }

    pub fn set_fullscreen_client(&self, client: Option<Arc<dyn FullscreenClient>>) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.fullscreen,
            client,
            |c| FullscreenCallbackProxy::new(Arc::clone(self.engine()), handle, c),
            FullscreenCallbackProxy::set_client,
            FullscreenCallbackProxy::destroy,
        )
    }

    pub fn set_error_page_client(&self, client: Option<Arc<dyn ErrorPageClient>>) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.error_page,
            client,
            |c| {
                ErrorPageCallbackProxy::new(
                    Arc::clone(self.engine()),
                    Arc::clone(self.ctx.version()),
                    handle,
                    c,
                )
            },
            ErrorPageCallbackProxy::set_client,
            ErrorPageCallbackProxy::destroy,
        )
    }

    pub fn set_new_tab_client(&self, client: Option<Arc<dyn NewTabClient>>) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.new_tab,
            client,
            |c| {
                NewTabCallbackProxy::new(
                    Arc::clone(self.engine()),
                    Arc::clone(self.ctx.version()),
                    handle,
                    c,
                )
            },
            NewTabCallbackProxy::set_client,
            NewTabCallbackProxy::destroy,
        )
    }

    pub fn set_google_accounts_client(
        &self,
        client: Option<Arc<dyn GoogleAccountsClient>>,
    ) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.google_accounts,
            client,
            |c| GoogleAccountsCallbackProxy::new(Arc::clone(self.engine()), handle, c),
            GoogleAccountsCallbackProxy::set_client,
            GoogleAccountsCallbackProxy::destroy,
        )
    }

    pub fn set_external_intent_in_incognito_client(
        &self,
        client: Option<Arc<dyn ExternalIntentInIncognitoClient>>,
    ) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.external_intent,
            client,
            |c| {
                ExternalIntentInIncognitoCallbackProxy::new(
                    Arc::clone(self.engine()),
                    Arc::clone(self.ctx.version()),
                    handle,
                    c,
                )
            },
            ExternalIntentInIncognitoCallbackProxy::set_client,
            ExternalIntentInIncognitoCallbackProxy::destroy,
        )
    }

    pub fn set_media_stream_client(
        &self,
        client: Option<Arc<dyn MediaStreamClient>>,
    ) -> Result<()> {
        let handle = self.handle.get()?;
        proxy_slot::install(
            &self.proxies.media_stream,
            client,
            |c| {
                MediaStreamCaptureProxy::new(
                    Arc::clone(self.engine()),
                    Arc::clone(self.ctx.version()),
                    handle,
                    c,
                )
            },
            MediaStreamCaptureProxy::set_client,
            MediaStreamCaptureProxy::destroy,
        )
    }

    // Engine events for a feature go to its proxy, if the embedder set one.

    pub fn favicon_callback_proxy(&self) -> Result<Option<Arc<FaviconCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.favicon.lock().clone())
    }

    pub fn fullscreen_callback_proxy(&self) -> Result<Option<Arc<FullscreenCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.fullscreen.lock().clone())
    }

    pub fn error_page_callback_proxy(&self) -> Result<Option<Arc<ErrorPageCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.error_page.lock().clone())
    }

    pub fn new_tab_callback_proxy(&self) -> Result<Option<Arc<NewTabCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.new_tab.lock().clone())
    }

    pub fn google_accounts_callback_proxy(
        &self,
    ) -> Result<Option<Arc<GoogleAccountsCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.google_accounts.lock().clone())
    }

    pub fn external_intent_in_incognito_callback_proxy(
        &self,
    ) -> Result<Option<Arc<ExternalIntentInIncognitoCallbackProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.external_intent.lock().clone())
    }

    pub fn media_stream_capture_proxy(&self) -> Result<Option<Arc<MediaStreamCaptureProxy>>> {
        self.handle.get()?;
        Ok(self.proxies.media_stream.lock().clone())
    }

    pub fn on_native_title_updated(&self, title: &str) {
        if !self.handle.is_alive() {
            return;
        }
        *self.title.lock() = title.to_string();
        let title = title.to_string();
        self.client
            .notify("on_title_updated", move |c| c.on_title_updated(title));
    }

    pub fn on_native_visible_url_changed(&self, url: &str) -> Result<()> {
        if !self.handle.is_alive() {
            return Ok(());
        }
        let url = parse_url(url)?;
        *self.visible_url.lock() = Some(url.clone());
        self.client
            .notify("on_visible_url_changed", move |c| c.on_visible_url_changed(url));
        Ok(())
    }

    pub fn on_native_render_process_gone(&self) {
        if !self.handle.is_alive() {
            return;
        }
        tracing::warn!(tab_id = self.id, "renderer process gone");
        self.client
            .notify("on_render_process_gone", |c| c.on_render_process_gone());
    }

    /// Page content opened a tab. Without a new tab client nobody can show
    /// it, so it is closed again and `None` returned.
    pub fn on_native_new_tab(
        &self,
        new_tab: NativeHandle,
        tab_type: i32,
    ) -> Result<Option<Arc<Tab>>> {
        self.handle.get()?;
        let tab_type = NewTabType::from_native(tab_type)?;
        let browser = self.browser()?;
        let created = browser.on_native_tab_created(new_tab)?;

        let proxy = self.proxies.new_tab.lock().clone();
        match proxy {
            Some(proxy) => {
                proxy.on_new_tab(created.raw_id(), tab_type)?;
                Ok(Some(created))
            }
            None => {
                tracing::debug!(tab_id = self.id, "no new tab client; closing opened tab");
                browser.destroy_tab(&created)?;
                Ok(None)
            }
        }
    }

    /// Called by the owning browser once the tab is detached.
    pub(crate) fn destroy(&self) -> Result<()> {
        let Some(handle) = self.handle.begin_destroy()? else {
            return Ok(());
        };

        self.proxies.destroy_all();
        if let Some(controller) = self.controller.get() {
            if let Err(err) = controller.destroy() {
                tracing::error!(
                    tab_id = self.id,
                    error = %err,
                    "navigation controller destroy failed"
                );
            }
        }

        self.ctx.tabs.remove(&self.id);
        self.engine().delete(NativeKind::Tab, handle);
        self.handle.finish_destroy();
        self.client.detach();
        *self.browser.lock() = Weak::new();
        tracing::info!(tab_id = self.id, handle = %handle, "tab destroyed");
        Ok(())
    }
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("destroyed", &self.handle.is_destroyed())
            .finish()
    }
}
