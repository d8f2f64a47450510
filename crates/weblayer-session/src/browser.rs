//! Browsers
//!
//! A browser shares its profile (counted, not owned) and owns an ordered set
//! of tabs, at most one of them active. Destroying a browser destroys its
//! tabs first.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use url::Origin;

use weblayer_common::{ClientSlot, DestroyDiscipline, HandleCell, LifecycleError, RemoteResult};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

use crate::context::SessionContext;
use crate::error::{parse_url, SessionError};
use crate::profile::Profile;
use crate::tab::Tab;
use crate::Result;

pub trait BrowserClient: Send + Sync {
    fn on_tab_added(&self, tab_id: i32) -> RemoteResult;
    fn on_tab_removed(&self, tab_id: i32) -> RemoteResult;
    fn on_active_tab_changed(&self, tab_id: Option<i32>) -> RemoteResult;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserOptions {
    /// Key under which the engine saves and restores this browser's tabs.
    pub persistence_id: Option<String>,
    /// Origins the browser may load. `None` allows every origin.
    pub allowed_origins: Option<Vec<String>>,
}

pub struct Browser {
    handle: HandleCell,
    ctx: Arc<SessionContext>,
    me: Weak<Browser>,
    profile: Arc<Profile>,
    persistence_id: Option<String>,
    allowed_origins: Option<Vec<Origin>>,
    tabs: Mutex<Vec<Arc<Tab>>>,
    active_tab: Mutex<Option<i32>>,
    client: ClientSlot<dyn BrowserClient>,
}

impl Browser {
    pub fn create(profile: &Arc<Profile>, options: BrowserOptions) -> Result<Arc<Self>> {
        let profile_handle = profile.handle()?;
        if options.persistence_id.as_deref() == Some("") {
            return Err(LifecycleError::InvalidArgument(
                "persistence id must not be empty".to_string(),
            )
            .into());
        }
        let allowed_origins = options
            .allowed_origins
            .map(|origins| {
                origins
                    .iter()
                    .map(|raw| parse_url(raw).map(|url| url.origin()))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let ctx = Arc::clone(profile.context());
        let handle = ctx.engine().create(NativeKind::Browser, Some(profile_handle));
        let browser = Arc::new_cyclic(|me| Self {
            handle: HandleCell::new(NativeKind::Browser.as_str(), handle, DestroyDiscipline::Once),
            ctx: Arc::clone(&ctx),
            me: me.clone(),
            profile: Arc::clone(profile),
            persistence_id: options.persistence_id,
            allowed_origins,
            tabs: Mutex::new(Vec::new()),
            active_tab: Mutex::new(None),
            client: ClientSlot::shell(NativeKind::Browser.as_str()),
        });

        profile.add_browser_ref();
        if let Err(err) = ctx.browsers.insert(handle, Arc::clone(&browser)) {
            profile.release_browser_ref();
            ctx.engine().delete(NativeKind::Browser, handle);
            browser.handle.finish_destroy();
            return Err(err.into());
        }
        tracing::info!(
            handle = %handle,
            profile = %profile.key().name,
            persistence_id = ?browser.persistence_id,
            "browser created"
        );
        Ok(browser)
    }

    fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.ctx.engine()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    pub fn profile(&self) -> Result<Arc<Profile>> {
        self.handle.get()?;
        Ok(Arc::clone(&self.profile))
    }

    pub(crate) fn uses_profile(&self, profile: &Profile) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.profile), profile)
    }

    pub fn persistence_id(&self) -> Result<Option<String>> {
        self.handle.get()?;
        Ok(self.persistence_id.clone())
    }

    pub fn allowed_origins(&self) -> Result<Option<Vec<String>>> {
        self.handle.get()?;
        Ok(self
            .allowed_origins
            .as_ref()
            .map(|origins| origins.iter().map(|o| o.ascii_serialization()).collect()))
    }

    pub fn is_origin_allowed(&self, url: &str) -> Result<bool> {
        self.handle.get()?;
        let origin = parse_url(url)?.origin();
        Ok(match &self.allowed_origins {
            None => true,
            Some(allowed) => allowed.contains(&origin),
        })
    }

    pub fn set_client(&self, client: Arc<dyn BrowserClient>) -> Result<()> {
        self.handle.get()?;
        Ok(self.client.set_client(client)?)
    }

    pub fn tabs(&self) -> Result<Vec<Arc<Tab>>> {
        self.handle.get()?;
        Ok(self.tabs.lock().clone())
    }

    pub fn active_tab(&self) -> Result<Option<Arc<Tab>>> {
        self.handle.get()?;
        let Some(id) = *self.active_tab.lock() else {
            return Ok(None);
        };
        Ok(self.tabs.lock().iter().find(|t| t.raw_id() == id).cloned())
    }

    fn contains(&self, tab: &Tab) -> bool {
        self.tabs.lock().iter().any(|t| t.raw_id() == tab.raw_id())
    }

    pub fn create_tab(&self) -> Result<Arc<Tab>> {
        let handle = self.handle.get()?;
        let profile_handle = self.profile.handle()?;
        let id = self.ctx.tab_ids.next()?;
        let tab_handle = self.engine().create(NativeKind::Tab, Some(profile_handle));
        let tab = Tab::register(&self.ctx, id, self.me.clone(), tab_handle)?;
        self.attach(handle, &tab)?;
        Ok(tab)
    }

    /// Moves `tab` here from whichever browser holds it. Both browsers must
    /// share a profile.
    pub fn add_tab(&self, tab: &Arc<Tab>) -> Result<()> {
        let handle = self.handle.get()?;
        tab.handle()?;
        let current = tab.browser()?;
        if std::ptr::eq(Arc::as_ptr(&current), self) {
            return Ok(());
        }
        if !Arc::ptr_eq(&current.profile, &self.profile) {
            return Err(LifecycleError::InvalidArgument(
                "tabs can only move between browsers of the same profile".to_string(),
            )
            .into());
        }

        current.detach(tab)?;
        self.attach(handle, tab)
    }

    fn attach(&self, handle: NativeHandle, tab: &Arc<Tab>) -> Result<()> {
        self.engine().browser_add_tab(handle, tab.handle()?);
        self.tabs.lock().push(Arc::clone(tab));
        tab.set_browser(self.me.clone());

        let id = tab.raw_id();
        tracing::debug!(tab_id = id, browser = %handle, "tab attached");
        self.client.notify("on_tab_added", move |c| c.on_tab_added(id));
        Ok(())
    }

    fn detach(&self, tab: &Tab) -> Result<()> {
        let handle = self.handle.get()?;
        let id = tab.raw_id();
        {
            let mut tabs = self.tabs.lock();
            let Some(index) = tabs.iter().position(|t| t.raw_id() == id) else {
                return Err(SessionError::NotInBrowser(id));
            };
            tabs.remove(index);
        }
        self.engine().browser_remove_tab(handle, tab.handle()?);

        let was_active = {
            let mut active = self.active_tab.lock();
            let was_active = *active == Some(id);
            if was_active {
                *active = None;
            }
            was_active
        };
        if was_active {
            self.engine().browser_set_active_tab(handle, None);
            self.client
                .notify("on_active_tab_changed", |c| c.on_active_tab_changed(None));
        }
        self.client.notify("on_tab_removed", move |c| c.on_tab_removed(id));
        Ok(())
    }

    pub fn destroy_tab(&self, tab: &Arc<Tab>) -> Result<()> {
        self.detach(tab)?;
        tab.destroy()
    }

    /// `None` clears the active tab.
    pub fn set_active_tab(&self, tab: Option<&Arc<Tab>>) -> Result<()> {
        let handle = self.handle.get()?;
        let (id, tab_handle) = match tab {
            Some(tab) => {
                if !self.contains(tab) {
                    return Err(SessionError::NotInBrowser(tab.raw_id()));
                }
                (Some(tab.raw_id()), Some(tab.handle()?))
            }
            None => (None, None),
        };

        let changed = {
            let mut active = self.active_tab.lock();
            let changed = *active != id;
            *active = id;
            changed
        };
        self.engine().browser_set_active_tab(handle, tab_handle);
        if changed {
            self.client
                .notify("on_active_tab_changed", move |c| c.on_active_tab_changed(id));
        }
        Ok(())
    }

    /// The engine made a tab on its own (a popup, a restored tab). It gets a
    /// shell client; notifications wait for the embedder to wire one.
    pub fn on_native_tab_created(&self, tab_handle: NativeHandle) -> Result<Arc<Tab>> {
        let handle = self.handle.get()?;
        let id = self.ctx.tab_ids.next()?;
        let tab = Tab::register(&self.ctx, id, self.me.clone(), tab_handle)?;
        self.tabs.lock().push(Arc::clone(&tab));
        tracing::debug!(tab_id = id, browser = %handle, "engine created tab");
        self.client.notify("on_tab_added", move |c| c.on_tab_added(id));
        Ok(tab)
    }

    /// Destroys every tab, releases the profile, tells browser list
    /// observers, then deletes the native browser.
    pub fn destroy(&self) -> Result<()> {
        let Some(handle) = self.handle.begin_destroy()? else {
            return Ok(());
        };

        let tabs = std::mem::take(&mut *self.tabs.lock());
        *self.active_tab.lock() = None;
        for tab in tabs {
            if let Ok(tab_handle) = tab.handle() {
                self.engine().browser_remove_tab(handle, tab_handle);
            }
            if let Err(err) = tab.destroy() {
                tracing::error!(tab_id = tab.raw_id(), error = %err, "tab destroy failed");
            }
        }

        self.profile.release_browser_ref();
        self.ctx.browsers.remove(&handle);
        self.engine().delete(NativeKind::Browser, handle);
        self.handle.finish_destroy();
        self.client.detach();
        tracing::info!(handle = %handle, "browser destroyed");
        Ok(())
    }
}
