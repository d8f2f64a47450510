//! Per-profile cookie access and change listeners

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use weblayer_common::{
    ClientFeature, DestroyDiscipline, HandleCell, LifecycleError, RemoteResult, VersionGate,
};
use weblayer_native::codes::cookie_change_cause;
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

use crate::error::parse_url;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CookieChangeCause {
    Inserted,
    Explicit,
    UnknownDeletion,
    Overwrite,
    Expired,
    Evicted,
    ExpiredOverwrite,
}

impl CookieChangeCause {
    pub fn from_native(code: i32) -> std::result::Result<Self, LifecycleError> {
        match code {
            cookie_change_cause::INSERTED => Ok(CookieChangeCause::Inserted),
            cookie_change_cause::EXPLICIT => Ok(CookieChangeCause::Explicit),
            cookie_change_cause::UNKNOWN_DELETION => Ok(CookieChangeCause::UnknownDeletion),
            cookie_change_cause::OVERWRITE => Ok(CookieChangeCause::Overwrite),
            cookie_change_cause::EXPIRED => Ok(CookieChangeCause::Expired),
            cookie_change_cause::EVICTED => Ok(CookieChangeCause::Evicted),
            cookie_change_cause::EXPIRED_OVERWRITE => Ok(CookieChangeCause::ExpiredOverwrite),
            value => Err(LifecycleError::UnmappedValue {
                kind: "cookie change cause",
                value,
            }),
        }
    }

    /// Older clients have no `ExpiredOverwrite`; they are told `Overwrite`.
    pub fn for_client(self, version: &VersionGate) -> std::result::Result<Self, LifecycleError> {
        if self == CookieChangeCause::ExpiredOverwrite
            && !version.supports(ClientFeature::ExpiredOverwriteCookieCause)?
        {
            return Ok(CookieChangeCause::Overwrite);
        }
        Ok(self)
    }
}

pub trait CookieChangeListener: Send + Sync {
    fn on_cookie_changed(&self, cookie: String, cause: CookieChangeCause) -> RemoteResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

pub struct CookieManager {
    handle: HandleCell,
    engine: Arc<dyn NativeEngine>,
    version: Arc<VersionGate>,
    next_listener: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, Arc<dyn CookieChangeListener>>>,
}

impl CookieManager {
    pub(crate) fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        profile: NativeHandle,
    ) -> Self {
        let handle = engine.create(NativeKind::CookieManager, Some(profile));
        Self {
            handle: HandleCell::new(
                NativeKind::CookieManager.as_str(),
                handle,
                DestroyDiscipline::Idempotent,
            ),
            engine,
            version,
            next_listener: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    /// Returns whether the engine accepted the cookie.
    pub fn set_cookie(&self, url: &str, value: &str) -> Result<bool> {
        let handle = self.handle.get()?;
        let url = parse_url(url)?;
        Ok(self.engine.set_cookie(handle, url.as_str(), value))
    }

    pub fn get_cookie(&self, url: &str) -> Result<String> {
        let handle = self.handle.get()?;
        let url = parse_url(url)?;
        Ok(self.engine.get_cookie(handle, url.as_str()))
    }

    /// Watches cookies for `url`, optionally only the one called `name`.
    pub fn add_cookie_change_listener(
        &self,
        url: &str,
        name: Option<&str>,
        listener: Arc<dyn CookieChangeListener>,
    ) -> Result<ListenerId> {
        let handle = self.handle.get()?;
        let url = parse_url(url)?;
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, listener);
        self.engine
            .add_cookie_change_listener(handle, url.as_str(), name, id.raw());
        tracing::debug!(listener_id = id.raw(), url = %url, "cookie listener added");
        Ok(id)
    }

    /// Returns false when `id` was not registered.
    pub fn remove_cookie_change_listener(&self, id: ListenerId) -> Result<bool> {
        let handle = self.handle.get()?;
        if self.listeners.lock().remove(&id).is_none() {
            return Ok(false);
        }
        self.engine.remove_cookie_change_listener(handle, id.raw());
        Ok(true)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn on_native_cookie_changed(
        &self,
        listener_id: u64,
        cookie: &str,
        cause: i32,
    ) -> Result<()> {
        if !self.handle.is_alive() {
            return Ok(());
        }
        let cause = CookieChangeCause::from_native(cause)?.for_client(&self.version)?;
        let Some(listener) = self.listeners.lock().get(&ListenerId(listener_id)).cloned() else {
            tracing::debug!(listener_id, "change for removed cookie listener dropped");
            return Ok(());
        };
        if let Err(err) = listener.on_cookie_changed(cookie.to_string(), cause) {
            tracing::warn!(listener_id, error = %err, "cookie listener unreachable");
        }
        Ok(())
    }

    /// Listeners go with the native object.
    pub fn destroy(&self) -> bool {
        let Ok(Some(handle)) = self.handle.release() else {
            return false;
        };
        self.listeners.lock().clear();
        self.engine.delete(NativeKind::CookieManager, handle);
        true
    }
}

impl std::fmt::Debug for CookieManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieManager")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weblayer_common::{RemoteError, VersionPolicy};
    use weblayer_native::{NativeCall, RecordingEngine};

    #[derive(Default)]
    struct Changes(Mutex<Vec<(String, CookieChangeCause)>>);

    impl CookieChangeListener for Changes {
        fn on_cookie_changed(&self, cookie: String, cause: CookieChangeCause) -> RemoteResult {
            self.0.lock().push((cookie, cause));
            Ok(())
        }
    }

    struct Gone;

    impl CookieChangeListener for Gone {
        fn on_cookie_changed(&self, _cookie: String, _cause: CookieChangeCause) -> RemoteResult {
            Err(RemoteError::Disconnected)
        }
    }

    fn manager(client_major: u32) -> (Arc<RecordingEngine>, CookieManager) {
        let engine = Arc::new(RecordingEngine::new());
        let profile = engine.mint(NativeKind::Profile);
        let version = Arc::new(VersionGate::with_client(VersionPolicy::default(), client_major));
        let manager = CookieManager::new(engine.clone(), version, profile);
        (engine, manager)
    }

    #[test]
    fn test_set_and_get() {
        let (_, cookies) = manager(95);
        assert!(cookies.set_cookie("https://example.com/", "a=1").unwrap());
        assert_eq!(cookies.get_cookie("https://example.com/").unwrap(), "a=1");
        assert!(matches!(
            cookies.get_cookie("not a url"),
            Err(crate::SessionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_listener_lifecycle() {
        let (engine, cookies) = manager(95);
        let changes = Arc::new(Changes::default());
        let id = cookies
            .add_cookie_change_listener("https://example.com/", Some("a"), changes.clone())
            .unwrap();

        cookies
            .on_native_cookie_changed(id.raw(), "a=2", cookie_change_cause::OVERWRITE)
            .unwrap();
        assert!(cookies.remove_cookie_change_listener(id).unwrap());
        assert!(!cookies.remove_cookie_change_listener(id).unwrap());
        cookies
            .on_native_cookie_changed(id.raw(), "a=3", cookie_change_cause::EXPLICIT)
            .unwrap();

        assert_eq!(
            *changes.0.lock(),
            vec![("a=2".to_string(), CookieChangeCause::Overwrite)]
        );
        assert_eq!(
            engine.count(|c| matches!(c, NativeCall::RemoveCookieChangeListener { .. })),
            1
        );
    }

    #[test]
    fn test_cause_translation() {
        let old = VersionGate::with_client(VersionPolicy::default(), 91);
        let new = VersionGate::with_client(VersionPolicy::default(), 92);
        let cause =
            CookieChangeCause::from_native(cookie_change_cause::EXPIRED_OVERWRITE).unwrap();
        assert_eq!(cause.for_client(&old).unwrap(), CookieChangeCause::Overwrite);
        assert_eq!(cause.for_client(&new).unwrap(), CookieChangeCause::ExpiredOverwrite);
        assert_eq!(
            CookieChangeCause::from_native(42).unwrap_err(),
            LifecycleError::UnmappedValue {
                kind: "cookie change cause",
                value: 42
            }
        );
    }

    #[test]
    fn test_unreachable_listener_is_swallowed() {
        let (_, cookies) = manager(95);
        let id = cookies
            .add_cookie_change_listener("https://example.com/", None, Arc::new(Gone))
            .unwrap();
        cookies
            .on_native_cookie_changed(id.raw(), "a=1", cookie_change_cause::INSERTED)
            .unwrap();
    }

    #[test]
    fn test_destroy() {
        let (engine, cookies) = manager(95);
        let changes = Arc::new(Changes::default());
        cookies
            .add_cookie_change_listener("https://example.com/", None, changes)
            .unwrap();
        assert!(cookies.destroy());
        assert!(!cookies.destroy());
        assert_eq!(engine.delete_count(NativeKind::CookieManager), 1);
        assert_eq!(cookies.listener_count(), 0);
        assert!(cookies
            .set_cookie("https://example.com/", "a=1")
            .unwrap_err()
            .is_use_after_destroy());
    }
}
