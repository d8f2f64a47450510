//! Per-profile download events
//!
//! Forwards engine download events to the client and answers the engine's
//! "may this download start" question through a one-shot responder.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use url::Url;

use weblayer_common::{CallbackProxy, ProxyState, RemoteResult};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

use crate::download::{Download, DownloadFailure, DownloadState};
use crate::error::DownloadError;
use crate::registry::DownloadRegistry;
use crate::Result;

pub trait DownloadClient: Send + Sync {
    /// Returns true when the client takes the download over entirely.
    fn intercept_download(
        &self,
        url: Url,
        user_agent: String,
        content_disposition: String,
        mime_type: String,
        content_length: i64,
    ) -> RemoteResult<bool>;

    fn allow_download(
        &self,
        url: Url,
        request_method: String,
        request_initiator: Option<String>,
        responder: AllowDownloadResponder,
    ) -> RemoteResult;

    fn download_started(&self, download: Arc<Download>) -> RemoteResult;
    fn download_progress_changed(&self, download: Arc<Download>) -> RemoteResult;
    fn download_completed(&self, download: Arc<Download>) -> RemoteResult;
    fn download_failed(&self, download: Arc<Download>) -> RemoteResult;
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| DownloadError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

struct Inner {
    proxy: CallbackProxy<dyn DownloadClient>,
    pending_allow: Mutex<HashSet<u64>>,
}

impl Inner {
    fn respond(&self, request_id: u64, allowed: bool) -> bool {
        if !self.pending_allow.lock().remove(&request_id) {
            return false;
        }
        let handle = match self.proxy.handle() {
            Ok(handle) => handle,
            Err(_) => return false,
        };
        self.proxy
            .engine()
            .allow_download_response(handle, request_id, allowed);
        true
    }
}

pub struct AllowDownloadResponder {
    inner: Weak<Inner>,
    request_id: u64,
}

impl AllowDownloadResponder {
    pub fn respond(self, allowed: bool) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.respond(self.request_id, allowed),
            None => false,
        }
    }
}

pub struct DownloadCallbackProxy {
    inner: Arc<Inner>,
    registry: Arc<DownloadRegistry>,
    profile_name: String,
    by_handle: Mutex<HashMap<NativeHandle, i32>>,
}

impl DownloadCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        registry: Arc<DownloadRegistry>,
        profile: NativeHandle,
        profile_name: &str,
        client: Arc<dyn DownloadClient>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                proxy: CallbackProxy::new(
                    engine,
                    NativeKind::DownloadCallbackProxy,
                    Some(profile),
                    client,
                ),
                pending_allow: Mutex::new(HashSet::new()),
            }),
            registry,
            profile_name: profile_name.to_string(),
            by_handle: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> ProxyState {
        self.inner.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.inner.proxy.handle()?)
    }

    pub fn set_client(&self, client: Arc<dyn DownloadClient>) -> Result<()> {
        Ok(self.inner.proxy.set_client(client)?)
    }

    fn download_for(&self, handle: NativeHandle) -> Option<Arc<Download>> {
        let id = *self.by_handle.lock().get(&handle)?;
        self.registry.get(id)
    }

    /// Whether the client took the download. Unreachable clients do not.
    pub fn on_native_intercept_download(
        &self,
        url: &str,
        user_agent: &str,
        content_disposition: &str,
        mime_type: &str,
        content_length: i64,
    ) -> Result<bool> {
        let url = parse_url(url)?;
        let (user_agent, content_disposition, mime_type) = (
            user_agent.to_string(),
            content_disposition.to_string(),
            mime_type.to_string(),
        );
        let answer = self.inner.proxy.query("intercept_download", move |c| {
            c.intercept_download(
                url,
                user_agent,
                content_disposition,
                mime_type,
                content_length,
            )
        });
        Ok(matches!(answer, Some(Ok(true))))
    }

    /// Asks the client whether a download may start. The engine gets a deny
    /// when the client cannot be reached.
    pub fn on_native_allow_download(
        &self,
        request_id: u64,
        url: &str,
        request_method: &str,
        request_initiator: Option<&str>,
    ) -> Result<()> {
        if !self.inner.proxy.is_active() {
            return Ok(());
        }
        let url = parse_url(url)?;
        self.inner.pending_allow.lock().insert(request_id);

        let responder = AllowDownloadResponder {
            inner: Arc::downgrade(&self.inner),
            request_id,
        };
        let method = request_method.to_string();
        let initiator = request_initiator.map(str::to_string);
        let sent = self.inner.proxy.query("allow_download", move |c| {
            c.allow_download(url, method, initiator, responder)
        });
        if let Some(Err(_)) = sent {
            self.inner.respond(request_id, false);
        }
        Ok(())
    }

    /// A download started. Assigns its notification id and registers it.
    pub fn on_native_download_started(
        &self,
        handle: NativeHandle,
        url: &str,
        mime_type: Option<&str>,
        total_bytes: Option<i64>,
        is_transient: bool,
    ) -> Result<Option<Arc<Download>>> {
        if !self.inner.proxy.is_active() {
            return Ok(None);
        }
        let url = parse_url(url)?;
        let notification_id = self.registry.allocate_id()?;
        let download = Arc::new(Download::new(
            Arc::clone(self.inner.proxy.engine()),
            notification_id,
            handle,
            &self.profile_name,
            url,
            mime_type.map(str::to_string),
            total_bytes,
            is_transient,
        ));

        self.registry.register(Arc::clone(&download))?;
        self.by_handle.lock().insert(handle, notification_id);
        tracing::info!(
            notification_id,
            profile = %self.profile_name,
            transient = is_transient,
            "download started"
        );

        let notified = Arc::clone(&download);
        self.inner
            .proxy
            .notify("download_started", move |c| c.download_started(notified));
        Ok(Some(download))
    }

    pub fn on_native_download_progress(
        &self,
        handle: NativeHandle,
        state: i32,
        received_bytes: i64,
        total_bytes: Option<i64>,
    ) -> Result<()> {
        let Some(download) = self.download_for(handle) else {
            return Ok(());
        };
        let state = DownloadState::from_native(state)?;
        download.update_progress(state, received_bytes, total_bytes);
        self.inner.proxy.notify("download_progress_changed", move |c| {
            c.download_progress_changed(download)
        });
        Ok(())
    }

    pub fn on_native_download_completed(
        &self,
        handle: NativeHandle,
        location: &str,
    ) -> Result<()> {
        let Some(download) = self.download_for(handle) else {
            return Ok(());
        };
        download.mark_complete(location.to_string());
        self.registry.persist(&download)?;
        self.inner
            .proxy
            .notify("download_completed", move |c| c.download_completed(download));
        Ok(())
    }

    pub fn on_native_download_failed(&self, handle: NativeHandle, error_code: i32) -> Result<()> {
        let Some(download) = self.download_for(handle) else {
            return Ok(());
        };
        download.mark_failed(DownloadFailure::from_native(error_code)?);
        self.inner
            .proxy
            .notify("download_failed", move |c| c.download_failed(download));
        Ok(())
    }

    /// The engine retired the download; it leaves the live map.
    pub fn on_native_download_destroyed(&self, handle: NativeHandle) {
        let Some(id) = self.by_handle.lock().remove(&handle) else {
            return;
        };
        if self.registry.on_download_destroyed(id).is_some() {
            tracing::debug!(notification_id = id, handle = %handle, "download retired");
        }
    }

    /// Retires every download this proxy started; no destroyed event can
    /// reach them once the proxy is gone.
    pub fn destroy(&self) -> bool {
        self.inner.pending_allow.lock().clear();
        let started: Vec<i32> = self.by_handle.lock().drain().map(|(_, id)| id).collect();
        for id in started {
            if self.registry.on_download_destroyed(id).is_some() {
                tracing::debug!(notification_id = id, "download retired with its proxy");
            }
        }
        self.inner.proxy.destroy()
    }
}
