//! In-process engine that records every call
//!
//! Used as the default engine strategy and as the engine double in tests.
//! It hands out sequential handles, tracks which ones are alive, and keeps an
//! ordered log of everything it was asked to do.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{NativeEngine, NativeNavigateParams};
use crate::handle::{NativeHandle, NativeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    Create {
        kind: NativeKind,
        handle: NativeHandle,
        owner: Option<NativeHandle>,
    },
    Delete {
        kind: NativeKind,
        handle: NativeHandle,
    },
    BrowserAddTab {
        browser: NativeHandle,
        tab: NativeHandle,
    },
    BrowserRemoveTab {
        browser: NativeHandle,
        tab: NativeHandle,
    },
    BrowserSetActiveTab {
        browser: NativeHandle,
        tab: Option<NativeHandle>,
    },
    Navigate {
        controller: NativeHandle,
        url: String,
        params: NativeNavigateParams,
    },
    GoBack(NativeHandle),
    GoForward(NativeHandle),
    Reload(NativeHandle),
    Stop(NativeHandle),
    SetRequestHeader {
        navigation: NativeHandle,
        name: String,
        value: String,
    },
    SetUserAgentString {
        navigation: NativeHandle,
        value: String,
    },
    SetCookie {
        cookie_manager: NativeHandle,
        url: String,
        value: String,
    },
    AddCookieChangeListener {
        cookie_manager: NativeHandle,
        listener_id: u64,
    },
    RemoveCookieChangeListener {
        cookie_manager: NativeHandle,
        listener_id: u64,
    },
    SchedulePrerender {
        prerender_controller: NativeHandle,
        url: String,
    },
    ExitFullscreen(NativeHandle),
    AccessTokenFetched {
        proxy: NativeHandle,
        request_id: u64,
        token: String,
    },
    ExternalIntentDecision {
        proxy: NativeHandle,
        request_id: u64,
        decision: i32,
    },
    StopMediaStream(NativeHandle),
    AllowDownloadResponse {
        proxy: NativeHandle,
        request_id: u64,
        allowed: bool,
    },
    PauseDownload(NativeHandle),
    ResumeDownload(NativeHandle),
    CancelDownload(NativeHandle),
    DeleteProfileData {
        profile_name: String,
        is_incognito: bool,
    },
    RemoveBrowserPersistenceStorage {
        profile_name: String,
        ids: Vec<String>,
    },
    ClearBrowsingData {
        profile_name: String,
        data_types: Vec<i32>,
    },
    UploadCrash {
        local_id: String,
    },
}

#[derive(Default)]
struct RecordingState {
    live: HashMap<NativeHandle, NativeKind>,
    calls: Vec<NativeCall>,
    invalid_deletes: usize,
    can_go_back: bool,
    can_go_forward: bool,
    cookies: HashMap<String, String>,
    persistence_ids: HashMap<String, Vec<String>>,
    upload_failure: Option<String>,
    disk_failures: HashSet<String>,
}

pub struct RecordingEngine {
    next_handle: AtomicU64,
    state: Mutex<RecordingState>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(RecordingState::default()),
        }
    }

    fn allocate(&self) -> NativeHandle {
        let raw = self.next_handle.fetch_add(8, Ordering::Relaxed);
        // The counter starts above zero and only grows.
        NativeHandle::new(raw).unwrap_or_else(|| unreachable!("handle counter wrapped"))
    }

    fn record(&self, call: NativeCall) {
        self.state.lock().calls.push(call);
    }

    /// Simulates the engine creating an object on its own (a navigation, a
    /// page, a download, a popup tab).
    pub fn mint(&self, kind: NativeKind) -> NativeHandle {
        let handle = self.allocate();
        self.state.lock().live.insert(handle, kind);
        handle
    }

    /// Simulates the engine destroying an object it owns.
    pub fn retire(&self, handle: NativeHandle) {
        self.state.lock().live.remove(&handle);
    }

    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.state.lock().live.contains_key(&handle)
    }

    pub fn live_count(&self, kind: NativeKind) -> usize {
        self.state
            .lock()
            .live
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn live_handles(&self) -> Vec<(NativeHandle, NativeKind)> {
        let mut live: Vec<_> = self.state.lock().live.iter().map(|(h, k)| (*h, *k)).collect();
        live.sort_by_key(|(handle, _)| *handle);
        live
    }

    pub fn create_count(&self, kind: NativeKind) -> usize {
        self.count(|call| matches!(call, NativeCall::Create { kind: k, .. } if *k == kind))
    }

    pub fn delete_count(&self, kind: NativeKind) -> usize {
        self.count(|call| matches!(call, NativeCall::Delete { kind: k, .. } if *k == kind))
    }

    /// Deletes of handles that were never created or were already deleted.
    pub fn invalid_delete_count(&self) -> usize {
        self.state.lock().invalid_deletes
    }

    pub fn count(&self, predicate: impl Fn(&NativeCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn position(&self, predicate: impl Fn(&NativeCall) -> bool) -> Option<usize> {
        self.state.lock().calls.iter().position(|c| predicate(c))
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.lock().calls.clone()
    }

    pub fn set_history(&self, can_go_back: bool, can_go_forward: bool) {
        let mut state = self.state.lock();
        state.can_go_back = can_go_back;
        state.can_go_forward = can_go_forward;
    }

    pub fn set_persistence_ids(&self, profile_name: &str, ids: Vec<String>) {
        self.state
            .lock()
            .persistence_ids
            .insert(profile_name.to_string(), ids);
    }

    pub fn fail_uploads_with(&self, reason: Option<String>) {
        self.state.lock().upload_failure = reason;
    }

    /// Makes blocking disk work for `profile_name` report failure.
    pub fn fail_disk_work_for(&self, profile_name: &str) {
        self.state
            .lock()
            .disk_failures
            .insert(profile_name.to_string());
    }
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for RecordingEngine {
    fn create(&self, kind: NativeKind, owner: Option<NativeHandle>) -> NativeHandle {
        let handle = self.allocate();
        let mut state = self.state.lock();
        state.live.insert(handle, kind);
        state.calls.push(NativeCall::Create {
            kind,
            handle,
            owner,
        });
        tracing::trace!(kind = %kind, handle = %handle, "native create");
        handle
    }

    fn delete(&self, kind: NativeKind, handle: NativeHandle) {
        let mut state = self.state.lock();
        match state.live.remove(&handle) {
            Some(live_kind) if live_kind == kind => {}
            other => {
                tracing::error!(
                    kind = %kind,
                    handle = %handle,
                    found = ?other,
                    "native delete of a handle that is not live"
                );
                state.invalid_deletes += 1;
            }
        }
        state.calls.push(NativeCall::Delete { kind, handle });
    }

    fn browser_add_tab(&self, browser: NativeHandle, tab: NativeHandle) {
        self.record(NativeCall::BrowserAddTab { browser, tab });
    }

    fn browser_remove_tab(&self, browser: NativeHandle, tab: NativeHandle) {
        self.record(NativeCall::BrowserRemoveTab { browser, tab });
    }

    fn browser_set_active_tab(&self, browser: NativeHandle, tab: Option<NativeHandle>) {
        self.record(NativeCall::BrowserSetActiveTab { browser, tab });
    }

    fn navigate(&self, controller: NativeHandle, url: &str, params: &NativeNavigateParams) {
        self.record(NativeCall::Navigate {
            controller,
            url: url.to_string(),
            params: params.clone(),
        });
    }

    fn go_back(&self, controller: NativeHandle) {
        self.record(NativeCall::GoBack(controller));
    }

    fn go_forward(&self, controller: NativeHandle) {
        self.record(NativeCall::GoForward(controller));
    }

    fn can_go_back(&self, _controller: NativeHandle) -> bool {
        self.state.lock().can_go_back
    }

    fn can_go_forward(&self, _controller: NativeHandle) -> bool {
        self.state.lock().can_go_forward
    }

    fn reload(&self, controller: NativeHandle) {
        self.record(NativeCall::Reload(controller));
    }

    fn stop(&self, controller: NativeHandle) {
        self.record(NativeCall::Stop(controller));
    }

    fn set_request_header(&self, navigation: NativeHandle, name: &str, value: &str) {
        self.record(NativeCall::SetRequestHeader {
            navigation,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn set_user_agent_string(&self, navigation: NativeHandle, value: &str) {
        self.record(NativeCall::SetUserAgentString {
            navigation,
            value: value.to_string(),
        });
    }

    fn set_cookie(&self, cookie_manager: NativeHandle, url: &str, value: &str) -> bool {
        let mut state = self.state.lock();
        state.cookies.insert(url.to_string(), value.to_string());
        state.calls.push(NativeCall::SetCookie {
            cookie_manager,
            url: url.to_string(),
            value: value.to_string(),
        });
        true
    }

    fn get_cookie(&self, _cookie_manager: NativeHandle, url: &str) -> String {
        self.state
            .lock()
            .cookies
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    fn add_cookie_change_listener(
        &self,
        cookie_manager: NativeHandle,
        _url: &str,
        _name: Option<&str>,
        listener_id: u64,
    ) {
        self.record(NativeCall::AddCookieChangeListener {
            cookie_manager,
            listener_id,
        });
    }

    fn remove_cookie_change_listener(&self, cookie_manager: NativeHandle, listener_id: u64) {
        self.record(NativeCall::RemoveCookieChangeListener {
            cookie_manager,
            listener_id,
        });
    }

    fn schedule_prerender(&self, prerender_controller: NativeHandle, url: &str) {
        self.record(NativeCall::SchedulePrerender {
            prerender_controller,
            url: url.to_string(),
        });
    }

    fn exit_fullscreen(&self, proxy: NativeHandle) {
        self.record(NativeCall::ExitFullscreen(proxy));
    }

    fn access_token_fetched(&self, proxy: NativeHandle, request_id: u64, token: &str) {
        self.record(NativeCall::AccessTokenFetched {
            proxy,
            request_id,
            token: token.to_string(),
        });
    }

    fn external_intent_decision(&self, proxy: NativeHandle, request_id: u64, decision: i32) {
        self.record(NativeCall::ExternalIntentDecision {
            proxy,
            request_id,
            decision,
        });
    }

    fn stop_media_stream(&self, proxy: NativeHandle) {
        self.record(NativeCall::StopMediaStream(proxy));
    }

    fn allow_download_response(&self, proxy: NativeHandle, request_id: u64, allowed: bool) {
        self.record(NativeCall::AllowDownloadResponse {
            proxy,
            request_id,
            allowed,
        });
    }

    fn pause_download(&self, download: NativeHandle) {
        self.record(NativeCall::PauseDownload(download));
    }

    fn resume_download(&self, download: NativeHandle) {
        self.record(NativeCall::ResumeDownload(download));
    }

    fn cancel_download(&self, download: NativeHandle) {
        self.record(NativeCall::CancelDownload(download));
    }

    fn delete_profile_data(&self, profile_name: &str, is_incognito: bool) -> bool {
        let mut state = self.state.lock();
        state.calls.push(NativeCall::DeleteProfileData {
            profile_name: profile_name.to_string(),
            is_incognito,
        });
        !state.disk_failures.contains(profile_name)
    }

    fn browser_persistence_ids(&self, profile_name: &str, _is_incognito: bool) -> Vec<String> {
        self.state
            .lock()
            .persistence_ids
            .get(profile_name)
            .cloned()
            .unwrap_or_default()
    }

    fn remove_browser_persistence_storage(
        &self,
        profile_name: &str,
        _is_incognito: bool,
        ids: &[String],
    ) -> bool {
        let mut state = self.state.lock();
        if let Some(existing) = state.persistence_ids.get_mut(profile_name) {
            existing.retain(|id| !ids.contains(id));
        }
        state.calls.push(NativeCall::RemoveBrowserPersistenceStorage {
            profile_name: profile_name.to_string(),
            ids: ids.to_vec(),
        });
        !state.disk_failures.contains(profile_name)
    }

    fn clear_browsing_data(
        &self,
        profile_name: &str,
        _is_incognito: bool,
        data_types: &[i32],
        _from_millis: i64,
        _to_millis: i64,
    ) -> bool {
        let mut state = self.state.lock();
        state.calls.push(NativeCall::ClearBrowsingData {
            profile_name: profile_name.to_string(),
            data_types: data_types.to_vec(),
        });
        !state.disk_failures.contains(profile_name)
    }

    fn upload_crash(&self, local_id: &str, _dump: &[u8]) -> Result<String, String> {
        let mut state = self.state.lock();
        state.calls.push(NativeCall::UploadCrash {
            local_id: local_id.to_string(),
        });
        match &state.upload_failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(format!("report-{}", local_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_delete_pairing() {
        let engine = RecordingEngine::new();
        let profile = engine.create(NativeKind::Profile, None);
        let browser = engine.create(NativeKind::Browser, Some(profile));
        assert_ne!(profile, browser);
        assert_eq!(engine.live_count(NativeKind::Browser), 1);

        engine.delete(NativeKind::Browser, browser);
        assert_eq!(engine.live_count(NativeKind::Browser), 0);
        assert_eq!(engine.invalid_delete_count(), 0);

        // A second delete of the same handle is flagged.
        engine.delete(NativeKind::Browser, browser);
        assert_eq!(engine.invalid_delete_count(), 1);
        assert_eq!(engine.delete_count(NativeKind::Browser), 2);
    }

    #[test]
    fn test_minted_handles_are_live_until_retired() {
        let engine = RecordingEngine::new();
        let page = engine.mint(NativeKind::Page);
        assert!(engine.is_live(page));
        engine.retire(page);
        assert!(!engine.is_live(page));
        assert_eq!(engine.create_count(NativeKind::Page), 0);
    }

    #[test]
    fn test_cookie_round_trip() {
        let engine = RecordingEngine::new();
        let cm = engine.create(NativeKind::CookieManager, None);
        assert!(engine.set_cookie(cm, "https://example.com/", "a=b"));
        assert_eq!(engine.get_cookie(cm, "https://example.com/"), "a=b");
        assert_eq!(engine.get_cookie(cm, "https://other.com/"), "");
    }
}
