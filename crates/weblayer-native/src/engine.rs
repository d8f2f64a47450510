//! The engine boundary
//!
//! Everything the managed side can ask of the engine. Handle-taking methods
//! are only called on the UI sequence with live handles; the methods under
//! "Blocking work" are called from worker threads and are keyed by profile
//! name rather than handle because the profile may be torn down while they
//! run.

use crate::handle::{NativeHandle, NativeKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeNavigateParams {
    pub should_replace_current_entry: bool,
    pub intent_processing_disabled: bool,
}

pub trait NativeEngine: Send + Sync {
    /// Creates an engine object. `owner` is the handle of the object it
    /// hangs off (profile for a browser, tab for its callback proxies, ...).
    fn create(&self, kind: NativeKind, owner: Option<NativeHandle>) -> NativeHandle;

    /// Deletes an object previously returned by [`NativeEngine::create`] or
    /// announced by the engine. Called exactly once per handle.
    fn delete(&self, kind: NativeKind, handle: NativeHandle);

    // Browser
    fn browser_add_tab(&self, browser: NativeHandle, tab: NativeHandle);
    fn browser_remove_tab(&self, browser: NativeHandle, tab: NativeHandle);
    fn browser_set_active_tab(&self, browser: NativeHandle, tab: Option<NativeHandle>);

    // Navigation controller
    fn navigate(&self, controller: NativeHandle, url: &str, params: &NativeNavigateParams);
    fn go_back(&self, controller: NativeHandle);
    fn go_forward(&self, controller: NativeHandle);
    fn can_go_back(&self, controller: NativeHandle) -> bool;
    fn can_go_forward(&self, controller: NativeHandle) -> bool;
    fn reload(&self, controller: NativeHandle);
    fn stop(&self, controller: NativeHandle);

    // Navigation
    fn set_request_header(&self, navigation: NativeHandle, name: &str, value: &str);
    fn set_user_agent_string(&self, navigation: NativeHandle, value: &str);

    // Cookies and prerendering
    fn set_cookie(&self, cookie_manager: NativeHandle, url: &str, value: &str) -> bool;
    fn get_cookie(&self, cookie_manager: NativeHandle, url: &str) -> String;
    fn add_cookie_change_listener(
        &self,
        cookie_manager: NativeHandle,
        url: &str,
        name: Option<&str>,
        listener_id: u64,
    );
    fn remove_cookie_change_listener(&self, cookie_manager: NativeHandle, listener_id: u64);
    fn schedule_prerender(&self, prerender_controller: NativeHandle, url: &str);

    // Callback proxy replies
    fn exit_fullscreen(&self, proxy: NativeHandle);
    fn access_token_fetched(&self, proxy: NativeHandle, request_id: u64, token: &str);
    fn external_intent_decision(&self, proxy: NativeHandle, request_id: u64, decision: i32);
    fn stop_media_stream(&self, proxy: NativeHandle);
    fn allow_download_response(&self, proxy: NativeHandle, request_id: u64, allowed: bool);

    // Downloads
    fn pause_download(&self, download: NativeHandle);
    fn resume_download(&self, download: NativeHandle);
    fn cancel_download(&self, download: NativeHandle);

    // Blocking work
    fn delete_profile_data(&self, profile_name: &str, is_incognito: bool) -> bool;
    fn browser_persistence_ids(&self, profile_name: &str, is_incognito: bool) -> Vec<String>;
    fn remove_browser_persistence_storage(
        &self,
        profile_name: &str,
        is_incognito: bool,
        ids: &[String],
    ) -> bool;
    fn clear_browsing_data(
        &self,
        profile_name: &str,
        is_incognito: bool,
        data_types: &[i32],
        from_millis: i64,
        to_millis: i64,
    ) -> bool;
    fn upload_crash(&self, local_id: &str, dump: &[u8]) -> Result<String, String>;
}
