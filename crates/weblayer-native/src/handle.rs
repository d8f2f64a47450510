//! Opaque engine handles

use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

/// An opaque pointer-sized value owned by the engine.
///
/// Zero is the "destroyed" sentinel, so a `NativeHandle` can never hold it;
/// an absent handle is spelled `Option<NativeHandle>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Which engine object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    Profile,
    Browser,
    Tab,
    NavigationController,
    Navigation,
    Page,
    CookieManager,
    PrerenderController,
    Download,
    DownloadCallbackProxy,
    AccessTokenFetcherProxy,
    FaviconCallbackProxy,
    FullscreenCallbackProxy,
    ErrorPageCallbackProxy,
    NewTabCallbackProxy,
    GoogleAccountsCallbackProxy,
    ExternalIntentInIncognitoCallbackProxy,
    MediaStreamCaptureProxy,
}

impl NativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeKind::Profile => "profile",
            NativeKind::Browser => "browser",
            NativeKind::Tab => "tab",
            NativeKind::NavigationController => "navigation_controller",
            NativeKind::Navigation => "navigation",
            NativeKind::Page => "page",
            NativeKind::CookieManager => "cookie_manager",
            NativeKind::PrerenderController => "prerender_controller",
            NativeKind::Download => "download",
            NativeKind::DownloadCallbackProxy => "download_callback_proxy",
            NativeKind::AccessTokenFetcherProxy => "access_token_fetcher_proxy",
            NativeKind::FaviconCallbackProxy => "favicon_callback_proxy",
            NativeKind::FullscreenCallbackProxy => "fullscreen_callback_proxy",
            NativeKind::ErrorPageCallbackProxy => "error_page_callback_proxy",
            NativeKind::NewTabCallbackProxy => "new_tab_callback_proxy",
            NativeKind::GoogleAccountsCallbackProxy => "google_accounts_callback_proxy",
            NativeKind::ExternalIntentInIncognitoCallbackProxy => {
                "external_intent_in_incognito_callback_proxy"
            }
            NativeKind::MediaStreamCaptureProxy => "media_stream_capture_proxy",
        }
    }

    /// Objects the engine creates and retires on its own.
    pub fn is_engine_owned(&self) -> bool {
        matches!(
            self,
            NativeKind::Navigation | NativeKind::Page | NativeKind::Download
        )
    }
}

impl std::fmt::Display for NativeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_not_a_handle() {
        assert!(NativeHandle::new(0).is_none());
        assert_eq!(NativeHandle::new(42).unwrap().raw(), 42);
    }

    #[test]
    fn test_engine_owned_kinds() {
        assert!(NativeKind::Page.is_engine_owned());
        assert!(!NativeKind::Tab.is_engine_owned());
    }
}
