//! WebLayer Callback Proxies
//!
//! Per-tab and per-profile helpers that exist only to receive engine events
//! and hand them to a remote client. Every proxy here:
//! - is created with its native counterpart and a non-null client
//! - lets the client be replaced while active
//! - destroys idempotently, deleting the native object once
//! - translates engine codes with explicit tables

mod access_token;
mod error_page;
mod external_intent;
mod favicon;
mod fullscreen;
mod google_accounts;
mod media_stream;
mod new_tab;

pub use access_token::{AccessTokenClient, AccessTokenFetcherProxy, AccessTokenResponder};
pub use error_page::{ErrorPageCallbackProxy, ErrorPageClient};
pub use external_intent::{
    ExternalIntentInIncognitoCallbackProxy, ExternalIntentInIncognitoClient, IntentDecision,
    IntentDecisionResponder,
};
pub use favicon::{FaviconCallbackProxy, FaviconClient};
pub use fullscreen::{
    FullscreenCallbackProxy, FullscreenClient, FullscreenExitHandle, TOAST_DURATION,
};
pub use google_accounts::{
    GoogleAccountServiceType, GoogleAccountsCallbackProxy, GoogleAccountsClient,
    GoogleAccountsParams,
};
pub use media_stream::{MediaStreamCaptureProxy, MediaStreamClient};
pub use new_tab::{NewTabCallbackProxy, NewTabClient, NewTabType};
