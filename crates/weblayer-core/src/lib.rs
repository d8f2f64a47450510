//! WebLayer Core
//!
//! Root of the embedding layer: configuration, engine selection, the client
//! version handshake and crash reporting. Everything else hangs off the
//! [`WebLayer`] object and is re-exported here.

mod config;
mod crash_reporter;
mod engine;
mod error;
mod weblayer;

pub use config::{Config, RECORDING_ENGINE};
pub use crash_reporter::{CrashReporterClient, CrashReporterController};
pub use engine::{EngineFactory, EngineRegistry};
pub use error::CoreError;
pub use weblayer::WebLayer;

// Re-export the layer's components
pub use weblayer_callbacks::{
    AccessTokenClient, AccessTokenFetcherProxy, ErrorPageCallbackProxy, ErrorPageClient,
    ExternalIntentInIncognitoCallbackProxy, ExternalIntentInIncognitoClient, FaviconCallbackProxy,
    FaviconClient, FullscreenCallbackProxy, FullscreenClient, GoogleAccountsCallbackProxy,
    GoogleAccountsClient, MediaStreamCaptureProxy, MediaStreamClient, NewTabCallbackProxy,
    NewTabClient, NewTabType,
};
pub use weblayer_common::{
    AsyncFailure, AsyncResult, ClientFeature, LifecycleError, RemoteError, RemoteResult,
    VersionGate, VersionPolicy,
};
pub use weblayer_download::{
    Download, DownloadCallbackProxy, DownloadClient, DownloadError, DownloadRegistry,
    DownloadState, IntentOutcome,
};
pub use weblayer_native::{NativeEngine, NativeHandle, NativeKind, RecordingEngine};
pub use weblayer_navigation::{Navigation, NavigationController, NavigationError, Page};
pub use weblayer_session::{
    Browser, BrowserClient, BrowserOptions, BrowsingDataType, CookieChangeCause,
    CookieChangeListener, CookieManager, PrerenderController, Profile, ProfileKey,
    ProfileManager, SessionError, Tab, TabClient,
};
pub use weblayer_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging. `RUST_LOG` wins over `default_filter`; an unparsable
/// filter falls back to `info`. Returns false when a subscriber was already
/// installed.
pub fn init_logging(default_filter: &str) -> bool {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
