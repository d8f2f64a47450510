//! Error page hooks

use std::sync::Arc;

use weblayer_common::{
    CallbackProxy, ClientFeature, ProxyState, RemoteResult, Result, VersionGate,
};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

pub trait ErrorPageClient: Send + Sync {
    /// Returns true when the client handled "back to safety" itself.
    fn on_back_to_safety(&self) -> RemoteResult<bool>;

    /// Custom HTML for a failed navigation, or `None` for the default page.
    fn error_page_content(&self, navigation_id: i64) -> RemoteResult<Option<String>>;
}

pub struct ErrorPageCallbackProxy {
    proxy: CallbackProxy<dyn ErrorPageClient>,
    version: Arc<VersionGate>,
}

impl ErrorPageCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        tab: NativeHandle,
        client: Arc<dyn ErrorPageClient>,
    ) -> Self {
        Self {
            proxy: CallbackProxy::new(
                engine,
                NativeKind::ErrorPageCallbackProxy,
                Some(tab),
                client,
            ),
            version,
        }
    }

    pub fn state(&self) -> ProxyState {
        self.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn ErrorPageClient>) -> Result<()> {
        self.proxy.set_client(client)
    }

    /// Whether the engine should skip its own back-to-safety handling. Any
    /// failure to reach the client means "not handled".
    pub fn on_native_back_to_safety(&self) -> bool {
        match self.proxy.query("on_back_to_safety", |c| c.on_back_to_safety()) {
            Some(Ok(handled)) => handled,
            Some(Err(_)) | None => false,
        }
    }

    /// Error page HTML supplied by the client. Clients that predate the
    /// hook always get the engine's default page.
    pub fn on_native_error_page_content(&self, navigation_id: i64) -> Option<String> {
        match self.version.supports(ClientFeature::ErrorPageContent) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "error page content requested before client setup");
                return None;
            }
        }

        match self.proxy.query("error_page_content", move |c| {
            c.error_page_content(navigation_id)
        }) {
            Some(Ok(content)) => content,
            Some(Err(_)) | None => None,
        }
    }

    pub fn destroy(&self) -> bool {
        self.proxy.destroy()
    }
}
