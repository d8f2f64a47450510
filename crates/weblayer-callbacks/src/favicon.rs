//! Favicon change forwarding

use std::sync::Arc;

use weblayer_common::{CallbackProxy, ProxyState, RemoteResult, Result};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

pub trait FaviconClient: Send + Sync {
    /// `None` when the page has no favicon (or it was reset by a navigation).
    fn on_favicon_changed(&self, png: Option<Vec<u8>>) -> RemoteResult;
}

pub struct FaviconCallbackProxy {
    proxy: CallbackProxy<dyn FaviconClient>,
}

impl FaviconCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        tab: NativeHandle,
        client: Arc<dyn FaviconClient>,
    ) -> Self {
        Self {
            proxy: CallbackProxy::new(engine, NativeKind::FaviconCallbackProxy, Some(tab), client),
        }
    }

    pub fn state(&self) -> ProxyState {
        self.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn FaviconClient>) -> Result<()> {
        self.proxy.set_client(client)
    }

    pub fn on_native_favicon_changed(&self, png: Option<Vec<u8>>) {
        self.proxy
            .notify("on_favicon_changed", move |c| c.on_favicon_changed(png));
    }

    pub fn destroy(&self) -> bool {
        self.proxy.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use weblayer_native::RecordingEngine;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Option<usize>>>);

    impl FaviconClient for Recorder {
        fn on_favicon_changed(&self, png: Option<Vec<u8>>) -> RemoteResult {
            self.0.lock().push(png.map(|p| p.len()));
            Ok(())
        }
    }

    #[test]
    fn test_favicon_forwarding_and_destroy() {
        let engine = Arc::new(RecordingEngine::new());
        let tab = engine.create(NativeKind::Tab, None);
        let recorder = Arc::new(Recorder::default());
        let proxy = FaviconCallbackProxy::new(engine.clone(), tab, recorder.clone());

        proxy.on_native_favicon_changed(Some(vec![0; 4]));
        proxy.on_native_favicon_changed(None);
        assert_eq!(*recorder.0.lock(), vec![Some(4), None]);

        assert!(proxy.destroy());
        assert!(!proxy.destroy());
        proxy.on_native_favicon_changed(Some(vec![1]));
        assert_eq!(recorder.0.lock().len(), 2);
        assert_eq!(engine.delete_count(NativeKind::FaviconCallbackProxy), 1);
        assert_eq!(proxy.state(), ProxyState::Destroyed);
    }
}
