//! New tab requests from page content

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use weblayer_common::{
    CallbackProxy, ClientFeature, LifecycleError, ProxyState, RemoteResult, Result, VersionGate,
};
use weblayer_native::codes::new_tab;
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewTabType {
    ForegroundTab,
    BackgroundTab,
    NewPopup,
    NewWindow,
}

impl NewTabType {
    pub fn from_native(code: i32) -> Result<Self> {
        match code {
            new_tab::FOREGROUND_TAB => Ok(NewTabType::ForegroundTab),
            new_tab::BACKGROUND_TAB => Ok(NewTabType::BackgroundTab),
            new_tab::NEW_POPUP => Ok(NewTabType::NewPopup),
            new_tab::NEW_WINDOW => Ok(NewTabType::NewWindow),
            value => Err(LifecycleError::UnmappedValue {
                kind: "new tab type",
                value,
            }),
        }
    }

    /// The shape the connected client understands. Clients without
    /// `NewWindow` get the closest older value.
    pub fn for_client(self, version: &VersionGate) -> Result<Self> {
        if self == NewTabType::NewWindow && !version.supports(ClientFeature::NewWindowTabType)? {
            return Ok(NewTabType::NewPopup);
        }
        Ok(self)
    }
}

pub trait NewTabClient: Send + Sync {
    fn on_new_tab(&self, tab_id: i32, tab_type: NewTabType) -> RemoteResult;
}

pub struct NewTabCallbackProxy {
    proxy: CallbackProxy<dyn NewTabClient>,
    version: Arc<VersionGate>,
}

impl NewTabCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        tab: NativeHandle,
        client: Arc<dyn NewTabClient>,
    ) -> Self {
        Self {
            proxy: CallbackProxy::new(engine, NativeKind::NewTabCallbackProxy, Some(tab), client),
            version,
        }
    }

    pub fn state(&self) -> ProxyState {
        self.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn NewTabClient>) -> Result<()> {
        self.proxy.set_client(client)
    }

    /// Tells the client about a tab the engine opened. The tab has already
    /// been registered by the time this runs.
    pub fn on_new_tab(&self, tab_id: i32, tab_type: NewTabType) -> Result<()> {
        let tab_type = tab_type.for_client(&self.version)?;
        self.proxy
            .notify("on_new_tab", move |c| c.on_new_tab(tab_id, tab_type));
        Ok(())
    }

    pub fn destroy(&self) -> bool {
        self.proxy.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use weblayer_common::VersionPolicy;
    use weblayer_native::RecordingEngine;

    #[derive(Default)]
    struct Client(Mutex<Vec<(i32, NewTabType)>>);

    impl NewTabClient for Client {
        fn on_new_tab(&self, tab_id: i32, tab_type: NewTabType) -> RemoteResult {
            self.0.lock().push((tab_id, tab_type));
            Ok(())
        }
    }

    #[test]
    fn test_translation_table() {
        assert_eq!(
            NewTabType::from_native(new_tab::BACKGROUND_TAB).unwrap(),
            NewTabType::BackgroundTab
        );
        assert_eq!(
            NewTabType::from_native(42).unwrap_err(),
            LifecycleError::UnmappedValue {
                kind: "new tab type",
                value: 42
            }
        );
    }

    #[test]
    fn test_new_window_for_old_client() {
        let engine = Arc::new(RecordingEngine::new());
        let tab = engine.create(NativeKind::Tab, None);
        let version = Arc::new(VersionGate::with_client(VersionPolicy::default(), 89));
        let client = Arc::new(Client::default());
        let proxy = NewTabCallbackProxy::new(engine, version, tab, client.clone());

        proxy.on_new_tab(7, NewTabType::NewWindow).unwrap();
        proxy.on_new_tab(8, NewTabType::ForegroundTab).unwrap();
        assert_eq!(
            *client.0.lock(),
            vec![(7, NewTabType::NewPopup), (8, NewTabType::ForegroundTab)]
        );
    }
}
