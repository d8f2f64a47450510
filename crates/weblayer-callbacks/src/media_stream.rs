//! Media capture indicator

use std::sync::Arc;

use weblayer_common::{
    CallbackProxy, ClientFeature, ProxyState, RemoteResult, Result, VersionGate,
};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

pub trait MediaStreamClient: Send + Sync {
    fn on_media_stream_state_changed(&self, audio: bool, video: bool) -> RemoteResult;
}

pub struct MediaStreamCaptureProxy {
    proxy: CallbackProxy<dyn MediaStreamClient>,
    version: Arc<VersionGate>,
}

impl MediaStreamCaptureProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        tab: NativeHandle,
        client: Arc<dyn MediaStreamClient>,
    ) -> Self {
        Self {
            proxy: CallbackProxy::new(
                engine,
                NativeKind::MediaStreamCaptureProxy,
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

    pub fn set_client(&self, client: Arc<dyn MediaStreamClient>) -> Result<()> {
        self.proxy.set_client(client)
    }

    pub fn on_native_state_changed(&self, audio: bool, video: bool) {
        if !self
            .version
            .supports(ClientFeature::MediaStreamControls)
            .unwrap_or(false)
        {
            return;
        }
        self.proxy.notify("on_media_stream_state_changed", move |c| {
            c.on_media_stream_state_changed(audio, video)
        });
    }

    /// The user asked to stop capturing.
    pub fn stop_stream(&self) -> Result<()> {
        let handle = self.proxy.handle()?;
        self.proxy.engine().stop_media_stream(handle);
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
    use weblayer_native::{NativeCall, RecordingEngine};

    #[derive(Default)]
    struct Client(Mutex<Vec<(bool, bool)>>);

    impl MediaStreamClient for Client {
        fn on_media_stream_state_changed(&self, audio: bool, video: bool) -> RemoteResult {
            self.0.lock().push((audio, video));
            Ok(())
        }
    }

    fn setup(
        client_major: u32,
    ) -> (Arc<RecordingEngine>, MediaStreamCaptureProxy, Arc<Client>) {
        let engine = Arc::new(RecordingEngine::new());
        let tab = engine.create(NativeKind::Tab, None);
        let version = Arc::new(VersionGate::with_client(VersionPolicy::default(), client_major));
        let client = Arc::new(Client::default());
        let proxy = MediaStreamCaptureProxy::new(engine.clone(), version, tab, client.clone());
        (engine, proxy, client)
    }

    #[test]
    fn test_state_changes_and_stop() {
        let (engine, proxy, client) = setup(95);
        proxy.on_native_state_changed(true, false);
        assert_eq!(*client.0.lock(), vec![(true, false)]);

        proxy.stop_stream().unwrap();
        assert_eq!(engine.count(|c| matches!(c, NativeCall::StopMediaStream(_))), 1);

        proxy.destroy();
        assert!(proxy.stop_stream().unwrap_err().is_use_after_destroy());
    }

    #[test]
    fn test_old_client_gets_no_state() {
        let (_, proxy, client) = setup(87);
        proxy.on_native_state_changed(true, true);
        assert!(client.0.lock().is_empty());
    }
}
