//! Fullscreen enter/exit
//!
//! Each enter notification carries an exit handle stamped with a request
//! id. Entering again, or the engine leaving fullscreen on its own, makes
//! every older handle stale. Calling a handle from inside the client's
//! enter notification is a client contract violation.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use weblayer_common::{
    CallbackProxy, LifecycleError, ProxyState, RemoteResult, RequestCounter, Result,
};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

/// How long the "press back to exit" hint stays up after entering.
pub const TOAST_DURATION: Duration = Duration::from_secs(5);

pub trait FullscreenClient: Send + Sync {
    fn enter_fullscreen(&self, exit: FullscreenExitHandle) -> RemoteResult;
    fn exit_fullscreen(&self) -> RemoteResult;
}

struct Inner {
    proxy: CallbackProxy<dyn FullscreenClient>,
    requests: RequestCounter,
    notifying_enter: AtomicBool,
    toast_until: Mutex<Option<Instant>>,
}

impl Inner {
    fn exit(&self, request_id: u64) -> Result<bool> {
        if self.notifying_enter.load(Ordering::SeqCst) {
            tracing::error!(request_id, "exit fullscreen called from inside enter notification");
            return Err(LifecycleError::ReentrantCall("exit_fullscreen"));
        }
        if !self.proxy.is_active() {
            return Ok(false);
        }
        if !self.requests.is_current(request_id) {
            tracing::debug!(
                request_id,
                current = self.requests.current(),
                "stale fullscreen exit ignored"
            );
            return Ok(false);
        }

        self.requests.invalidate();
        *self.toast_until.lock() = None;
        let handle = self.proxy.handle()?;
        self.proxy.engine().exit_fullscreen(handle);
        Ok(true)
    }
}

/// One-shot exit callback handed to the client with each enter.
pub struct FullscreenExitHandle {
    inner: Weak<Inner>,
    request_id: u64,
}

impl FullscreenExitHandle {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Asks the engine to leave fullscreen. Returns whether this handle was
    /// still current and the native exit was issued.
    pub fn exit(self) -> Result<bool> {
        match self.inner.upgrade() {
            Some(inner) => inner.exit(self.request_id),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for FullscreenExitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullscreenExitHandle")
            .field("request_id", &self.request_id)
            .finish()
    }
}

pub struct FullscreenCallbackProxy {
    inner: Arc<Inner>,
}

impl FullscreenCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        tab: NativeHandle,
        client: Arc<dyn FullscreenClient>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                proxy: CallbackProxy::new(
                    engine,
                    NativeKind::FullscreenCallbackProxy,
                    Some(tab),
                    client,
                ),
                requests: RequestCounter::new(),
                notifying_enter: AtomicBool::new(false),
                toast_until: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> ProxyState {
        self.inner.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.inner.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn FullscreenClient>) -> Result<()> {
        self.inner.proxy.set_client(client)
    }

    /// Id the next exit handle has to carry to be honored.
    pub fn current_request_id(&self) -> u64 {
        self.inner.requests.current()
    }

    pub fn is_toast_visible(&self) -> bool {
        matches!(*self.inner.toast_until.lock(), Some(until) if Instant::now() < until)
    }

    pub fn on_native_enter_fullscreen(&self) {
        if !self.inner.proxy.is_active() {
            return;
        }

        let request_id = self.inner.requests.next();
        let exit = FullscreenExitHandle {
            inner: Arc::downgrade(&self.inner),
            request_id,
        };
        *self.inner.toast_until.lock() = Some(Instant::now() + TOAST_DURATION);
        tracing::debug!(request_id, "entering fullscreen");

        self.inner.notifying_enter.store(true, Ordering::SeqCst);
        self.inner
            .proxy
            .notify("enter_fullscreen", move |c| c.enter_fullscreen(exit));
        self.inner.notifying_enter.store(false, Ordering::SeqCst);
    }

    /// The engine left fullscreen (page script, navigation, ...).
    pub fn on_native_exit_fullscreen(&self) {
        if !self.inner.proxy.is_active() {
            return;
        }
        self.inner.requests.invalidate();
        *self.inner.toast_until.lock() = None;
        self.inner.proxy.notify("exit_fullscreen", |c| c.exit_fullscreen());
    }

    pub fn destroy(&self) -> bool {
        *self.inner.toast_until.lock() = None;
        self.inner.requests.invalidate();
        self.inner.proxy.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weblayer_native::{NativeCall, RecordingEngine};

    #[derive(Default)]
    struct Holder {
        handles: Mutex<Vec<FullscreenExitHandle>>,
        exits: Mutex<usize>,
    }

    impl FullscreenClient for Holder {
        fn enter_fullscreen(&self, exit: FullscreenExitHandle) -> RemoteResult {
            self.handles.lock().push(exit);
            Ok(())
        }

        fn exit_fullscreen(&self) -> RemoteResult {
            *self.exits.lock() += 1;
            Ok(())
        }
    }

    fn setup() -> (Arc<RecordingEngine>, FullscreenCallbackProxy, Arc<Holder>) {
        let engine = Arc::new(RecordingEngine::new());
        let tab = engine.create(NativeKind::Tab, None);
        let holder = Arc::new(Holder::default());
        let proxy = FullscreenCallbackProxy::new(engine.clone(), tab, holder.clone());
        (engine, proxy, holder)
    }

    fn exit_calls(engine: &RecordingEngine) -> usize {
        engine.count(|c| matches!(c, NativeCall::ExitFullscreen(_)))
    }

    #[test]
    fn test_stale_exit_handle_is_ignored() {
        let (engine, proxy, holder) = setup();
        proxy.on_native_enter_fullscreen();
        proxy.on_native_enter_fullscreen();

        let mut handles = std::mem::take(&mut *holder.handles.lock());
        let newer = handles.pop().unwrap();
        let older = handles.pop().unwrap();
        assert_eq!(newer.request_id(), older.request_id() + 1);

        assert!(!older.exit().unwrap());
        assert_eq!(exit_calls(&engine), 0);

        assert!(newer.exit().unwrap());
        assert_eq!(exit_calls(&engine), 1);
        assert!(!proxy.is_toast_visible());
    }

    #[test]
    fn test_engine_exit_makes_handle_stale() {
        let (engine, proxy, holder) = setup();
        proxy.on_native_enter_fullscreen();
        assert!(proxy.is_toast_visible());
        proxy.on_native_exit_fullscreen();
        assert_eq!(*holder.exits.lock(), 1);

        let handle = holder.handles.lock().pop().unwrap();
        assert!(!handle.exit().unwrap());
        assert_eq!(exit_calls(&engine), 0);
    }

    struct Reentrant {
        result: Mutex<Option<Result<bool>>>,
    }

    impl FullscreenClient for Reentrant {
        fn enter_fullscreen(&self, exit: FullscreenExitHandle) -> RemoteResult {
            *self.result.lock() = Some(exit.exit());
            Ok(())
        }

        fn exit_fullscreen(&self) -> RemoteResult {
            Ok(())
        }
    }

    #[test]
    fn test_synchronous_exit_is_rejected() {
        let engine = Arc::new(RecordingEngine::new());
        let tab = engine.create(NativeKind::Tab, None);
        let client = Arc::new(Reentrant {
            result: Mutex::new(None),
        });
        let proxy = FullscreenCallbackProxy::new(engine.clone(), tab, client.clone());

        proxy.on_native_enter_fullscreen();
        assert_eq!(
            client.result.lock().take().unwrap(),
            Err(LifecycleError::ReentrantCall("exit_fullscreen"))
        );
        assert_eq!(exit_calls(&engine), 0);
    }

    #[test]
    fn test_destroy_clears_toast_and_disarms_handles() {
        let (engine, proxy, holder) = setup();
        proxy.on_native_enter_fullscreen();
        assert!(proxy.destroy());
        assert!(!proxy.is_toast_visible());

        let handle = holder.handles.lock().pop().unwrap();
        assert!(!handle.exit().unwrap());
        assert!(!proxy.destroy());
        assert_eq!(engine.delete_count(NativeKind::FullscreenCallbackProxy), 1);
    }
}
