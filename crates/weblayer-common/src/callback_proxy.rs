//! Generic native-event to client-event proxy
//!
//! Construction makes the native create call and stores the client, which is
//! the `Uninitialized → Active` edge; there is no way to hold a proxy that
//! has not completed it. The client is an `Arc`, so a proxy can never be
//! built or re-pointed at "no client".

use std::sync::Arc;

use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

use crate::client::ClientSlot;
use crate::error::RemoteResult;
use crate::handle_cell::{DestroyDiscipline, HandleCell};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Active,
    Destroyed,
}

pub struct CallbackProxy<C: ?Sized> {
    kind: NativeKind,
    handle: HandleCell,
    client: ClientSlot<C>,
    engine: Arc<dyn NativeEngine>,
}

impl<C: ?Sized + Send + Sync> CallbackProxy<C> {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        kind: NativeKind,
        owner: Option<NativeHandle>,
        client: Arc<C>,
    ) -> Self {
        let handle = engine.create(kind, owner);
        tracing::debug!(kind = %kind, handle = %handle, "callback proxy created");

        Self {
            kind,
            handle: HandleCell::new(kind.as_str(), handle, DestroyDiscipline::Idempotent),
            client: ClientSlot::connected(kind.as_str(), client),
            engine,
        }
    }

    pub fn kind(&self) -> NativeKind {
        self.kind
    }

    pub fn state(&self) -> ProxyState {
        if self.handle.is_alive() {
            ProxyState::Active
        } else {
            ProxyState::Destroyed
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == ProxyState::Active
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.handle.get()
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Replaces the client. Only valid while active.
    pub fn set_client(&self, client: Arc<C>) -> Result<()> {
        self.handle.get()?;
        self.client.set_client(client)
    }

    pub fn client(&self) -> Result<Arc<C>> {
        self.handle.get()?;
        self.client.client().ok_or(crate::LifecycleError::UseAfterDestroy {
            entity: self.kind.as_str(),
        })
    }

    /// Forwards an observational event. Silently dropped once destroyed.
    pub fn notify<F>(&self, what: &'static str, f: F)
    where
        F: FnOnce(&C) -> RemoteResult + Send + 'static,
    {
        if !self.is_active() {
            tracing::debug!(kind = %self.kind, what, "event for destroyed proxy ignored");
            return;
        }
        self.client.notify(what, f);
    }

    /// Asks the client a question on behalf of the engine. `None` when the
    /// proxy is already destroyed (the engine's request is moot); a transport
    /// failure is returned for the caller to pick a safe answer.
    pub fn query<T>(
        &self,
        what: &'static str,
        f: impl FnOnce(&C) -> RemoteResult<T>,
    ) -> Option<Result<T>> {
        if !self.is_active() {
            tracing::debug!(kind = %self.kind, what, "query for destroyed proxy ignored");
            return None;
        }
        Some(self.client.call(what, f))
    }

    /// Deletes the native object and drops the client. Safe to call again.
    /// Returns whether this call did the teardown.
    pub fn destroy(&self) -> bool {
        let handle = match self.handle.begin_destroy() {
            Ok(Some(handle)) => handle,
            // Idempotent discipline never errors; a repeat is a no-op.
            Ok(None) | Err(_) => return false,
        };

        self.engine.delete(self.kind, handle);
        self.handle.finish_destroy();
        self.client.detach();
        tracing::debug!(kind = %self.kind, handle = %handle, "callback proxy destroyed");
        true
    }
}
