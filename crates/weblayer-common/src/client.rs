//! Managed half of a remote client stub pair
//!
//! An object created from the engine side exists as a shell until the
//! embedder wires its client. Notifications sent to a shell are queued and
//! delivered, in order, by the first `set_client`. Once the native
//! counterpart is gone the slot is detached and nothing is forwarded again.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{LifecycleError, RemoteResult};
use crate::Result;

type PendingCall<C> = Box<dyn FnOnce(&C) -> RemoteResult + Send>;

enum SlotState<C: ?Sized> {
    Shell(Vec<(&'static str, PendingCall<C>)>),
    Connected(Arc<C>),
    Detached,
}

pub struct ClientSlot<C: ?Sized> {
    entity: &'static str,
    state: Mutex<SlotState<C>>,
}

impl<C: ?Sized + Send + Sync> ClientSlot<C> {
    /// A slot with no client yet.
    pub fn shell(entity: &'static str) -> Self {
        Self {
            entity,
            state: Mutex::new(SlotState::Shell(Vec::new())),
        }
    }

    pub fn connected(entity: &'static str, client: Arc<C>) -> Self {
        Self {
            entity,
            state: Mutex::new(SlotState::Connected(client)),
        }
    }

    /// Installs (or replaces) the remote peer. The previous peer is dropped
    /// and sees nothing further; queued shell notifications go to the new
    /// one exactly once.
    pub fn set_client(&self, client: Arc<C>) -> Result<()> {
        loop {
            let batch = {
                let mut state = self.state.lock();
                let batch = match &mut *state {
                    SlotState::Detached => {
                        return Err(LifecycleError::UseAfterDestroy {
                            entity: self.entity,
                        })
                    }
                    SlotState::Connected(_) => Vec::new(),
                    SlotState::Shell(pending) => std::mem::take(pending),
                };
                if batch.is_empty() {
                    *state = SlotState::Connected(Arc::clone(&client));
                    return Ok(());
                }
                batch
            };

            // Delivered with the lock released; anything queued meanwhile is
            // picked up by the next pass.
            for (what, call) in batch {
                if let Err(err) = call(&client) {
                    tracing::warn!(
                        entity = self.entity,
                        what,
                        error = %err,
                        "dropping queued notification"
                    );
                }
            }
        }
    }

    pub fn client(&self) -> Option<Arc<C>> {
        match &*self.state.lock() {
            SlotState::Connected(client) => Some(Arc::clone(client)),
            SlotState::Shell(_) | SlotState::Detached => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.state.lock(), SlotState::Connected(_))
    }

    pub fn is_detached(&self) -> bool {
        matches!(&*self.state.lock(), SlotState::Detached)
    }

    /// Best-effort notification. Queued while a shell, dropped once
    /// detached, and a transport failure is logged and swallowed.
    pub fn notify<F>(&self, what: &'static str, f: F)
    where
        F: FnOnce(&C) -> RemoteResult + Send + 'static,
    {
        let client = {
            let mut state = self.state.lock();
            match &mut *state {
                SlotState::Connected(client) => Arc::clone(client),
                SlotState::Shell(pending) => {
                    pending.push((what, Box::new(f)));
                    return;
                }
                SlotState::Detached => {
                    tracing::debug!(entity = self.entity, what, "client detached; not forwarding");
                    return;
                }
            }
        };

        if let Err(err) = f(&client) {
            tracing::warn!(entity = self.entity, what, error = %err, "remote notification failed");
        }
    }

    /// Transactional call: the caller needs the answer, so a missing client
    /// or a transport failure is an error.
    pub fn call<T>(&self, what: &'static str, f: impl FnOnce(&C) -> RemoteResult<T>) -> Result<T> {
        let client = match &*self.state.lock() {
            SlotState::Connected(client) => Arc::clone(client),
            SlotState::Shell(_) => {
                return Err(LifecycleError::InvalidState(format!(
                    "{} has no client for {}",
                    self.entity, what
                )))
            }
            SlotState::Detached => {
                return Err(LifecycleError::UseAfterDestroy {
                    entity: self.entity,
                })
            }
        };

        f(&client).map_err(|err| {
            tracing::warn!(entity = self.entity, what, error = %err, "remote call failed");
            LifecycleError::from(err)
        })
    }

    /// The native counterpart is gone. Drops the client and any queued
    /// notifications.
    pub fn detach(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), SlotState::Detached);
        drop(previous);
    }
}
