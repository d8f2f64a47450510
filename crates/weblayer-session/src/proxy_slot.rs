//! Optional per-feature callback proxies
//!
//! Setting a client creates the proxy (and its native counterpart) the first
//! time, re-points it afterwards, and `None` destroys it.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::SessionError;
use crate::Result;

pub(crate) type ProxySlot<P> = Mutex<Option<Arc<P>>>;

pub(crate) fn install<P, C, E>(
    slot: &ProxySlot<P>,
    client: Option<Arc<C>>,
    create: impl FnOnce(Arc<C>) -> P,
    set_client: impl FnOnce(&P, Arc<C>) -> std::result::Result<(), E>,
    destroy: impl FnOnce(&P) -> bool,
) -> Result<()>
where
    C: ?Sized,
    SessionError: From<E>,
{
    let existing = slot.lock().clone();
    match (existing, client) {
        (Some(proxy), Some(client)) => set_client(&proxy, client)?,
        (None, Some(client)) => {
            let proxy = Arc::new(create(client));
            *slot.lock() = Some(proxy);
        }
        (Some(proxy), None) => {
            slot.lock().take();
            destroy(&proxy);
        }
        (None, None) => {}
    }
    Ok(())
}

/// Takes the proxy out of its slot and destroys it.
pub(crate) fn clear<P>(slot: &ProxySlot<P>, destroy: impl FnOnce(&P) -> bool) {
    let existing = slot.lock().take();
    if let Some(proxy) = existing {
        destroy(&proxy);
    }
}
