//! Managed half of a native handle pair
//!
//! ```text
//! Alive(handle)
//!   ↓ begin_destroy      (children released, observers told, handle still readable)
//! Destroying(handle)
//!   ↓ finish_destroy     (after the native delete)
//! Destroyed
//! ```

use parking_lot::Mutex;

use weblayer_native::NativeHandle;

use crate::error::LifecycleError;
use crate::sequence::SequenceChecker;
use crate::Result;

/// How a second destroy is treated. Fixed per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyDiscipline {
    /// Repeat destroys are silently ignored. Callback proxies and other
    /// leaf helpers.
    Idempotent,
    /// A repeat destroy is a caller bug and fails with `UseAfterDestroy`.
    /// Profiles, browsers, tabs, navigation controllers.
    Once,
    /// The engine created the object and announces its destruction; the
    /// managed side never deletes it. Navigations, pages, downloads.
    EngineOwned,
}

#[derive(Debug, Clone, Copy)]
enum HandleState {
    Alive(NativeHandle),
    Destroying(NativeHandle),
    Destroyed,
}

pub struct HandleCell {
    entity: &'static str,
    discipline: DestroyDiscipline,
    state: Mutex<HandleState>,
    sequence: SequenceChecker,
}

impl HandleCell {
    pub fn new(entity: &'static str, handle: NativeHandle, discipline: DestroyDiscipline) -> Self {
        Self {
            entity,
            discipline,
            state: Mutex::new(HandleState::Alive(handle)),
            sequence: SequenceChecker::new(),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn discipline(&self) -> DestroyDiscipline {
        self.discipline
    }

    /// The handle, or `UseAfterDestroy` once the native object is gone.
    /// Still readable while a destroy is in progress.
    pub fn get(&self) -> Result<NativeHandle> {
        self.sequence.check(self.entity);
        self.peek().ok_or(LifecycleError::UseAfterDestroy {
            entity: self.entity,
        })
    }

    /// The handle without failing; for engine callbacks that must quietly
    /// tolerate arriving late.
    pub fn peek(&self) -> Option<NativeHandle> {
        match *self.state.lock() {
            HandleState::Alive(handle) | HandleState::Destroying(handle) => Some(handle),
            HandleState::Destroyed => None,
        }
    }

    /// True only before any destroy has started.
    pub fn is_alive(&self) -> bool {
        matches!(*self.state.lock(), HandleState::Alive(_))
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(*self.state.lock(), HandleState::Destroyed)
    }

    /// Starts teardown. Returns the handle to delete, or `None` when an
    /// idempotent destroy has already happened (or is underway).
    pub fn begin_destroy(&self) -> Result<Option<NativeHandle>> {
        self.sequence.check(self.entity);
        let mut state = self.state.lock();
        match *state {
            HandleState::Alive(handle) => {
                *state = HandleState::Destroying(handle);
                Ok(Some(handle))
            }
            HandleState::Destroying(_) | HandleState::Destroyed => match self.discipline {
                DestroyDiscipline::Once => {
                    tracing::error!(entity = self.entity, "destroy called more than once");
                    Err(LifecycleError::UseAfterDestroy {
                        entity: self.entity,
                    })
                }
                DestroyDiscipline::Idempotent | DestroyDiscipline::EngineOwned => Ok(None),
            },
        }
    }

    /// Zeroes the handle. Call after the native delete.
    pub fn finish_destroy(&self) {
        *self.state.lock() = HandleState::Destroyed;
    }

    /// `begin_destroy` and `finish_destroy` in one step, for objects with no
    /// children or observers to notify in between.
    pub fn release(&self) -> Result<Option<NativeHandle>> {
        let handle = self.begin_destroy()?;
        self.finish_destroy();
        Ok(handle)
    }

    /// The engine announced it destroyed the object. Returns whether the
    /// handle was still set.
    pub fn on_engine_destroyed(&self) -> bool {
        let mut state = self.state.lock();
        let was_set = !matches!(*state, HandleState::Destroyed);
        *state = HandleState::Destroyed;
        was_set
    }
}

impl std::fmt::Debug for HandleCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCell")
            .field("entity", &self.entity)
            .field("discipline", &self.discipline)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: u64) -> NativeHandle {
        NativeHandle::new(raw).unwrap()
    }

    #[test]
    fn test_idempotent_release() {
        let cell = HandleCell::new("favicon", handle(8), DestroyDiscipline::Idempotent);
        assert_eq!(cell.release().unwrap(), Some(handle(8)));
        assert_eq!(cell.release().unwrap(), None);
        assert!(cell.get().unwrap_err().is_use_after_destroy());
    }

    #[test]
    fn test_once_release_fails_second_time() {
        let cell = HandleCell::new("tab", handle(8), DestroyDiscipline::Once);
        assert_eq!(cell.release().unwrap(), Some(handle(8)));
        assert_eq!(
            cell.release().unwrap_err(),
            LifecycleError::UseAfterDestroy { entity: "tab" }
        );
    }

    #[test]
    fn test_readable_while_destroying() {
        let cell = HandleCell::new("browser", handle(16), DestroyDiscipline::Once);
        let h = cell.begin_destroy().unwrap();
        assert_eq!(h, Some(handle(16)));
        assert!(!cell.is_alive());
        assert_eq!(cell.get().unwrap(), handle(16));

        // Re-entrant destroy while tearing down is still a second destroy.
        assert!(cell.begin_destroy().is_err());

        cell.finish_destroy();
        assert!(cell.is_destroyed());
        assert!(cell.peek().is_none());
    }

    #[test]
    fn test_engine_destroyed() {
        let cell = HandleCell::new("page", handle(24), DestroyDiscipline::EngineOwned);
        assert!(cell.on_engine_destroyed());
        assert!(!cell.on_engine_destroyed());
        assert!(cell.get().is_err());
    }
}
