//! Identity-keyed directories with lifecycle observers
//!
//! A registry holds the single live instance for each key. Entries go in
//! when the object is constructed and come out when it is destroyed.
//!
//! Broadcast convention: `on_removed` fires after the entry is gone from the
//! map but while the object is still readable (its handle has not been
//! zeroed yet). Owners remove the entry, then delete the native object.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::LifecycleError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Observers notified in registration order. Observers may add or remove
/// observers (including themselves) while being notified; one removed
/// mid-broadcast is not called afterwards.
pub struct ObserverList<O: ?Sized> {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Arc<O>)>>,
}

impl<O: ?Sized> ObserverList<O> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, observer: Arc<O>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.read().iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn for_each(&self, mut f: impl FnMut(&O)) {
        let snapshot: Vec<(ObserverId, Arc<O>)> = self
            .observers
            .read()
            .iter()
            .map(|(id, o)| (*id, Arc::clone(o)))
            .collect();

        for (id, observer) in snapshot {
            if self.contains(id) {
                f(&observer);
            }
        }
    }
}

impl<O: ?Sized> Default for ObserverList<O> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait RegistryObserver<V: ?Sized>: Send + Sync {
    fn on_added(&self, _value: &Arc<V>) {}
    fn on_removed(&self, _value: &Arc<V>) {}
}

struct Entry<V: ?Sized> {
    sequence: u64,
    value: Arc<V>,
}

pub struct Registry<K, V: ?Sized + 'static> {
    name: &'static str,
    next_sequence: AtomicU64,
    entries: RwLock<HashMap<K, Entry<V>>>,
    observers: ObserverList<dyn RegistryObserver<V>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: ?Sized + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_sequence: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
            observers: ObserverList::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registers a newly constructed object. A live entry under the same key
    /// is a bug in the caller's dedup logic.
    pub fn insert(&self, key: K, value: Arc<V>) -> Result<()> {
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&key) {
                return Err(LifecycleError::InvalidArgument(format!(
                    "{} already has an entry for {:?}",
                    self.name, key
                )));
            }
            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            entries.insert(
                key,
                Entry {
                    sequence,
                    value: Arc::clone(&value),
                },
            );
        }

        self.observers.for_each(|o| o.on_added(&value));
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.read().get(key).map(|e| Arc::clone(&e.value))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Removes the entry and tells observers. Returns the removed object.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed = self.entries.write().remove(key)?;
        self.observers.for_each(|o| o.on_removed(&removed.value));
        Some(removed.value)
    }

    /// Live objects in insertion order.
    pub fn values(&self) -> Vec<Arc<V>> {
        let entries = self.entries.read();
        let mut values: Vec<(u64, Arc<V>)> = entries
            .values()
            .map(|e| (e.sequence, Arc::clone(&e.value)))
            .collect();
        values.sort_by_key(|(sequence, _)| *sequence);
        values.into_iter().map(|(_, v)| v).collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<Arc<V>> {
        self.values().into_iter().find(|v| predicate(v))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn add_observer(&self, observer: Arc<dyn RegistryObserver<V>>) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
