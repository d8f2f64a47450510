//! Monotonic id spaces
//!
//! Ids are never handed out twice. Download notification ids are used to
//! address downloads from outside the process, and a recycled id could route
//! a stale action to an unrelated download; tab ids follow the same rule so
//! there is one policy to reason about.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use crate::error::LifecycleError;
use crate::Result;

#[derive(Debug)]
pub struct IdAllocator {
    what: &'static str,
    next: AtomicI32,
}

impl IdAllocator {
    pub fn new(what: &'static str) -> Self {
        Self::starting_at(what, 1)
    }

    /// Resumes an id space, e.g. from a persisted high-water mark.
    pub fn starting_at(what: &'static str, first: i32) -> Self {
        Self {
            what,
            next: AtomicI32::new(first),
        }
    }

    pub fn next(&self) -> Result<i32> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| LifecycleError::InvalidState(format!("{} id space exhausted", self.what)))
    }

    /// The id the next call to [`IdAllocator::next`] would return.
    pub fn peek_next(&self) -> i32 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Request counter for operations that can be superseded. Only the most
/// recent request id is current.
#[derive(Debug, Default)]
pub struct RequestCounter {
    current: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.current() == id
    }

    /// Makes every outstanding request id stale.
    pub fn invalidate(&self) {
        self.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let ids = IdAllocator::new("tab");
        assert_eq!(ids.next().unwrap(), 1);
        assert_eq!(ids.next().unwrap(), 2);
        assert_eq!(ids.peek_next(), 3);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let ids = IdAllocator::starting_at("download", i32::MAX);
        assert!(matches!(ids.next(), Err(LifecycleError::InvalidState(_))));
    }

    #[test]
    fn test_request_counter() {
        let counter = RequestCounter::new();
        let first = counter.next();
        let second = counter.next();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        counter.invalidate();
        assert!(!counter.is_current(second));
    }
}
