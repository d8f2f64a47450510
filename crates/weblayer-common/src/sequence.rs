//! UI sequence affinity

use std::thread::{self, ThreadId};

/// Remembers the thread it was created on and asserts later accesses happen
/// there. Every managed object lives on that one sequence; workers hand
/// their results back through [`crate::TaskRunner`].
#[derive(Debug)]
pub struct SequenceChecker {
    owner: ThreadId,
}

impl SequenceChecker {
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    pub fn called_on_valid_sequence(&self) -> bool {
        thread::current().id() == self.owner
    }

    #[track_caller]
    pub fn check(&self, what: &str) {
        assert!(
            self.called_on_valid_sequence(),
            "{} accessed off its owning sequence",
            what
        );
    }
}

impl Default for SequenceChecker {
    fn default() -> Self {
        Self::new()
    }
}
