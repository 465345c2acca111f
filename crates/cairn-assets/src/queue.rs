//! Deduplicating FIFO of assets waiting for a load attempt.

use std::collections::VecDeque;

use crate::handle::UntypedHandle;

/// Pending loads, oldest first.
///
/// Queue sizes per tick are expected to be small, so membership is a
/// linear scan rather than a side index.
#[derive(Debug, Default)]
pub struct LoadingQueue {
    pending: VecDeque<UntypedHandle>,
}

impl LoadingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handle` unless it is already pending.
    ///
    /// Returns `true` if the handle was added.
    pub fn push(&mut self, handle: UntypedHandle) -> bool {
        if self.contains(handle) {
            return false;
        }
        self.pending.push_back(handle);
        true
    }

    pub fn pop_front(&mut self) -> Option<UntypedHandle> {
        self.pending.pop_front()
    }

    pub fn contains(&self, handle: UntypedHandle) -> bool {
        self.pending.iter().any(|pending| *pending == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UntypedHandle> {
        self.pending.iter()
    }
}
