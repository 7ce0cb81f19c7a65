use std::collections::VecDeque;

use crate::buffer::WritePageGuard;

/// Per-operation container for write-latched ancestor pages.
///
/// During a pessimistic descent the tree deposits each ancestor's write
/// guard here; once a node proves safe, or after the structural change
/// completes, the set is released in reverse acquisition order.
#[derive(Default)]
pub struct Transaction {
    page_set: VecDeque<WritePageGuard>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.page_set.is_empty()
    }

    pub(crate) fn add_into_page_set(&mut self, guard: WritePageGuard) {
        self.page_set.push_back(guard);
    }

    /// Takes back the most recently deposited ancestor (the parent of the
    /// node currently being worked on).
    pub(crate) fn pop_page_set(&mut self) -> Option<WritePageGuard> {
        self.page_set.pop_back()
    }

    /// Drops all held guards, deepest first.
    pub(crate) fn release_all(&mut self) {
        while self.page_set.pop_back().is_some() {}
    }
}
