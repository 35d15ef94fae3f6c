//! Run-scoped duplicate detection

use std::collections::HashSet;

/// Identifiers accepted so far in one run
///
/// Each run builds its own instance; nothing is shared between runs.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, id: &str) -> bool {
        self.seen.contains(id.trim())
    }

    /// Register an identifier; only called once a record has been fully accepted
    pub fn mark_seen(&mut self, id: &str) {
        self.seen.insert(id.trim().to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
