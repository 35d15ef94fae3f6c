//! In-memory sink used by tests and dry runs

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Sink, SinkError};
use crate::models::CleanRecord;

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, CleanRecord>,
    /// Size of every bulk_insert call, in call order, failed ones included
    batch_sizes: Vec<usize>,
}

/// Identifier-keyed store held in memory
///
/// Inserting a batch that contains an already stored identifier fails the
/// whole batch, like a primary-key violation in a transactional store.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<State>,
    failing_batches: HashSet<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given bulk_insert calls fail (1-based call numbers)
    pub fn with_failing_batches(mut self, batches: impl IntoIterator<Item = usize>) -> Self {
        self.failing_batches.extend(batches);
        self
    }

    /// Stored records ordered by identifier
    pub fn records(&self) -> Vec<CleanRecord> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.records.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<CleanRecord> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.records.get(id).cloned()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.batch_sizes.clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn bulk_insert(&self, batch: &[CleanRecord]) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.batch_sizes.push(batch.len());

        let call = state.batch_sizes.len();
        if self.failing_batches.contains(&call) {
            return Err(SinkError::Unavailable(format!("injected failure for batch {}", call)));
        }

        let mut ids = HashSet::with_capacity(batch.len());
        for record in batch {
            if state.records.contains_key(&record.id) || !ids.insert(record.id.as_str()) {
                return Err(SinkError::DuplicateKey(record.id.clone()));
            }
        }

        for record in batch {
            state.records.insert(record.id.clone(), record.clone());
        }

        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.records.clear();
        Ok(())
    }

    async fn count(&self) -> Result<u64, SinkError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.records.len() as u64)
    }
}
