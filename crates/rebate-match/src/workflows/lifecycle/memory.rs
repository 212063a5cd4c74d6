use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::machine::LifecycleState;
use super::store::{Lifecycle, LifecycleStore, StoreError};
use super::LifecycleId;

/// Mutex-guarded reference store. Backs the demo server and the test
/// harnesses; the compare-and-swap contract lives here so every consumer
/// shares one implementation of it.
pub struct InMemoryLifecycleStore<R> {
    records: Arc<Mutex<HashMap<LifecycleId, R>>>,
}

impl<R> Default for InMemoryLifecycleStore<R> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<R> Clone for InMemoryLifecycleStore<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<R: Lifecycle> LifecycleStore<R> for InMemoryLifecycleStore<R> {
    fn insert(&self, record: R) -> Result<R, StoreError> {
        let mut guard = self.records.lock().expect("lifecycle store mutex poisoned");
        if guard.contains_key(record.lifecycle_id()) {
            return Err(StoreError::Conflict);
        }
        guard.insert(record.lifecycle_id().clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &LifecycleId) -> Result<Option<R>, StoreError> {
        let guard = self.records.lock().expect("lifecycle store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn commit_transition(
        &self,
        id: &LifecycleId,
        expected: R::State,
        apply: &mut dyn FnMut(&mut R),
    ) -> Result<R, StoreError> {
        let mut guard = self.records.lock().expect("lifecycle store mutex poisoned");
        let record = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        let found = record.current_state();
        if found != expected {
            return Err(StoreError::StaleState {
                expected: expected.label(),
                found: found.label(),
            });
        }
        apply(record);
        Ok(record.clone())
    }

    fn mutate(&self, id: &LifecycleId, apply: &mut dyn FnMut(&mut R)) -> Result<R, StoreError> {
        let mut guard = self.records.lock().expect("lifecycle store mutex poisoned");
        let record = guard.get_mut(id).ok_or(StoreError::NotFound)?;
        apply(record);
        Ok(record.clone())
    }
}
