use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{EvidenceId, EvidenceItem};
use crate::workflows::lifecycle::{LifecycleId, StoreError};

/// Storage abstraction for evidence metadata so the service module can be
/// exercised in isolation. The application records themselves live behind
/// the generic [`LifecycleStore`](crate::workflows::lifecycle::LifecycleStore).
pub trait EvidenceStore: Send + Sync {
    fn insert(&self, item: EvidenceItem) -> Result<EvidenceItem, StoreError>;

    fn fetch(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>, StoreError>;

    /// Every item ever submitted for the lifecycle, superseded ones included.
    fn all_for_lifecycle(&self, id: &LifecycleId) -> Result<Vec<EvidenceItem>, StoreError>;

    /// Items that still count toward readiness.
    fn active_for_lifecycle(&self, id: &LifecycleId) -> Result<Vec<EvidenceItem>, StoreError>;

    fn update(&self, item: EvidenceItem) -> Result<(), StoreError>;
}

/// Mutex-backed evidence store for the demo server and test harnesses.
#[derive(Default, Clone)]
pub struct InMemoryEvidenceStore {
    items: Arc<Mutex<HashMap<EvidenceId, EvidenceItem>>>,
}

impl EvidenceStore for InMemoryEvidenceStore {
    fn insert(&self, item: EvidenceItem) -> Result<EvidenceItem, StoreError> {
        let mut guard = self.items.lock().expect("evidence mutex poisoned");
        if guard.contains_key(&item.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn fetch(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>, StoreError> {
        let guard = self.items.lock().expect("evidence mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn all_for_lifecycle(&self, id: &LifecycleId) -> Result<Vec<EvidenceItem>, StoreError> {
        let guard = self.items.lock().expect("evidence mutex poisoned");
        let mut items: Vec<EvidenceItem> = guard
            .values()
            .filter(|item| &item.lifecycle_id == id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(items)
    }

    fn active_for_lifecycle(&self, id: &LifecycleId) -> Result<Vec<EvidenceItem>, StoreError> {
        let mut items = self.all_for_lifecycle(id)?;
        items.retain(|item| item.superseded_by.is_none());
        Ok(items)
    }

    fn update(&self, item: EvidenceItem) -> Result<(), StoreError> {
        let mut guard = self.items.lock().expect("evidence mutex poisoned");
        if !guard.contains_key(&item.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(item.id.clone(), item);
        Ok(())
    }
}
