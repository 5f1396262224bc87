use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{SearchIndex, WorkshopDocument};
use crate::{Error, Result};

/// In-process index that records what it was sent.
///
/// Serves deployments with search disabled and the integration tests, which
/// inspect [`MemorySearchIndex::documents`] after a request.
#[derive(Default)]
pub struct MemorySearchIndex {
    documents: Mutex<BTreeMap<Uuid, WorkshopDocument>>,
    failing: AtomicBool,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, BTreeMap<Uuid, WorkshopDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn documents(&self) -> Vec<WorkshopDocument> {
        self.store().values().cloned().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<WorkshopDocument> {
        self.store().get(&id).cloned()
    }

    /// Makes every following call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ExternalService(
                "Search index is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index_all(&self, documents: &[WorkshopDocument]) -> Result<()> {
        self.check()?;
        let mut store = self.store();
        for document in documents {
            store.insert(document.id, document.clone());
        }
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<()> {
        self.check()?;
        let mut store = self.store();
        for id in ids {
            store.remove(id);
        }
        Ok(())
    }
}
