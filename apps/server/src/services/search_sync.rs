//! Mirrors workshop rows into the search index through sync records.
//!
//! Writers record what changed with [`SearchSyncService::add_new_record`] and
//! enqueue a `search_sync` job; the job calls
//! [`SearchSyncService::synchronize`], which drains the oldest records in
//! Create, Update, Delete order.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Filter, OrderBy, Page, SyncRecordRepository, WorkshopRepository};
use crate::metrics::SEARCH_SYNC_OPERATIONS;
use crate::models::{SyncEntity, SyncOperation, SyncRecord};
use crate::queue::{job_types, JobPriority, JobQueue};
use crate::search::{SearchIndex, WorkshopDocument};
use crate::Result;

/// Outcome of one [`SearchSyncService::synchronize`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPass {
    /// Records applied to the index and removed.
    pub synchronized: usize,
    pub succeeded: bool,
    /// The pass read a full batch, so older records may still be waiting.
    pub more_pending: bool,
}

pub struct SearchSyncService {
    records: SyncRecordRepository,
    workshops: WorkshopRepository,
    index: Arc<dyn SearchIndex>,
    operations_per_task: i64,
    enabled: bool,
}

impl SearchSyncService {
    pub fn new(
        records: SyncRecordRepository,
        workshops: WorkshopRepository,
        index: Arc<dyn SearchIndex>,
        operations_per_task: i64,
        enabled: bool,
    ) -> Self {
        Self {
            records,
            workshops,
            index,
            operations_per_task,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a pending index change. Returns `None` when search is disabled.
    pub async fn add_new_record(
        &self,
        entity: SyncEntity,
        record_id: Uuid,
        operation: SyncOperation,
    ) -> Result<Option<Uuid>> {
        if !self.enabled {
            return Ok(None);
        }
        let id = self
            .records
            .create(entity, record_id, operation, Utc::now())
            .await?;
        tracing::debug!(%entity, %record_id, %operation, "Recorded search sync operation");
        Ok(Some(id))
    }

    /// Records `operation` for every workshop in `record_ids` and enqueues one
    /// `search_sync` job. A failed enqueue is logged; the periodic sync picks
    /// the records up later.
    pub async fn schedule(
        &self,
        queue: &dyn JobQueue,
        record_ids: &[Uuid],
        operation: SyncOperation,
    ) -> Result<()> {
        if !self.enabled || record_ids.is_empty() {
            return Ok(());
        }
        for &record_id in record_ids {
            self.add_new_record(SyncEntity::Workshop, record_id, operation)
                .await?;
        }
        if let Err(e) = queue
            .enqueue(
                job_types::SEARCH_SYNC.to_string(),
                serde_json::json!({}),
                JobPriority::Normal,
                None,
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to enqueue search sync job");
        }
        Ok(())
    }

    /// Runs one synchronization pass over at most `operations_per_task`
    /// records. When a step fails, the records of that step and every later
    /// step stay for the next pass.
    pub async fn synchronize(&self) -> Result<SyncPass> {
        let filter = Filter::eq("s.entity", SyncEntity::Workshop.as_str());
        let order = OrderBy::new().asc("s.operation_time").asc("s.id");
        let records = self
            .records
            .get(Page::new(0, self.operations_per_task), filter, &order)
            .await?;
        let mut pass = SyncPass {
            synchronized: 0,
            succeeded: true,
            more_pending: i64::try_from(records.len())
                .is_ok_and(|n| n >= self.operations_per_task),
        };
        if records.is_empty() {
            return Ok(pass);
        }
        tracing::info!(records = records.len(), "Synchronizing search index");

        for operation in [
            SyncOperation::Create,
            SyncOperation::Update,
            SyncOperation::Delete,
        ] {
            let batch: Vec<&SyncRecord> = records
                .iter()
                .filter(|r| r.operation == operation)
                .collect();
            if batch.is_empty() {
                continue;
            }

            match self.apply(operation, &batch).await {
                Ok(()) => {
                    let ids: Vec<Uuid> = batch.iter().map(|r| r.id).collect();
                    self.records.delete_many(&ids).await?;
                    pass.synchronized += ids.len();
                    SEARCH_SYNC_OPERATIONS
                        .with_label_values(&[operation.as_str(), "success"])
                        .inc();
                }
                Err(e) => {
                    SEARCH_SYNC_OPERATIONS
                        .with_label_values(&[operation.as_str(), "failure"])
                        .inc();
                    tracing::error!(%operation, records = batch.len(), error = %e, "Search index synchronization failed");
                    pass.succeeded = false;
                    return Ok(pass);
                }
            }
        }
        Ok(pass)
    }

    async fn apply(&self, operation: SyncOperation, batch: &[&SyncRecord]) -> Result<()> {
        let ids: Vec<Uuid> = distinct_record_ids(batch);
        match operation {
            SyncOperation::Delete => self.index.delete_by_ids(&ids).await,
            SyncOperation::Create | SyncOperation::Update => {
                let workshops = self
                    .workshops
                    .get_by_filter(Filter::is_in("w.id", ids))
                    .await?;
                let documents: Vec<WorkshopDocument> =
                    workshops.iter().map(WorkshopDocument::from).collect();
                if documents.is_empty() {
                    return Ok(());
                }
                self.index.index_all(&documents).await
            }
        }
    }
}

fn distinct_record_ids(batch: &[&SyncRecord]) -> Vec<Uuid> {
    batch
        .iter()
        .map(|r| r.record_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(record_id: Uuid, operation: SyncOperation) -> SyncRecord {
        SyncRecord {
            id: Uuid::new_v4(),
            entity: SyncEntity::Workshop,
            record_id,
            operation,
            operation_time: Utc::now(),
        }
    }

    #[test]
    fn repeated_changes_to_one_workshop_are_indexed_once() {
        let workshop = Uuid::new_v4();
        let other = Uuid::new_v4();
        let records = vec![
            record(workshop, SyncOperation::Update),
            record(other, SyncOperation::Update),
            record(workshop, SyncOperation::Update),
        ];
        let batch: Vec<&SyncRecord> = records.iter().collect();

        let ids = distinct_record_ids(&batch);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&workshop));
        assert!(ids.contains(&other));
    }
}
