//! Pushes recorded workshop changes to the search index

use super::base::Worker;
use crate::{
    queue::{job_types, Job, JobQueue},
    services::SearchSyncService,
    Error, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Later records wait for the next scheduled job.
const MAX_PASSES_PER_JOB: usize = 20;

pub struct SearchSyncWorker {
    job_queue: Arc<dyn JobQueue>,
    search_sync: Arc<SearchSyncService>,
}

impl SearchSyncWorker {
    pub fn new(job_queue: Arc<dyn JobQueue>, search_sync: Arc<SearchSyncService>) -> Self {
        Self {
            job_queue,
            search_sync,
        }
    }
}

#[async_trait]
impl Worker for SearchSyncWorker {
    fn name(&self) -> &str {
        "SearchSyncWorker"
    }

    fn supported_job_types(&self) -> &[&str] {
        &[job_types::SEARCH_SYNC]
    }

    /// Drains the backlog pass by pass, reporting progress and stopping early
    /// when the job is cancelled.
    async fn process_job(&self, job: Job) -> Result<()> {
        tracing::debug!(job_id = %job.id, "{} processing job", self.name());

        let mut synchronized = 0usize;
        for pass_number in 1..=MAX_PASSES_PER_JOB {
            if self.job_queue.is_cancelled(job.id).await? {
                tracing::info!(job_id = %job.id, synchronized, "Search sync job cancelled");
                return Ok(());
            }

            let pass = self.search_sync.synchronize().await?;
            synchronized += pass.synchronized;
            self.job_queue
                .update_progress(
                    job.id,
                    i32::try_from(synchronized).unwrap_or(i32::MAX),
                    None,
                    Some(serde_json::json!({ "passes": pass_number })),
                )
                .await?;

            if !pass.succeeded {
                // Records stay in place, the retry picks them up.
                return Err(Error::ExternalService(
                    "Search index synchronization failed".to_string(),
                ));
            }
            if !pass.more_pending {
                break;
            }
        }

        self.job_queue
            .complete_job(
                job.id,
                Some(serde_json::json!({ "synchronized": synchronized })),
            )
            .await
    }
}
