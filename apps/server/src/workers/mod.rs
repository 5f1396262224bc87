//! Background workers
//!
//! Workers run either embedded in the API server or in the standalone
//! `outofschool-worker` binary. Both share the same queue-driven runner.

mod base;
mod maintenance;
mod runner;
mod scheduler;
mod search_sync;
mod state;

pub use base::{Worker, WorkerConfig};
pub use maintenance::MaintenanceWorker;
pub use runner::{jittered_duration, spawn_workers_with_config, WorkerRunnerConfig};
pub use scheduler::{spawn_scheduler, SchedulerConfig};
pub use search_sync::SearchSyncWorker;
pub use state::WorkerState;

use crate::{
    config::Config,
    db::ApplicationRepository,
    queue::JobQueue,
    services::SearchSyncService,
    Result,
};
use std::{sync::Arc, time::Duration};

/// Builds the worker set from its dependencies.
pub fn build_workers(
    job_queue: Arc<dyn JobQueue>,
    search_sync: Arc<SearchSyncService>,
    applications: ApplicationRepository,
    config: &Config,
) -> Vec<Arc<dyn Worker>> {
    vec![
        Arc::new(SearchSyncWorker::new(job_queue.clone(), search_sync)),
        Arc::new(MaintenanceWorker::new(
            job_queue,
            applications,
            config.workers.job_retention_days,
        )),
    ]
}

pub fn create_workers(state: &WorkerState, config: WorkerConfig) -> Result<Vec<Arc<dyn Worker>>> {
    tracing::debug!(
        max_concurrent_jobs = config.max_concurrent_jobs,
        poll_interval_seconds = config.poll_interval_seconds,
        "Creating workers"
    );
    Ok(build_workers(
        state.job_queue.clone(),
        state.search_sync.clone(),
        state.applications.clone(),
        &state.config,
    ))
}

pub fn scheduler_config(config: &Config) -> SchedulerConfig {
    SchedulerConfig {
        search_sync_interval: config
            .search
            .enabled
            .then(|| Duration::from_secs(config.search.sync_interval_seconds.max(1))),
        maintenance_interval: Duration::from_secs(config.workers.maintenance_interval_seconds.max(1)),
        job_retention_days: config.workers.job_retention_days,
    }
}
