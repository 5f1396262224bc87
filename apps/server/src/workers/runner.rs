//! Drives workers from the job queue listener
//!
//! Each worker gets its own task that listens for its job types and runs up to
//! `max_concurrent_jobs` jobs at once. A lost listener connection is re-opened
//! with jittered exponential backoff.

use super::base::Worker;
use crate::{
    config,
    queue::{Job, JobQueue},
    Error, Result,
};
use futures::StreamExt;
use std::{sync::Arc, time::Instant};
use tokio::{
    sync::{watch, Semaphore},
    task::JoinHandle,
    time::{sleep, Duration},
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkerRunnerConfig {
    pub max_concurrent_jobs: usize,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub reconnect_jitter_ratio: f64,
}

impl WorkerRunnerConfig {
    pub fn from_config(config: &config::WorkerConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
            reconnect_initial: Duration::from_secs(config.reconnect_initial_seconds.max(1)),
            reconnect_max: Duration::from_secs(config.reconnect_max_seconds.max(1)),
            reconnect_jitter_ratio: config.reconnect_jitter_ratio.clamp(0.0, 1.0),
        }
    }
}

pub fn spawn_workers_with_config(
    workers: Vec<Arc<dyn Worker>>,
    job_queue: Arc<dyn JobQueue>,
    config: WorkerRunnerConfig,
    shutdown: Option<watch::Receiver<bool>>,
) -> Vec<JoinHandle<Result<()>>> {
    workers
        .into_iter()
        .map(|worker| {
            tokio::spawn(run_worker(
                worker,
                job_queue.clone(),
                config.clone(),
                shutdown.clone(),
            ))
        })
        .collect()
}

async fn run_worker(
    worker: Arc<dyn Worker>,
    job_queue: Arc<dyn JobQueue>,
    config: WorkerRunnerConfig,
    mut shutdown: Option<watch::Receiver<bool>>,
) -> Result<()> {
    worker.start().await?;

    let job_types: Vec<String> = worker
        .supported_job_types()
        .iter()
        .map(|t| t.to_string())
        .collect();
    let permits = config.max_concurrent_jobs.max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut retry_delay = config.reconnect_initial;

    'listen: loop {
        let mut jobs = match job_queue.listen(&job_types).await {
            Ok(stream) => {
                retry_delay = config.reconnect_initial;
                stream
            }
            Err(e) => {
                tracing::error!(
                    worker = worker.name(),
                    error = %e,
                    retry_in = ?retry_delay,
                    "Failed to listen for jobs"
                );
                tokio::select! {
                    _ = sleep(jittered_duration(retry_delay, config.reconnect_jitter_ratio)) => {}
                    _ = wait_for_shutdown(&mut shutdown) => break 'listen,
                }
                retry_delay = (retry_delay * 2).min(config.reconnect_max);
                continue;
            }
        };

        loop {
            let next = tokio::select! {
                next = jobs.next() => next,
                _ = wait_for_shutdown(&mut shutdown) => break 'listen,
            };
            match next {
                Some(Ok(job)) => {
                    let permit = semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::Internal(format!("Worker semaphore closed: {e}")))?;
                    let worker = worker.clone();
                    let job_queue = job_queue.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        process(worker.as_ref(), job_queue.as_ref(), job).await;
                    });
                }
                Some(Err(e)) => {
                    tracing::warn!(worker = worker.name(), error = %e, "Job listener failed, reconnecting");
                    break;
                }
                None => break,
            }
        }
    }

    // Let in-flight jobs finish.
    let _ = semaphore.acquire_many(permits as u32).await;
    worker.stop().await
}

async fn process(worker: &dyn Worker, job_queue: &dyn JobQueue, job: Job) {
    let job_id = job.id;
    let job_type = job.job_type.clone();
    let retry = job.can_retry();
    let started = Instant::now();

    match worker.process_job(job).await {
        Ok(()) => tracing::debug!(
            worker = worker.name(),
            %job_id,
            %job_type,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job completed"
        ),
        Err(e) => {
            tracing::error!(
                worker = worker.name(),
                %job_id,
                %job_type,
                retry,
                error = %e,
                "Job failed"
            );
            if let Err(fail_err) = job_queue.fail_job(job_id, e.to_string(), retry).await {
                tracing::error!(%job_id, error = %fail_err, "Failed to record job failure");
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown else {
        return std::future::pending().await;
    };
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            // Sender gone without a signal: keep running.
            return std::future::pending().await;
        }
    }
}

pub fn jittered_duration(base: Duration, jitter_ratio: f64) -> Duration {
    if base.is_zero() || jitter_ratio <= 0.0 {
        return base;
    }

    let value = Uuid::new_v4().as_u128() as u64;
    let unit = (value as f64) / (u64::MAX as f64); // [0,1]
    let signed = unit * 2.0 - 1.0; // [-1,1]
    let factor = (1.0 + signed * jitter_ratio).max(0.0);
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_ratio() {
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            let d = jittered_duration(base, 0.2);
            assert!(d >= Duration::from_secs(8) && d <= Duration::from_secs(12));
        }
        assert_eq!(jittered_duration(base, 0.0), base);
    }

    #[tokio::test]
    async fn shutdown_signal_is_observed() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Some(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut shutdown))
            .await
            .unwrap();
    }
}
