//! Enqueues recurring jobs on fixed intervals

use crate::queue::{job_types, JobPriority, JobQueue};
use std::sync::Arc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// `None` when search synchronization is disabled.
    pub search_sync_interval: Option<Duration>,
    pub maintenance_interval: Duration,
    pub job_retention_days: i32,
}

/// A recurring job and the interval it is enqueued on.
struct Schedule {
    job_type: &'static str,
    parameters: serde_json::Value,
    priority: JobPriority,
    every: Duration,
}

fn schedules(config: &SchedulerConfig) -> Vec<Schedule> {
    let mut schedules = Vec::new();
    if let Some(every) = config.search_sync_interval {
        schedules.push(Schedule {
            job_type: job_types::SEARCH_SYNC,
            parameters: serde_json::json!({}),
            priority: JobPriority::Normal,
            every,
        });
    }
    schedules.push(Schedule {
        job_type: job_types::APPLICATION_STUDYING,
        parameters: serde_json::json!({}),
        priority: JobPriority::Low,
        every: config.maintenance_interval,
    });
    schedules.push(Schedule {
        job_type: job_types::CLEANUP_JOBS,
        parameters: serde_json::json!({ "days": config.job_retention_days }),
        priority: JobPriority::Low,
        every: config.maintenance_interval,
    });
    schedules
}

/// Spawns one ticker per recurring job. Tickers stop when `shutdown` flips.
pub fn spawn_scheduler(
    job_queue: Arc<dyn JobQueue>,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    schedules(&config)
        .into_iter()
        .map(|schedule| {
            let job_queue = job_queue.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = interval(schedule.every.max(Duration::from_secs(1)));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick fires immediately; skip it so start-up stays quiet.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                            continue;
                        }
                    }
                    match job_queue
                        .enqueue(
                            schedule.job_type.to_string(),
                            schedule.parameters.clone(),
                            schedule.priority,
                            None,
                        )
                        .await
                    {
                        Ok(job_id) => {
                            tracing::debug!(%job_id, job_type = schedule.job_type, "Scheduled job")
                        }
                        Err(e) => tracing::warn!(
                            job_type = schedule.job_type,
                            error = %e,
                            "Failed to schedule job"
                        ),
                    }
                }
                tracing::debug!(job_type = schedule.job_type, "Scheduler stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_sync_is_only_scheduled_when_enabled() {
        let mut config = SchedulerConfig {
            search_sync_interval: None,
            maintenance_interval: Duration::from_secs(3600),
            job_retention_days: 7,
        };
        let types: Vec<_> = schedules(&config).iter().map(|s| s.job_type).collect();
        assert_eq!(
            types,
            vec![job_types::APPLICATION_STUDYING, job_types::CLEANUP_JOBS]
        );

        config.search_sync_interval = Some(Duration::from_secs(60));
        let all = schedules(&config);
        assert_eq!(all[0].job_type, job_types::SEARCH_SYNC);
        assert_eq!(all[2].parameters["days"], 7);
    }
}
