//! Background worker entry point.
//!
//! Runs the search synchronization and maintenance workers plus the job
//! scheduler, separately from the API server.

use anyhow::Context;
use clap::Parser;
use outofschool::{
    config::Config,
    logging,
    workers::{
        create_workers, jittered_duration, scheduler_config, spawn_scheduler,
        spawn_workers_with_config, WorkerConfig, WorkerRunnerConfig, WorkerState,
    },
};
use tokio::time::{sleep, Duration};

#[derive(Debug, Parser)]
#[clap(name = "outofschool-worker", version, about = "Out-of-school enrollment background workers")]
struct Args {
    /// Configuration file (defaults to config.yaml when present)
    #[clap(long, short)]
    config: Option<String>,

    /// Run one search synchronization pass and exit
    #[clap(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load_from(args.config.as_deref()).context("Failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _telemetry_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging/telemetry")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.logging.deployment_environment,
        "Starting background workers"
    );

    if args.once {
        let state = init_worker_state_with_retry(&config).await?;
        let pass = state
            .search_sync
            .synchronize()
            .await
            .context("Search synchronization failed")?;
        tracing::info!(
            synchronized = pass.synchronized,
            succeeded = pass.succeeded,
            more_pending = pass.more_pending,
            "Single search synchronization pass finished"
        );
        logging::shutdown_telemetry();
        return Ok(());
    }

    if !config.workers.enabled {
        tracing::warn!("Workers are disabled in configuration");
        return Ok(());
    }

    if config.workers.embedded {
        tracing::warn!(
            "workers.embedded is true, so workers also run inside the API server. \
             Set workers.embedded=false when using this binary."
        );
    }

    tracing::info!(
        max_concurrent = config.workers.max_concurrent_jobs,
        poll_interval_seconds = config.workers.poll_interval_seconds,
        "Worker configuration loaded"
    );

    let state = init_worker_state_with_retry(&config).await?;

    let worker_config = WorkerConfig {
        max_concurrent_jobs: config.workers.max_concurrent_jobs,
        poll_interval_seconds: config.workers.poll_interval_seconds,
    };
    let workers = create_workers(&state, worker_config).context("Failed to create workers")?;

    for worker in &workers {
        tracing::info!(
            worker_name = worker.name(),
            supported_jobs = ?worker.supported_job_types(),
            "Worker registered"
        );
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handles = spawn_scheduler(
        state.job_queue.clone(),
        scheduler_config(&config),
        shutdown_rx.clone(),
    );
    let handles = spawn_workers_with_config(
        workers,
        state.job_queue.clone(),
        WorkerRunnerConfig::from_config(&config.workers),
        Some(shutdown_rx),
    );

    tracing::info!("Workers running. Press Ctrl+C to stop.");

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    for handle in scheduler_handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task join error");
        }
    }
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Worker task ended with error"),
            Err(e) => tracing::error!(error = %e, "Worker task join error"),
        }
    }

    tracing::info!("Worker shutdown complete");
    logging::shutdown_telemetry();

    Ok(())
}

/// Retries on database errors so a worker started before Postgres does not exit.
async fn init_worker_state_with_retry(config: &Config) -> anyhow::Result<WorkerState> {
    let initial = Duration::from_secs(config.workers.reconnect_initial_seconds.max(1));
    let max = Duration::from_secs(config.workers.reconnect_max_seconds.max(1));
    let jitter_ratio = config.workers.reconnect_jitter_ratio;

    let mut retry_delay = initial;
    loop {
        match WorkerState::new(config.clone()).await {
            Ok(state) => return Ok(state),
            Err(outofschool::Error::Database(e)) => {
                tracing::error!(
                    error = %e,
                    retry_in = ?retry_delay,
                    "Failed to initialize worker state, database unavailable"
                );
                sleep(jittered_duration(retry_delay, jitter_ratio)).await;
                retry_delay = (retry_delay * 2).min(max);
            }
            Err(e) => return Err(anyhow::anyhow!(e)).context("Failed to initialize worker state"),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, stopping workers...");
        }
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received, stopping workers...");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown signal received, stopping workers...");
}
