//! Enrollment API server entry point.
//!
//! With `workers.embedded` (the default) the background workers and the job
//! scheduler run in-process. Set `workers.embedded: false` and start
//! `outofschool-worker` separately to scale them independently.

use anyhow::Context;
use clap::Parser;
use outofschool::{
    api::create_router,
    config::Config,
    logging,
    state::AppState,
    workers::{
        create_workers, scheduler_config, spawn_scheduler, spawn_workers_with_config,
        WorkerConfig, WorkerRunnerConfig, WorkerState,
    },
};
use tokio::{sync::watch, task::JoinHandle};

#[derive(Debug, Parser)]
#[clap(name = "outofschool-server", version, about = "Out-of-school enrollment API server")]
struct Args {
    /// Configuration file (defaults to config.yaml when present)
    #[clap(long, short)]
    config: Option<String>,
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
        "Starting enrollment server"
    );

    let addr = config
        .socket_addr()
        .context("Failed to determine socket address")?;

    let background = if config.workers.enabled && config.workers.embedded {
        Some(spawn_embedded_workers(&config).await?)
    } else {
        if !config.workers.embedded {
            tracing::info!("Embedded workers disabled, use the separate outofschool-worker binary");
        }
        None
    };

    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    let app = create_router(state);

    tracing::info!(listen_addr = %addr, "Enrollment server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server terminated unexpectedly");
    }

    if let Some(background) = background {
        tracing::info!("Shutting down embedded workers...");
        let _ = background.shutdown_tx.send(true);
        for handle in background.scheduler_handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler task join error");
            }
        }
        for handle in background.worker_handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Embedded worker ended with error"),
                Err(e) => tracing::error!(error = %e, "Embedded worker task join error"),
            }
        }
        tracing::info!("Embedded workers stopped");
    }

    tracing::info!("Server shutdown complete");
    logging::shutdown_telemetry();

    Ok(())
}

struct BackgroundHandles {
    shutdown_tx: watch::Sender<bool>,
    worker_handles: Vec<JoinHandle<outofschool::Result<()>>>,
    scheduler_handles: Vec<JoinHandle<()>>,
}

async fn spawn_embedded_workers(config: &Config) -> anyhow::Result<BackgroundHandles> {
    tracing::info!("Initializing embedded workers...");

    let worker_state = WorkerState::new(config.clone())
        .await
        .context("Failed to initialize embedded worker state")?;

    let worker_config = WorkerConfig {
        max_concurrent_jobs: config.workers.max_concurrent_jobs,
        poll_interval_seconds: config.workers.poll_interval_seconds,
    };
    let workers = create_workers(&worker_state, worker_config)
        .context("Failed to create embedded workers")?;

    for worker in &workers {
        tracing::info!(
            worker_name = worker.name(),
            supported_jobs = ?worker.supported_job_types(),
            "Embedded worker registered"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handles = spawn_scheduler(
        worker_state.job_queue.clone(),
        scheduler_config(config),
        shutdown_rx.clone(),
    );
    let worker_handles = spawn_workers_with_config(
        workers,
        worker_state.job_queue.clone(),
        WorkerRunnerConfig::from_config(&config.workers),
        Some(shutdown_rx),
    );

    tracing::info!(
        workers = worker_handles.len(),
        schedules = scheduler_handles.len(),
        "Embedded workers started"
    );

    Ok(BackgroundHandles {
        shutdown_tx,
        worker_handles,
        scheduler_handles,
    })
}

/// Resolves on SIGTERM or SIGINT.
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
            tracing::info!("SIGINT received, starting graceful shutdown...");
        }
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received, starting graceful shutdown...");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
