//! Lightweight state for background workers
//!
//! Workers need the job queue, the search synchronization service and the
//! application repository; none of the HTTP-side services are built.

use crate::{
    config::Config,
    db::{ApplicationRepository, SyncRecordRepository, WorkshopRepository},
    queue::{JobQueue, PostgresJobQueue},
    search::{ElasticsearchIndex, SearchIndex},
    services::SearchSyncService,
    state::run_migrations,
    Result,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct WorkerState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub job_queue: Arc<dyn JobQueue>,
    pub search_sync: Arc<SearchSyncService>,
    pub applications: ApplicationRepository,
}

impl WorkerState {
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!("Initializing worker state...");

        let db_pool = create_db_pool(&config).await?;
        run_migrations(&db_pool).await?;

        let job_queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(
            db_pool.clone(),
            config.workers.poll_interval_seconds,
        ));

        let index: Arc<dyn SearchIndex> = Arc::new(ElasticsearchIndex::new(&config.search)?);
        let search_sync = Arc::new(SearchSyncService::new(
            SyncRecordRepository::new(db_pool.clone()),
            WorkshopRepository::new(db_pool.clone()),
            index,
            config.search.operations_per_task,
            config.search.enabled,
        ));

        tracing::info!(
            search_enabled = config.search.enabled,
            "Worker state initialized successfully"
        );

        Ok(Self {
            applications: ApplicationRepository::new(db_pool.clone()),
            config: Arc::new(config),
            db_pool,
            job_queue,
            search_sync,
        })
    }
}

async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating worker database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.worker_pool_min_size)
        .max_connections(config.database.worker_pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.worker_pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;
                // Fail fast instead of queueing behind long locks.
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database.url)
        .await
        .map_err(crate::Error::Database)?;

    tracing::info!(
        min = config.database.worker_pool_min_size,
        max = config.database.worker_pool_max_size,
        "Worker database pool created"
    );

    Ok(pool)
}
