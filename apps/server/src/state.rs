//! Shared application state

use crate::{
    auth::{CurrentUser, JwtAuth},
    config::Config,
    db::{
        AchievementRepository, AdminRepository, ApplicationRepository, ChangesLogRepository,
        ChatMessageRepository, ChatRoomRepository, ChildRepository, CodeficatorRepository,
        NotificationRepository, ParentRepository, ProviderRepository, SyncRecordRepository,
        UserRepository, WorkshopRepository,
    },
    identity::{HttpIdentityClient, IdentityApi},
    push::Hub,
    queue::{InlineJobQueue, JobQueue, PostgresJobQueue},
    search::{ElasticsearchIndex, SearchIndex},
    services::{
        AchievementService, AdminScope, AdminService, ApplicationService, ChangesLogService,
        ChatService, ChildService, CodeficatorService, NotificationService, ParentService,
        ProviderService, SearchSyncService, UserService, WorkshopService,
    },
    Result,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub enum JobQueueKind {
    /// Persist jobs in Postgres and rely on background workers.
    Postgres,
    /// Execute supported jobs immediately in-process (useful for tests).
    Inline,
}

#[derive(Clone)]
pub struct AppStateOptions {
    pub run_migrations: bool,
    pub job_queue: JobQueueKind,
    /// Replaces the Elasticsearch index built from `config.search`.
    pub search_index: Option<Arc<dyn SearchIndex>>,
    /// Replaces the HTTP identity server client built from `config.identity`.
    pub identity: Option<Arc<dyn IdentityApi>>,
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
            job_queue: JobQueueKind::Postgres,
            search_index: None,
            identity: None,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<JwtAuth>,
    pub db_pool: PgPool,
    pub job_queue: Arc<dyn JobQueue>,
    pub hub: Arc<Hub>,
    pub search_index: Arc<dyn SearchIndex>,
    pub admins_repo: AdminRepository,
    pub applications_repo: ApplicationRepository,
    pub user_service: Arc<UserService>,
    pub parent_service: Arc<ParentService>,
    pub child_service: Arc<ChildService>,
    pub provider_service: Arc<ProviderService>,
    pub workshop_service: Arc<WorkshopService>,
    pub application_service: Arc<ApplicationService>,
    pub achievement_service: Arc<AchievementService>,
    pub admin_service: Arc<AdminService>,
    pub chat_service: Arc<ChatService>,
    pub codeficator_service: Arc<CodeficatorService>,
    pub changes_log_service: Arc<ChangesLogService>,
    pub notification_service: Arc<NotificationService>,
    pub search_sync_service: Arc<SearchSyncService>,
}

impl AppState {
    /// Initialize the application state
    pub async fn new(config: Config) -> Result<Self> {
        Self::new_with_options(config, AppStateOptions::default()).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        let db_pool = create_db_pool(&config).await?;
        Self::from_pool(config, db_pool, options).await
    }

    /// Builds the state over an existing pool.
    pub async fn from_pool(config: Config, db_pool: PgPool, options: AppStateOptions) -> Result<Self> {
        tracing::info!("Initializing application state...");

        if options.run_migrations {
            run_migrations(&db_pool).await?;
        }

        let config = Arc::new(config);
        let auth = Arc::new(JwtAuth::new(&config.auth));
        let hub = Arc::new(Hub::new());

        let users = UserRepository::new(db_pool.clone());
        let parents = ParentRepository::new(db_pool.clone());
        let children = ChildRepository::new(db_pool.clone());
        let providers = ProviderRepository::new(db_pool.clone());
        let workshops = WorkshopRepository::new(db_pool.clone());
        let applications = ApplicationRepository::new(db_pool.clone());
        let admins = AdminRepository::new(db_pool.clone());

        let search_index: Arc<dyn SearchIndex> = match options.search_index {
            Some(index) => index,
            None => Arc::new(ElasticsearchIndex::new(&config.search)?),
        };
        let identity: Arc<dyn IdentityApi> = match options.identity {
            Some(identity) => identity,
            None => Arc::new(HttpIdentityClient::new(&config.identity)?),
        };

        let codeficator_service = Arc::new(CodeficatorService::new(CodeficatorRepository::new(
            db_pool.clone(),
        )));
        let changes_log_service = Arc::new(ChangesLogService::new(
            ChangesLogRepository::new(db_pool.clone()),
            config.changes_log.clone(),
        ));
        let notification_service = Arc::new(NotificationService::new(
            NotificationRepository::new(db_pool.clone()),
            hub.clone(),
            config.notifications.clone(),
        ));
        let search_sync_service = Arc::new(SearchSyncService::new(
            SyncRecordRepository::new(db_pool.clone()),
            workshops.clone(),
            search_index.clone(),
            config.search.operations_per_task,
            config.search.enabled,
        ));

        // Create job queue (may run jobs inline for tests).
        let job_queue: Arc<dyn JobQueue> = match options.job_queue {
            JobQueueKind::Postgres => Arc::new(PostgresJobQueue::new(
                db_pool.clone(),
                config.workers.poll_interval_seconds,
            )),
            JobQueueKind::Inline => Arc::new(InlineJobQueue::new(
                search_sync_service.clone(),
                applications.clone(),
            )),
        };

        let workshop_service = Arc::new(WorkshopService::new(
            workshops.clone(),
            providers.clone(),
            codeficator_service.clone(),
            search_sync_service.clone(),
            job_queue.clone(),
        ));
        let provider_service = Arc::new(ProviderService::new(
            providers.clone(),
            workshops.clone(),
            changes_log_service.clone(),
            notification_service.clone(),
            search_sync_service.clone(),
            codeficator_service.clone(),
            job_queue.clone(),
        ));
        let application_service = Arc::new(ApplicationService::new(
            applications.clone(),
            workshops.clone(),
            children.clone(),
            parents.clone(),
            providers.clone(),
            workshop_service.clone(),
            changes_log_service.clone(),
            notification_service.clone(),
            config.applications.clone(),
        ));
        let chat_service = Arc::new(ChatService::new(
            ChatRoomRepository::new(db_pool.clone()),
            ChatMessageRepository::new(db_pool.clone()),
            workshops,
            parents.clone(),
            providers,
            hub.clone(),
            notification_service.clone(),
        ));
        let admin_service = Arc::new(AdminService::new(
            admins.clone(),
            users.clone(),
            codeficator_service.clone(),
            identity,
        ));

        tracing::info!(
            search_enabled = config.search.enabled,
            notifications_enabled = config.notifications.enabled,
            auth_enabled = config.auth.enabled,
            "Application state initialized successfully"
        );

        Ok(Self {
            user_service: Arc::new(UserService::new(users.clone())),
            parent_service: Arc::new(ParentService::new(parents.clone(), users)),
            child_service: Arc::new(ChildService::new(children, parents)),
            achievement_service: Arc::new(AchievementService::new(AchievementRepository::new(
                db_pool.clone(),
            ))),
            config,
            auth,
            db_pool,
            job_queue,
            hub,
            search_index,
            admins_repo: admins,
            applications_repo: applications,
            provider_service,
            workshop_service,
            application_service,
            admin_service,
            chat_service,
            codeficator_service,
            changes_log_service,
            notification_service,
            search_sync_service,
        })
    }

    /// Visibility of the caller as an administrator.
    pub async fn scope_of(&self, user: &CurrentUser) -> Result<AdminScope> {
        AdminScope::resolve(user, &self.admins_repo, &self.codeficator_service).await
    }
}

pub async fn run_migrations(db_pool: &PgPool) -> Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(db_pool)
        .await
        .map_err(|e| match e {
            sqlx::migrate::MigrateError::Execute(db_err) => crate::Error::Database(db_err),
            other => crate::Error::Internal(format!("Migration failed: {other}")),
        })
}

pub async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;
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
        min = config.database.pool_min_size,
        max = config.database.pool_max_size,
        "Database pool created"
    );

    Ok(pool)
}
