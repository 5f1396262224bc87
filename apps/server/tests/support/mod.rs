//! Shared integration test harness.
//!
//! Every test gets its own Postgres schema on the database named by
//! `OOS_TEST_DATABASE_URL`; tests are skipped when the variable is unset.
//! Jobs run inline, the search index is in memory and the identity server
//! is stubbed.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use outofschool::{
    api::create_router,
    config::Config,
    identity::{IdentityApi, IdentityResponse},
    models::{AdminInput, AdminKind, Role},
    search::MemorySearchIndex,
    state::{AppState, AppStateOptions, JobQueueKind},
};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Identity server stand-in: succeeds unless told otherwise and records calls.
#[derive(Default)]
pub struct StubIdentity {
    failure: Mutex<Option<u16>>,
    calls: Mutex<Vec<String>>,
}

impl StubIdentity {
    pub fn fail_with(&self, status: u16) {
        *self.failure.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: String, result: Option<Value>) -> IdentityResponse {
        self.calls.lock().unwrap().push(call);
        match *self.failure.lock().unwrap() {
            Some(status) => IdentityResponse {
                is_success: false,
                http_status_code: status,
                message: Some("Rejected by identity server".to_string()),
                result: None,
            },
            None => IdentityResponse::success(result),
        }
    }
}

#[async_trait]
impl IdentityApi for StubIdentity {
    async fn create_admin(
        &self,
        kind: AdminKind,
        _input: &AdminInput,
        _token: &str,
    ) -> outofschool::Result<IdentityResponse> {
        let user_id = Uuid::new_v4().to_string();
        Ok(self.respond(format!("create {kind}"), Some(json!({ "userId": user_id }))))
    }

    async fn update_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        _input: &AdminInput,
        _token: &str,
    ) -> outofschool::Result<IdentityResponse> {
        Ok(self.respond(format!("update {kind} {user_id}"), None))
    }

    async fn delete_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        _token: &str,
    ) -> outofschool::Result<IdentityResponse> {
        Ok(self.respond(format!("delete {kind} {user_id}"), None))
    }

    async fn block_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        is_blocked: bool,
        _token: &str,
    ) -> outofschool::Result<IdentityResponse> {
        Ok(self.respond(format!("block {kind} {user_id} {is_blocked}"), None))
    }
}

#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub search: Arc<MemorySearchIndex>,
    pub identity: Arc<StubIdentity>,
}

impl TestApp {
    /// Bearer token for `user_id` acting as `role`.
    pub fn token(&self, user_id: &str, role: Role) -> String {
        self.state.auth.issue(user_id, role, None).unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        self.request_with_extra_headers(method, path, body, &[]).await
    }

    pub async fn request_as(
        &self,
        token: &str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let authorization = format!("Bearer {token}");
        self.request_with_extra_headers(
            method,
            path,
            body,
            &[("authorization", authorization.as_str())],
        )
        .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, body))
    }

    /// Sends `body` as JSON and parses the response body (Null when empty).
    pub async fn json_as(
        &self,
        token: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let body = body.map(to_json_body).transpose()?;
        let (status, _headers, bytes) = self.request_as(token, method, path, body).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn seed_user(&self, role: Role) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, role, is_registered) \
             VALUES ($1, 'Test', $2, $3, $4, TRUE)",
        )
        .bind(&id)
        .bind(format!("{role}User"))
        .bind(format!("{id}@example.com"))
        .bind(role.as_str())
        .execute(&self.state.db_pool)
        .await?;
        Ok(id)
    }

    pub async fn seed_institution(&self, title: &str) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO institutions (id, title) VALUES ($1, $2)")
            .bind(id)
            .bind(title)
            .execute(&self.state.db_pool)
            .await?;
        Ok(id)
    }

    pub async fn seed_catottg(
        &self,
        id: i64,
        parent_id: Option<i64>,
        category: &str,
        name: &str,
        (latitude, longitude): (f64, f64),
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO catottgs (id, parent_id, category, name, latitude, longitude) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(parent_id)
        .bind(category)
        .bind(name)
        .bind(latitude)
        .bind(longitude)
        .execute(&self.state.db_pool)
        .await?;
        Ok(())
    }

    /// Kyivska region (1) > Bilotserkivskyi district (3) > Bilotserkivska
    /// community (4) > Bila Tserkva (2), plus the city of Kyiv (10).
    pub async fn seed_geography(&self) -> anyhow::Result<()> {
        self.seed_catottg(1, None, "O", "Kyivska", (50.05, 30.76)).await?;
        self.seed_catottg(3, Some(1), "P", "Bilotserkivskyi", (49.80, 30.11))
            .await?;
        self.seed_catottg(4, Some(3), "H", "Bilotserkivska", (49.80, 30.11))
            .await?;
        self.seed_catottg(2, Some(4), "M", "Bila Tserkva", (49.80, 30.11))
            .await?;
        self.seed_catottg(10, None, "K", "Kyiv", (50.45, 30.52)).await?;
        Ok(())
    }
}

pub fn to_json_body<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(actual, expected, "unexpected status for {context}");
}

pub fn provider_input(edrpou: &str, email: &str, catottg_id: i64) -> Value {
    json!({
        "fullTitle": "Kyiv Youth Creativity Centre",
        "shortTitle": "KYCC",
        "edrpouIpn": edrpou,
        "email": email,
        "phoneNumber": "+380501234567",
        "ownership": "Common",
        "legalStreet": "Khreshchatyk",
        "legalBuildingNumber": "1",
        "legalCatottgId": catottg_id,
    })
}

pub fn workshop_input(provider_id: &str, title: &str, available_seats: Option<i32>) -> Value {
    json!({
        "providerId": provider_id,
        "title": title,
        "email": "workshop@example.com",
        "phoneNumber": "+380501234567",
        "description": "Weekly lessons for beginners",
        "minAge": 6,
        "maxAge": 12,
        "price": "150.00",
        "availableSeats": available_seats,
        "city": "Kyiv",
        "street": "Khreshchatyk",
        "buildingNumber": "5",
        "catottgId": 10,
        "latitude": 50.45,
        "longitude": 30.52,
    })
}

pub fn child_input(first_name: &str) -> Value {
    json!({
        "firstName": first_name,
        "lastName": "Shevchenko",
        "dateOfBirth": "2016-04-12",
        "gender": "Female",
    })
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.enabled = true;
    config.auth.jwt_secret = Some(TEST_JWT_SECRET.to_string());
    config.search.enabled = true;
    config.workers.enabled = false;
    config
}

fn test_database_url() -> Option<String> {
    std::env::var("OOS_TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.is_empty())
}

pub async fn with_test_app<F, Fut>(f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F, Fut>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: FnOnce(TestApp) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let Some(url) = test_database_url() else {
        eprintln!("OOS_TEST_DATABASE_URL is not set, skipping");
        return Ok(());
    };

    let schema = format!("test_{}", Uuid::new_v4().simple());
    let admin_pool = PgPoolOptions::new().max_connections(1).connect(&url).await?;
    admin_pool
        .execute(format!("CREATE SCHEMA \"{schema}\"").as_str())
        .await?;

    let pool = schema_pool(&url, &schema).await?;
    let mut config = test_config();
    configure(&mut config);

    let search = Arc::new(MemorySearchIndex::new());
    let identity = Arc::new(StubIdentity::default());
    let state = AppState::from_pool(
        config,
        pool.clone(),
        AppStateOptions {
            run_migrations: true,
            job_queue: JobQueueKind::Inline,
            search_index: Some(search.clone()),
            identity: Some(identity.clone()),
        },
    )
    .await?;

    let app = TestApp {
        router: create_router(state.clone()),
        state,
        search,
        identity,
    };
    let result = f(app).await;

    pool.close().await;
    admin_pool
        .execute(format!("DROP SCHEMA \"{schema}\" CASCADE").as_str())
        .await?;
    result
}

async fn schema_pool(url: &str, schema: &str) -> anyhow::Result<PgPool> {
    let search_path = format!("SET search_path TO \"{schema}\"");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                conn.execute(search_path.as_str()).await?;
                Ok(())
            })
        })
        .connect(url)
        .await?;
    Ok(pool)
}
