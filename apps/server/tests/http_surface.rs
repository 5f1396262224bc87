#![allow(unused)]
#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use outofschool::models::Role;
use support::*;

#[tokio::test]
async fn health_reports_database_and_queue() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app.request(Method::GET, "/health", None).await?;
            assert_status(status, StatusCode::OK, "health");
            let health: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(health["status"], "ok");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn metrics_are_exposed_without_token() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.request(Method::GET, "/health", None).await?;
            let (status, _headers, body) = app.request(Method::GET, "/metrics", None).await?;
            assert_status(status, StatusCode::OK, "metrics");
            let text = String::from_utf8(body.to_vec())?;
            assert!(text.contains("outofschool_http_requests_total"));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn security_headers_are_present() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, headers, _body) = app.request(Method::GET, "/health", None).await?;
            assert_status(status, StatusCode::OK, "health");

            for (name, expected) in [
                ("x-content-type-options", "nosniff"),
                ("x-frame-options", "DENY"),
                ("referrer-policy", "no-referrer"),
                ("content-security-policy", "default-src 'none'"),
            ] {
                let got = headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                assert_eq!(got, expected, "missing/incorrect header '{}'", name);
            }
            assert!(headers.get("strict-transport-security").is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn protected_routes_require_a_token() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) =
                app.request(Method::GET, "/api/v1/users/me", None).await?;
            assert_status(status, StatusCode::UNAUTHORIZED, "users/me without token");
            let error: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(error["status"], 401);

            let (status, _headers, _body) = app
                .request_as("not-a-jwt", Method::GET, "/api/v1/users/me", None)
                .await?;
            assert_status(status, StatusCode::UNAUTHORIZED, "users/me with garbage token");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn codeficator_is_public() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.seed_geography().await?;

            let (status, _headers, body) =
                app.request(Method::GET, "/api/v1/codeficator", None).await?;
            assert_status(status, StatusCode::OK, "top level");
            let top: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
            let names: Vec<&str> = top.iter().filter_map(|c| c["name"].as_str()).collect();
            assert_eq!(names.len(), 2);
            assert!(names.contains(&"Kyiv"));

            let (status, _headers, body) = app
                .request(Method::GET, "/api/v1/codeficator/search?name=Bila", None)
                .await?;
            assert_status(status, StatusCode::OK, "search");
            let found: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
            assert_eq!(found[0]["settlement"], "Bila Tserkva");
            assert_eq!(found[0]["region"], "Kyivska");

            let (status, _headers, body) = app
                .request(
                    Method::GET,
                    "/api/v1/codeficator/nearest?lat=50.44&lon=30.50",
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "nearest");
            let nearest: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(nearest["id"], 10);

            let (status, _headers, _body) = app
                .request(Method::GET, "/api/v1/codeficator/999", None)
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "missing id");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn internal_jobs_are_tech_admin_only() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let parent = app.seed_user(Role::Parent).await?;
            let token = app.token(&parent, Role::Parent);
            let (status, _body) = app
                .json_as(&token, Method::GET, "/internal/jobs", None)
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "jobs as parent");

            let admin = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&admin, Role::TechAdmin);
            let (status, body) = app
                .json_as(&token, Method::GET, "/internal/jobs", None)
                .await?;
            assert_status(status, StatusCode::OK, "jobs as tech admin");
            assert!(body["jobs"].is_array());

            let missing = uuid::Uuid::new_v4();
            let (status, _body) = app
                .json_as(&token, Method::GET, &format!("/internal/jobs/{missing}"), None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "missing job");
            Ok(())
        })
    })
    .await
}
