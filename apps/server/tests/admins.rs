#![allow(unused)]
#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use outofschool::models::Role;
use serde_json::{json, Value};
use support::*;
use uuid::Uuid;

fn admin_input(email: &str, institution_id: Uuid, catottg_id: Option<i64>) -> Value {
    json!({
        "firstName": "Iryna",
        "lastName": "Koval",
        "email": email,
        "phoneNumber": "+380671112233",
        "institutionId": institution_id,
        "catottgId": catottg_id,
    })
}

#[tokio::test]
async fn tech_admin_creates_ministry_admin() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let institution = app.seed_institution("Ministry of Education").await?;
            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);

            let (status, admin) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/admins/ministry",
                    Some(&admin_input("ministry@example.com", institution, None)),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create ministry admin");
            assert_eq!(admin["institutionTitle"], "Ministry of Education");
            assert_eq!(admin["isBlocked"], false);
            assert_eq!(app.identity.calls().len(), 1);

            let (status, page) = app
                .json_as(&token, Method::GET, "/api/v1/admins/ministry", None)
                .await?;
            assert_status(status, StatusCode::OK, "list ministry admins");
            assert_eq!(page["totalAmount"], 1);

            // The new admin can see their own profile.
            let user_id = admin["userId"].as_str().unwrap();
            let own = app.token(user_id, Role::MinistryAdmin);
            let (status, me) = app
                .json_as(&own, Method::GET, "/api/v1/admins/ministry/me", None)
                .await?;
            assert_status(status, StatusCode::OK, "current admin");
            assert_eq!(me["email"], "ministry@example.com");

            let (status, _body) = app
                .json_as(&own, Method::GET, "/api/v1/admins/region/me", None)
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "wrong kind");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn admin_email_must_be_unique() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let institution = app.seed_institution("Ministry of Education").await?;
            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);
            let input = admin_input("twice@example.com", institution, None);

            let (status, _body) = app
                .json_as(&token, Method::POST, "/api/v1/admins/ministry", Some(&input))
                .await?;
            assert_status(status, StatusCode::CREATED, "first");

            let (status, error) = app
                .json_as(&token, Method::POST, "/api/v1/admins/ministry", Some(&input))
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "second");
            assert!(error["message"].as_str().unwrap().contains("already taken"));
            assert_eq!(app.identity.calls().len(), 1);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn regional_admins_need_a_territory() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let institution = app.seed_institution("Ministry of Education").await?;
            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);

            let (status, _body) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/admins/region",
                    Some(&admin_input("region@example.com", institution, None)),
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "region admin without CATOTTG");
            assert!(app.identity.calls().is_empty());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn admin_hierarchy_is_enforced() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.seed_geography().await?;
            let institution = app.seed_institution("Ministry of Education").await?;

            let area = app.seed_user(Role::AreaAdmin).await?;
            let token = app.token(&area, Role::AreaAdmin);
            let (status, _body) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/admins/region",
                    Some(&admin_input("region@example.com", institution, Some(1))),
                )
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "area admin creates region admin");

            let parent = app.seed_user(Role::Parent).await?;
            let token = app.token(&parent, Role::Parent);
            let (status, _body) = app
                .json_as(&token, Method::GET, "/api/v1/admins/area", None)
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "parent lists admins");

            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);
            let (status, _body) = app
                .json_as(&token, Method::GET, "/api/v1/admins/janitor", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "unknown admin kind");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn identity_server_rejection_is_returned() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let institution = app.seed_institution("Ministry of Education").await?;
            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);
            app.identity.fail_with(409);

            let (status, error) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/admins/ministry",
                    Some(&admin_input("rejected@example.com", institution, None)),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "identity conflict");
            assert_eq!(error["status"], 409);
            assert_eq!(error["message"], "Rejected by identity server");

            // Nothing was stored locally.
            let (status, _body) = app
                .json_as(&token, Method::GET, "/api/v1/admins/ministry", None)
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "no admins");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn ministry_admin_manages_only_own_institution() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.seed_geography().await?;
            let own = app.seed_institution("Own").await?;
            let foreign = app.seed_institution("Foreign").await?;
            let tech = app.seed_user(Role::TechAdmin).await?;
            let tech_token = app.token(&tech, Role::TechAdmin);

            let (status, ministry) = app
                .json_as(
                    &tech_token,
                    Method::POST,
                    "/api/v1/admins/ministry",
                    Some(&admin_input("own-ministry@example.com", own, None)),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create ministry admin");
            let (status, stranger) = app
                .json_as(
                    &tech_token,
                    Method::POST,
                    "/api/v1/admins/region",
                    Some(&admin_input("foreign-region@example.com", foreign, Some(1))),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create foreign region admin");
            let stranger_id = stranger["userId"].as_str().unwrap().to_string();

            let token = app.token(ministry["userId"].as_str().unwrap(), Role::MinistryAdmin);
            let identity_calls = app.identity.calls().len();

            let (status, _body) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/admins/region",
                    Some(&admin_input("region@example.com", foreign, Some(1))),
                )
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "create in foreign institution");

            let (status, _body) = app
                .json_as(
                    &token,
                    Method::PUT,
                    &format!("/api/v1/admins/region/{stranger_id}/block"),
                    Some(&json!({ "isBlocked": true })),
                )
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "block foreign admin");

            let (status, _body) = app
                .json_as(
                    &token,
                    Method::DELETE,
                    &format!("/api/v1/admins/region/{stranger_id}"),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "delete foreign admin");
            assert_eq!(app.identity.calls().len(), identity_calls);

            let (status, _body) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/admins/region",
                    Some(&admin_input("own-region@example.com", own, Some(1))),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create in own institution");
            Ok(())
        })
    })
    .await
}
