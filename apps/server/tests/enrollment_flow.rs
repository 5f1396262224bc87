#![allow(unused)]
#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use outofschool::models::Role;
use serde_json::{json, Value};
use support::*;
use uuid::Uuid;

struct Enrollment {
    provider_token: String,
    parent_token: String,
    provider_id: String,
    workshop_id: String,
    parent_id: String,
    child_id: String,
}

/// Provider with one workshop, and a parent with one child.
async fn enrollment(app: &TestApp, available_seats: Option<i32>) -> anyhow::Result<Enrollment> {
    app.seed_geography().await?;

    let provider_user = app.seed_user(Role::Provider).await?;
    let provider_token = app.token(&provider_user, Role::Provider);
    let (status, provider) = app
        .json_as(
            &provider_token,
            Method::POST,
            "/api/v1/providers",
            Some(&provider_input("12345678", "centre@example.com", 10)),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create provider");
    let provider_id = provider["id"].as_str().unwrap().to_string();

    let (status, workshop) = app
        .json_as(
            &provider_token,
            Method::POST,
            "/api/v1/workshops",
            Some(&workshop_input(&provider_id, "Robotics", available_seats)),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create workshop");
    let workshop_id = workshop["id"].as_str().unwrap().to_string();

    let parent_user = app.seed_user(Role::Parent).await?;
    let parent_token = app.token(&parent_user, Role::Parent);
    let (status, parent) = app
        .json_as(&parent_token, Method::POST, "/api/v1/parents", Some(&json!({})))
        .await?;
    assert_status(status, StatusCode::CREATED, "create parent");
    let parent_id = parent["id"].as_str().unwrap().to_string();

    let (status, child) = app
        .json_as(
            &parent_token,
            Method::POST,
            "/api/v1/children",
            Some(&child_input("Olena")),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create child");
    let child_id = child["id"].as_str().unwrap().to_string();

    Ok(Enrollment {
        provider_token,
        parent_token,
        provider_id,
        workshop_id,
        parent_id,
        child_id,
    })
}

async fn apply(app: &TestApp, e: &Enrollment) -> anyhow::Result<(StatusCode, Value)> {
    app.json_as(
        &e.parent_token,
        Method::POST,
        "/api/v1/applications",
        Some(&json!({
            "workshopId": e.workshop_id,
            "childId": e.child_id,
            "parentId": e.parent_id,
        })),
    )
    .await
}

#[tokio::test]
async fn created_workshop_reaches_search_index() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, Some(10)).await?;
            let id: Uuid = e.workshop_id.parse()?;

            let document = app
                .search
                .get(id)
                .expect("workshop should be indexed after creation");
            assert_eq!(document.title, "Robotics");
            assert_eq!(document.available_seats, Some(10));

            let (status, _body) = app
                .json_as(
                    &e.provider_token,
                    Method::DELETE,
                    &format!("/api/v1/workshops/{}", e.workshop_id),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "delete workshop");
            assert!(app.search.get(id).is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn workshops_are_browsable_anonymously() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, None).await?;

            let (status, _headers, body) = app
                .request(
                    Method::GET,
                    &format!("/api/v1/workshops/{}", e.workshop_id),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "get workshop");
            let workshop: Value = serde_json::from_slice(&body)?;
            assert_eq!(workshop["providerId"], e.provider_id.as_str());

            let (status, _headers, _body) = app
                .request(
                    Method::GET,
                    &format!("/api/v1/workshops/{}", Uuid::new_v4()),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "missing workshop");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn parent_applies_and_provider_approves() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, Some(1)).await?;

            let (status, application) = apply(&app, &e).await?;
            assert_status(status, StatusCode::CREATED, "apply");
            assert_eq!(application["status"], "Pending");
            let application_id = application["id"].as_str().unwrap().to_string();

            // A pending application blocks another one for the same child.
            let (status, _body) = apply(&app, &e).await?;
            assert_status(status, StatusCode::BAD_REQUEST, "duplicate application");

            let (status, approved) = app
                .json_as(
                    &e.provider_token,
                    Method::PUT,
                    "/api/v1/applications",
                    Some(&json!({ "id": application_id, "status": "Approved" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "approve");
            assert_eq!(approved["status"], "Approved");

            let (status, taken) = app
                .json_as(
                    &e.provider_token,
                    Method::GET,
                    &format!("/api/v1/workshops/{}/taken-seats", e.workshop_id),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "taken seats");
            assert_eq!(taken["takenSeats"], 1);

            // The parent was told about the status change.
            let (status, amount) = app
                .json_as(&e.parent_token, Method::GET, "/api/v1/notifications/amount", None)
                .await?;
            assert_status(status, StatusCode::OK, "notification amount");
            assert_eq!(amount["amount"], 1);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn parent_cannot_approve_own_application() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, None).await?;
            let (_status, application) = apply(&app, &e).await?;

            let (status, error) = app
                .json_as(
                    &e.parent_token,
                    Method::PUT,
                    "/api/v1/applications",
                    Some(&json!({ "id": application["id"], "status": "Approved" })),
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "parent approves");
            assert_eq!(error["status"], 400);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn other_parents_cannot_read_applications() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, None).await?;
            let (_status, application) = apply(&app, &e).await?;
            let path = format!("/api/v1/applications/{}", application["id"].as_str().unwrap());

            let (status, _body) = app.json_as(&e.parent_token, Method::GET, &path, None).await?;
            assert_status(status, StatusCode::OK, "own application");

            let stranger = app.seed_user(Role::Parent).await?;
            let token = app.token(&stranger, Role::Parent);
            let (status, _body) = app.json_as(&token, Method::GET, &path, None).await?;
            assert_status(status, StatusCode::FORBIDDEN, "stranger");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn provider_edrpou_must_be_unique() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, None).await?;

            let other = app.seed_user(Role::Provider).await?;
            let token = app.token(&other, Role::Provider);
            let (status, error) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/providers",
                    Some(&provider_input("12345678", "other@example.com", 10)),
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "duplicate EDRPOU");
            assert!(error["message"].as_str().unwrap().contains("EDRPOU"));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn chat_is_limited_to_room_members() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let e = enrollment(&app, None).await?;

            let (status, message) = app
                .json_as(
                    &e.parent_token,
                    Method::POST,
                    "/api/v1/chat/messages",
                    Some(&json!({
                        "workshopId": e.workshop_id,
                        "parentId": e.parent_id,
                        "text": "Is there a trial lesson?",
                    })),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "parent message");
            let room_id = message["chatRoomId"].as_str().unwrap().to_string();
            let messages_path = format!("/api/v1/chat/rooms/{room_id}/messages");

            let (status, messages) = app
                .json_as(&e.provider_token, Method::GET, &messages_path, None)
                .await?;
            assert_status(status, StatusCode::OK, "provider reads");
            assert_eq!(messages.as_array().unwrap().len(), 1);
            assert!(messages[0]["readTime"].is_string());

            let stranger = app.seed_user(Role::Parent).await?;
            let token = app.token(&stranger, Role::Parent);
            let (status, _body) = app.json_as(&token, Method::GET, &messages_path, None).await?;
            assert_status(status, StatusCode::FORBIDDEN, "stranger reads");

            let (status, _body) = app
                .json_as(
                    &token,
                    Method::POST,
                    "/api/v1/chat/messages",
                    Some(&json!({
                        "workshopId": e.workshop_id,
                        "parentId": e.parent_id,
                        "text": "hello",
                    })),
                )
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "stranger writes");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn catalogue_matches_overlapping_age_ranges() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            // The fixture workshop takes children aged 6 to 12.
            let e = enrollment(&app, None).await?;

            let (status, _headers, body) = app
                .request(Method::GET, "/api/v1/workshops?minAge=10&maxAge=15", None)
                .await?;
            assert_status(status, StatusCode::OK, "overlapping range");
            let found: Value = serde_json::from_slice(&body)?;
            assert_eq!(found["totalAmount"], 1);
            assert_eq!(found["entities"][0]["id"], e.workshop_id.as_str());

            let (status, _headers, _body) = app
                .request(
                    Method::GET,
                    "/api/v1/workshops?minAge=10&maxAge=15&isAppropriateAge=true",
                    None,
                )
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "range must contain the workshop");

            let (status, _headers, _body) = app
                .request(Method::GET, "/api/v1/workshops?minAge=13&maxAge=16", None)
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "disjoint range");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn region_admin_changes_status_only_inside_territory() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            // The fixture provider is registered in Kyiv, outside Kyivska region.
            let e = enrollment(&app, None).await?;
            let institution = app.seed_institution("Ministry of Education").await?;
            let provider_id: Uuid = e.provider_id.parse()?;
            sqlx::query("UPDATE providers SET institution_id = $1 WHERE id = $2")
                .bind(institution)
                .bind(provider_id)
                .execute(&app.state.db_pool)
                .await?;

            let region = app.seed_user(Role::RegionAdmin).await?;
            sqlx::query(
                "INSERT INTO region_admins (user_id, institution_id, catottg_id) \
                 VALUES ($1, $2, 1)",
            )
            .bind(&region)
            .bind(institution)
            .execute(&app.state.db_pool)
            .await?;
            let token = app.token(&region, Role::RegionAdmin);
            let path = format!("/api/v1/providers/{}/status", e.provider_id);
            let approve = json!({ "status": "Approved" });

            let (status, _body) = app
                .json_as(&token, Method::PUT, &path, Some(&approve))
                .await?;
            assert_status(status, StatusCode::FORBIDDEN, "provider outside territory");

            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);
            let (status, result) = app
                .json_as(&token, Method::PUT, &path, Some(&approve))
                .await?;
            assert_status(status, StatusCode::OK, "tech admin");
            assert_eq!(result["status"], "Approved");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn license_status_change_is_logged() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.seed_geography().await?;
            let owner = app.seed_user(Role::Provider).await?;
            let owner_token = app.token(&owner, Role::Provider);
            let mut input = provider_input("87654321", "licensed@example.com", 10);
            input["license"] = json!("AB-123456");
            let (status, provider) = app
                .json_as(&owner_token, Method::POST, "/api/v1/providers", Some(&input))
                .await?;
            assert_status(status, StatusCode::CREATED, "create provider");
            assert_eq!(provider["licenseStatus"], "Pending");
            let provider_id = provider["id"].as_str().unwrap().to_string();

            let tech = app.seed_user(Role::TechAdmin).await?;
            let token = app.token(&tech, Role::TechAdmin);
            let (status, updated) = app
                .json_as(
                    &token,
                    Method::PUT,
                    &format!("/api/v1/providers/{provider_id}/license-status"),
                    Some(&json!({ "licenseStatus": "Approved" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "approve license");
            assert_eq!(updated["licenseStatus"], "Approved");

            let (status, log) = app
                .json_as(
                    &token,
                    Method::GET,
                    &format!(
                        "/api/v1/changes-log?entityType=Provider&propertyName=LicenseStatus&entityId={provider_id}"
                    ),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "changes log");
            assert_eq!(log["totalAmount"], 1);
            assert_eq!(log["entities"][0]["oldValue"], "Pending");
            assert_eq!(log["entities"][0]["newValue"], "Approved");
            Ok(())
        })
    })
    .await
}
