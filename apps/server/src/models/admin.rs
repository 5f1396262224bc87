use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::AdminKind;

/// Ministry, region or area administrator with user details.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub user_id: String,
    pub kind: AdminKind,
    pub institution_id: Uuid,
    pub institution_title: String,
    pub catottg_id: Option<i64>,
    pub catottg_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_blocked: bool,
}

/// Payload sent to the identity server when provisioning an admin account.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminInput {
    pub user_id: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub first_name: String,
    #[validate(length(min = 1, max = 60))]
    pub last_name: String,
    #[validate(length(max = 60))]
    pub middle_name: Option<String>,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 15))]
    pub phone_number: Option<String>,
    pub institution_id: Uuid,
    pub catottg_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminFilter {
    pub search_string: Option<String>,
    pub institution_id: Option<Uuid>,
    pub catottg_id: Option<i64>,
    pub from: Option<i64>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBlock {
    pub is_blocked: bool,
}
