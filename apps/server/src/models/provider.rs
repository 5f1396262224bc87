use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{comma_separated, LicenseStatus, OwnershipType, ProviderStatus};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub full_title: String,
    pub short_title: String,
    pub full_title_en: Option<String>,
    pub short_title_en: Option<String>,
    pub edrpou_ipn: String,
    pub email: String,
    pub phone_number: String,
    pub website: Option<String>,
    pub ownership: OwnershipType,
    pub status: ProviderStatus,
    pub status_reason: Option<String>,
    pub license: Option<String>,
    pub license_status: LicenseStatus,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub block_phone_number: Option<String>,
    pub institution_id: Option<Uuid>,
    pub legal_street: String,
    pub legal_building_number: String,
    pub legal_catottg_id: i64,
    pub user_id: String,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
}

impl Provider {
    pub fn legal_address(&self) -> String {
        format!(
            "{}, {} ({})",
            self.legal_street, self.legal_building_number, self.legal_catottg_id
        )
    }

    pub fn has_license(&self) -> bool {
        self.license.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInput {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub full_title: String,
    #[validate(length(min = 1, max = 60))]
    pub short_title: String,
    #[validate(length(max = 120))]
    pub full_title_en: Option<String>,
    #[validate(length(max = 60))]
    pub short_title_en: Option<String>,
    #[validate(length(min = 8, max = 10))]
    pub edrpou_ipn: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 15))]
    pub phone_number: String,
    #[validate(url)]
    pub website: Option<String>,
    pub ownership: OwnershipType,
    #[validate(length(max = 30))]
    pub license: Option<String>,
    pub institution_id: Option<Uuid>,
    #[validate(length(min = 1, max = 60))]
    pub legal_street: String,
    #[validate(length(min = 1, max = 15))]
    pub legal_building_number: String,
    #[validate(range(min = 1))]
    pub legal_catottg_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusUpdate {
    pub status: ProviderStatus,
    pub status_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusResult {
    pub provider_id: Uuid,
    pub status: ProviderStatus,
    pub status_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLicenseStatusUpdate {
    pub license_status: LicenseStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBlock {
    pub is_blocked: bool,
    #[validate(length(max = 500))]
    pub block_reason: Option<String>,
    #[validate(length(max = 15))]
    pub block_phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFilter {
    pub search_string: Option<String>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub status: Vec<ProviderStatus>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub license_status: Vec<LicenseStatus>,
    pub institution_id: Option<Uuid>,
    pub catottg_id: Option<i64>,
    pub from: Option<i64>,
    pub size: Option<i64>,
}
