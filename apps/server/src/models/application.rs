use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{comma_separated, ApplicationStatus, ShowApplications};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub child_id: Uuid,
    pub parent_id: Uuid,
    pub status: ApplicationStatus,
    pub rejection_message: Option<String>,
    pub is_blocked_by_provider: bool,
    pub creation_time: DateTime<Utc>,
    pub approved_time: Option<DateTime<Utc>>,
    pub ended_time: Option<DateTime<Utc>>,
    pub workshop_title: String,
    pub provider_id: Uuid,
    pub provider_title: String,
    pub child_first_name: String,
    pub child_last_name: String,
    pub child_middle_name: Option<String>,
    pub parent_user_id: String,
    pub parent_first_name: String,
    pub parent_last_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCreate {
    pub workshop_id: Uuid,
    pub child_id: Uuid,
    pub parent_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub id: Uuid,
    pub status: ApplicationStatus,
    #[validate(length(max = 500))]
    pub rejection_message: Option<String>,
}

/// Outcome of an application request that passed validation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ApplicationCreated {
    #[serde(rename_all = "camelCase")]
    Created { application: Application },
    #[serde(rename_all = "camelCase")]
    LimitExceeded {
        description: String,
        seconds_before_retry: i64,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilter {
    #[serde(default, deserialize_with = "comma_separated")]
    pub statuses: Vec<ApplicationStatus>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub workshops: Vec<Uuid>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub children: Vec<Uuid>,
    pub search_string: Option<String>,
    #[serde(default)]
    pub show: ShowApplications,
    #[serde(default)]
    pub order_by_status: bool,
    #[serde(default)]
    pub order_by_date_ascending: bool,
    #[serde(default)]
    pub order_by_alphabetically: bool,
    pub from: Option<i64>,
    pub size: Option<i64>,
}
