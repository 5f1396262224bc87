use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ChangesLogEntity;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesLogEntry {
    pub id: i64,
    pub entity_type: ChangesLogEntity,
    pub entity_id: String,
    pub property_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub updated_date: DateTime<Utc>,
    pub user_id: String,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
    pub user_middle_name: Option<String>,
    pub user_email: Option<String>,
}

/// A property value change detected between two snapshots of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub property_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesLogFilter {
    pub entity_type: ChangesLogEntity,
    pub property_name: Option<String>,
    pub entity_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search_string: Option<String>,
    pub from: Option<i64>,
    pub size: Option<i64>,
}
