use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: Uuid,
    pub title: String,
    pub achievement_date: NaiveDate,
    pub workshop_id: Uuid,
    pub achievement_type_id: i64,
    pub achievement_type_title: String,
    pub children_ids: Vec<Uuid>,
    pub teachers: Vec<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementType {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AchievementInput {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 2000))]
    pub title: String,
    pub achievement_date: NaiveDate,
    pub workshop_id: Uuid,
    pub achievement_type_id: i64,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub children_ids: Vec<Uuid>,
    #[serde(default)]
    pub teachers: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementFilter {
    pub workshop_id: Option<Uuid>,
    pub from: Option<i64>,
    pub size: Option<i64>,
}
