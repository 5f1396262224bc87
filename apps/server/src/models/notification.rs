use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{NotificationAction, NotificationType};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[sqlx(rename = "notification_type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub action: NotificationAction,
    pub created_time: DateTime<Utc>,
    pub read_time: Option<DateTime<Utc>>,
    pub object_id: Option<Uuid>,
    pub data: serde_json::Value,
    pub grouped_data: Option<String>,
}

/// Notification content before it is fanned out to recipients.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationType,
    pub action: NotificationAction,
    pub object_id: Option<Uuid>,
    pub data: BTreeMap<String, String>,
    pub grouped_data: Option<String>,
}

impl NewNotification {
    pub fn new(kind: NotificationType, action: NotificationAction, object_id: Uuid) -> Self {
        Self {
            kind,
            action,
            object_id: Some(object_id),
            data: BTreeMap::new(),
            grouped_data: None,
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn grouped_by(mut self, grouped_data: impl Into<String>) -> Self {
        self.grouped_data = Some(grouped_data.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGrouped {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub action: Option<NotificationAction>,
    pub grouped_data: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroupedAndSingle {
    pub notifications: Vec<Notification>,
    pub notifications_grouped: Vec<NotificationGrouped>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAmount {
    pub amount: i64,
}
