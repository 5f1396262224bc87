use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub parent_id: Uuid,
    pub workshop_title: String,
    pub provider_id: Uuid,
    pub parent_user_id: String,
}

/// Chat room listing entry with its most recent message and unread counters.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomWithLastMessage {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub parent_id: Uuid,
    pub workshop_title: String,
    pub provider_id: Uuid,
    pub parent_first_name: String,
    pub parent_last_name: String,
    pub last_message_id: Option<Uuid>,
    pub last_message_text: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_message_sender_is_provider: Option<bool>,
    /// Messages from the provider side the parent has not read.
    pub unread_by_parent: i64,
    /// Messages from the parent the provider side has not read.
    pub unread_by_provider: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_room_id: Uuid,
    pub sender_role_is_provider: bool,
    pub text: String,
    pub created_time: DateTime<Utc>,
    pub read_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageCreate {
    pub workshop_id: Uuid,
    pub parent_id: Uuid,
    #[validate(length(min = 1, max = 256))]
    pub text: String,
}
