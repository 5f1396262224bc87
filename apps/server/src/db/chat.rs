use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use super::filter::Filter;
use super::repository::{Entity, Repository};
use crate::models::{ChatMessage, ChatRoom, ChatRoomWithLastMessage};
use crate::Result;

impl Entity for ChatRoom {
    type Key = Uuid;

    const NAME: &'static str = "ChatRoom";
    const TABLE: &'static str = "chat_rooms";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "r.id";
    const COLUMNS: &'static str = "r.id, r.workshop_id, r.parent_id, w.title AS workshop_title, \
        w.provider_id, pa.user_id AS parent_user_id";
    const FROM: &'static str = "chat_rooms r \
        JOIN workshops w ON w.id = r.workshop_id \
        JOIN parents pa ON pa.id = r.parent_id";
}

impl Entity for ChatMessage {
    type Key = Uuid;

    const NAME: &'static str = "ChatMessage";
    const TABLE: &'static str = "chat_messages";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "m.id";
    const COLUMNS: &'static str =
        "m.id, m.chat_room_id, m.sender_role_is_provider, m.text, m.created_time, m.read_time";
    const FROM: &'static str = "chat_messages m";
}

const ROOMS_WITH_LAST_MESSAGE: &str = r#"
    SELECT r.id, r.workshop_id, r.parent_id, w.title AS workshop_title, w.provider_id,
           pu.first_name AS parent_first_name, pu.last_name AS parent_last_name,
           lm.id AS last_message_id, lm.text AS last_message_text,
           lm.created_time AS last_message_time,
           lm.sender_role_is_provider AS last_message_sender_is_provider,
           (SELECT COUNT(*) FROM chat_messages um
             WHERE um.chat_room_id = r.id AND um.sender_role_is_provider
               AND um.read_time IS NULL) AS unread_by_parent,
           (SELECT COUNT(*) FROM chat_messages um
             WHERE um.chat_room_id = r.id AND NOT um.sender_role_is_provider
               AND um.read_time IS NULL) AS unread_by_provider
    FROM chat_rooms r
    JOIN workshops w ON w.id = r.workshop_id
    JOIN parents pa ON pa.id = r.parent_id
    JOIN users pu ON pu.id = pa.user_id
    LEFT JOIN LATERAL (
        SELECT m.id, m.text, m.created_time, m.sender_role_is_provider
        FROM chat_messages m
        WHERE m.chat_room_id = r.id
        ORDER BY m.created_time DESC
        LIMIT 1
    ) lm ON TRUE
    WHERE "#;

impl Repository<ChatRoom> {
    /// Inserts the room unless the workshop/parent pair already has one.
    pub async fn create_if_missing(&self, workshop_id: Uuid, parent_id: Uuid) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            WITH inserted AS (
                INSERT INTO chat_rooms (id, workshop_id, parent_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (workshop_id, parent_id) DO NOTHING
                RETURNING id
            )
            SELECT id FROM inserted
            UNION ALL
            SELECT id FROM chat_rooms WHERE workshop_id = $2 AND parent_id = $3
            LIMIT 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(workshop_id)
        .bind(parent_id)
        .fetch_one(self.pool())
        .await?;
        Ok(id)
    }

    /// Rooms matching `filter` (over aliases `r`, `w`, `pa`), most recent activity first.
    pub async fn with_last_message(&self, filter: Filter) -> Result<Vec<ChatRoomWithLastMessage>> {
        let mut qb = QueryBuilder::new(ROOMS_WITH_LAST_MESSAGE);
        filter.push_to(&mut qb);
        qb.push(" ORDER BY lm.created_time DESC NULLS LAST, r.id");
        Ok(qb
            .build_query_as::<ChatRoomWithLastMessage>()
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn room_ids(&self, filter: Filter) -> Result<Vec<Uuid>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT r.id FROM {} WHERE ",
            ChatRoom::FROM
        ));
        filter.push_to(&mut qb);
        qb.push(" ORDER BY r.id");
        Ok(qb.build_query_scalar::<Uuid>().fetch_all(self.pool()).await?)
    }
}

impl Repository<ChatMessage> {
    pub async fn create(
        &self,
        room_id: Uuid,
        sender_role_is_provider: bool,
        text: &str,
        created_time: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (id, chat_room_id, sender_role_is_provider, text, created_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, chat_room_id, sender_role_is_provider, text, created_time, read_time
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(room_id)
        .bind(sender_role_is_provider)
        .bind(text)
        .bind(created_time)
        .fetch_one(self.pool())
        .await?;
        Ok(message)
    }

    /// Marks unread messages sent by the given side as read. Returns their ids.
    pub async fn mark_read(
        &self,
        room_id: Uuid,
        sent_by_provider: bool,
        read_time: DateTime<Utc>,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE chat_messages SET read_time = $3
            WHERE chat_room_id = $1 AND sender_role_is_provider = $2 AND read_time IS NULL
            RETURNING id
            "#,
        )
        .bind(room_id)
        .bind(sent_by_provider)
        .bind(read_time)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    /// Parent messages not yet read by the provider side across a workshop's rooms.
    pub async fn count_unread_for_workshop(&self, workshop_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM chat_messages m
            JOIN chat_rooms r ON r.id = m.chat_room_id
            WHERE r.workshop_id = $1 AND NOT m.sender_role_is_provider AND m.read_time IS NULL
            "#,
        )
        .bind(workshop_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }
}
