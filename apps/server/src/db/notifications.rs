use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::repository::{Entity, Repository};
use crate::models::{NewNotification, Notification, NotificationType};
use crate::Result;

impl Entity for Notification {
    type Key = Uuid;

    const NAME: &'static str = "Notification";
    const TABLE: &'static str = "notifications";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "n.id";
    const COLUMNS: &'static str = "n.id, n.user_id, n.notification_type, n.action, \
        n.created_time, n.read_time, n.object_id, n.data, n.grouped_data";
    const FROM: &'static str = "notifications n";
}

impl Repository<Notification> {
    /// Inserts one row per recipient and returns them.
    pub async fn create_for(
        &self,
        notification: &NewNotification,
        recipients: &[String],
        created_time: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        if recipients.is_empty() {
            return Ok(Vec::new());
        }
        let data = serde_json::to_value(&notification.data)
            .map_err(|e| crate::Error::Internal(format!("Failed to encode notification data: {e}")))?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO notifications (id, user_id, notification_type, action, created_time, \
             object_id, data, grouped_data) ",
        );
        qb.push_values(recipients, |mut row, user_id| {
            row.push_bind(Uuid::new_v4())
                .push_bind(user_id.clone())
                .push_bind(notification.kind.as_str())
                .push_bind(notification.action.as_str())
                .push_bind(created_time)
                .push_bind(notification.object_id)
                .push_bind(data.clone())
                .push_bind(notification.grouped_data.clone());
        });
        qb.push(
            " RETURNING id, user_id, notification_type, action, created_time, read_time, \
             object_id, data, grouped_data",
        );
        Ok(qb
            .build_query_as::<Notification>()
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn mark_read(&self, id: Uuid, read_time: DateTime<Utc>) -> Result<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET read_time = COALESCE(read_time, $2)
            WHERE id = $1
            RETURNING id, user_id, notification_type, action, created_time, read_time,
                      object_id, data, grouped_data
            "#,
        )
        .bind(id)
        .bind(read_time)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn mark_read_by_type(
        &self,
        user_id: &str,
        kind: NotificationType,
        read_time: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read_time = $3
            WHERE user_id = $1 AND notification_type = $2 AND read_time IS NULL
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(read_time)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
