//! Notification rows per recipient, pushed live to subscribed users.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::NotificationsConfig;
use crate::db::{Filter, NotificationRepository, OrderBy};
use crate::metrics::NOTIFICATIONS_CREATED;
use crate::models::{
    NewNotification, Notification, NotificationAction, NotificationAmount,
    NotificationGrouped, NotificationGroupedAndSingle, NotificationType,
};
use crate::push::{Hub, PushEvent};
use crate::{Error, Result};

pub struct NotificationService {
    repo: NotificationRepository,
    hub: Arc<Hub>,
    config: NotificationsConfig,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, hub: Arc<Hub>, config: NotificationsConfig) -> Self {
        Self { repo, hub, config }
    }

    /// Writes one row per distinct recipient and pushes each to its owner.
    pub async fn create(
        &self,
        notification: NewNotification,
        recipients: impl IntoIterator<Item = String>,
    ) -> Result<Vec<Notification>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        let mut recipients: Vec<String> = recipients.into_iter().filter(|r| !r.is_empty()).collect();
        recipients.sort();
        recipients.dedup();
        if recipients.is_empty() {
            return Ok(Vec::new());
        }

        let created = self
            .repo
            .create_for(&notification, &recipients, Utc::now())
            .await?;
        NOTIFICATIONS_CREATED.inc_by(created.len() as u64);
        tracing::debug!(
            kind = %notification.kind,
            action = %notification.action,
            recipients = created.len(),
            "Created notifications"
        );

        for row in &created {
            self.hub
                .publish_to_user(&row.user_id, PushEvent::Notification(row.clone()));
        }
        Ok(created)
    }

    /// Same as [`create`](Self::create) but never fails the caller's operation.
    pub async fn notify(
        &self,
        notification: NewNotification,
        recipients: impl IntoIterator<Item = String>,
    ) {
        let kind = notification.kind;
        if let Err(e) = self.create(notification, recipients).await {
            tracing::warn!(%kind, error = %e, "Failed to create notifications");
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Notification> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Notification with Id = {id} doesn't exist")))
    }

    /// Marks the user's notification as read.
    pub async fn read(&self, id: Uuid, user_id: &str) -> Result<Notification> {
        let notification = self.get_by_id(id).await?;
        if notification.user_id != user_id {
            return Err(Error::Forbidden(
                "Notification belongs to another user".to_string(),
            ));
        }
        self.repo
            .mark_read(id, Utc::now())
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Notification with Id = {id} doesn't exist")))
    }

    pub async fn read_by_type(&self, user_id: &str, kind: NotificationType) -> Result<u64> {
        self.repo.mark_read_by_type(user_id, kind, Utc::now()).await
    }

    pub async fn delete(&self, id: Uuid, user_id: &str) -> Result<()> {
        let notification = self.get_by_id(id).await?;
        if notification.user_id != user_id {
            return Err(Error::Forbidden(
                "Notification belongs to another user".to_string(),
            ));
        }
        self.repo.delete(id).await
    }

    pub async fn get_all_by_filter(
        &self,
        user_id: &str,
        kind: Option<NotificationType>,
    ) -> Result<Vec<Notification>> {
        let mut filter = Filter::eq("n.user_id", user_id);
        if let Some(kind) = kind {
            filter = filter.and(Filter::eq("n.notification_type", kind.as_str()));
        }
        let order = OrderBy::new().desc("n.created_time");
        self.repo
            .get(crate::db::Page::unbounded(), filter, &order)
            .await
    }

    pub async fn get_all_grouped(&self, user_id: &str) -> Result<NotificationGroupedAndSingle> {
        let unread = self
            .repo
            .get(
                crate::db::Page::unbounded(),
                unread_for(user_id),
                &OrderBy::new().desc("n.created_time"),
            )
            .await?;
        Ok(group_unread(unread, &self.config.grouped))
    }

    pub async fn get_amount_of_new(&self, user_id: &str) -> Result<NotificationAmount> {
        let amount = self.repo.count(unread_for(user_id)).await?;
        Ok(NotificationAmount { amount })
    }
}

fn unread_for(user_id: &str) -> Filter {
    Filter::eq("n.user_id", user_id).and(Filter::IsNull("n.read_time"))
}

/// Splits unread notifications into singles and counted groups. Grouped types
/// get one entry per (type, action, grouped data) and a per-type total.
pub fn group_unread(
    notifications: Vec<Notification>,
    grouped_types: &[NotificationType],
) -> NotificationGroupedAndSingle {
    type GroupKey = (String, Option<String>, Option<String>);

    let mut detailed: BTreeMap<GroupKey, NotificationGrouped> = BTreeMap::new();
    let mut per_type: BTreeMap<String, NotificationGrouped> = BTreeMap::new();
    let mut singles = Vec::new();

    for notification in notifications {
        if !grouped_types.contains(&notification.kind) {
            singles.push(notification);
            continue;
        }
        let key = (
            notification.kind.to_string(),
            Some(notification.action.to_string()),
            notification.grouped_data.clone(),
        );
        detailed
            .entry(key)
            .or_insert_with(|| NotificationGrouped {
                kind: notification.kind,
                action: Some(notification.action),
                grouped_data: notification.grouped_data.clone(),
                amount: 0,
            })
            .amount += 1;
        per_type
            .entry(notification.kind.to_string())
            .or_insert_with(|| NotificationGrouped {
                kind: notification.kind,
                action: None::<NotificationAction>,
                grouped_data: None,
                amount: 0,
            })
            .amount += 1;
    }

    NotificationGroupedAndSingle {
        notifications: singles,
        notifications_grouped: detailed.into_values().chain(per_type.into_values()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(kind: NotificationType, action: NotificationAction, group: Option<&str>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: "user".to_string(),
            kind,
            action,
            created_time: Utc::now(),
            read_time: None,
            object_id: None,
            data: serde_json::json!({}),
            grouped_data: group.map(str::to_string),
        }
    }

    #[test]
    fn grouped_types_are_counted_and_others_kept_single() {
        let unread = vec![
            notification(NotificationType::Application, NotificationAction::Create, Some("Pending")),
            notification(NotificationType::Application, NotificationAction::Create, Some("Pending")),
            notification(NotificationType::Application, NotificationAction::Update, Some("Approved")),
            notification(NotificationType::Provider, NotificationAction::Update, None),
        ];

        let result = group_unread(unread, &[NotificationType::Application]);
        assert_eq!(result.notifications.len(), 1);
        assert_eq!(result.notifications[0].kind, NotificationType::Provider);

        let groups: Vec<(Option<NotificationAction>, Option<&str>, i64)> = result
            .notifications_grouped
            .iter()
            .map(|g| (g.action, g.grouped_data.as_deref(), g.amount))
            .collect();
        assert_eq!(
            groups,
            vec![
                (Some(NotificationAction::Create), Some("Pending"), 2),
                (Some(NotificationAction::Update), Some("Approved"), 1),
                (None, None, 3),
            ]
        );
    }

    #[test]
    fn nothing_grouped_when_no_types_configured() {
        let unread = vec![notification(NotificationType::Chat, NotificationAction::Message, None)];
        let result = group_unread(unread, &[]);
        assert_eq!(result.notifications.len(), 1);
        assert!(result.notifications_grouped.is_empty());
    }
}
