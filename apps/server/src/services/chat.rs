//! Parent/provider chat rooms, one per workshop and parent.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::{
    ChatMessageRepository, ChatRoomRepository, Filter, OrderBy, Page, ParentRepository,
    ProviderRepository, WorkshopRepository,
};
use crate::models::{
    ChatMessage, ChatMessageCreate, ChatRoom, ChatRoomWithLastMessage, NewNotification,
    NotificationAction, NotificationType, OffsetFilter, Role,
};
use crate::push::{Hub, PushEvent};
use crate::services::NotificationService;
use crate::{Error, Result};

/// Which side of a room the current user speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSide {
    Parent,
    Provider,
}

impl ChatSide {
    pub fn is_provider(&self) -> bool {
        *self == ChatSide::Provider
    }
}

pub struct ChatService {
    rooms: ChatRoomRepository,
    messages: ChatMessageRepository,
    workshops: WorkshopRepository,
    parents: ParentRepository,
    providers: ProviderRepository,
    hub: Arc<Hub>,
    notifications: Arc<NotificationService>,
}

impl ChatService {
    pub fn new(
        rooms: ChatRoomRepository,
        messages: ChatMessageRepository,
        workshops: WorkshopRepository,
        parents: ParentRepository,
        providers: ProviderRepository,
        hub: Arc<Hub>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            rooms,
            messages,
            workshops,
            parents,
            providers,
            hub,
            notifications,
        }
    }

    /// The user's side in the room, or Forbidden when they are not part of it.
    pub async fn side_in(&self, room: &ChatRoom, user: &CurrentUser) -> Result<ChatSide> {
        match user.role {
            Role::Parent if room.parent_user_id == user.user_id => Ok(ChatSide::Parent),
            Role::Provider
                if self.providers.id_for_staff_user(&user.user_id).await?
                    == Some(room.provider_id) =>
            {
                Ok(ChatSide::Provider)
            }
            _ => Err(Error::Forbidden(
                "The chat room belongs to other users".to_string(),
            )),
        }
    }

    pub async fn create_or_return_existing(
        &self,
        workshop_id: Uuid,
        parent_id: Uuid,
    ) -> Result<ChatRoom> {
        if self.workshops.get_by_id(workshop_id).await?.is_none() {
            return Err(Error::InvalidArgument(format!(
                "Workshop with Id = {workshop_id} doesn't exist"
            )));
        }
        if self.parents.get_by_id(parent_id).await?.is_none() {
            return Err(Error::InvalidArgument(format!(
                "Parent with Id = {parent_id} doesn't exist"
            )));
        }
        let id = self.rooms.create_if_missing(workshop_id, parent_id).await?;
        self.room(id).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<ChatRoom>> {
        self.rooms.get_by_id(id).await
    }

    pub async fn get_by_parent_and_workshop(
        &self,
        parent_id: Uuid,
        workshop_id: Uuid,
    ) -> Result<Option<ChatRoom>> {
        let filter = Filter::eq("r.parent_id", parent_id).and(Filter::eq("r.workshop_id", workshop_id));
        self.rooms.first(filter, &OrderBy::new()).await
    }

    pub async fn get_by_parent_and_provider(
        &self,
        parent_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Vec<ChatRoomWithLastMessage>> {
        self.rooms
            .with_last_message(
                Filter::eq("r.parent_id", parent_id).and(Filter::eq("w.provider_id", provider_id)),
            )
            .await
    }

    pub async fn get_by_parent_id(&self, parent_id: Uuid) -> Result<Vec<ChatRoomWithLastMessage>> {
        self.rooms
            .with_last_message(Filter::eq("r.parent_id", parent_id))
            .await
    }

    pub async fn get_by_provider_id(&self, provider_id: Uuid) -> Result<Vec<ChatRoomWithLastMessage>> {
        self.rooms
            .with_last_message(Filter::eq("w.provider_id", provider_id))
            .await
    }

    pub async fn get_by_workshop_ids(&self, workshop_ids: Vec<Uuid>) -> Result<Vec<ChatRoomWithLastMessage>> {
        self.rooms
            .with_last_message(Filter::is_in("r.workshop_id", workshop_ids))
            .await
    }

    pub async fn get_room_ids_by_parent_id(&self, parent_id: Uuid) -> Result<Vec<Uuid>> {
        self.rooms.room_ids(Filter::eq("r.parent_id", parent_id)).await
    }

    pub async fn get_room_ids_by_provider_id(&self, provider_id: Uuid) -> Result<Vec<Uuid>> {
        self.rooms
            .room_ids(Filter::eq("w.provider_id", provider_id))
            .await
    }

    /// Deletes the room and its messages.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.rooms.delete(id).await?;
        tracing::info!(chat_room_id = %id, "Deleted chat room");
        Ok(())
    }

    /// Sends a message, creating the room on first contact.
    pub async fn create_message(
        &self,
        request: &ChatMessageCreate,
        user: &CurrentUser,
    ) -> Result<ChatMessage> {
        request.validate()?;
        let workshop = self
            .workshops
            .get_by_id(request.workshop_id)
            .await?
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Workshop with Id = {} doesn't exist",
                    request.workshop_id
                ))
            })?;
        let parent = self
            .parents
            .get_by_id(request.parent_id)
            .await?
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Parent with Id = {} doesn't exist",
                    request.parent_id
                ))
            })?;
        let side = match user.role {
            Role::Parent if parent.user_id == user.user_id => ChatSide::Parent,
            Role::Provider
                if self.providers.id_for_staff_user(&user.user_id).await?
                    == Some(workshop.provider_id) =>
            {
                ChatSide::Provider
            }
            _ => {
                return Err(Error::Forbidden(
                    "Only the parent and the workshop's provider may chat".to_string(),
                ))
            }
        };
        let room_id = self.rooms.create_if_missing(workshop.id, parent.id).await?;
        let room = self.room(room_id).await?;

        let message = self
            .messages
            .create(room.id, side.is_provider(), request.text.trim(), Utc::now())
            .await?;
        tracing::debug!(chat_room_id = %room.id, message_id = %message.id, "Sent chat message");

        self.hub
            .publish_to_room(room.id, PushEvent::ChatMessage(message.clone()));

        let recipients = match side {
            ChatSide::Parent => {
                let mut ids = self.providers.employee_user_ids(room.provider_id).await?;
                if let Some(provider) = self.providers.get_by_id(room.provider_id).await? {
                    ids.push(provider.user_id);
                }
                ids
            }
            ChatSide::Provider => vec![room.parent_user_id.clone()],
        };
        let notification =
            NewNotification::new(NotificationType::Chat, NotificationAction::Message, room.id)
                .with_data("WorkshopTitle", room.workshop_title.clone())
                .grouped_by(room.id.to_string());
        self.notifications.notify(notification, recipients).await;

        Ok(message)
    }

    /// Messages of a room, newest first.
    pub async fn get_messages(&self, room_id: Uuid, offset: OffsetFilter) -> Result<Vec<ChatMessage>> {
        offset.validate()?;
        let order = OrderBy::new().desc("m.created_time").asc("m.id");
        self.messages
            .get(
                Page::from(offset),
                Filter::eq("m.chat_room_id", room_id),
                &order,
            )
            .await
    }

    /// Returns a page of messages and marks what the other side sent as read.
    pub async fn get_messages_and_mark_read(
        &self,
        room_id: Uuid,
        offset: OffsetFilter,
        user: &CurrentUser,
    ) -> Result<Vec<ChatMessage>> {
        let room = self.room(room_id).await?;
        let side = self.side_in(&room, user).await?;

        let read_ids = self
            .messages
            .mark_read(room_id, !side.is_provider(), Utc::now())
            .await?;
        if !read_ids.is_empty() {
            tracing::debug!(chat_room_id = %room_id, read = read_ids.len(), "Marked chat messages read");
            self.hub.publish_to_room(
                room_id,
                PushEvent::MessagesRead {
                    chat_room_id: room_id,
                    message_ids: read_ids,
                },
            );
        }
        self.get_messages(room_id, offset).await
    }

    /// Parent messages the provider side has not read yet across the workshop.
    pub async fn count_unread(&self, workshop_id: Uuid) -> Result<i64> {
        self.messages.count_unread_for_workshop(workshop_id).await
    }

    async fn room(&self, id: Uuid) -> Result<ChatRoom> {
        self.rooms
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Chat room with Id = {id} doesn't exist")))
    }
}
