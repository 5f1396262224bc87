//! Best-effort real-time fan-out for notifications and chat.
//!
//! One broadcast channel per user id and per chat room, created on first
//! subscription and dropped once nobody listens. Publishing to a key without
//! subscribers is a no-op.

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{ChatMessage, Notification};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    Notification(Notification),
    ChatMessage(ChatMessage),
    #[serde(rename_all = "camelCase")]
    MessagesRead {
        chat_room_id: Uuid,
        message_ids: Vec<Uuid>,
    },
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::Notification(_) => "notification",
            PushEvent::ChatMessage(_) => "chatMessage",
            PushEvent::MessagesRead { .. } => "messagesRead",
        }
    }
}

struct Channels<K> {
    senders: Mutex<HashMap<K, broadcast::Sender<PushEvent>>>,
}

impl<K: Eq + Hash + Clone> Channels<K> {
    fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, broadcast::Sender<PushEvent>>> {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscribe(&self, key: K) -> broadcast::Receiver<PushEvent> {
        self.lock()
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    fn publish(&self, key: &K, event: PushEvent) -> usize {
        let mut senders = self.lock();
        let Some(sender) = senders.get(key) else {
            return 0;
        };
        match sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                senders.remove(key);
                0
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

pub struct Hub {
    users: Channels<String>,
    rooms: Channels<Uuid>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            users: Channels::new(),
            rooms: Channels::new(),
        }
    }

    pub fn subscribe_user(&self, user_id: &str) -> broadcast::Receiver<PushEvent> {
        self.users.subscribe(user_id.to_string())
    }

    pub fn subscribe_room(&self, room_id: Uuid) -> broadcast::Receiver<PushEvent> {
        self.rooms.subscribe(room_id)
    }

    /// Returns the number of live subscribers reached.
    pub fn publish_to_user(&self, user_id: &str, event: PushEvent) -> usize {
        let delivered = self.users.publish(&user_id.to_string(), event);
        tracing::trace!(user_id, delivered, "Pushed to user");
        delivered
    }

    pub fn publish_to_room(&self, room_id: Uuid, event: PushEvent) -> usize {
        let delivered = self.rooms.publish(&room_id, event);
        tracing::trace!(%room_id, delivered, "Pushed to chat room");
        delivered
    }

    pub fn channel_count(&self) -> usize {
        self.users.len() + self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_event(room: Uuid) -> PushEvent {
        PushEvent::MessagesRead {
            chat_room_id: room,
            message_ids: vec![Uuid::new_v4()],
        }
    }

    #[tokio::test]
    async fn subscribers_receive_room_events() {
        let hub = Hub::new();
        let room = Uuid::new_v4();
        let mut first = hub.subscribe_room(room);
        let mut second = hub.subscribe_room(room);

        assert_eq!(hub.publish_to_room(room, read_event(room)), 2);
        assert_eq!(first.recv().await.unwrap().name(), "messagesRead");
        assert_eq!(second.recv().await.unwrap().name(), "messagesRead");
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let hub = Hub::new();
        assert_eq!(hub.publish_to_user("nobody", read_event(Uuid::new_v4())), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn channels_are_dropped_when_subscribers_leave() {
        let hub = Hub::new();
        let receiver = hub.subscribe_user("user-1");
        assert_eq!(hub.channel_count(), 1);
        drop(receiver);

        assert_eq!(hub.publish_to_user("user-1", read_event(Uuid::new_v4())), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let room = Uuid::new_v4();
        let value = serde_json::to_value(read_event(room)).unwrap();
        assert_eq!(value["event"], "messagesRead");
        assert_eq!(value["data"]["chatRoomId"], room.to_string());
    }
}
