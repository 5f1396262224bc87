//! Server-sent event streams for notifications and chat rooms.

use crate::{
    auth::CurrentUser,
    push::PushEvent,
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

fn to_event(event: &PushEvent) -> Option<Event> {
    match Event::default().event(event.name()).json_data(event) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, event = event.name(), "Failed to encode push event");
            None
        }
    }
}

/// Forwards broadcast events until the channel closes. Lagging subscribers
/// skip what they missed.
fn events(
    mut receiver: broadcast::Receiver<PushEvent>,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = to_event(&event) {
                        yield Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Push subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

pub async fn notifications(State(state): State<AppState>, user: CurrentUser) -> Response {
    tracing::debug!(user_id = %user.user_id, "Notification stream opened");
    let receiver = state.hub.subscribe_user(&user.user_id);
    Sse::new(events(receiver))
        .keep_alive(KeepAlive::default())
        .into_response()
}

pub async fn chat_room(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(room_id): Path<Uuid>,
) -> Result<Response> {
    let room = state
        .chat_service
        .get_by_id(room_id)
        .await?
        .ok_or_else(|| Error::OutOfRange(format!("Chat room with Id = {room_id} doesn't exist")))?;
    state.chat_service.side_in(&room, &user).await?;

    tracing::debug!(user_id = %user.user_id, %room_id, "Chat stream opened");
    let receiver = state.hub.subscribe_room(room_id);
    Ok(Sse::new(events(receiver))
        .keep_alive(KeepAlive::default())
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn stream_ends_when_channel_closes() {
        let (sender, receiver) = broadcast::channel(4);
        sender
            .send(PushEvent::MessagesRead {
                chat_room_id: Uuid::new_v4(),
                message_ids: vec![],
            })
            .unwrap();
        drop(sender);

        let collected: Vec<_> = events(receiver).collect().await;
        assert_eq!(collected.len(), 1);
    }
}
