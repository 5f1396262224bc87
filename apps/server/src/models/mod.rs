//! Domain entities and transfer objects

mod achievement;
mod admin;
mod application;
mod changes_log;
mod chat;
mod codeficator;
mod common;
mod enums;
mod notification;
mod provider;
mod user;
mod workshop;

pub use achievement::*;
pub use admin::*;
pub use application::*;
pub use changes_log::*;
pub use chat::*;
pub use codeficator::*;
pub use common::*;
pub use enums::*;
pub use notification::*;
pub use provider::*;
pub use user::*;
pub use workshop::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pending search-index synchronization for one record.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub id: Uuid,
    pub entity: SyncEntity,
    pub record_id: Uuid,
    pub operation: SyncOperation,
    pub operation_time: DateTime<Utc>,
}
