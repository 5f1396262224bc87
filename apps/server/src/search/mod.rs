//! Workshop search index.
//!
//! Workshops are mirrored into an external index through sync records
//! (see [`crate::services::SearchSyncService`]). The index only ever sees
//! [`WorkshopDocument`]s.

mod elasticsearch;
mod memory;

pub use elasticsearch::ElasticsearchIndex;
pub use memory::MemorySearchIndex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Workshop, WorkshopStatus};
use crate::Result;

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Inserts or replaces the documents, keyed by workshop id.
    async fn index_all(&self, documents: &[WorkshopDocument]) -> Result<()>;

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopDocument {
    pub id: Uuid,
    pub title: String,
    pub short_title: Option<String>,
    pub provider_id: Uuid,
    pub provider_title: String,
    pub provider_ownership: String,
    pub price: Decimal,
    pub is_free: bool,
    pub min_age: i32,
    pub max_age: i32,
    pub available_seats: Option<i32>,
    pub taken_seats: i64,
    pub competitive_selection: bool,
    pub city: String,
    pub street: String,
    pub building_number: String,
    pub catottg_id: i64,
    pub location: GeoPoint,
    pub status: WorkshopStatus,
    pub is_blocked: bool,
    pub institution_id: Option<Uuid>,
    pub created_time: DateTime<Utc>,
}

/// Elasticsearch `geo_point` in object form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<&Workshop> for WorkshopDocument {
    fn from(w: &Workshop) -> Self {
        Self {
            id: w.id,
            title: w.title.clone(),
            short_title: w.short_title.clone(),
            provider_id: w.provider_id,
            provider_title: w.provider_title.clone(),
            provider_ownership: w.provider_ownership.to_string(),
            price: w.price,
            is_free: w.is_free,
            min_age: w.min_age,
            max_age: w.max_age,
            available_seats: w.available_seats,
            taken_seats: w.taken_seats,
            competitive_selection: w.competitive_selection,
            city: w.city.clone(),
            street: w.street.clone(),
            building_number: w.building_number.clone(),
            catottg_id: w.catottg_id,
            location: GeoPoint {
                lat: w.latitude,
                lon: w.longitude,
            },
            status: w.status,
            is_blocked: w.is_blocked,
            institution_id: w.institution_id,
            created_time: w.created_time,
        }
    }
}
