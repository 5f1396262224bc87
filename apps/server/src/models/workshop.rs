use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{comma_separated, OwnershipType, ProviderStatus, WorkshopStatus};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    pub id: Uuid,
    pub title: String,
    pub short_title: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub website: Option<String>,
    pub description: String,
    pub min_age: i32,
    pub max_age: i32,
    pub price: Decimal,
    pub is_free: bool,
    /// `None` means the number of seats is unlimited.
    pub available_seats: Option<i32>,
    pub taken_seats: i64,
    pub competitive_selection: bool,
    pub status: WorkshopStatus,
    pub is_blocked: bool,
    pub provider_id: Uuid,
    pub provider_title: String,
    pub provider_status: ProviderStatus,
    pub provider_ownership: OwnershipType,
    pub institution_id: Option<Uuid>,
    pub city: String,
    pub street: String,
    pub building_number: String,
    pub catottg_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
}

impl Workshop {
    pub fn has_limited_seats(&self) -> bool {
        self.available_seats.is_some()
    }

    /// True when every limited seat is taken. Workshops run by state-owned
    /// providers never fill up.
    pub fn is_full(&self) -> bool {
        if self.provider_ownership == OwnershipType::State {
            return false;
        }
        match self.available_seats {
            Some(seats) => self.taken_seats >= i64::from(seats),
            None => false,
        }
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("price_must_not_be_negative"));
    }
    Ok(())
}

fn validate_age_range(input: &WorkshopInput) -> Result<(), ValidationError> {
    if input.min_age > input.max_age {
        return Err(ValidationError::new("min_age_exceeds_max_age"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_age_range"))]
pub struct WorkshopInput {
    pub id: Option<Uuid>,
    pub provider_id: Uuid,
    #[validate(length(min = 1, max = 60))]
    pub title: String,
    #[validate(length(max = 60))]
    pub short_title: Option<String>,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 15))]
    pub phone_number: String,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(min = 1, max = 3000))]
    pub description: String,
    #[validate(range(min = 0, max = 100))]
    pub min_age: i32,
    #[validate(range(min = 0, max = 100))]
    pub max_age: i32,
    #[validate(custom(function = "validate_price"))]
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub is_free: bool,
    #[validate(range(min = 1))]
    pub available_seats: Option<i32>,
    #[serde(default)]
    pub competitive_selection: bool,
    #[validate(length(min = 1, max = 60))]
    pub city: String,
    #[validate(length(min = 1, max = 60))]
    pub street: String,
    #[validate(length(min = 1, max = 15))]
    pub building_number: String,
    #[validate(range(min = 1))]
    pub catottg_id: i64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopStatusUpdate {
    pub status: WorkshopStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum WorkshopOrder {
    #[default]
    Newest,
    Title,
    PriceAsc,
    PriceDesc,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopFilter {
    pub search_text: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    /// Require the workshop's age range to lie inside `min_age..=max_age`
    /// instead of merely overlapping it.
    #[serde(default)]
    pub is_appropriate_age: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_free: Option<bool>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub statuses: Vec<WorkshopStatus>,
    #[serde(default, deserialize_with = "comma_separated")]
    pub provider_ids: Vec<Uuid>,
    pub catottg_id: Option<i64>,
    pub institution_id: Option<Uuid>,
    #[serde(default)]
    pub order_by: WorkshopOrder,
    pub from: Option<i64>,
    pub size: Option<i64>,
}
