//! Workshops published by providers.

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::{Filter, OrderBy, Page, ProviderRepository, WorkshopRepository};
use crate::models::{
    split_search_words, OffsetFilter, OwnershipType, Role, SearchResult, SyncOperation, Workshop,
    WorkshopFilter, WorkshopInput, WorkshopOrder, WorkshopStatus,
};
use crate::queue::JobQueue;
use crate::services::{CodeficatorService, SearchSyncService};
use crate::{Error, Result};

pub struct WorkshopService {
    workshops: WorkshopRepository,
    providers: ProviderRepository,
    codeficator: Arc<CodeficatorService>,
    search_sync: Arc<SearchSyncService>,
    queue: Arc<dyn JobQueue>,
}

impl WorkshopService {
    pub fn new(
        workshops: WorkshopRepository,
        providers: ProviderRepository,
        codeficator: Arc<CodeficatorService>,
        search_sync: Arc<SearchSyncService>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            workshops,
            providers,
            codeficator,
            search_sync,
            queue,
        }
    }

    /// Provider staff may manage their workshops; tech admins any workshop.
    async fn ensure_staff(&self, provider_id: Uuid, user: &CurrentUser) -> Result<()> {
        if user.role == Role::TechAdmin {
            return Ok(());
        }
        if user.role == Role::Provider
            && self.providers.id_for_staff_user(&user.user_id).await? == Some(provider_id)
        {
            return Ok(());
        }
        Err(Error::Forbidden(
            "Only the provider's staff may manage its workshops".to_string(),
        ))
    }

    pub async fn create(&self, input: &WorkshopInput, user: &CurrentUser) -> Result<Workshop> {
        input.validate()?;
        let provider = self
            .providers
            .get_by_id(input.provider_id)
            .await?
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Provider with Id = {} doesn't exist",
                    input.provider_id
                ))
            })?;
        self.ensure_staff(provider.id, user).await?;

        let id = Uuid::new_v4();
        self.workshops
            .create(self.workshops.pool(), id, input, &provider)
            .await?;
        tracing::info!(workshop_id = %id, provider_id = %provider.id, "Created workshop");

        self.search_sync
            .schedule(self.queue.as_ref(), &[id], SyncOperation::Create)
            .await?;
        self.get(id).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Workshop>> {
        self.workshops.get_by_id(id).await
    }

    /// The provider's other workshops, newest first.
    pub async fn get_by_provider_id(
        &self,
        provider_id: Uuid,
        exclude_id: Option<Uuid>,
        offset: OffsetFilter,
    ) -> Result<SearchResult<Workshop>> {
        offset.validate()?;
        let mut predicate = Filter::eq("w.provider_id", provider_id);
        if let Some(exclude_id) = exclude_id {
            predicate = predicate.and(Filter::ne("w.id", exclude_id));
        }
        let order = OrderBy::new().desc("w.created_time").asc("w.id");
        self.workshops
            .search(predicate, &order, Page::from(offset))
            .await
    }

    /// Public catalogue search. Blocked workshops are never listed.
    pub async fn get_by_filter(&self, filter: &WorkshopFilter) -> Result<SearchResult<Workshop>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;

        let mut predicate = Filter::eq("w.is_blocked", false);
        if let Some(text) = &filter.search_text {
            predicate = predicate.and(Filter::all(split_search_words(text).into_iter().map(
                |word| {
                    Filter::any([
                        Filter::starts_with("w.title", word.clone()),
                        Filter::starts_with("w.short_title", word.clone()),
                        Filter::starts_with("w.provider_title", word),
                    ])
                },
            )));
        }
        predicate = predicate.and(age_predicate(filter));
        if let Some(min_price) = filter.min_price {
            predicate = predicate.and(Filter::gte("w.price", min_price));
        }
        if let Some(max_price) = filter.max_price {
            predicate = predicate.and(Filter::lte("w.price", max_price));
        }
        if let Some(is_free) = filter.is_free {
            predicate = predicate.and(Filter::eq("w.is_free", is_free));
        }
        if !filter.statuses.is_empty() {
            predicate = predicate.and(Filter::in_names("w.status", &filter.statuses));
        }
        if !filter.provider_ids.is_empty() {
            predicate = predicate.and(Filter::is_in("w.provider_id", filter.provider_ids.clone()));
        }
        if let Some(institution_id) = filter.institution_id {
            predicate = predicate.and(Filter::eq("p.institution_id", institution_id));
        }
        if let Some(catottg_id) = filter.catottg_id {
            let ids = self.codeficator.all_children_ids(catottg_id).await?;
            predicate = predicate.and(Filter::is_in("w.catottg_id", ids.to_vec()));
        }

        self.workshops
            .search(predicate, &catalogue_order(filter.order_by), Page::from(offset))
            .await
    }

    pub async fn update(&self, input: &WorkshopInput, user: &CurrentUser) -> Result<Workshop> {
        input.validate()?;
        let id = input
            .id
            .ok_or_else(|| Error::InvalidArgument("Workshop id is required".to_string()))?;
        let before = self.get(id).await?;
        self.ensure_staff(before.provider_id, user).await?;
        if input.provider_id != before.provider_id {
            return Err(Error::InvalidArgument(
                "A workshop can not be moved to another provider".to_string(),
            ));
        }
        if let Some(seats) = input.available_seats {
            let taken = self.workshops.taken_seats(id).await?;
            if i64::from(seats) < taken {
                return Err(Error::InvalidArgument(format!(
                    "Available seats ({seats}) can not be less than taken seats ({taken})"
                )));
            }
        }

        self.workshops.update(id, input).await?;
        tracing::info!(workshop_id = %id, "Updated workshop");
        self.search_sync
            .schedule(self.queue.as_ref(), &[id], SyncOperation::Update)
            .await?;
        self.get(id).await
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: WorkshopStatus,
        user: &CurrentUser,
    ) -> Result<Workshop> {
        let workshop = self.get(id).await?;
        self.ensure_staff(workshop.provider_id, user).await?;
        if status == WorkshopStatus::Closed && !workshop.has_limited_seats() {
            return Err(Error::InvalidArgument(
                "Unable to close a workshop with an unlimited number of seats".to_string(),
            ));
        }
        if workshop.status == status {
            return Ok(workshop);
        }

        self.workshops
            .set_status(self.workshops.pool(), id, status)
            .await?;
        tracing::info!(workshop_id = %id, %status, "Changed workshop status");
        self.search_sync
            .schedule(self.queue.as_ref(), &[id], SyncOperation::Update)
            .await?;
        self.get(id).await
    }

    /// Sets the status chosen by seat accounting, outside of user requests.
    pub async fn set_status_automatically(&self, id: Uuid, status: WorkshopStatus) -> Result<()> {
        self.workshops
            .set_status(self.workshops.pool(), id, status)
            .await?;
        tracing::info!(workshop_id = %id, %status, "Workshop status follows taken seats");
        self.search_sync
            .schedule(self.queue.as_ref(), &[id], SyncOperation::Update)
            .await
    }

    pub async fn delete(&self, id: Uuid, user: &CurrentUser) -> Result<()> {
        let workshop = self.get(id).await?;
        self.ensure_staff(workshop.provider_id, user).await?;
        self.workshops.delete(id).await?;
        tracing::info!(workshop_id = %id, "Deleted workshop");
        self.search_sync
            .schedule(self.queue.as_ref(), &[id], SyncOperation::Delete)
            .await
    }

    pub async fn get_taken_seats(&self, id: Uuid) -> Result<i64> {
        self.workshops.taken_seats(id).await
    }

    async fn get(&self, id: Uuid) -> Result<Workshop> {
        self.workshops
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Workshop with Id = {id} doesn't exist")))
    }
}

fn catalogue_order(order: WorkshopOrder) -> OrderBy {
    let order_by = match order {
        WorkshopOrder::Newest => OrderBy::new().desc("w.created_time"),
        WorkshopOrder::Title => OrderBy::new().asc("w.title"),
        WorkshopOrder::PriceAsc => OrderBy::new().asc("w.price"),
        WorkshopOrder::PriceDesc => OrderBy::new().desc("w.price"),
    };
    order_by.asc("w.id")
}

/// Age bounds default to 0 and 100, so a filter without them matches every
/// workshop.
fn age_predicate(filter: &WorkshopFilter) -> Filter {
    if filter.min_age.is_none() && filter.max_age.is_none() {
        return Filter::True;
    }
    let min = filter.min_age.unwrap_or(0);
    let max = filter.max_age.unwrap_or(100);
    if filter.is_appropriate_age {
        Filter::gte("w.min_age", min).and(Filter::lte("w.max_age", max))
    } else {
        Filter::lte("w.min_age", max).and(Filter::gte("w.max_age", min))
    }
}

/// Status a workshop should switch to after its taken seats moved from
/// `taken_before` to `taken_after`. Unlimited workshops and those of
/// state-owned providers are never switched.
pub fn status_after_seat_change(
    workshop: &Workshop,
    taken_before: i64,
    taken_after: i64,
) -> Option<WorkshopStatus> {
    let available = i64::from(workshop.available_seats?);
    if workshop.provider_ownership == OwnershipType::State {
        return None;
    }
    match workshop.status {
        WorkshopStatus::Open if taken_after > taken_before && taken_after >= available => {
            Some(WorkshopStatus::Closed)
        }
        WorkshopStatus::Closed if taken_after < taken_before && taken_after == available - 1 => {
            Some(WorkshopStatus::Open)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::{Postgres, QueryBuilder};

    fn workshop(available_seats: Option<i32>, status: WorkshopStatus) -> Workshop {
        Workshop {
            id: Uuid::new_v4(),
            title: "Robotics".to_string(),
            short_title: None,
            email: "robots@example.com".to_string(),
            phone_number: "+380501234567".to_string(),
            website: None,
            description: "Build robots".to_string(),
            min_age: 8,
            max_age: 14,
            price: Decimal::ZERO,
            is_free: true,
            available_seats,
            taken_seats: 0,
            competitive_selection: false,
            status,
            is_blocked: false,
            provider_id: Uuid::new_v4(),
            provider_title: "Tech school".to_string(),
            provider_status: ProviderStatus::Approved,
            provider_ownership: OwnershipType::Private,
            institution_id: None,
            city: "Kyiv".to_string(),
            street: "Main".to_string(),
            building_number: "1".to_string(),
            catottg_id: 1,
            latitude: 50.45,
            longitude: 30.52,
            created_time: Utc::now(),
            updated_time: Utc::now(),
            is_deleted: false,
        }
    }

    #[test]
    fn filling_the_last_seat_closes_the_workshop() {
        let w = workshop(Some(3), WorkshopStatus::Open);
        assert_eq!(status_after_seat_change(&w, 2, 3), Some(WorkshopStatus::Closed));
        assert_eq!(status_after_seat_change(&w, 1, 2), None);
    }

    #[test]
    fn open_overbooked_workshop_stays_open_without_new_seats() {
        let w = workshop(Some(3), WorkshopStatus::Open);
        assert_eq!(status_after_seat_change(&w, 4, 4), None);
        assert_eq!(status_after_seat_change(&w, 4, 3), None);
        assert_eq!(status_after_seat_change(&w, 4, 5), Some(WorkshopStatus::Closed));
    }

    #[test]
    fn freeing_a_seat_reopens_a_full_workshop() {
        let w = workshop(Some(3), WorkshopStatus::Closed);
        assert_eq!(status_after_seat_change(&w, 3, 2), Some(WorkshopStatus::Open));
        // A workshop closed by hand with free seats stays closed.
        assert_eq!(status_after_seat_change(&w, 2, 1), None);
    }

    #[test]
    fn unlimited_and_state_workshops_never_switch() {
        let unlimited = workshop(None, WorkshopStatus::Open);
        assert_eq!(status_after_seat_change(&unlimited, 100, 101), None);

        let mut state = workshop(Some(1), WorkshopStatus::Open);
        state.provider_ownership = OwnershipType::State;
        assert_eq!(status_after_seat_change(&state, 0, 1), None);
    }

    #[test]
    fn catalogue_order_is_stable() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        catalogue_order(WorkshopOrder::PriceDesc).push_to(&mut qb);
        let sql = qb.sql().to_string();
        assert!(sql.contains("w.price DESC"));
        assert!(sql.ends_with("w.id ASC"));
    }

    #[test]
    fn age_range_overlaps_unless_appropriate_age_is_required() {
        let sql = |filter: &WorkshopFilter| {
            let mut qb = QueryBuilder::<Postgres>::new("");
            age_predicate(filter).push_to(&mut qb);
            qb.sql().to_string()
        };
        assert_eq!(sql(&WorkshopFilter::default()), "TRUE");

        let overlap = WorkshopFilter {
            min_age: Some(10),
            max_age: Some(15),
            ..Default::default()
        };
        assert_eq!(sql(&overlap), "(w.min_age <= $1 AND w.max_age >= $2)");

        let inside = WorkshopFilter {
            is_appropriate_age: true,
            ..overlap
        };
        assert_eq!(sql(&inside), "(w.min_age >= $1 AND w.max_age <= $2)");
    }
}
