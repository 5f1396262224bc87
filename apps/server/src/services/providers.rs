//! Provider accounts: registration, moderation, licensing and blocking.

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::{Filter, OrderBy, Page, ProviderRepository, WorkshopRepository};
use crate::error::{ErrorResponse, Typed};
use crate::models::{
    split_search_words, LicenseStatus, NewNotification, NotificationAction, NotificationType,
    OffsetFilter, Provider, ProviderBlock, ProviderFilter, ProviderInput, ProviderStatus,
    ProviderStatusResult, ProviderStatusUpdate, SearchResult, SortDirection, SyncOperation,
};
use crate::queue::JobQueue;
use crate::services::{
    AdminScope, ChangesLogService, CodeficatorService, NotificationService, SearchSyncService,
};
use crate::{Error, Result};

pub struct ProviderService {
    providers: ProviderRepository,
    workshops: WorkshopRepository,
    changes_log: Arc<ChangesLogService>,
    notifications: Arc<NotificationService>,
    search_sync: Arc<SearchSyncService>,
    codeficator: Arc<CodeficatorService>,
    queue: Arc<dyn JobQueue>,
}

/// What an owner's edit changed besides the plain fields.
#[derive(Debug, Clone)]
pub struct ProviderUpdate {
    pub provider: Provider,
    pub status_changed: bool,
    pub title_changed: bool,
}

/// License status implied by the license text.
pub fn license_status_for(license: Option<&str>) -> LicenseStatus {
    match license {
        Some(l) if !l.trim().is_empty() => LicenseStatus::Pending,
        _ => LicenseStatus::NotProvided,
    }
}

/// Applies an owner's edit to `before`. A new legal title or EDRPOU/IPN sends
/// the provider back to moderation; editing a provider returned for edits
/// queues it for recheck.
pub fn apply_update(before: &Provider, input: &ProviderInput) -> ProviderUpdate {
    let mut after = before.clone();
    after.full_title = input.full_title.clone();
    after.short_title = input.short_title.clone();
    after.full_title_en = input.full_title_en.clone();
    after.short_title_en = input.short_title_en.clone();
    after.edrpou_ipn = input.edrpou_ipn.clone();
    after.email = input.email.clone();
    after.phone_number = input.phone_number.clone();
    after.website = input.website.clone();
    after.ownership = input.ownership;
    after.institution_id = input.institution_id;
    after.legal_street = input.legal_street.clone();
    after.legal_building_number = input.legal_building_number.clone();
    after.legal_catottg_id = input.legal_catottg_id;

    if before.license.as_deref().map(str::trim) != input.license.as_deref().map(str::trim) {
        after.license = input.license.clone();
        after.license_status = license_status_for(input.license.as_deref());
    }

    let title_changed = before.full_title != after.full_title;
    if title_changed || before.edrpou_ipn != after.edrpou_ipn {
        after.status = ProviderStatus::Pending;
        after.status_reason = None;
    } else if before.status == ProviderStatus::Editing {
        after.status = ProviderStatus::Recheck;
        after.status_reason = None;
    }

    ProviderUpdate {
        status_changed: before.status != after.status,
        title_changed,
        provider: after,
    }
}

impl ProviderService {
    pub fn new(
        providers: ProviderRepository,
        workshops: WorkshopRepository,
        changes_log: Arc<ChangesLogService>,
        notifications: Arc<NotificationService>,
        search_sync: Arc<SearchSyncService>,
        codeficator: Arc<CodeficatorService>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            providers,
            workshops,
            changes_log,
            notifications,
            search_sync,
            codeficator,
            queue,
        }
    }

    pub async fn create(&self, input: &ProviderInput, user_id: &str) -> Result<Provider> {
        input.validate()?;
        if self.providers.any(Filter::eq("p.user_id", user_id)).await? {
            return Err(Error::InvalidArgument(
                "You can not create more than one account.".to_string(),
            ));
        }
        if self
            .providers
            .any(Filter::eq("p.edrpou_ipn", input.edrpou_ipn.as_str()))
            .await?
        {
            return Err(Error::InvalidArgument(
                "There is already a provider with such a data: EDRPOU/IPN".to_string(),
            ));
        }
        if self
            .providers
            .any(Filter::eq("p.email", input.email.as_str()))
            .await?
        {
            return Err(Error::InvalidArgument(
                "There is already a provider with such a data: Email".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let license_status = license_status_for(input.license.as_deref());
        self.providers
            .create(self.providers.pool(), id, user_id, input, license_status)
            .await?;
        tracing::info!(provider_id = %id, user_id, "Created provider");
        self.get(id).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Provider>> {
        self.providers.get_by_id(id).await
    }

    pub async fn get_by_user_id(&self, user_id: &str) -> Result<Option<Provider>> {
        self.providers
            .first(Filter::eq("p.user_id", user_id), &OrderBy::new())
            .await
    }

    /// Provider the user owns or works for.
    pub async fn get_id_for_staff_user(&self, user_id: &str) -> Result<Option<Uuid>> {
        self.providers.id_for_staff_user(user_id).await
    }

    pub async fn get_by_filter(
        &self,
        filter: &ProviderFilter,
        scope: &AdminScope,
    ) -> Result<SearchResult<Provider>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;

        let mut predicate = scope.providers();
        if let Some(search) = &filter.search_string {
            predicate = predicate.and(search_predicate(search));
        }
        if !filter.status.is_empty() {
            predicate = predicate.and(Filter::in_names("p.status", &filter.status));
        }
        if !filter.license_status.is_empty() {
            predicate = predicate.and(Filter::in_names(
                "p.license_status",
                &filter.license_status,
            ));
        }
        if let Some(institution_id) = filter.institution_id {
            predicate = predicate.and(Filter::eq("p.institution_id", institution_id));
        }
        if let Some(catottg_id) = filter.catottg_id {
            let ids = self.codeficator.all_children_ids(catottg_id).await?;
            predicate = predicate.and(Filter::is_in("p.legal_catottg_id", ids.to_vec()));
        }

        self.providers
            .search(predicate, &listing_order(), Page::from(offset))
            .await
    }

    /// Ids of every provider visible in `scope`.
    pub async fn get_provider_ids_in_scope(&self, scope: &AdminScope) -> Result<Vec<Uuid>> {
        Ok(self
            .providers
            .get_by_filter(scope.providers())
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect())
    }

    /// Owner or admin edit. Returns `None` for an unknown provider or when the
    /// EDRPOU/IPN belongs to another provider.
    pub async fn update(&self, input: &ProviderInput, user: &CurrentUser) -> Result<Option<Provider>> {
        input.validate()?;
        let Some(id) = input.id else {
            return Err(Error::InvalidArgument("Provider id is required".to_string()));
        };
        let Some(before) = self.providers.get_by_id(id).await? else {
            return Ok(None);
        };
        if !user.is_admin() && before.user_id != user.user_id {
            return Err(Error::Forbidden(
                "Only the owner may update the provider".to_string(),
            ));
        }
        let duplicate = Filter::eq("p.edrpou_ipn", input.edrpou_ipn.as_str())
            .and(Filter::ne("p.id", id));
        if self.providers.any(duplicate).await? {
            tracing::warn!(provider_id = %id, "EDRPOU/IPN belongs to another provider");
            return Ok(None);
        }

        let update = apply_update(&before, input);
        let after = &update.provider;
        let mut touched_workshops = Vec::new();

        let mut tx = self.providers.begin().await?;
        self.providers.update(&mut *tx, after).await?;
        if update.title_changed {
            touched_workshops.extend(
                self.workshops
                    .set_provider_title(&mut *tx, id, &after.full_title)
                    .await?,
            );
        }
        if update.status_changed {
            touched_workshops.extend(
                self.workshops
                    .set_provider_status(&mut *tx, id, after.status)
                    .await?,
            );
        }
        self.changes_log
            .add_entity_changes(&mut *tx, &id.to_string(), &before, after, &user.user_id)
            .await?;
        tx.commit().await?;

        tracing::info!(
            provider_id = %id,
            status_changed = update.status_changed,
            title_changed = update.title_changed,
            "Updated provider"
        );
        touched_workshops.sort();
        touched_workshops.dedup();
        self.search_sync
            .schedule(self.queue.as_ref(), &touched_workshops, SyncOperation::Update)
            .await?;
        if update.status_changed {
            self.notify_staff(after, NotificationAction::ProviderStatusChange)
                .await?;
        }
        Ok(Some(update.provider))
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        request: &ProviderStatusUpdate,
        user: &CurrentUser,
        scope: &AdminScope,
    ) -> Result<Typed<ProviderStatusResult>> {
        let Some(before) = self.providers.get_by_id(id).await? else {
            return Ok(Err(ErrorResponse::not_found()));
        };
        if !scope.contains(before.institution_id, before.legal_catottg_id) {
            return Ok(Err(ErrorResponse::forbidden(
                "Provider is outside of the administrator's area",
            )));
        }
        let mut after = before.clone();
        after.status = request.status;
        after.status_reason = request.status_reason.clone();

        let mut tx = self.providers.begin().await?;
        self.providers
            .set_status(&mut *tx, id, request.status, request.status_reason.as_deref())
            .await?;
        let workshops = self
            .workshops
            .set_provider_status(&mut *tx, id, request.status)
            .await?;
        self.changes_log
            .add_entity_changes(&mut *tx, &id.to_string(), &before, &after, &user.user_id)
            .await?;
        tx.commit().await?;

        tracing::info!(provider_id = %id, status = %request.status, "Changed provider status");
        self.search_sync
            .schedule(self.queue.as_ref(), &workshops, SyncOperation::Update)
            .await?;
        self.notify_staff(&after, NotificationAction::ProviderStatusChange)
            .await?;

        Ok(Ok(ProviderStatusResult {
            provider_id: id,
            status: request.status,
            status_reason: request.status_reason.clone(),
        }))
    }

    pub async fn update_license_status(
        &self,
        id: Uuid,
        license_status: LicenseStatus,
        user: &CurrentUser,
    ) -> Result<Provider> {
        let before = self.providers.get_by_id(id).await?.ok_or_else(|| {
            Error::OutOfRange(format!("Provider with Id = {id} doesn't exist"))
        })?;
        if !before.has_license() && license_status != LicenseStatus::NotProvided {
            return Err(Error::InvalidArgument(
                "Provider has no license to change its status".to_string(),
            ));
        }
        if before.has_license() && license_status == LicenseStatus::NotProvided {
            return Err(Error::InvalidArgument(
                "License status NotProvided is not allowed when a license is present".to_string(),
            ));
        }

        let mut after = before.clone();
        after.license_status = license_status;

        let mut tx = self.providers.begin().await?;
        self.providers
            .set_license_status(&mut *tx, id, license_status)
            .await?;
        self.changes_log
            .add_entity_changes(&mut *tx, &id.to_string(), &before, &after, &user.user_id)
            .await?;
        tx.commit().await?;

        tracing::info!(provider_id = %id, %license_status, "Changed provider license status");
        if license_status == LicenseStatus::Approved {
            self.notify_staff(&after, NotificationAction::LicenseApprove)
                .await?;
        }
        Ok(after)
    }

    pub async fn block(
        &self,
        id: Uuid,
        request: &ProviderBlock,
        user: &CurrentUser,
        scope: &AdminScope,
    ) -> Result<Typed<Provider>> {
        request.validate()?;
        let Some(before) = self.providers.get_by_id(id).await? else {
            return Ok(Err(ErrorResponse::not_found()));
        };
        if !scope.contains(before.institution_id, before.legal_catottg_id) {
            return Ok(Err(ErrorResponse::forbidden(
                "Provider is outside of the administrator's area",
            )));
        }
        if request.is_blocked
            && request
                .block_reason
                .as_deref()
                .map_or(true, |r| r.trim().is_empty())
        {
            return Ok(Err(ErrorResponse::bad_request(
                "Block reason is required to block a provider",
            )));
        }

        let (reason, phone) = if request.is_blocked {
            (
                request.block_reason.clone(),
                request.block_phone_number.clone(),
            )
        } else {
            (None, None)
        };
        let mut after = before.clone();
        after.is_blocked = request.is_blocked;
        after.block_reason = reason.clone();
        after.block_phone_number = phone.clone();

        let mut tx = self.providers.begin().await?;
        self.providers
            .set_blocked(
                &mut *tx,
                id,
                request.is_blocked,
                reason.as_deref(),
                phone.as_deref(),
            )
            .await?;
        let workshops = self
            .workshops
            .set_blocked_for_provider(&mut *tx, id, request.is_blocked)
            .await?;
        self.changes_log
            .add_entity_changes(&mut *tx, &id.to_string(), &before, &after, &user.user_id)
            .await?;
        tx.commit().await?;

        tracing::info!(provider_id = %id, is_blocked = request.is_blocked, "Changed provider block state");
        self.search_sync
            .schedule(self.queue.as_ref(), &workshops, SyncOperation::Update)
            .await?;
        let action = if request.is_blocked {
            NotificationAction::Block
        } else {
            NotificationAction::Unblock
        };
        self.notify_staff(&after, action).await?;
        Ok(Ok(after))
    }

    /// Soft-deletes the provider together with its workshops.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.providers.get_by_id(id).await?.is_none() {
            return Err(Error::InvalidArgument(format!(
                "Provider with Id = {id} doesn't exist"
            )));
        }

        let mut tx = self.providers.begin().await?;
        let workshops = self
            .workshops
            .soft_delete_for_provider(&mut *tx, id)
            .await?;
        self.providers.soft_delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(provider_id = %id, workshops = workshops.len(), "Deleted provider");
        self.search_sync
            .schedule(self.queue.as_ref(), &workshops, SyncOperation::Delete)
            .await
    }

    /// Owner plus every employee of the provider.
    pub async fn staff_user_ids(&self, provider: &Provider) -> Result<Vec<String>> {
        let mut ids = self.providers.employee_user_ids(provider.id).await?;
        ids.push(provider.user_id.clone());
        Ok(ids)
    }

    async fn notify_staff(&self, provider: &Provider, action: NotificationAction) -> Result<()> {
        let recipients = self.staff_user_ids(provider).await?;
        let notification = NewNotification::new(NotificationType::Provider, action, provider.id)
            .with_data("Status", provider.status.as_str())
            .with_data("LicenseStatus", provider.license_status.as_str())
            .grouped_by(provider.status.as_str());
        self.notifications.notify(notification, recipients).await;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Provider> {
        self.providers
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Provider with Id = {id} doesn't exist")))
    }
}

/// Words with letters match titles or the e-mail prefix; numeric words match
/// phone, EDRPOU/IPN or e-mail.
fn search_predicate(search: &str) -> Filter {
    Filter::all(split_search_words(search).into_iter().map(|word| {
        if word.chars().any(char::is_alphabetic) {
            Filter::any([
                Filter::starts_with("p.full_title", word.clone()),
                Filter::starts_with("p.short_title", word.clone()),
                Filter::starts_with("p.email", word),
            ])
        } else {
            Filter::any([
                Filter::contains("p.phone_number", word.clone()),
                Filter::starts_with("p.edrpou_ipn", word.clone()),
                Filter::starts_with("p.email", word),
            ])
        }
    }))
}

/// Unblocked first, then by moderation stage and title.
fn listing_order() -> OrderBy {
    OrderBy::new()
        .asc("p.is_blocked")
        .by_position("p.status", ProviderStatus::NAMES, SortDirection::Asc)
        .asc("p.full_title")
        .asc("p.id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OwnershipType;
    use chrono::Utc;
    use sqlx::{Postgres, QueryBuilder};

    fn provider() -> Provider {
        Provider {
            id: Uuid::new_v4(),
            full_title: "Art school".to_string(),
            short_title: "Art".to_string(),
            full_title_en: None,
            short_title_en: None,
            edrpou_ipn: "12345678".to_string(),
            email: "art@example.com".to_string(),
            phone_number: "+380501234567".to_string(),
            website: None,
            ownership: OwnershipType::Private,
            status: ProviderStatus::Approved,
            status_reason: Some("ok".to_string()),
            license: None,
            license_status: LicenseStatus::NotProvided,
            is_blocked: false,
            block_reason: None,
            block_phone_number: None,
            institution_id: None,
            legal_street: "Main".to_string(),
            legal_building_number: "1".to_string(),
            legal_catottg_id: 10,
            user_id: "owner".to_string(),
            created_time: Utc::now(),
            updated_time: Utc::now(),
            is_deleted: false,
        }
    }

    fn input_from(p: &Provider) -> ProviderInput {
        ProviderInput {
            id: Some(p.id),
            full_title: p.full_title.clone(),
            short_title: p.short_title.clone(),
            full_title_en: None,
            short_title_en: None,
            edrpou_ipn: p.edrpou_ipn.clone(),
            email: p.email.clone(),
            phone_number: p.phone_number.clone(),
            website: None,
            ownership: p.ownership,
            license: p.license.clone(),
            institution_id: p.institution_id,
            legal_street: p.legal_street.clone(),
            legal_building_number: p.legal_building_number.clone(),
            legal_catottg_id: p.legal_catottg_id,
        }
    }

    #[test]
    fn title_change_resets_status_to_pending() {
        let before = provider();
        let mut input = input_from(&before);
        input.full_title = "Music school".to_string();

        let update = apply_update(&before, &input);
        assert!(update.title_changed);
        assert!(update.status_changed);
        assert_eq!(update.provider.status, ProviderStatus::Pending);
        assert_eq!(update.provider.status_reason, None);
    }

    #[test]
    fn edrpou_change_resets_status_without_title_change() {
        let before = provider();
        let mut input = input_from(&before);
        input.edrpou_ipn = "87654321".to_string();

        let update = apply_update(&before, &input);
        assert!(!update.title_changed);
        assert_eq!(update.provider.status, ProviderStatus::Pending);
    }

    #[test]
    fn plain_edit_keeps_status_and_editing_moves_to_recheck() {
        let before = provider();
        let mut input = input_from(&before);
        input.phone_number = "+380671112233".to_string();
        let update = apply_update(&before, &input);
        assert!(!update.status_changed);
        assert_eq!(update.provider.status, ProviderStatus::Approved);

        let mut editing = provider();
        editing.status = ProviderStatus::Editing;
        let update = apply_update(&editing, &input_from(&editing));
        assert_eq!(update.provider.status, ProviderStatus::Recheck);
    }

    #[test]
    fn license_change_sets_license_status() {
        let before = provider();
        let mut input = input_from(&before);
        input.license = Some("LIC-42".to_string());
        assert_eq!(
            apply_update(&before, &input).provider.license_status,
            LicenseStatus::Pending
        );

        let mut licensed = provider();
        licensed.license = Some("LIC-42".to_string());
        licensed.license_status = LicenseStatus::Approved;
        let unchanged = apply_update(&licensed, &input_from(&licensed));
        assert_eq!(unchanged.provider.license_status, LicenseStatus::Approved);

        let mut removed = input_from(&licensed);
        removed.license = Some("  ".to_string());
        assert_eq!(
            apply_update(&licensed, &removed).provider.license_status,
            LicenseStatus::NotProvided
        );
    }

    #[test]
    fn numeric_words_search_phone_and_edrpou() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        search_predicate("art 1234").push_to(&mut qb);
        let sql = qb.sql().to_string();
        assert!(sql.contains("p.full_title"));
        assert!(sql.contains("p.edrpou_ipn"));
        assert!(sql.contains("p.phone_number"));
    }

    #[test]
    fn pending_providers_are_listed_before_approved_ones() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        listing_order().push_to(&mut qb);
        assert_eq!(
            qb.sql(),
            " ORDER BY p.is_blocked ASC, CASE p.status WHEN 'Pending' THEN 0 \
             WHEN 'Editing' THEN 1 WHEN 'Approved' THEN 2 WHEN 'Recheck' THEN 3 ELSE 4 END ASC, \
             p.full_title ASC, p.id ASC"
        );
    }
}
