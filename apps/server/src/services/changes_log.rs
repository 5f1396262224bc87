//! Audit trail of tracked property changes on providers and applications.

use sqlx::PgExecutor;

use crate::config::ChangesLogConfig;
use crate::db::{ChangesLogRepository, Filter, OrderBy, Page};
use crate::models::{
    split_search_words, Application, ChangesLogEntity, ChangesLogEntry, ChangesLogFilter,
    OffsetFilter, PropertyChange, Provider, SearchResult,
};
use crate::services::AdminScope;
use crate::Result;

/// Exposes property values by name for change detection.
pub trait TrackedProperties {
    const ENTITY: ChangesLogEntity;

    /// Current value of `property`, `None` for null or unknown properties.
    fn property(&self, property: &str) -> Option<String>;
}

impl TrackedProperties for Provider {
    const ENTITY: ChangesLogEntity = ChangesLogEntity::Provider;

    fn property(&self, property: &str) -> Option<String> {
        match property {
            "FullTitle" => Some(self.full_title.clone()),
            "ShortTitle" => Some(self.short_title.clone()),
            "EdrpouIpn" => Some(self.edrpou_ipn.clone()),
            "Email" => Some(self.email.clone()),
            "PhoneNumber" => Some(self.phone_number.clone()),
            "Website" => self.website.clone(),
            "Ownership" => Some(self.ownership.to_string()),
            "LegalAddress" => Some(self.legal_address()),
            "License" => self.license.clone(),
            "LicenseStatus" => Some(self.license_status.to_string()),
            "Status" => Some(self.status.to_string()),
            "StatusReason" => self.status_reason.clone(),
            "InstitutionId" => self.institution_id.map(|id| id.to_string()),
            "IsBlocked" => Some(self.is_blocked.to_string()),
            _ => None,
        }
    }
}

impl TrackedProperties for Application {
    const ENTITY: ChangesLogEntity = ChangesLogEntity::Application;

    fn property(&self, property: &str) -> Option<String> {
        match property {
            "Status" => Some(self.status.to_string()),
            "RejectionMessage" => self.rejection_message.clone(),
            "IsBlockedByProvider" => Some(self.is_blocked_by_provider.to_string()),
            _ => None,
        }
    }
}

/// Tracked properties whose values differ between the two snapshots.
pub fn diff<T: TrackedProperties>(tracked: &[String], before: &T, after: &T) -> Vec<PropertyChange> {
    tracked
        .iter()
        .filter_map(|name| {
            let old_value = before.property(name);
            let new_value = after.property(name);
            (old_value != new_value).then(|| PropertyChange {
                property_name: name.clone(),
                old_value,
                new_value,
            })
        })
        .collect()
}

pub struct ChangesLogService {
    repo: ChangesLogRepository,
    tracked: ChangesLogConfig,
}

impl ChangesLogService {
    pub fn new(repo: ChangesLogRepository, tracked: ChangesLogConfig) -> Self {
        Self { repo, tracked }
    }

    pub fn tracked_properties(&self, entity: ChangesLogEntity) -> &[String] {
        match entity {
            ChangesLogEntity::Provider => &self.tracked.provider,
            ChangesLogEntity::Application => &self.tracked.application,
        }
    }

    /// Writes one row per changed tracked property. Returns the number written.
    pub async fn add_entity_changes<'e, T: TrackedProperties>(
        &self,
        exec: impl PgExecutor<'e>,
        entity_id: &str,
        before: &T,
        after: &T,
        user_id: &str,
    ) -> Result<u64> {
        let changes = diff(self.tracked_properties(T::ENTITY), before, after);
        if changes.is_empty() {
            return Ok(0);
        }
        let written = self
            .repo
            .add_changes(exec, T::ENTITY, entity_id, &changes, user_id)
            .await?;
        tracing::debug!(entity = %T::ENTITY, entity_id, written, "Recorded entity changes");
        Ok(written)
    }

    pub async fn get_changes(
        &self,
        filter: &ChangesLogFilter,
        scope: &AdminScope,
    ) -> Result<SearchResult<ChangesLogEntry>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;

        let mut predicate = Filter::eq("cl.entity_type", filter.entity_type.as_str());
        if let Some(property) = &filter.property_name {
            predicate = predicate.and(Filter::eq("cl.property_name", property.as_str()));
        }
        if let Some(entity_id) = &filter.entity_id {
            predicate = predicate.and(Filter::eq("cl.entity_id", entity_id.as_str()));
        }
        if let Some(from) = filter.date_from {
            predicate = predicate.and(Filter::gte("cl.updated_date", from));
        }
        if let Some(to) = filter.date_to.and_then(|d| d.succ_opt()) {
            predicate = predicate.and(Filter::lt("cl.updated_date", to));
        }
        if let Some(search) = &filter.search_string {
            predicate = predicate.and(Filter::all(split_search_words(search).into_iter().map(
                |word| {
                    Filter::any([
                        Filter::starts_with("u.first_name", word.clone()),
                        Filter::starts_with("u.last_name", word.clone()),
                        Filter::starts_with("u.middle_name", word.clone()),
                        Filter::starts_with("u.email", word.clone()),
                        Filter::contains("cl.old_value", word.clone()),
                        Filter::contains("cl.new_value", word),
                    ])
                },
            )));
        }
        predicate = predicate.and(match filter.entity_type {
            ChangesLogEntity::Provider => scope.provider_changes(),
            ChangesLogEntity::Application => scope.application_changes(),
        });

        let order = OrderBy::new().desc("cl.updated_date").desc("cl.id");
        self.repo.search(predicate, &order, Page::from(offset)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LicenseStatus, OwnershipType, ProviderStatus};
    use chrono::Utc;
    use uuid::Uuid;

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
            status_reason: None,
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

    fn tracked(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_changed_tracked_properties_are_reported() {
        let before = provider();
        let mut after = before.clone();
        after.full_title = "Music school".to_string();
        after.short_title = "Music".to_string();
        after.license = Some("LIC-1".to_string());

        let changes = diff(&tracked(&["FullTitle", "License", "Status"]), &before, &after);
        assert_eq!(
            changes,
            vec![
                PropertyChange {
                    property_name: "FullTitle".to_string(),
                    old_value: Some("Art school".to_string()),
                    new_value: Some("Music school".to_string()),
                },
                PropertyChange {
                    property_name: "License".to_string(),
                    old_value: None,
                    new_value: Some("LIC-1".to_string()),
                },
            ]
        );
    }

    #[test]
    fn legal_address_tracks_every_address_part() {
        let before = provider();
        let mut after = before.clone();
        after.legal_catottg_id = 11;
        assert_eq!(diff(&tracked(&["LegalAddress"]), &before, &after).len(), 1);
    }

    #[test]
    fn unknown_properties_never_differ() {
        let before = provider();
        let mut after = before.clone();
        after.status = ProviderStatus::Pending;
        assert!(diff(&tracked(&["NoSuchProperty"]), &before, &after).is_empty());
    }
}
