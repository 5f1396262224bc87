//! Enrollment applications: creation limits, status workflow and listings.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::config::ApplicationsConfig;
use crate::db::{
    ApplicationRepository, ApplicationStatusChange, ChildRepository, Filter, OrderBy, Page,
    ParentRepository, ProviderRepository, WorkshopRepository,
};
use crate::error::{ApiError, ErrorResponse, Typed};
use crate::metrics::{APPLICATIONS_CREATED, APPLICATION_STATUS_CHANGES};
use crate::models::{
    split_search_words, Application, ApplicationCreate, ApplicationCreated, ApplicationFilter,
    ApplicationStatus, ApplicationUpdate, NewNotification, NotificationAction, NotificationType,
    OffsetFilter, Role, SearchResult, ShowApplications, SortDirection, WorkshopStatus,
};
use crate::services::status_permissions::can_change_status;
use crate::services::workshops::status_after_seat_change;
use crate::services::{AdminScope, ChangesLogService, NotificationService, WorkshopService};
use crate::{Error, Result};

/// Excludes applications whose child, parent or workshop was deleted.
const NOT_DELETED: Filter =
    Filter::Raw("c.is_deleted = FALSE AND pa.is_deleted = FALSE AND w.is_deleted = FALSE");

pub struct ApplicationService {
    applications: ApplicationRepository,
    workshops: WorkshopRepository,
    children: ChildRepository,
    parents: ParentRepository,
    providers: ProviderRepository,
    workshop_service: Arc<WorkshopService>,
    changes_log: Arc<ChangesLogService>,
    notifications: Arc<NotificationService>,
    config: ApplicationsConfig,
}

impl ApplicationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        applications: ApplicationRepository,
        workshops: WorkshopRepository,
        children: ChildRepository,
        parents: ParentRepository,
        providers: ProviderRepository,
        workshop_service: Arc<WorkshopService>,
        changes_log: Arc<ChangesLogService>,
        notifications: Arc<NotificationService>,
        config: ApplicationsConfig,
    ) -> Self {
        Self {
            applications,
            workshops,
            children,
            parents,
            providers,
            workshop_service,
            changes_log,
            notifications,
            config,
        }
    }

    pub async fn create(
        &self,
        request: &ApplicationCreate,
        user: &CurrentUser,
    ) -> Result<ApplicationCreated> {
        request.validate()?;

        let parent = self
            .parents
            .get_by_id(request.parent_id)
            .await?
            .filter(|p| p.user_id == user.user_id)
            .ok_or_else(|| {
                Error::InvalidArgument("Parent does not belong to the current user".to_string())
            })?;
        self.children
            .get_by_id(request.child_id)
            .await?
            .filter(|c| c.parent_id == parent.id)
            .ok_or_else(|| {
                Error::InvalidArgument("Child does not belong to the parent".to_string())
            })?;

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
        if workshop.is_blocked {
            return Err(Error::InvalidArgument(
                "Unable to create a new application for a workshop because workshop is blocked"
                    .to_string(),
            ));
        }
        if workshop.status != WorkshopStatus::Open {
            return Err(Error::InvalidArgument(
                "Unable to create a new application for a workshop because workshop status is closed"
                    .to_string(),
            ));
        }
        if !self
            .allowed_new_application_by_child_status(request.workshop_id, request.child_id)
            .await?
        {
            return Err(Error::InvalidArgument(
                "Unable to create a new application for a child because there's already \
                 appropriate status were found in this workshop"
                    .to_string(),
            ));
        }

        let now = Utc::now();
        let since = now - Duration::days(self.config.limit_days);
        let recent = self
            .applications
            .recent_creation_times(request.workshop_id, request.child_id, parent.id, since)
            .await?;
        if let Some(seconds_before_retry) =
            retry_after(&recent, self.config.limit, self.config.limit_days, now)
        {
            tracing::info!(
                workshop_id = %request.workshop_id,
                child_id = %request.child_id,
                seconds_before_retry,
                "Applications limit exceeded"
            );
            return Ok(ApplicationCreated::LimitExceeded {
                description: format!(
                    "Limit of applications per {} days is exceeded.",
                    self.config.limit_days
                ),
                seconds_before_retry,
            });
        }

        let id = Uuid::new_v4();
        self.applications
            .create(id, request.workshop_id, request.child_id, parent.id, now)
            .await?;
        APPLICATIONS_CREATED.inc();
        tracing::info!(application_id = %id, workshop_id = %request.workshop_id, "Created application");

        let application = self.get(id).await?;
        let recipients = self.provider_staff(application.provider_id).await?;
        self.notifications
            .notify(
                notification(&application, NotificationAction::Create),
                recipients,
            )
            .await;
        Ok(ApplicationCreated::Created { application })
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Application>> {
        self.applications.get_by_id(id).await
    }

    /// Admin listing limited to the caller's scope.
    pub async fn get_all(
        &self,
        filter: &ApplicationFilter,
        scope: &AdminScope,
    ) -> Result<SearchResult<Application>> {
        self.search(scope.applications(), filter).await
    }

    pub async fn get_all_by_parent(
        &self,
        parent_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<SearchResult<Application>> {
        self.search(Filter::eq("a.parent_id", parent_id), filter)
            .await
    }

    pub async fn get_count_by_parent(&self, parent_id: Uuid) -> Result<i64> {
        self.applications
            .count(NOT_DELETED.and(Filter::eq("a.parent_id", parent_id)))
            .await
    }

    pub async fn get_all_by_child(&self, child_id: Uuid) -> Result<Vec<Application>> {
        let order = OrderBy::new().desc("a.creation_time");
        self.applications
            .get(
                Page::unbounded(),
                NOT_DELETED.and(Filter::eq("a.child_id", child_id)),
                &order,
            )
            .await
    }

    pub async fn get_all_by_workshop(
        &self,
        workshop_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<SearchResult<Application>> {
        self.search(Filter::eq("a.workshop_id", workshop_id), filter)
            .await
    }

    pub async fn get_all_by_provider(
        &self,
        provider_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<SearchResult<Application>> {
        self.search(Filter::eq("w.provider_id", provider_id), filter)
            .await
    }

    /// False while the child has an active application to the workshop.
    pub async fn allowed_new_application_by_child_status(
        &self,
        workshop_id: Uuid,
        child_id: Uuid,
    ) -> Result<bool> {
        let active = Filter::eq("a.workshop_id", workshop_id)
            .and(Filter::eq("a.child_id", child_id))
            .and(Filter::in_names("a.status", ApplicationStatus::ACTIVE));
        Ok(!self.applications.any(active).await?)
    }

    /// A parent may review a workshop one of their children attends or attended.
    pub async fn allowed_to_review(&self, parent_id: Uuid, workshop_id: Uuid) -> Result<bool> {
        let attended = Filter::eq("a.parent_id", parent_id)
            .and(Filter::eq("a.workshop_id", workshop_id))
            .and(Filter::in_names("a.status", ApplicationStatus::REVIEWABLE));
        self.applications.any(attended).await
    }

    pub async fn change_approved_statuses_to_studying(&self) -> Result<Vec<Uuid>> {
        let ids = self.applications.approved_to_studying().await?;
        if !ids.is_empty() {
            APPLICATION_STATUS_CHANGES
                .with_label_values(&[ApplicationStatus::StudyingForYears.as_str()])
                .inc_by(ids.len() as u64);
            tracing::info!(updated = ids.len(), "Moved approved applications to studying");
        }
        Ok(ids)
    }

    pub async fn update(
        &self,
        request: &ApplicationUpdate,
        user: &CurrentUser,
    ) -> Result<Typed<Application>> {
        request.validate()?;
        let Some(before) = self.applications.get_by_id(request.id).await? else {
            return Ok(Err(ErrorResponse::bad_request("Application doesn't exist")
                .with_api_error(ApiError::new(
                    "Application",
                    "EntityIdDoesNotExist",
                    format!("Application with Id = {} doesn't exist", request.id),
                ))));
        };
        self.ensure_participant(&before, user).await?;
        if before.status == request.status {
            return Ok(Ok(before));
        }

        let workshop = self
            .workshops
            .get_by_id(before.workshop_id)
            .await?
            .ok_or_else(|| {
                Error::OutOfRange(format!(
                    "Workshop with Id = {} doesn't exist",
                    before.workshop_id
                ))
            })?;

        if request.status.is_valid() && !before.status.is_valid() {
            if workshop.is_full() {
                return Ok(Err(ErrorResponse::bad_request("Workshop is full")
                    .with_api_error(ApiError::new(
                        "Application",
                        "WorkshopIsFull",
                        "There are no available seats in the workshop",
                    ))));
            }
            let approved_elsewhere = Filter::eq("a.workshop_id", before.workshop_id)
                .and(Filter::eq("a.child_id", before.child_id))
                .and(Filter::ne("a.id", before.id))
                .and(Filter::in_names("a.status", ApplicationStatus::VALID));
            if self.applications.any(approved_elsewhere).await? {
                return Ok(Err(ErrorResponse::bad_request("Child is already approved")
                    .with_api_error(ApiError::new(
                        "Application",
                        "ChildIsAlreadyApproved",
                        "The child already has an approved application to this workshop",
                    ))));
            }
        }

        if !can_change_status(
            workshop.competitive_selection,
            user.role,
            before.status,
            request.status,
        ) {
            return Err(Error::InvalidArgument(format!(
                "Forbidden to update status from {} to {}",
                before.status, request.status
            )));
        }

        let change = status_change(&before, request, Utc::now());
        let mut after = before.clone();
        after.status = change.status;
        after.rejection_message = change.rejection_message.clone();
        after.approved_time = change.approved_time;
        after.ended_time = change.ended_time;

        let mut tx = self.applications.begin().await?;
        self.applications.update_status(&mut *tx, &change).await?;
        self.changes_log
            .add_entity_changes(
                &mut *tx,
                &before.id.to_string(),
                &before,
                &after,
                &user.user_id,
            )
            .await?;
        tx.commit().await?;

        APPLICATION_STATUS_CHANGES
            .with_label_values(&[after.status.as_str()])
            .inc();
        tracing::info!(
            application_id = %after.id,
            from = %before.status,
            to = %after.status,
            "Changed application status"
        );

        self.notify_status_change(&after).await?;

        let taken_after = self.workshops.taken_seats(workshop.id).await?;
        if let Some(status) = status_after_seat_change(&workshop, workshop.taken_seats, taken_after)
        {
            self.workshop_service
                .set_status_automatically(workshop.id, status)
                .await?;
        }

        Ok(Ok(self.get(after.id).await?))
    }

    /// Marks (or clears) the parent's applications to the provider's workshops
    /// as blocked by that provider.
    pub async fn block_by_provider(
        &self,
        provider_id: Uuid,
        parent_id: Uuid,
        is_blocked: bool,
    ) -> Result<u64> {
        let updated = self
            .applications
            .set_blocked_by_provider(provider_id, parent_id, is_blocked)
            .await?;
        tracing::info!(%provider_id, %parent_id, is_blocked, updated, "Changed blocked-by-provider flag");
        Ok(updated)
    }

    async fn search(
        &self,
        base: Filter,
        filter: &ApplicationFilter,
    ) -> Result<SearchResult<Application>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;
        let predicate = NOT_DELETED.and(base).and(filter_predicate(filter));
        self.applications
            .search(predicate, &filter_order(filter), Page::from(offset))
            .await
    }

    /// Parents touch only their own applications and providers only those to
    /// their workshops.
    pub async fn ensure_participant(&self, application: &Application, user: &CurrentUser) -> Result<()> {
        let allowed = match user.role {
            Role::Parent => application.parent_user_id == user.user_id,
            Role::Provider => {
                self.providers.id_for_staff_user(&user.user_id).await?
                    == Some(application.provider_id)
            }
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::Forbidden(
                "The application belongs to another user".to_string(),
            ))
        }
    }

    async fn notify_status_change(&self, application: &Application) -> Result<()> {
        let recipients = match application.status {
            ApplicationStatus::Approved
            | ApplicationStatus::Rejected
            | ApplicationStatus::AcceptedForSelection => {
                vec![application.parent_user_id.clone()]
            }
            ApplicationStatus::Left => self.provider_staff(application.provider_id).await?,
            _ => return Ok(()),
        };
        self.notifications
            .notify(
                notification(application, NotificationAction::Update),
                recipients,
            )
            .await;
        Ok(())
    }

    async fn provider_staff(&self, provider_id: Uuid) -> Result<Vec<String>> {
        let mut ids = self.providers.employee_user_ids(provider_id).await?;
        if let Some(provider) = self.providers.get_by_id(provider_id).await? {
            ids.push(provider.user_id);
        }
        Ok(ids)
    }

    async fn get(&self, id: Uuid) -> Result<Application> {
        self.applications
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Application with Id = {id} doesn't exist")))
    }
}

fn notification(application: &Application, action: NotificationAction) -> NewNotification {
    NewNotification::new(NotificationType::Application, action, application.id)
        .with_data("Status", application.status.as_str())
        .with_data("WorkshopTitle", application.workshop_title.clone())
        .with_data(
            "ChildFullName",
            format!(
                "{} {}",
                application.child_last_name, application.child_first_name
            ),
        )
        .grouped_by(application.status.as_str())
}

/// Seconds until another application is allowed, or `None` when under the
/// limit. `recent` holds creation times within the window, newest first.
pub fn retry_after(
    recent: &[DateTime<Utc>],
    limit: i64,
    limit_days: i64,
    now: DateTime<Utc>,
) -> Option<i64> {
    let limit = usize::try_from(limit).ok().filter(|l| *l > 0)?;
    if recent.len() < limit {
        return None;
    }
    let oldest_counted = recent[limit - 1];
    let allowed_at = oldest_counted + Duration::days(limit_days) + Duration::seconds(1);
    Some((allowed_at - now).num_seconds().max(0))
}

/// Persisted fields for moving `before` to the requested status.
pub fn status_change(
    before: &Application,
    request: &ApplicationUpdate,
    now: DateTime<Utc>,
) -> ApplicationStatusChange {
    let status = request.status;
    ApplicationStatusChange {
        id: before.id,
        status,
        rejection_message: if status == ApplicationStatus::Rejected {
            request.rejection_message.clone()
        } else {
            None
        },
        approved_time: if status == ApplicationStatus::Approved {
            Some(now)
        } else {
            before.approved_time
        },
        ended_time: if status.is_terminal() { Some(now) } else { None },
    }
}

fn filter_predicate(filter: &ApplicationFilter) -> Filter {
    let mut predicate = Filter::True;
    if !filter.statuses.is_empty() {
        predicate = predicate.and(Filter::in_names("a.status", &filter.statuses));
    }
    if !filter.workshops.is_empty() {
        predicate = predicate.and(Filter::is_in("a.workshop_id", filter.workshops.clone()));
    }
    if !filter.children.is_empty() {
        predicate = predicate.and(Filter::is_in("a.child_id", filter.children.clone()));
    }
    if let Some(search) = &filter.search_string {
        predicate = predicate.and(Filter::all(split_search_words(search).into_iter().map(
            |word| {
                Filter::any([
                    Filter::eq("w.title", word.clone()),
                    Filter::starts_with("w.provider_title", word.clone()),
                    Filter::starts_with("p.full_title_en", word.clone()),
                    Filter::starts_with("c.first_name", word.clone()),
                    Filter::starts_with("c.middle_name", word.clone()),
                    Filter::starts_with("c.last_name", word),
                ])
            },
        )));
    }
    match filter.show {
        ShowApplications::All => predicate,
        ShowApplications::Blocked => predicate.and(Filter::eq("a.is_blocked_by_provider", true)),
        ShowApplications::Unblocked => {
            predicate.and(Filter::eq("a.is_blocked_by_provider", false))
        }
    }
}

fn filter_order(filter: &ApplicationFilter) -> OrderBy {
    let mut order = OrderBy::new();
    if filter.show == ShowApplications::All {
        order = order.asc("a.is_blocked_by_provider");
    }
    if filter.order_by_status {
        order = order.by_position("a.status", ApplicationStatus::NAMES, SortDirection::Asc);
    }
    order = if filter.order_by_date_ascending {
        order.asc("a.creation_time")
    } else {
        order.desc("a.creation_time")
    };
    if filter.order_by_alphabetically {
        order = order.asc("pu.last_name");
    }
    order.asc("a.id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, QueryBuilder};

    fn application(status: ApplicationStatus) -> Application {
        Application {
            id: Uuid::new_v4(),
            workshop_id: Uuid::new_v4(),
            child_id: Uuid::new_v4(),
            parent_id: Uuid::new_v4(),
            status,
            rejection_message: None,
            is_blocked_by_provider: false,
            creation_time: Utc::now(),
            approved_time: None,
            ended_time: None,
            workshop_title: "Robotics".to_string(),
            provider_id: Uuid::new_v4(),
            provider_title: "Tech school".to_string(),
            child_first_name: "Olena".to_string(),
            child_last_name: "Koval".to_string(),
            child_middle_name: None,
            parent_user_id: "parent".to_string(),
            parent_first_name: "Iryna".to_string(),
            parent_last_name: "Koval".to_string(),
        }
    }

    fn request(status: ApplicationStatus, rejection: Option<&str>) -> ApplicationUpdate {
        ApplicationUpdate {
            id: Uuid::new_v4(),
            status,
            rejection_message: rejection.map(str::to_string),
        }
    }

    #[test]
    fn retry_is_counted_from_the_limit_th_newest_application() {
        let now = Utc::now();
        let recent = vec![now - Duration::days(1), now - Duration::days(3)];

        assert_eq!(retry_after(&recent[..1], 2, 7, now), None);

        let seconds = retry_after(&recent, 2, 7, now).unwrap();
        let expected = (Duration::days(4) + Duration::seconds(1)).num_seconds();
        assert_eq!(seconds, expected);
    }

    #[test]
    fn non_positive_limit_disables_the_check() {
        let now = Utc::now();
        assert_eq!(retry_after(&[now], 0, 7, now), None);
    }

    #[test]
    fn rejection_message_is_kept_only_when_rejecting() {
        let now = Utc::now();
        let before = application(ApplicationStatus::Pending);

        let rejected = status_change(&before, &request(ApplicationStatus::Rejected, Some("full")), now);
        assert_eq!(rejected.rejection_message.as_deref(), Some("full"));
        assert_eq!(rejected.ended_time, Some(now));

        let approved = status_change(&before, &request(ApplicationStatus::Approved, Some("x")), now);
        assert_eq!(approved.rejection_message, None);
        assert_eq!(approved.approved_time, Some(now));
        assert_eq!(approved.ended_time, None);
    }

    #[test]
    fn leaving_keeps_the_approval_time() {
        let now = Utc::now();
        let mut before = application(ApplicationStatus::StudyingForYears);
        let approved_at = now - Duration::days(30);
        before.approved_time = Some(approved_at);

        let left = status_change(&before, &request(ApplicationStatus::Left, None), now);
        assert_eq!(left.approved_time, Some(approved_at));
        assert_eq!(left.ended_time, Some(now));
    }

    #[test]
    fn blocked_applications_sort_last_when_showing_all() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        let filter = ApplicationFilter {
            order_by_status: true,
            ..Default::default()
        };
        filter_order(&filter).push_to(&mut qb);
        assert_eq!(
            qb.sql(),
            " ORDER BY a.is_blocked_by_provider ASC, CASE a.status WHEN 'Pending' THEN 0 \
             WHEN 'AcceptedForSelection' THEN 1 WHEN 'Approved' THEN 2 \
             WHEN 'StudyingForYears' THEN 3 WHEN 'Completed' THEN 4 WHEN 'Rejected' THEN 5 \
             WHEN 'Left' THEN 6 ELSE 7 END ASC, a.creation_time DESC, a.id ASC"
        );

        let mut qb = QueryBuilder::<Postgres>::new("");
        let blocked = ApplicationFilter {
            show: ShowApplications::Blocked,
            order_by_date_ascending: true,
            ..Default::default()
        };
        filter_order(&blocked).push_to(&mut qb);
        assert_eq!(qb.sql(), " ORDER BY a.creation_time ASC, a.id ASC");
    }

    #[test]
    fn creation_time_sorts_before_parent_name() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        let filter = ApplicationFilter {
            show: ShowApplications::Blocked,
            order_by_date_ascending: true,
            order_by_alphabetically: true,
            ..Default::default()
        };
        filter_order(&filter).push_to(&mut qb);
        assert_eq!(
            qb.sql(),
            " ORDER BY a.creation_time ASC, pu.last_name ASC, a.id ASC"
        );
    }

    #[test]
    fn search_matches_exact_workshop_title_and_name_prefixes() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        let filter = ApplicationFilter {
            search_string: Some("Robo".to_string()),
            show: ShowApplications::All,
            ..Default::default()
        };
        filter_predicate(&filter).push_to(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains("w.title = $1"), "{sql}");
        assert!(!sql.contains("w.title ILIKE"), "{sql}");
        assert!(sql.contains("w.provider_title ILIKE"), "{sql}");
        assert!(sql.contains("p.full_title_en ILIKE"), "{sql}");
        assert!(sql.contains("c.middle_name ILIKE"), "{sql}");
        assert!(!sql.contains("pu.last_name"), "{sql}");
    }
}
