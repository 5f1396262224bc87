//! Ministry, region and area administrators.
//!
//! Accounts live on the identity server; every mutation is forwarded there
//! first with the caller's token and mirrored locally only on success.

use axum::http::StatusCode;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::{AdminRepository, Filter, NewUser, OrderBy, Page, UserRepository};
use crate::error::{ErrorResponse, Typed};
use crate::identity::{IdentityApi, IdentityResponse};
use crate::models::{
    split_search_words, Admin, AdminFilter, AdminInput, AdminKind, OffsetFilter, SearchResult,
    UserUpdate,
};
use crate::services::{AdminScope, CodeficatorService};
use crate::{Error, Result};

pub struct AdminService {
    admins: AdminRepository,
    users: UserRepository,
    codeficator: Arc<CodeficatorService>,
    identity: Arc<dyn IdentityApi>,
}

impl AdminService {
    pub fn new(
        admins: AdminRepository,
        users: UserRepository,
        codeficator: Arc<CodeficatorService>,
        identity: Arc<dyn IdentityApi>,
    ) -> Self {
        Self {
            admins,
            users,
            codeficator,
            identity,
        }
    }

    pub async fn get_by_id(&self, kind: AdminKind, user_id: &str) -> Result<Option<Admin>> {
        let filter = Filter::eq("ad.user_id", user_id).and(Filter::eq("ad.kind", kind.as_str()));
        self.admins.first(filter, &OrderBy::new()).await
    }

    pub async fn get_by_user_id(&self, kind: AdminKind, user_id: &str) -> Result<Admin> {
        self.get_by_id(kind, user_id).await?.ok_or_else(|| {
            Error::InvalidArgument(format!("{kind} admin with UserId = {user_id} doesn't exist"))
        })
    }

    /// Fails with `Forbidden` unless the caller's own institution and
    /// territory cover the target admin.
    async fn ensure_manages(
        &self,
        user: &CurrentUser,
        institution_id: Uuid,
        catottg_id: Option<i64>,
    ) -> Result<()> {
        let scope = AdminScope::resolve(user, &self.admins, &self.codeficator).await?;
        if manages(&scope, institution_id, catottg_id) {
            return Ok(());
        }
        tracing::warn!(user_id = %user.user_id, %institution_id, ?catottg_id, "Admin is outside of the caller's scope");
        Err(Error::Forbidden(
            "Admin is outside of the caller's institution or territory".to_string(),
        ))
    }

    /// Admins of `kind` visible to `user`, ordered by last name.
    pub async fn get_by_filter(
        &self,
        kind: AdminKind,
        filter: &AdminFilter,
        user: &CurrentUser,
    ) -> Result<SearchResult<Admin>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;

        let scope = AdminScope::resolve(user, &self.admins, &self.codeficator).await?;
        let Some(mut predicate) = admin_predicate(kind, filter, &scope) else {
            tracing::debug!(user_id = %user.user_id, ?kind, "Admin filter is outside of the caller's scope");
            return Ok(SearchResult::empty());
        };
        if let Some(catottg_id) = filter.catottg_id {
            let ids = self.codeficator.all_children_ids(catottg_id).await?;
            predicate = predicate.and(Filter::is_in("ad.catottg_id", ids.to_vec()));
        }

        let order = OrderBy::new().asc("u.last_name").asc("u.first_name").asc("ad.user_id");
        self.admins
            .search(predicate, &order, Page::from(offset))
            .await
    }

    pub async fn create(
        &self,
        kind: AdminKind,
        input: &AdminInput,
        user: &CurrentUser,
    ) -> Result<Typed<Admin>> {
        input.validate()?;
        if kind != AdminKind::Ministry && input.catottg_id.is_none() {
            return Err(Error::InvalidArgument(format!(
                "{kind} admin requires a CATOTTG id"
            )));
        }
        self.ensure_manages(user, input.institution_id, input.catottg_id)
            .await?;
        if self.users.email_taken(&input.email).await? {
            return Err(Error::InvalidArgument(format!(
                "Email {} is already taken",
                input.email
            )));
        }

        let response = self.identity.create_admin(kind, input, &user.token).await?;
        if !response.is_success {
            return Ok(Err(identity_failure(&response)));
        }
        let user_id = response
            .created_user_id()
            .or_else(|| input.user_id.clone())
            .ok_or_else(|| {
                Error::ExternalService("Identity server did not return the new user id".to_string())
            })?;

        let mut tx = self.admins.begin().await?;
        self.users
            .create(
                &mut *tx,
                &NewUser {
                    id: user_id.clone(),
                    first_name: input.first_name.clone(),
                    last_name: input.last_name.clone(),
                    middle_name: input.middle_name.clone(),
                    email: input.email.clone(),
                    phone_number: input.phone_number.clone(),
                    role: kind.role(),
                },
            )
            .await?;
        self.admins
            .upsert(
                &mut *tx,
                kind,
                &user_id,
                input.institution_id,
                input.catottg_id,
            )
            .await?;
        tx.commit().await?;
        tracing::info!(user_id = %user_id, ?kind, created_by = %user.user_id, "Created admin");

        Ok(Ok(self.get_by_user_id(kind, &user_id).await?))
    }

    pub async fn update(
        &self,
        kind: AdminKind,
        input: &AdminInput,
        user: &CurrentUser,
    ) -> Result<Typed<Admin>> {
        input.validate()?;
        let Some(user_id) = input.user_id.as_deref() else {
            return Err(Error::InvalidArgument("Admin user id is required".to_string()));
        };
        let Some(before) = self.get_by_id(kind, user_id).await? else {
            return Ok(Err(ErrorResponse::not_found()));
        };
        self.ensure_manages(user, before.institution_id, before.catottg_id)
            .await?;
        self.ensure_manages(user, input.institution_id, input.catottg_id)
            .await?;

        let response = self
            .identity
            .update_admin(kind, user_id, input, &user.token)
            .await?;
        if !response.is_success {
            return Ok(Err(identity_failure(&response)));
        }

        let mut tx = self.admins.begin().await?;
        self.users
            .update(
                &mut *tx,
                user_id,
                &UserUpdate {
                    first_name: input.first_name.clone(),
                    last_name: input.last_name.clone(),
                    middle_name: input.middle_name.clone(),
                    phone_number: input.phone_number.clone(),
                },
            )
            .await?;
        self.admins
            .upsert(
                &mut *tx,
                kind,
                user_id,
                input.institution_id,
                input.catottg_id,
            )
            .await?;
        tx.commit().await?;
        tracing::info!(user_id = %user_id, ?kind, updated_by = %user.user_id, "Updated admin");

        Ok(Ok(self.get_by_user_id(kind, user_id).await?))
    }

    pub async fn delete(
        &self,
        kind: AdminKind,
        user_id: &str,
        user: &CurrentUser,
    ) -> Result<Typed<()>> {
        let Some(target) = self.get_by_id(kind, user_id).await? else {
            return Ok(Err(ErrorResponse::not_found()));
        };
        self.ensure_manages(user, target.institution_id, target.catottg_id)
            .await?;
        let response = self
            .identity
            .delete_admin(kind, user_id, &user.token)
            .await?;
        if !response.is_success {
            return Ok(Err(identity_failure(&response)));
        }
        self.users.soft_delete(self.users.pool(), user_id).await?;
        tracing::info!(user_id = %user_id, ?kind, deleted_by = %user.user_id, "Deleted admin");
        Ok(Ok(()))
    }

    pub async fn block(
        &self,
        kind: AdminKind,
        user_id: &str,
        is_blocked: bool,
        user: &CurrentUser,
    ) -> Result<Typed<()>> {
        let Some(target) = self.get_by_id(kind, user_id).await? else {
            return Ok(Err(ErrorResponse::not_found()));
        };
        self.ensure_manages(user, target.institution_id, target.catottg_id)
            .await?;
        let response = self
            .identity
            .block_admin(kind, user_id, is_blocked, &user.token)
            .await?;
        if !response.is_success {
            return Ok(Err(identity_failure(&response)));
        }
        self.users
            .set_blocked(self.users.pool(), user_id, is_blocked)
            .await?;
        tracing::info!(user_id = %user_id, ?kind, is_blocked, "Changed admin block state");
        Ok(Ok(()))
    }
}

/// Predicate for listing admins of `kind` within `scope`, or `None` when the
/// requested filter lies outside of it.
fn admin_predicate(kind: AdminKind, filter: &AdminFilter, scope: &AdminScope) -> Option<Filter> {
    let mut predicate = Filter::eq("ad.kind", kind.as_str());

    match scope {
        AdminScope::Unrestricted => {
            if let Some(institution_id) = filter.institution_id {
                predicate = predicate.and(Filter::eq("ad.institution_id", institution_id));
            }
        }
        AdminScope::Institution(own) => {
            if filter.institution_id.is_some_and(|id| id != *own) {
                return None;
            }
            predicate = predicate.and(Filter::eq("ad.institution_id", *own));
        }
        AdminScope::Territory {
            institution_id,
            catottg_ids,
        } => {
            if filter.institution_id.is_some_and(|id| id != *institution_id) {
                return None;
            }
            if let Some(catottg_id) = filter.catottg_id {
                if !catottg_ids.is_empty() && !catottg_ids.contains(&catottg_id) {
                    return None;
                }
            }
            predicate = predicate.and(scope.filter("ad.institution_id", "ad.catottg_id"));
        }
        AdminScope::Nothing => return None,
    }

    if let Some(search) = &filter.search_string {
        predicate = predicate.and(Filter::all(split_search_words(search).into_iter().map(
            |word| {
                Filter::any([
                    Filter::starts_with("u.first_name", word.clone()),
                    Filter::starts_with("u.last_name", word.clone()),
                    Filter::starts_with("u.email", word),
                ])
            },
        )));
    }
    Some(predicate)
}

/// Whether `scope` covers an admin of `institution_id` placed at `catottg_id`.
fn manages(scope: &AdminScope, institution_id: Uuid, catottg_id: Option<i64>) -> bool {
    match scope {
        AdminScope::Unrestricted => true,
        AdminScope::Institution(own) => *own == institution_id,
        AdminScope::Territory {
            institution_id: own,
            catottg_ids,
        } => {
            *own == institution_id
                && (catottg_ids.is_empty()
                    || catottg_id.is_some_and(|id| catottg_ids.contains(&id)))
        }
        AdminScope::Nothing => false,
    }
}

fn identity_failure(response: &IdentityResponse) -> ErrorResponse {
    tracing::warn!(
        status = response.http_status_code,
        message = ?response.message,
        "Identity server rejected admin request"
    );
    let status =
        StatusCode::from_u16(response.http_status_code).unwrap_or(StatusCode::BAD_GATEWAY);
    let status = if status.is_success() {
        StatusCode::BAD_GATEWAY
    } else {
        status
    };
    ErrorResponse::new(status, response.message.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, QueryBuilder};

    fn sql(filter: Filter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_to(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn ministry_admin_can_not_look_into_other_institutions() {
        let own = Uuid::new_v4();
        let filter = AdminFilter {
            institution_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(admin_predicate(AdminKind::Region, &filter, &AdminScope::Institution(own)).is_none());

        let predicate =
            admin_predicate(AdminKind::Region, &AdminFilter::default(), &AdminScope::Institution(own))
                .unwrap();
        assert!(sql(predicate).contains("ad.institution_id = "));
    }

    #[test]
    fn region_admin_is_limited_to_own_territory() {
        let scope = AdminScope::Territory {
            institution_id: Uuid::new_v4(),
            catottg_ids: vec![10, 11],
        };
        let outside = AdminFilter {
            catottg_id: Some(99),
            ..Default::default()
        };
        assert!(admin_predicate(AdminKind::Area, &outside, &scope).is_none());

        let inside = AdminFilter {
            catottg_id: Some(11),
            ..Default::default()
        };
        let rendered = sql(admin_predicate(AdminKind::Area, &inside, &scope).unwrap());
        assert!(rendered.contains("ad.catottg_id = ANY("));
    }

    #[test]
    fn callers_without_scope_see_nothing() {
        assert!(admin_predicate(AdminKind::Ministry, &AdminFilter::default(), &AdminScope::Nothing)
            .is_none());
    }

    #[test]
    fn managed_admins_share_institution_and_territory() {
        let own = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        assert!(manages(&AdminScope::Unrestricted, foreign, None));
        assert!(manages(&AdminScope::Institution(own), own, Some(1)));
        assert!(!manages(&AdminScope::Institution(own), foreign, Some(1)));

        let region = AdminScope::Territory {
            institution_id: own,
            catottg_ids: vec![1, 3, 4, 2],
        };
        assert!(manages(&region, own, Some(3)));
        assert!(!manages(&region, own, Some(10)));
        assert!(!manages(&region, own, None));
        assert!(!manages(&region, foreign, Some(3)));
        assert!(!manages(&AdminScope::Nothing, own, Some(3)));
    }

    #[test]
    fn unsuccessful_identity_response_keeps_status() {
        let response = IdentityResponse {
            is_success: false,
            http_status_code: 409,
            message: Some("Email already taken".to_string()),
            result: None,
        };
        let error = identity_failure(&response);
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.message.as_deref(), Some("Email already taken"));

        let odd = IdentityResponse {
            http_status_code: 200,
            ..response
        };
        assert_eq!(identity_failure(&odd).status_code(), StatusCode::BAD_GATEWAY);
    }
}
