//! Users, parents and their children.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::db::{ChildRepository, Filter, OrderBy, Page, ParentRepository, UserRepository};
use crate::error::{ErrorResponse, Typed};
use crate::models::{
    split_search_words, BlockUnblockParent, Child, ChildFilter, ChildInput, OffsetFilter, Parent,
    ParentCreate, ParentPersonalInfo, SearchResult, User, UserUpdate,
};
use crate::{Error, Result};

pub struct UserService {
    users: UserRepository,
}

impl UserService {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<User> {
        self.users
            .get_by_id(id.to_string())
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("User with Id = {id} doesn't exist")))
    }

    pub async fn get_all(&self) -> Result<Vec<User>> {
        self.users.get_all().await
    }

    pub async fn update(&self, id: &str, update: &UserUpdate) -> Result<User> {
        update.validate()?;
        self.users.update(self.users.pool(), id, update).await?;
        tracing::info!(user_id = id, "Updated user");
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.users.delete(id.to_string()).await?;
        tracing::info!(user_id = id, "Deleted user");
        Ok(())
    }
}

pub struct ParentService {
    parents: ParentRepository,
    users: UserRepository,
}

impl ParentService {
    pub fn new(parents: ParentRepository, users: UserRepository) -> Self {
        Self { parents, users }
    }

    /// Registers the current user as a parent.
    pub async fn create(&self, user_id: &str, info: &ParentCreate) -> Result<Parent> {
        info.validate()?;
        if self.users.get_by_id(user_id.to_string()).await?.is_none() {
            return Err(Error::InvalidArgument(format!(
                "User with Id = {user_id} doesn't exist"
            )));
        }
        if self
            .parents
            .any(Filter::eq("pa.user_id", user_id))
            .await?
        {
            return Err(Error::InvalidArgument(
                "You can not create more than one account.".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let mut tx = self.parents.begin().await?;
        self.parents.create(&mut *tx, id, user_id, info).await?;
        self.users.set_registered(&mut *tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(parent_id = %id, user_id, "Created parent");
        self.parents
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Parent {id} vanished after insert")))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Parent>> {
        self.parents.get_by_id(id).await
    }

    pub async fn get_by_user_id(&self, user_id: &str) -> Result<Option<Parent>> {
        self.parents
            .first(Filter::eq("pa.user_id", user_id), &OrderBy::new())
            .await
    }

    pub async fn get_personal_info(&self, user_id: &str) -> Result<ParentPersonalInfo> {
        let parent = self.get_by_user_id(user_id).await?.ok_or_else(|| {
            Error::OutOfRange(format!("Parent for user with Id = {user_id} doesn't exist"))
        })?;
        Ok(ParentPersonalInfo {
            first_name: parent.first_name,
            last_name: parent.last_name,
            middle_name: parent.middle_name,
            phone_number: parent.phone_number,
            gender: parent.gender,
            date_of_birth: parent.date_of_birth,
        })
    }

    /// Updates the user's names and phone together with the parent's details.
    pub async fn update(&self, user_id: &str, info: &ParentPersonalInfo) -> Result<ParentPersonalInfo> {
        info.validate()?;
        if info.gender.is_none() {
            return Err(Error::InvalidArgument("Gender is required".to_string()));
        }
        match info.date_of_birth {
            Some(date) => validate_date_of_birth(date, Utc::now().date_naive())?,
            None => {
                return Err(Error::InvalidArgument(
                    "Date of birth is required".to_string(),
                ))
            }
        }

        let user_update = UserUpdate {
            first_name: info.first_name.clone(),
            last_name: info.last_name.clone(),
            middle_name: info.middle_name.clone(),
            phone_number: info.phone_number.clone(),
        };
        let mut tx = self.parents.begin().await?;
        self.users.update(&mut *tx, user_id, &user_update).await?;
        self.parents
            .update_personal_info(&mut *tx, user_id, info)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id, "Updated parent personal info");
        self.get_personal_info(user_id).await
    }

    /// Soft-deletes the parent and their user account.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let parent = self.parents.get_by_id(id).await?.ok_or_else(|| {
            Error::InvalidArgument(format!("Parent with Id = {id} doesn't exist"))
        })?;

        let mut tx = self.parents.begin().await?;
        self.parents.soft_delete(&mut *tx, id).await?;
        self.users.soft_delete(&mut *tx, &parent.user_id).await?;
        tx.commit().await?;

        tracing::info!(parent_id = %id, user_id = %parent.user_id, "Deleted parent");
        Ok(())
    }

    /// Blocks or unblocks the parent's account on behalf of an admin.
    pub async fn block_unblock(
        &self,
        request: &BlockUnblockParent,
        admin_user_id: &str,
    ) -> Result<Typed<()>> {
        let Some(parent) = self.parents.get_by_id(request.parent_id).await? else {
            return Ok(Err(ErrorResponse::not_found()));
        };
        if request.is_blocked
            && request
                .reason
                .as_deref()
                .map_or(true, |r| r.trim().is_empty())
        {
            return Ok(Err(ErrorResponse::bad_request(
                "Reason is required to block a parent",
            )));
        }
        if parent.is_blocked == request.is_blocked {
            return Ok(Ok(()));
        }

        let mut tx = self.parents.begin().await?;
        self.users
            .set_blocked(&mut *tx, &parent.user_id, request.is_blocked)
            .await?;
        self.parents
            .log_block(
                &mut *tx,
                parent.id,
                admin_user_id,
                request.reason.as_deref(),
                request.is_blocked,
            )
            .await?;
        tx.commit().await?;

        tracing::info!(
            parent_id = %parent.id,
            is_blocked = request.is_blocked,
            admin_user_id,
            "Changed parent block state"
        );
        Ok(Ok(()))
    }
}

pub struct ChildService {
    children: ChildRepository,
    parents: ParentRepository,
}

impl ChildService {
    pub fn new(children: ChildRepository, parents: ParentRepository) -> Self {
        Self { children, parents }
    }

    async fn parent_of(&self, user_id: &str) -> Result<Parent> {
        self.parents
            .first(Filter::eq("pa.user_id", user_id), &OrderBy::new())
            .await?
            .ok_or_else(|| {
                Error::InvalidArgument(format!("There is no parent for user with Id = {user_id}"))
            })
    }

    fn check_input(input: &ChildInput) -> Result<()> {
        input.validate()?;
        validate_date_of_birth(input.date_of_birth, Utc::now().date_naive())
    }

    pub async fn create_for_parent(&self, user_id: &str, input: &ChildInput) -> Result<Child> {
        Self::check_input(input)?;
        let parent = self.parent_of(user_id).await?;

        let id = Uuid::new_v4();
        self.children.create(id, parent.id, input).await?;
        tracing::info!(child_id = %id, parent_id = %parent.id, "Created child");
        self.get(id).await
    }

    pub async fn get_by_parent(
        &self,
        user_id: &str,
        offset: OffsetFilter,
    ) -> Result<SearchResult<Child>> {
        offset.validate()?;
        let parent = self.parent_of(user_id).await?;
        let order = OrderBy::new()
            .desc("c.is_parent")
            .asc("c.first_name")
            .asc("c.id");
        self.children
            .search(Filter::eq("c.parent_id", parent.id), &order, Page::from(offset))
            .await
    }

    pub async fn get_by_id_and_user(&self, id: Uuid, user_id: &str) -> Result<Child> {
        let child = self.get(id).await?;
        let parent = self.parent_of(user_id).await?;
        if child.parent_id != parent.id {
            return Err(Error::InvalidArgument(format!(
                "Child with Id = {id} does not belong to the current user"
            )));
        }
        Ok(child)
    }

    pub async fn update_for_user(&self, id: Uuid, input: &ChildInput, user_id: &str) -> Result<Child> {
        Self::check_input(input)?;
        self.get_by_id_and_user(id, user_id).await?;
        self.children.update(id, input).await?;
        tracing::info!(child_id = %id, "Updated child");
        self.get(id).await
    }

    pub async fn delete_for_user(&self, id: Uuid, user_id: &str) -> Result<()> {
        self.get_by_id_and_user(id, user_id).await?;
        self.children.delete(id).await?;
        tracing::info!(child_id = %id, "Deleted child");
        Ok(())
    }

    /// Admin listing of every child, optionally narrowed by name words.
    pub async fn get_by_filter(&self, filter: &ChildFilter) -> Result<SearchResult<Child>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;

        let predicate = match &filter.search_string {
            Some(search) => Filter::all(split_search_words(search).into_iter().map(|word| {
                Filter::any([
                    Filter::starts_with("c.first_name", word.clone()),
                    Filter::starts_with("c.last_name", word.clone()),
                    Filter::starts_with("c.middle_name", word),
                ])
            })),
            None => Filter::True,
        };
        let order = OrderBy::new()
            .asc("c.last_name")
            .asc("c.first_name")
            .asc("c.id");
        self.children
            .search(predicate, &order, Page::from(offset))
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Child> {
        self.children
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Child with Id = {id} doesn't exist")))
    }
}

/// A date of birth must lie in the past and within a human lifetime.
pub fn validate_date_of_birth(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date >= today {
        return Err(Error::InvalidArgument(
            "Date of birth must be in the past".to_string(),
        ));
    }
    if today.years_since(date).unwrap_or(0) > 120 {
        return Err(Error::InvalidArgument(
            "Date of birth is too far in the past".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_of_birth_must_be_in_the_past() {
        let today = date(2024, 9, 1);
        assert!(validate_date_of_birth(date(2015, 3, 10), today).is_ok());
        assert!(matches!(
            validate_date_of_birth(today, today),
            Err(Error::InvalidArgument(_))
        ));
        assert!(validate_date_of_birth(date(2025, 1, 1), today).is_err());
    }

    #[test]
    fn implausibly_old_dates_are_rejected() {
        let today = date(2024, 9, 1);
        assert!(validate_date_of_birth(date(1900, 1, 1), today).is_err());
        assert!(validate_date_of_birth(date(1950, 1, 1), today).is_ok());
    }
}
