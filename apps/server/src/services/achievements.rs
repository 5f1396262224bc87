use uuid::Uuid;
use validator::Validate;

use crate::db::{AchievementRepository, Filter, OrderBy, Page};
use crate::models::{
    Achievement, AchievementFilter, AchievementInput, AchievementType, OffsetFilter, SearchResult,
};
use crate::{Error, Result};

pub struct AchievementService {
    repo: AchievementRepository,
}

impl AchievementService {
    pub fn new(repo: AchievementRepository) -> Self {
        Self { repo }
    }

    /// Achievements whose type was deleted are not found either.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Achievement> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::OutOfRange(format!("Achievement with Id = {id} doesn't exist")))
    }

    pub async fn get_by_filter(&self, filter: &AchievementFilter) -> Result<SearchResult<Achievement>> {
        let offset = OffsetFilter::new(filter.from, filter.size);
        offset.validate()?;
        let predicate = match filter.workshop_id {
            Some(workshop_id) => Filter::eq("ac.workshop_id", workshop_id),
            None => Filter::True,
        };
        let order = OrderBy::new().desc("ac.achievement_date").asc("ac.id");
        self.repo.search(predicate, &order, Page::from(offset)).await
    }

    pub async fn create(&self, input: &AchievementInput) -> Result<Achievement> {
        input.validate()?;
        let id = Uuid::new_v4();
        self.repo.create(id, input).await?;
        tracing::info!(achievement_id = %id, workshop_id = %input.workshop_id, "Created achievement");
        self.get_by_id(id).await
    }

    pub async fn update(&self, input: &AchievementInput) -> Result<Achievement> {
        input.validate()?;
        let id = input
            .id
            .ok_or_else(|| Error::InvalidArgument("Achievement id is required".to_string()))?;
        self.repo.update(id, input).await?;
        tracing::info!(achievement_id = %id, "Updated achievement");
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.repo.get_by_id(id).await?.is_none() {
            return Err(Error::InvalidArgument(format!(
                "Achievement with Id = {id} doesn't exist"
            )));
        }
        self.repo.delete(id).await?;
        tracing::info!(achievement_id = %id, "Deleted achievement");
        Ok(())
    }

    pub async fn get_types(&self) -> Result<Vec<AchievementType>> {
        self.repo.types().await
    }
}
