use sqlx::PgExecutor;
use uuid::Uuid;

use super::repository::{ensure_updated, Entity, Repository};
use crate::models::{Provider, ProviderStatus, Workshop, WorkshopInput, WorkshopStatus};
use crate::Result;

impl Entity for Workshop {
    type Key = Uuid;

    const NAME: &'static str = "Workshop";
    const TABLE: &'static str = "workshops";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "w.id";
    const COLUMNS: &'static str = "w.id, w.title, w.short_title, w.email, w.phone_number, \
        w.website, w.description, w.min_age, w.max_age, w.price, w.is_free, w.available_seats, \
        (SELECT COUNT(*) FROM applications ta \
          WHERE ta.workshop_id = w.id AND ta.status IN ('Approved', 'StudyingForYears')) \
          AS taken_seats, \
        w.competitive_selection, w.status, w.is_blocked, w.provider_id, w.provider_title, \
        w.provider_status, w.provider_ownership, p.institution_id, w.city, w.street, \
        w.building_number, w.catottg_id, w.latitude, w.longitude, w.created_time, \
        w.updated_time, w.is_deleted";
    const FROM: &'static str = "workshops w JOIN providers p ON p.id = w.provider_id";
    const NOT_DELETED: Option<&'static str> = Some("w.is_deleted = FALSE");
    const SOFT_DELETE: bool = true;
}

impl Repository<Workshop> {
    pub async fn create<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        input: &WorkshopInput,
        provider: &Provider,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workshops (
                id, title, short_title, email, phone_number, website, description, min_age,
                max_age, price, is_free, available_seats, competitive_selection, status,
                provider_id, provider_title, provider_status, provider_ownership, city, street,
                building_number, catottg_id, latitude, longitude
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.short_title)
        .bind(&input.email)
        .bind(&input.phone_number)
        .bind(&input.website)
        .bind(&input.description)
        .bind(input.min_age)
        .bind(input.max_age)
        .bind(input.price)
        .bind(input.is_free)
        .bind(input.available_seats)
        .bind(input.competitive_selection)
        .bind(WorkshopStatus::Open.as_str())
        .bind(provider.id)
        .bind(&provider.full_title)
        .bind(provider.status.as_str())
        .bind(provider.ownership.as_str())
        .bind(&input.city)
        .bind(&input.street)
        .bind(&input.building_number)
        .bind(input.catottg_id)
        .bind(input.latitude)
        .bind(input.longitude)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn update(&self, id: Uuid, input: &WorkshopInput) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE workshops
            SET title = $2, short_title = $3, email = $4, phone_number = $5, website = $6,
                description = $7, min_age = $8, max_age = $9, price = $10, is_free = $11,
                available_seats = $12, competitive_selection = $13, city = $14, street = $15,
                building_number = $16, catottg_id = $17, latitude = $18, longitude = $19,
                updated_time = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.short_title)
        .bind(&input.email)
        .bind(&input.phone_number)
        .bind(&input.website)
        .bind(&input.description)
        .bind(input.min_age)
        .bind(input.max_age)
        .bind(input.price)
        .bind(input.is_free)
        .bind(input.available_seats)
        .bind(input.competitive_selection)
        .bind(&input.city)
        .bind(&input.street)
        .bind(&input.building_number)
        .bind(input.catottg_id)
        .bind(input.latitude)
        .bind(input.longitude)
        .execute(self.pool())
        .await?;
        ensure_updated(result, Workshop::NAME, id)
    }

    pub async fn set_status<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        status: WorkshopStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE workshops SET status = $2, updated_time = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(exec)
        .await?;
        ensure_updated(result, Workshop::NAME, id)
    }

    /// Copies the provider's title into its workshops. Returns affected workshop ids.
    pub async fn set_provider_title<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        provider_id: Uuid,
        title: &str,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE workshops SET provider_title = $2, updated_time = NOW()
            WHERE provider_id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(provider_id)
        .bind(title)
        .fetch_all(exec)
        .await?;
        Ok(ids)
    }

    pub async fn set_provider_status<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        provider_id: Uuid,
        status: ProviderStatus,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE workshops SET provider_status = $2, updated_time = NOW()
            WHERE provider_id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(provider_id)
        .bind(status.as_str())
        .fetch_all(exec)
        .await?;
        Ok(ids)
    }

    pub async fn set_blocked_for_provider<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        provider_id: Uuid,
        is_blocked: bool,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE workshops SET is_blocked = $2, updated_time = NOW()
            WHERE provider_id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(provider_id)
        .bind(is_blocked)
        .fetch_all(exec)
        .await?;
        Ok(ids)
    }

    pub async fn soft_delete_for_provider<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        provider_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE workshops SET is_deleted = TRUE, updated_time = NOW()
            WHERE provider_id = $1 AND is_deleted = FALSE
            RETURNING id
            "#,
        )
        .bind(provider_id)
        .fetch_all(exec)
        .await?;
        Ok(ids)
    }

    pub async fn taken_seats(&self, id: Uuid) -> Result<i64> {
        let taken = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM applications
            WHERE workshop_id = $1 AND status IN ('Approved', 'StudyingForYears')
            "#,
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;
        Ok(taken)
    }
}
