use sqlx::PgExecutor;
use uuid::Uuid;

use super::repository::{ensure_updated, Entity, Repository};
use crate::models::{LicenseStatus, Provider, ProviderInput, ProviderStatus};
use crate::Result;

impl Entity for Provider {
    type Key = Uuid;

    const NAME: &'static str = "Provider";
    const TABLE: &'static str = "providers";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "p.id";
    const COLUMNS: &'static str = "p.id, p.full_title, p.short_title, p.full_title_en, \
        p.short_title_en, p.edrpou_ipn, p.email, p.phone_number, p.website, p.ownership, \
        p.status, p.status_reason, p.license, p.license_status, p.is_blocked, p.block_reason, \
        p.block_phone_number, p.institution_id, p.legal_street, p.legal_building_number, \
        p.legal_catottg_id, p.user_id, p.created_time, p.updated_time, p.is_deleted";
    const FROM: &'static str = "providers p";
    const NOT_DELETED: Option<&'static str> = Some("p.is_deleted = FALSE");
    const SOFT_DELETE: bool = true;
}

impl Repository<Provider> {
    pub async fn create<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        user_id: &str,
        input: &ProviderInput,
        license_status: LicenseStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO providers (
                id, full_title, short_title, full_title_en, short_title_en, edrpou_ipn, email,
                phone_number, website, ownership, status, license, license_status,
                institution_id, legal_street, legal_building_number, legal_catottg_id, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(id)
        .bind(&input.full_title)
        .bind(&input.short_title)
        .bind(&input.full_title_en)
        .bind(&input.short_title_en)
        .bind(&input.edrpou_ipn)
        .bind(&input.email)
        .bind(&input.phone_number)
        .bind(&input.website)
        .bind(input.ownership.as_str())
        .bind(ProviderStatus::Pending.as_str())
        .bind(&input.license)
        .bind(license_status.as_str())
        .bind(input.institution_id)
        .bind(&input.legal_street)
        .bind(&input.legal_building_number)
        .bind(input.legal_catottg_id)
        .bind(user_id)
        .execute(exec)
        .await?;
        Ok(())
    }

    /// Writes every editable column from `provider`.
    pub async fn update<'e>(&self, exec: impl PgExecutor<'e>, provider: &Provider) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE providers
            SET full_title = $2, short_title = $3, full_title_en = $4, short_title_en = $5,
                edrpou_ipn = $6, email = $7, phone_number = $8, website = $9, ownership = $10,
                status = $11, status_reason = $12, license = $13, license_status = $14,
                institution_id = $15, legal_street = $16, legal_building_number = $17,
                legal_catottg_id = $18, updated_time = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(provider.id)
        .bind(&provider.full_title)
        .bind(&provider.short_title)
        .bind(&provider.full_title_en)
        .bind(&provider.short_title_en)
        .bind(&provider.edrpou_ipn)
        .bind(&provider.email)
        .bind(&provider.phone_number)
        .bind(&provider.website)
        .bind(provider.ownership.as_str())
        .bind(provider.status.as_str())
        .bind(&provider.status_reason)
        .bind(&provider.license)
        .bind(provider.license_status.as_str())
        .bind(provider.institution_id)
        .bind(&provider.legal_street)
        .bind(&provider.legal_building_number)
        .bind(provider.legal_catottg_id)
        .execute(exec)
        .await?;
        ensure_updated(result, Provider::NAME, provider.id)
    }

    pub async fn set_status<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        status: ProviderStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE providers SET status = $2, status_reason = $3, updated_time = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(reason)
        .execute(exec)
        .await?;
        ensure_updated(result, Provider::NAME, id)
    }

    pub async fn set_license_status<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        status: LicenseStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE providers SET license_status = $2, updated_time = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(exec)
        .await?;
        ensure_updated(result, Provider::NAME, id)
    }

    pub async fn set_blocked<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        is_blocked: bool,
        reason: Option<&str>,
        phone: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE providers
            SET is_blocked = $2, block_reason = $3, block_phone_number = $4, updated_time = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(is_blocked)
        .bind(reason)
        .bind(phone)
        .execute(exec)
        .await?;
        ensure_updated(result, Provider::NAME, id)
    }

    pub async fn soft_delete<'e>(&self, exec: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE providers SET is_deleted = TRUE, updated_time = NOW() \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(exec)
        .await?;
        ensure_updated(result, Provider::NAME, id)
    }

    /// User ids of the provider's employees.
    pub async fn employee_user_ids(&self, provider_id: Uuid) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM provider_employees WHERE provider_id = $1 ORDER BY user_id",
        )
        .bind(provider_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    /// Provider owned by the user or employing them.
    pub async fn id_for_staff_user(&self, user_id: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT p.id FROM providers p
            WHERE p.is_deleted = FALSE
              AND (p.user_id = $1
                   OR EXISTS (SELECT 1 FROM provider_employees e
                              WHERE e.provider_id = p.id AND e.user_id = $1))
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(id)
    }
}
