use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::repository::{ensure_updated, Entity, Repository};
use crate::models::{Application, ApplicationStatus};
use crate::Result;

impl Entity for Application {
    type Key = Uuid;

    const NAME: &'static str = "Application";
    const TABLE: &'static str = "applications";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "a.id";
    const COLUMNS: &'static str = "a.id, a.workshop_id, a.child_id, a.parent_id, a.status, \
        a.rejection_message, a.is_blocked_by_provider, a.creation_time, a.approved_time, \
        a.ended_time, w.title AS workshop_title, w.provider_id, p.full_title AS provider_title, \
        c.first_name AS child_first_name, c.last_name AS child_last_name, \
        c.middle_name AS child_middle_name, pa.user_id AS parent_user_id, \
        pu.first_name AS parent_first_name, pu.last_name AS parent_last_name";
    const FROM: &'static str = "applications a \
        JOIN workshops w ON w.id = a.workshop_id \
        JOIN providers p ON p.id = w.provider_id \
        JOIN children c ON c.id = a.child_id \
        JOIN parents pa ON pa.id = a.parent_id \
        JOIN users pu ON pu.id = pa.user_id";
}

/// Persisted status fields of one application.
#[derive(Debug, Clone)]
pub struct ApplicationStatusChange {
    pub id: Uuid,
    pub status: ApplicationStatus,
    pub rejection_message: Option<String>,
    pub approved_time: Option<DateTime<Utc>>,
    pub ended_time: Option<DateTime<Utc>>,
}

impl Repository<Application> {
    pub async fn create(
        &self,
        id: Uuid,
        workshop_id: Uuid,
        child_id: Uuid,
        parent_id: Uuid,
        creation_time: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, workshop_id, child_id, parent_id, status, creation_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(workshop_id)
        .bind(child_id)
        .bind(parent_id)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(creation_time)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_status<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        change: &ApplicationStatusChange,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET status = $2, rejection_message = $3, approved_time = $4, ended_time = $5
            WHERE id = $1
            "#,
        )
        .bind(change.id)
        .bind(change.status.as_str())
        .bind(&change.rejection_message)
        .bind(change.approved_time)
        .bind(change.ended_time)
        .execute(exec)
        .await?;
        ensure_updated(result, Application::NAME, change.id)
    }

    /// Creation times of recent applications for the triple, newest first.
    pub async fn recent_creation_times(
        &self,
        workshop_id: Uuid,
        child_id: Uuid,
        parent_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let times = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT creation_time FROM applications
            WHERE workshop_id = $1 AND child_id = $2 AND parent_id = $3 AND creation_time >= $4
            ORDER BY creation_time DESC
            "#,
        )
        .bind(workshop_id)
        .bind(child_id)
        .bind(parent_id)
        .bind(since)
        .fetch_all(self.pool())
        .await?;
        Ok(times)
    }

    /// Moves every Approved application to StudyingForYears. Returns updated ids.
    pub async fn approved_to_studying(&self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE applications SET status = $2
            WHERE status = $1
            RETURNING id
            "#,
        )
        .bind(ApplicationStatus::Approved.as_str())
        .bind(ApplicationStatus::StudyingForYears.as_str())
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    /// Flags the parent's applications to the provider's workshops.
    pub async fn set_blocked_by_provider(
        &self,
        provider_id: Uuid,
        parent_id: Uuid,
        is_blocked: bool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE applications a SET is_blocked_by_provider = $3
            FROM workshops w
            WHERE w.id = a.workshop_id AND w.provider_id = $1 AND a.parent_id = $2
            "#,
        )
        .bind(provider_id)
        .bind(parent_id)
        .bind(is_blocked)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
