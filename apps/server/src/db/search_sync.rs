use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::repository::{Entity, Repository};
use crate::models::{SyncEntity, SyncOperation, SyncRecord};
use crate::Result;

impl Entity for SyncRecord {
    type Key = Uuid;

    const NAME: &'static str = "SyncRecord";
    const TABLE: &'static str = "search_sync_records";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "s.id";
    const COLUMNS: &'static str = "s.id, s.entity, s.record_id, s.operation, s.operation_time";
    const FROM: &'static str = "search_sync_records s";
}

impl Repository<SyncRecord> {
    pub async fn create(
        &self,
        entity: SyncEntity,
        record_id: Uuid,
        operation: SyncOperation,
        operation_time: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO search_sync_records (id, entity, record_id, operation, operation_time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(entity.as_str())
        .bind(record_id)
        .bind(operation.as_str())
        .bind(operation_time)
        .execute(self.pool())
        .await?;
        Ok(id)
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM search_sync_records WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
