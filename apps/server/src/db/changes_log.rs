use sqlx::{PgExecutor, Postgres, QueryBuilder};

use super::repository::{Entity, Repository};
use crate::models::{ChangesLogEntity, ChangesLogEntry, PropertyChange};
use crate::Result;

impl Entity for ChangesLogEntry {
    type Key = i64;

    const NAME: &'static str = "ChangesLog";
    const TABLE: &'static str = "changes_logs";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "cl.id";
    const COLUMNS: &'static str = "cl.id, cl.entity_type, cl.entity_id, cl.property_name, \
        cl.old_value, cl.new_value, cl.updated_date, cl.user_id, \
        u.first_name AS user_first_name, u.last_name AS user_last_name, \
        u.middle_name AS user_middle_name, u.email AS user_email";
    // `lp` is the logged provider; `lap` the provider owning a logged application's workshop.
    const FROM: &'static str = "changes_logs cl \
        LEFT JOIN users u ON u.id = cl.user_id \
        LEFT JOIN providers lp ON cl.entity_type = 'Provider' AND lp.id::text = cl.entity_id \
        LEFT JOIN applications la \
               ON cl.entity_type = 'Application' AND la.id::text = cl.entity_id \
        LEFT JOIN workshops law ON law.id = la.workshop_id \
        LEFT JOIN providers lap ON lap.id = law.provider_id";
}

impl Repository<ChangesLogEntry> {
    pub async fn add_changes<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        entity_type: ChangesLogEntity,
        entity_id: &str,
        changes: &[PropertyChange],
        user_id: &str,
    ) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO changes_logs (entity_type, entity_id, property_name, old_value, \
             new_value, user_id) ",
        );
        qb.push_values(changes, |mut row, change| {
            row.push_bind(entity_type.as_str())
                .push_bind(entity_id.to_string())
                .push_bind(change.property_name.clone())
                .push_bind(change.old_value.clone())
                .push_bind(change.new_value.clone())
                .push_bind(user_id.to_string());
        });
        let result = qb.build().execute(exec).await?;
        Ok(result.rows_affected())
    }
}
