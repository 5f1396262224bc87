use sqlx::PgExecutor;
use uuid::Uuid;

use super::repository::{Entity, Repository};
use crate::models::{Admin, AdminKind};
use crate::Result;

impl Entity for Admin {
    type Key = String;

    const NAME: &'static str = "Admin";
    // Deleting an admin soft-deletes the account.
    const TABLE: &'static str = "users";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "ad.user_id";
    const COLUMNS: &'static str = "ad.user_id, ad.kind, ad.institution_id, \
        i.title AS institution_title, ad.catottg_id, ca.name AS catottg_name, u.first_name, \
        u.last_name, u.middle_name, u.email, u.phone_number, u.is_blocked";
    const FROM: &'static str = "(\
            SELECT user_id, 'Ministry'::varchar AS kind, institution_id, NULL::bigint AS catottg_id \
              FROM ministry_admins \
            UNION ALL \
            SELECT user_id, 'Region'::varchar, institution_id, catottg_id FROM region_admins \
            UNION ALL \
            SELECT user_id, 'Area'::varchar, institution_id, catottg_id FROM area_admins\
        ) ad \
        JOIN users u ON u.id = ad.user_id \
        JOIN institutions i ON i.id = ad.institution_id \
        LEFT JOIN catottgs ca ON ca.id = ad.catottg_id";
    const NOT_DELETED: Option<&'static str> = Some("u.is_deleted = FALSE");
    const SOFT_DELETE: bool = true;
}

impl Repository<Admin> {
    /// Creates or replaces the admin record for `kind`.
    pub async fn upsert<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        kind: AdminKind,
        user_id: &str,
        institution_id: Uuid,
        catottg_id: Option<i64>,
    ) -> Result<()> {
        let sql = match kind {
            AdminKind::Ministry => {
                r#"
                INSERT INTO ministry_admins (user_id, institution_id) VALUES ($1, $2)
                ON CONFLICT (user_id) DO UPDATE SET institution_id = EXCLUDED.institution_id
                "#
            }
            AdminKind::Region => {
                r#"
                INSERT INTO region_admins (user_id, institution_id, catottg_id) VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE
                SET institution_id = EXCLUDED.institution_id, catottg_id = EXCLUDED.catottg_id
                "#
            }
            AdminKind::Area => {
                r#"
                INSERT INTO area_admins (user_id, institution_id, catottg_id) VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE
                SET institution_id = EXCLUDED.institution_id, catottg_id = EXCLUDED.catottg_id
                "#
            }
        };
        let mut query = sqlx::query(sql).bind(user_id).bind(institution_id);
        if kind != AdminKind::Ministry {
            query = query.bind(catottg_id);
        }
        query.execute(exec).await?;
        Ok(())
    }
}
