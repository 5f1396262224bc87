use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use super::repository::{ensure_updated, Entity, Repository};
use crate::models::{Achievement, AchievementInput, AchievementType};
use crate::Result;

impl Entity for Achievement {
    type Key = Uuid;

    const NAME: &'static str = "Achievement";
    const TABLE: &'static str = "achievements";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "ac.id";
    const COLUMNS: &'static str = "ac.id, ac.title, ac.achievement_date, ac.workshop_id, \
        ac.achievement_type_id, t.title AS achievement_type_title, \
        ARRAY(SELECT ch.child_id FROM achievement_children ch \
              WHERE ch.achievement_id = ac.id ORDER BY ch.child_id) AS children_ids, \
        ARRAY(SELECT te.title FROM achievement_teachers te \
              WHERE te.achievement_id = ac.id ORDER BY te.id) AS teachers";
    const FROM: &'static str =
        "achievements ac JOIN achievement_types t ON t.id = ac.achievement_type_id";
    const NOT_DELETED: Option<&'static str> = Some("t.is_deleted = FALSE");
}

impl Repository<Achievement> {
    pub async fn create(&self, id: Uuid, input: &AchievementInput) -> Result<()> {
        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO achievements (id, title, achievement_date, workshop_id, achievement_type_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(input.achievement_date)
        .bind(input.workshop_id)
        .bind(input.achievement_type_id)
        .execute(&mut *tx)
        .await?;
        write_links(&mut tx, id, input).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Rewrites the achievement and replaces its children and teachers.
    pub async fn update(&self, id: Uuid, input: &AchievementInput) -> Result<()> {
        let mut tx: Transaction<'_, Postgres> = self.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE achievements
            SET title = $2, achievement_date = $3, workshop_id = $4, achievement_type_id = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(input.achievement_date)
        .bind(input.workshop_id)
        .bind(input.achievement_type_id)
        .execute(&mut *tx)
        .await?;
        ensure_updated(result, Achievement::NAME, id)?;

        sqlx::query("DELETE FROM achievement_children WHERE achievement_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM achievement_teachers WHERE achievement_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        write_links(&mut tx, id, input).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn types(&self) -> Result<Vec<AchievementType>> {
        let types = sqlx::query_as::<_, AchievementType>(
            "SELECT id, title FROM achievement_types WHERE is_deleted = FALSE ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(types)
    }
}

async fn write_links(conn: &mut PgConnection, id: Uuid, input: &AchievementInput) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO achievement_children (achievement_id, child_id)
        SELECT $1, child_id FROM UNNEST($2::uuid[]) AS child_id
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(id)
    .bind(&input.children_ids)
    .execute(&mut *conn)
    .await?;

    let teachers: Vec<String> = input
        .teachers
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    sqlx::query(
        r#"
        INSERT INTO achievement_teachers (achievement_id, title)
        SELECT $1, title FROM UNNEST($2::varchar[]) WITH ORDINALITY AS t(title, n) ORDER BY n
        "#,
    )
    .bind(id)
    .bind(&teachers)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
