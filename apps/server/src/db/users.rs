//! Users, parents and children.

use chrono::Utc;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::repository::{ensure_updated, Entity, Repository};
use crate::models::{Child, ChildInput, Parent, ParentPersonalInfo, Role, User, UserUpdate};
use crate::Result;

impl Entity for User {
    type Key = String;

    const NAME: &'static str = "User";
    const TABLE: &'static str = "users";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "u.id";
    const COLUMNS: &'static str = "u.id, u.first_name, u.last_name, u.middle_name, u.email, \
        u.phone_number, u.role, u.is_blocked, u.is_registered, u.is_deleted, u.created_time, \
        u.last_login";
    const FROM: &'static str = "users u";
    const NOT_DELETED: Option<&'static str> = Some("u.is_deleted = FALSE");
    const SOFT_DELETE: bool = true;
}

/// Account data written when a user is provisioned locally.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
}

impl Repository<User> {
    pub async fn create<'e>(&self, exec: impl PgExecutor<'e>, user: &NewUser) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, middle_name, email, phone_number, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                middle_name = EXCLUDED.middle_name,
                email = EXCLUDED.email,
                phone_number = EXCLUDED.phone_number,
                role = EXCLUDED.role,
                is_deleted = FALSE
            "#,
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.middle_name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn update<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: &str,
        update: &UserUpdate,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, middle_name = $4, phone_number = $5
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.middle_name)
        .bind(&update.phone_number)
        .execute(exec)
        .await?;
        ensure_updated(result, User::NAME, id)
    }

    pub async fn set_registered<'e>(&self, exec: impl PgExecutor<'e>, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_registered = TRUE WHERE id = $1")
            .bind(id)
            .execute(exec)
            .await?;
        ensure_updated(result, User::NAME, id)
    }

    pub async fn set_blocked<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: &str,
        is_blocked: bool,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_blocked = $2 WHERE id = $1")
            .bind(id)
            .bind(is_blocked)
            .execute(exec)
            .await?;
        ensure_updated(result, User::NAME, id)
    }

    pub async fn soft_delete<'e>(&self, exec: impl PgExecutor<'e>, id: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE")
                .bind(id)
                .execute(exec)
                .await?;
        ensure_updated(result, User::NAME, id)
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE)",
        )
        .bind(email)
        .fetch_one(self.pool())
        .await?;
        Ok(taken)
    }

    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

impl Entity for Parent {
    type Key = Uuid;

    const NAME: &'static str = "Parent";
    const TABLE: &'static str = "parents";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "pa.id";
    const COLUMNS: &'static str = "pa.id, pa.user_id, pa.gender, pa.date_of_birth, \
        pu.first_name, pu.last_name, pu.middle_name, pu.email, pu.phone_number, pu.is_blocked, \
        pa.is_deleted";
    const FROM: &'static str = "parents pa JOIN users pu ON pu.id = pa.user_id";
    const NOT_DELETED: Option<&'static str> = Some("pa.is_deleted = FALSE");
    const SOFT_DELETE: bool = true;
}

impl Repository<Parent> {
    pub async fn create<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        id: Uuid,
        user_id: &str,
        info: &crate::models::ParentCreate,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO parents (id, user_id, gender, date_of_birth) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(user_id)
        .bind(info.gender.map(|g| g.as_str()))
        .bind(info.date_of_birth)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn update_personal_info<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        user_id: &str,
        info: &ParentPersonalInfo,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE parents SET gender = $2, date_of_birth = $3
            WHERE user_id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(user_id)
        .bind(info.gender.map(|g| g.as_str()))
        .bind(info.date_of_birth)
        .execute(exec)
        .await?;
        ensure_updated(result, Parent::NAME, user_id)
    }

    pub async fn soft_delete<'e>(&self, exec: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE parents SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(exec)
        .await?;
        ensure_updated(result, Parent::NAME, id)
    }

    pub async fn log_block<'e>(
        &self,
        exec: impl PgExecutor<'e>,
        parent_id: Uuid,
        admin_user_id: &str,
        reason: Option<&str>,
        is_blocked: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO parent_blocked_by_admin_logs (parent_id, user_id, reason, is_blocked)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(parent_id)
        .bind(admin_user_id)
        .bind(reason)
        .bind(is_blocked)
        .execute(exec)
        .await?;
        Ok(())
    }
}

impl Entity for Child {
    type Key = Uuid;

    const NAME: &'static str = "Child";
    const TABLE: &'static str = "children";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "c.id";
    const COLUMNS: &'static str = "c.id, c.first_name, c.last_name, c.middle_name, \
        c.date_of_birth, c.gender, c.parent_id, c.is_parent, c.place_of_study, c.is_deleted";
    const FROM: &'static str = "children c";
    const NOT_DELETED: Option<&'static str> = Some("c.is_deleted = FALSE");
    const SOFT_DELETE: bool = true;
}

impl Repository<Child> {
    pub async fn create(&self, id: Uuid, parent_id: Uuid, input: &ChildInput) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO children (id, first_name, last_name, middle_name, date_of_birth, gender,
                                  parent_id, is_parent, place_of_study)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.middle_name)
        .bind(input.date_of_birth)
        .bind(input.gender.as_str())
        .bind(parent_id)
        .bind(input.is_parent)
        .bind(&input.place_of_study)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update(&self, id: Uuid, input: &ChildInput) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE children
            SET first_name = $2, last_name = $3, middle_name = $4, date_of_birth = $5,
                gender = $6, is_parent = $7, place_of_study = $8
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.middle_name)
        .bind(input.date_of_birth)
        .bind(input.gender.as_str())
        .bind(input.is_parent)
        .bind(&input.place_of_study)
        .execute(self.pool())
        .await?;
        ensure_updated(result, Child::NAME, id)
    }
}
