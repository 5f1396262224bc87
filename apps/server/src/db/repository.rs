//! Generic read/delete repository over a single entity's SELECT.
//!
//! Entity-specific writes live next to each entity as inherent
//! `impl Repository<Entity>` blocks.

use std::fmt::Display;
use std::marker::PhantomData;

use sqlx::postgres::{PgQueryResult, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use super::filter::{Filter, OrderBy, Page, Value};
use crate::models::SearchResult;
use crate::{Error, Result};

/// Table mapping for a row type.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    type Key: Into<Value> + Display + Clone + Send + Sync;

    /// Name used in error messages.
    const NAME: &'static str;
    /// Base table for deletes and updates.
    const TABLE: &'static str;
    /// Key column of `TABLE`, unqualified.
    const TABLE_KEY: &'static str;
    /// Key column as it appears in `FROM`.
    const KEY: &'static str;
    const COLUMNS: &'static str;
    /// FROM clause including the fixed set of joins.
    const FROM: &'static str;
    /// Predicate hiding soft-deleted rows, including soft-deleted joins.
    const NOT_DELETED: Option<&'static str> = None;
    /// Whether `TABLE` has an `is_deleted` flag that delete sets.
    const SOFT_DELETE: bool = false;
}

pub struct Repository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    fn visible(filter: Filter) -> Filter {
        match E::NOT_DELETED {
            Some(predicate) => Filter::Raw(predicate).and(filter),
            None => filter,
        }
    }

    fn select(filter: Filter) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE ",
            E::COLUMNS,
            E::FROM
        ));
        Self::visible(filter).push_to(&mut qb);
        qb
    }

    pub async fn get_by_id(&self, id: E::Key) -> Result<Option<E>> {
        let mut qb = Self::select(Filter::eq(E::KEY, id));
        Ok(qb.build_query_as::<E>().fetch_optional(&self.pool).await?)
    }

    pub async fn get_all(&self) -> Result<Vec<E>> {
        self.get_by_filter(Filter::True).await
    }

    pub async fn get_by_filter(&self, filter: Filter) -> Result<Vec<E>> {
        let mut qb = Self::select(filter);
        Ok(qb.build_query_as::<E>().fetch_all(&self.pool).await?)
    }

    /// Ordered page of matching rows.
    pub async fn get(&self, page: Page, filter: Filter, order_by: &OrderBy) -> Result<Vec<E>> {
        let mut qb = Self::select(filter);
        order_by.push_to(&mut qb);
        page.push_to(&mut qb);
        Ok(qb.build_query_as::<E>().fetch_all(&self.pool).await?)
    }

    pub async fn first(&self, filter: Filter, order_by: &OrderBy) -> Result<Option<E>> {
        let mut qb = Self::select(filter);
        order_by.push_to(&mut qb);
        qb.push(" LIMIT 1");
        Ok(qb.build_query_as::<E>().fetch_optional(&self.pool).await?)
    }

    pub async fn count(&self, filter: Filter) -> Result<i64> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE ", E::FROM));
        Self::visible(filter).push_to(&mut qb);
        Ok(qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?)
    }

    pub async fn any(&self, filter: Filter) -> Result<bool> {
        let mut qb = QueryBuilder::new(format!("SELECT EXISTS (SELECT 1 FROM {} WHERE ", E::FROM));
        Self::visible(filter).push_to(&mut qb);
        qb.push(")");
        Ok(qb.build_query_scalar::<bool>().fetch_one(&self.pool).await?)
    }

    /// Total count plus one ordered page.
    pub async fn search(
        &self,
        filter: Filter,
        order_by: &OrderBy,
        page: Page,
    ) -> Result<SearchResult<E>> {
        let total_amount = self.count(filter.clone()).await?;
        if total_amount == 0 {
            return Ok(SearchResult::empty());
        }
        let entities = self.get(page, filter, order_by).await?;
        Ok(SearchResult {
            total_amount,
            entities,
        })
    }

    /// Deletes the row, or flags it when the entity is soft-deletable.
    pub async fn delete(&self, id: E::Key) -> Result<()> {
        let mut qb = if E::SOFT_DELETE {
            QueryBuilder::new(format!(
                "UPDATE {} SET is_deleted = TRUE WHERE is_deleted = FALSE AND {} = ",
                E::TABLE,
                E::TABLE_KEY
            ))
        } else {
            QueryBuilder::new(format!("DELETE FROM {} WHERE {} = ", E::TABLE, E::TABLE_KEY))
        };
        let display = id.to_string();
        let key: Value = id.into();
        key.push_bind(&mut qb);
        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::Concurrency(format!(
                "Deleting failed. {} with Id = {} doesn't exist in the system.",
                E::NAME,
                display
            )));
        }
        Ok(())
    }
}

/// Maps a zero-row UPDATE to the stale-update error.
pub fn ensure_updated(result: PgQueryResult, entity: &str, id: impl Display) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(Error::Concurrency(format!(
            "Updating failed. {entity} with Id = {id} doesn't exist in the system."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_update_is_a_concurrency_error() {
        let err = ensure_updated(PgQueryResult::default(), "Provider", "42").unwrap_err();
        match err {
            Error::Concurrency(message) => assert_eq!(
                message,
                "Updating failed. Provider with Id = 42 doesn't exist in the system."
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
