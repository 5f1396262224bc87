use sqlx::{Postgres, QueryBuilder};

use super::filter::Filter;
use super::repository::{Entity, Repository};
use crate::models::{Codeficator, CodeficatorAddress, CodeficatorName};
use crate::Result;

impl Entity for Codeficator {
    type Key = i64;

    const NAME: &'static str = "Codeficator";
    const TABLE: &'static str = "catottgs";
    const TABLE_KEY: &'static str = "id";
    const KEY: &'static str = "ca.id";
    const COLUMNS: &'static str =
        "ca.id, ca.parent_id, ca.category, ca.name, ca.latitude, ca.longitude, ca.sort_order";
    const FROM: &'static str = "catottgs ca";
}

// Settlement-level entry `e` with up to three ancestors.
const SETTLEMENT_ADDRESSES: &str = r#"
    SELECT e.id, e.category, e.name AS settlement, h.name AS territorial_community,
           d.name AS district, o.name AS region, NULL::varchar AS city_district,
           e.latitude, e.longitude, e.sort_order
    FROM catottgs e
    LEFT JOIN catottgs h ON h.id = e.parent_id
    LEFT JOIN catottgs d ON d.id = h.parent_id
    LEFT JOIN catottgs o ON o.id = d.parent_id
    WHERE "#;

// City district `e` inside city `m`.
const DISTRICT_ADDRESSES: &str = r#"
    SELECT e.id, e.category, m.name AS settlement, h.name AS territorial_community,
           d.name AS district, o.name AS region, e.name AS city_district,
           e.latitude, e.longitude, e.sort_order
    FROM catottgs e
    JOIN catottgs m ON m.id = e.parent_id
    LEFT JOIN catottgs h ON h.id = m.parent_id
    LEFT JOIN catottgs d ON d.id = h.parent_id
    LEFT JOIN catottgs o ON o.id = d.parent_id
    WHERE "#;

impl Repository<Codeficator> {
    pub async fn names(&self, filter: Filter) -> Result<Vec<CodeficatorName>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT ca.id, ca.name AS full_name FROM catottgs ca WHERE ",
        );
        filter.push_to(&mut qb);
        qb.push(" ORDER BY ca.name");
        Ok(qb
            .build_query_as::<CodeficatorName>()
            .fetch_all(self.pool())
            .await?)
    }

    /// The entry and every ancestor, nearest first.
    pub async fn ancestors(&self, id: i64) -> Result<Vec<Codeficator>> {
        let rows = sqlx::query_as::<_, Codeficator>(
            r#"
            WITH RECURSIVE chain AS (
                SELECT c.*, 0 AS depth FROM catottgs c WHERE c.id = $1
                UNION ALL
                SELECT p.*, chain.depth + 1 FROM catottgs p JOIN chain ON p.id = chain.parent_id
            )
            SELECT id, parent_id, category, name, latitude, longitude, sort_order
            FROM chain ORDER BY depth
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Ids of the entry and all of its descendants.
    pub async fn descendant_ids(&self, id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            WITH RECURSIVE tree AS (
                SELECT id FROM catottgs WHERE id = $1
                UNION ALL
                SELECT c.id FROM catottgs c JOIN tree ON c.parent_id = tree.id
            )
            SELECT id FROM tree ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    /// Settlements matching `settlements` plus city districts matching `districts`.
    pub async fn addresses(
        &self,
        settlements: Filter,
        districts: Filter,
        limit: i64,
    ) -> Result<Vec<CodeficatorAddress>> {
        let mut qb = QueryBuilder::<Postgres>::new("(");
        qb.push(SETTLEMENT_ADDRESSES);
        settlements.push_to(&mut qb);
        qb.push(") UNION ALL (");
        qb.push(DISTRICT_ADDRESSES);
        districts.push_to(&mut qb);
        qb.push(") ORDER BY sort_order, settlement LIMIT ");
        qb.push_bind(limit);
        Ok(qb
            .build_query_as::<CodeficatorAddress>()
            .fetch_all(self.pool())
            .await?)
    }
}
