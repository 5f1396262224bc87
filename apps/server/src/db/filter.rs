//! Composable SQL predicates.
//!
//! A [`Filter`] is a small expression tree over trusted column expressions
//! (compile-time `&'static str`, e.g. `"w.title"`) and bound values. It renders
//! into a [`QueryBuilder`] with `$n` placeholders so user input never reaches
//! the SQL text.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use std::borrow::Cow;
use uuid::Uuid;

use crate::models::SortDirection;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uuid(Uuid),
    Text(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    Decimal(Decimal),
    Time(DateTime<Utc>),
    Date(NaiveDate),
    UuidList(Vec<Uuid>),
    TextList(Vec<String>),
    IntList(Vec<i64>),
}

impl Value {
    pub fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Value::Uuid(v) => qb.push_bind(*v),
            Value::Text(v) => qb.push_bind(v.clone()),
            Value::Int(v) => qb.push_bind(*v),
            Value::Bool(v) => qb.push_bind(*v),
            Value::Float(v) => qb.push_bind(*v),
            Value::Decimal(v) => qb.push_bind(*v),
            Value::Time(v) => qb.push_bind(*v),
            Value::Date(v) => qb.push_bind(*v),
            Value::UuidList(v) => qb.push_bind(v.clone()),
            Value::TextList(v) => qb.push_bind(v.clone()),
            Value::IntList(v) => qb.push_bind(v.clone()),
        };
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<Uuid>> for Value {
    fn from(v: Vec<Uuid>) -> Self {
        Value::UuidList(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextList(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntList(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    fn as_sql(&self) -> &'static str {
        match self {
            Op::Eq => " = ",
            Op::Ne => " <> ",
            Op::Gt => " > ",
            Op::Gte => " >= ",
            Op::Lt => " < ",
            Op::Lte => " <= ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    False,
    Compare(&'static str, Op, Value),
    /// `column = ANY($n)`; an empty list matches nothing.
    In(&'static str, Value),
    IsNull(&'static str),
    NotNull(&'static str),
    /// Case-insensitive prefix match.
    StartsWith(&'static str, String),
    /// Case-insensitive substring match.
    Contains(&'static str, String),
    /// Trusted SQL fragment without parameters.
    Raw(&'static str),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Compare(column, Op::Eq, value.into())
    }

    pub fn ne(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Compare(column, Op::Ne, value.into())
    }

    pub fn gt(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Compare(column, Op::Gt, value.into())
    }

    pub fn gte(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Compare(column, Op::Gte, value.into())
    }

    pub fn lt(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Compare(column, Op::Lt, value.into())
    }

    pub fn lte(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Compare(column, Op::Lte, value.into())
    }

    pub fn is_in(column: &'static str, values: impl Into<Value>) -> Self {
        Filter::In(column, values.into())
    }

    /// Membership test against text-persisted enum values.
    pub fn in_names<T: ToString>(column: &'static str, values: &[T]) -> Self {
        Filter::In(
            column,
            Value::TextList(values.iter().map(ToString::to_string).collect()),
        )
    }

    pub fn starts_with(column: &'static str, prefix: impl Into<String>) -> Self {
        Filter::StartsWith(column, prefix.into())
    }

    pub fn contains(column: &'static str, needle: impl Into<String>) -> Self {
        Filter::Contains(column, needle.into())
    }

    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Logical AND, flattening nested conjunctions and dropping `True`.
    pub fn and(self, other: Filter) -> Self {
        Filter::all([self, other])
    }

    /// Logical OR, flattening nested disjunctions and dropping `False`.
    pub fn or(self, other: Filter) -> Self {
        Filter::any([self, other])
    }

    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut parts = Vec::new();
        for filter in filters {
            match filter {
                Filter::True => {}
                Filter::False => return Filter::False,
                Filter::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Filter::True,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut parts = Vec::new();
        for filter in filters {
            match filter {
                Filter::False => {}
                Filter::True => return Filter::True,
                Filter::Or(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Filter::False,
            1 => parts.remove(0),
            _ => Filter::Or(parts),
        }
    }

    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Filter::True => {
                qb.push("TRUE");
            }
            Filter::False => {
                qb.push("FALSE");
            }
            Filter::Compare(column, op, value) => {
                qb.push(*column).push(op.as_sql());
                value.push_bind(qb);
            }
            Filter::In(column, value) => {
                qb.push(*column).push(" = ANY(");
                value.push_bind(qb);
                qb.push(")");
            }
            Filter::IsNull(column) => {
                qb.push(*column).push(" IS NULL");
            }
            Filter::NotNull(column) => {
                qb.push(*column).push(" IS NOT NULL");
            }
            Filter::StartsWith(column, prefix) => {
                qb.push(*column).push(" ILIKE ");
                qb.push_bind(format!("{}%", escape_like(prefix)));
            }
            Filter::Contains(column, needle) => {
                qb.push(*column).push(" ILIKE ");
                qb.push_bind(format!("%{}%", escape_like(needle)));
            }
            Filter::Raw(sql) => {
                qb.push(*sql);
            }
            Filter::And(parts) => push_joined(qb, parts, " AND "),
            Filter::Or(parts) => push_joined(qb, parts, " OR "),
            Filter::Not(inner) => {
                qb.push("NOT (");
                inner.push_to(qb);
                qb.push(")");
            }
        }
    }
}

fn push_joined(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Filter], separator: &str) {
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        part.push_to(qb);
    }
    qb.push(")");
}

/// Escapes `%`, `_` and `\` so user text matches literally inside LIKE patterns.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy(Vec<(Cow<'static, str>, SortDirection)>);

impl OrderBy {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn asc(self, column: &'static str) -> Self {
        self.then(column, SortDirection::Asc)
    }

    pub fn desc(self, column: &'static str) -> Self {
        self.then(column, SortDirection::Desc)
    }

    pub fn then(mut self, column: &'static str, direction: SortDirection) -> Self {
        self.0.push((Cow::Borrowed(column), direction));
        self
    }

    /// Sorts a text enum column by declaration order of `names` instead of
    /// alphabetically. Unknown values go last.
    pub fn by_position(
        mut self,
        column: &'static str,
        names: &[&'static str],
        direction: SortDirection,
    ) -> Self {
        let mut expression = format!("CASE {column}");
        for (position, name) in names.iter().enumerate() {
            expression.push_str(&format!(" WHEN '{name}' THEN {position}"));
        }
        expression.push_str(&format!(" ELSE {} END", names.len()));
        self.0.push((Cow::Owned(expression), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if self.0.is_empty() {
            return;
        }
        qb.push(" ORDER BY ");
        for (i, (column, direction)) in self.0.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column.as_ref()).push(" ").push(direction.as_sql());
        }
    }
}

/// Offset window; `take = 0` means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub take: i64,
}

impl Page {
    pub fn new(skip: i64, take: i64) -> Self {
        Self {
            skip: skip.max(0),
            take: take.max(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if self.take > 0 {
            qb.push(" LIMIT ").push_bind(self.take);
        }
        if self.skip > 0 {
            qb.push(" OFFSET ").push_bind(self.skip);
        }
    }
}

impl From<crate::models::OffsetFilter> for Page {
    fn from(filter: crate::models::OffsetFilter) -> Self {
        Page::new(filter.from, filter.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(filter: &Filter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_to(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn renders_nested_predicates_with_placeholders() {
        let filter = Filter::eq("p.status", "Approved")
            .and(Filter::starts_with("p.full_title", "Шк").or(Filter::eq("p.email", "a@b.ua")))
            .and(Filter::Raw("p.is_deleted = FALSE"));

        assert_eq!(
            render(&filter),
            "(p.status = $1 AND (p.full_title ILIKE $2 OR p.email = $3) AND p.is_deleted = FALSE)"
        );
    }

    #[test]
    fn neutral_elements_collapse() {
        assert_eq!(Filter::True.and(Filter::True), Filter::True);
        assert_eq!(
            Filter::True.and(Filter::eq("a.id", 1_i64)),
            Filter::eq("a.id", 1_i64)
        );
        assert_eq!(Filter::eq("a.id", 1_i64).and(Filter::False), Filter::False);
        assert_eq!(Filter::any(Vec::new()), Filter::False);
        assert_eq!(Filter::False.or(Filter::True), Filter::True);
    }

    #[test]
    fn conjunctions_flatten() {
        let filter = Filter::eq("a", 1_i64)
            .and(Filter::eq("b", 2_i64))
            .and(Filter::eq("c", 3_i64));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn membership_and_negation() {
        let filter = Filter::in_names("a.status", &["Pending", "Approved"])
            .and(Filter::IsNull("a.ended_time").not());
        assert_eq!(
            render(&filter),
            "(a.status = ANY($1) AND NOT (a.ended_time IS NULL))"
        );
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn order_and_page_render_in_sequence() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM t");
        OrderBy::new()
            .asc("t.is_blocked")
            .desc("t.created_time")
            .push_to(&mut qb);
        Page::new(20, 10).push_to(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM t ORDER BY t.is_blocked ASC, t.created_time DESC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn enum_columns_sort_by_declaration_order() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM t");
        OrderBy::new()
            .by_position("t.status", &["Pending", "Approved"], SortDirection::Asc)
            .asc("t.id")
            .push_to(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM t ORDER BY CASE t.status WHEN 'Pending' THEN 0 \
             WHEN 'Approved' THEN 1 ELSE 2 END ASC, t.id ASC"
        );
    }

    #[test]
    fn page_clamps_negative_values() {
        let page = Page::new(-5, -1);
        assert_eq!(page, Page::unbounded());

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        page.push_to(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1");
    }
}
