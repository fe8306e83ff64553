//! Type-safe SQL condition builder on `SeaQuery`
//!
//! Dynamic WHERE clauses (smart-playlist rules, catalog searches) are
//! assembled here instead of by string concatenation. Everything renders
//! to parameterized SQL; values travel separately and are bound through
//! sqlx at execution time.

use sea_query::extension::postgres::PgExpr;
use sea_query::{Alias, Cond, Expr, IntoColumnRef, IntoIden, SimpleExpr, Value as SeaValue};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// SQL condition builder wrapping a `SeaQuery` `Cond`
#[derive(Clone, Debug)]
pub struct Filter {
    condition: Cond,
    count: usize,
}

impl Filter {
    /// Conjunction: every added condition must hold
    #[must_use]
    pub fn all() -> Self {
        Self {
            condition: Cond::all(),
            count: 0,
        }
    }

    /// Disjunction: any added condition may hold
    #[must_use]
    pub fn any() -> Self {
        Self {
            condition: Cond::any(),
            count: 0,
        }
    }

    /// column = value
    #[must_use]
    pub fn eq(mut self, column: impl Into<ColumnRef>, value: impl Into<FilterValue>) -> Self {
        self.condition = self
            .condition
            .add(Expr::col(column.into()).eq(value.into().into_sea_value()));
        self.count += 1;
        self
    }

    /// column > value
    #[must_use]
    pub fn gt(mut self, column: impl Into<ColumnRef>, value: impl Into<FilterValue>) -> Self {
        self.condition = self
            .condition
            .add(Expr::col(column.into()).gt(value.into().into_sea_value()));
        self.count += 1;
        self
    }

    /// column < value
    #[must_use]
    pub fn lt(mut self, column: impl Into<ColumnRef>, value: impl Into<FilterValue>) -> Self {
        self.condition = self
            .condition
            .add(Expr::col(column.into()).lt(value.into().into_sea_value()));
        self.count += 1;
        self
    }

    /// column ILIKE pattern
    #[must_use]
    pub fn ilike(mut self, column: impl Into<ColumnRef>, pattern: impl Into<String>) -> Self {
        let expr: SimpleExpr = Expr::col(column.into()).ilike(pattern.into());
        self.condition = self.condition.add(expr);
        self.count += 1;
        self
    }

    /// column IN (values)
    #[must_use]
    pub fn in_list(mut self, column: impl Into<ColumnRef>, values: Vec<FilterValue>) -> Self {
        let sea_values: Vec<SeaValue> =
            values.into_iter().map(FilterValue::into_sea_value).collect();
        self.condition = self.condition.add(Expr::col(column.into()).is_in(sea_values));
        self.count += 1;
        self
    }

    /// column BETWEEN low AND high
    #[must_use]
    pub fn between(
        mut self,
        column: impl Into<ColumnRef>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.condition = self.condition.add(
            Expr::col(column.into())
                .between(low.into().into_sea_value(), high.into().into_sea_value()),
        );
        self.count += 1;
        self
    }

    /// Merge another filter as a nested condition
    #[must_use]
    pub fn add_cond(mut self, other: Cond) -> Self {
        self.condition = self.condition.add(other);
        self.count += 1;
        self
    }

    /// Add a prebuilt expression (computed columns, casts)
    #[must_use]
    pub fn add_expr(mut self, expr: SimpleExpr) -> Self {
        self.condition = self.condition.add(expr);
        self.count += 1;
        self
    }

    /// Number of conditions added so far
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Unwrap into the `SeaQuery` condition
    #[must_use]
    pub fn build(self) -> Cond {
        self.condition
    }
}

/// Reference to a database column, optionally table-qualified
#[derive(Clone, Debug)]
pub enum ColumnRef {
    Simple(String),
    Qualified { table: String, column: String },
}

impl ColumnRef {
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Qualified {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(s: &str) -> Self {
        match s.split_once('.') {
            Some((table, column)) => Self::Qualified {
                table: table.to_string(),
                column: column.to_string(),
            },
            None => Self::Simple(s.to_string()),
        }
    }
}

impl From<String> for ColumnRef {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl IntoColumnRef for ColumnRef {
    fn into_column_ref(self) -> sea_query::ColumnRef {
        match self {
            Self::Simple(name) => sea_query::ColumnRef::Column(Alias::new(name).into_iden()),
            Self::Qualified { table, column } => sea_query::ColumnRef::TableColumn(
                Alias::new(table).into_iden(),
                Alias::new(column).into_iden(),
            ),
        }
    }
}

/// Value that can be safely parameterized in SQL queries
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FilterValue {
    fn into_sea_value(self) -> SeaValue {
        match self {
            Self::Null => SeaValue::String(None),
            Self::Bool(b) => SeaValue::Bool(Some(b)),
            Self::Int(i) => SeaValue::BigInt(Some(i)),
            Self::Float(f) => SeaValue::Double(Some(f)),
            Self::String(s) => SeaValue::String(Some(Box::new(s))),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for FilterValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for FilterValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FilterValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Bind a rendered `SeaQuery` value onto an sqlx query
#[must_use]
pub fn bind_sea_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: SeaValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SeaValue::Bool(v) => query.bind(v),
        SeaValue::TinyInt(v) => query.bind(v.map(i16::from)),
        SeaValue::SmallInt(v) => query.bind(v),
        SeaValue::Int(v) => query.bind(v),
        SeaValue::BigInt(v) => query.bind(v),
        SeaValue::Float(v) => query.bind(v),
        SeaValue::Double(v) => query.bind(v),
        SeaValue::String(v) => query.bind(v.map(|s| *s)),
        SeaValue::Char(v) => query.bind(v.map(|c| c.to_string())),
        _ => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, Query as SeaQuery};

    fn render(filter: Filter) -> (String, Vec<SeaValue>) {
        let (sql, values) = SeaQuery::select()
            .column(Alias::new("id"))
            .from(Alias::new("media_items"))
            .cond_where(filter.build())
            .build(PostgresQueryBuilder);
        (sql, values.0)
    }

    // ========== Condition Shapes ==========

    #[test]
    fn test_and_conditions() {
        let filter = Filter::all().eq("genre", "Rock").gt("year", 2000);
        let (sql, values) = render(filter);
        assert!(sql.contains("\"genre\" = $1"));
        assert!(sql.contains("\"year\" > $2"));
        assert!(sql.contains("AND"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_or_conditions() {
        let filter = Filter::any().eq("genre", "Rock").eq("genre", "Jazz");
        let (sql, _) = render(filter);
        assert!(sql.contains("OR"));
    }

    #[test]
    fn test_ilike_renders_parameterized() {
        let filter = Filter::all().ilike("title", "%matrix%");
        let (sql, values) = render(filter);
        assert!(sql.contains("ILIKE"));
        assert!(!sql.contains("matrix"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_between_takes_two_values() {
        let filter = Filter::all().between("year", 1990, 1999);
        let (sql, values) = render(filter);
        assert!(sql.contains("BETWEEN"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_in_list() {
        let filter = Filter::all().in_list(
            "genre",
            vec![FilterValue::from("Rock"), FilterValue::from("Jazz")],
        );
        let (sql, values) = render(filter);
        assert!(sql.contains("IN"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_qualified_column() {
        let filter = Filter::all().eq(ColumnRef::qualified("artist", "title"), "Pink Floyd");
        let (sql, _) = render(filter);
        assert!(sql.contains(r#""artist"."title""#));
    }

    #[test]
    fn test_empty_filter_reports_empty() {
        assert!(Filter::all().is_empty());
        assert_eq!(Filter::all().eq("a", 1).len(), 1);
    }
}
