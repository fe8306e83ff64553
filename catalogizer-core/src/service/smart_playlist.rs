//! Smart-playlist rule compiler and evaluator
//!
//! Compiles a declarative rule set into one parameterized SELECT over the
//! catalog. Tracks live in `media_items`; the album and artist of a track
//! are its parent and grandparent entities, joined in as `album` and
//! `artist`. Unknown (field, operator) pairs compile to nothing and are
//! skipped with a warning; a criteria whose rules all compile to nothing
//! yields an empty result, never the whole library.

use sea_query::{
    Alias, Expr, JoinType, Order, PostgresQueryBuilder, Query, SimpleExpr, Value as SeaValue,
};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool, Row};

use crate::models::{MediaItemId, RuleLogic, SmartPlaylistCriteria, SmartRule};
use crate::repository::{bind_sea_value, ColumnRef, Filter, FilterValue};
use crate::Result;

/// Compiles criteria into catalog queries and runs them
#[derive(Clone)]
pub struct SmartPlaylistEvaluator {
    pool: PgPool,
}

impl SmartPlaylistEvaluator {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Evaluate criteria against the catalog, returning matching track
    /// IDs in criteria order
    pub async fn evaluate(&self, criteria: &SmartPlaylistCriteria) -> Result<Vec<MediaItemId>> {
        self.evaluate_on(criteria, &self.pool).await
    }

    /// Evaluate on an explicit executor so a smart refresh can run its
    /// read inside the surrounding transaction
    pub async fn evaluate_on<'e, E: PgExecutor<'e>>(
        &self,
        criteria: &SmartPlaylistCriteria,
        executor: E,
    ) -> Result<Vec<MediaItemId>> {
        let Some((sql, values)) = compile_query(criteria) else {
            return Ok(Vec::new());
        };

        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_sea_value(query, value);
        }
        let rows = query.fetch_all(executor).await?;
        Ok(rows
            .iter()
            .map(|row| MediaItemId::from_string(row.get(0)))
            .collect())
    }
}

impl std::fmt::Debug for SmartPlaylistEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartPlaylistEvaluator").finish()
    }
}

/// Compile criteria to `(sql, values)`. Returns `None` when no rule
/// survives compilation.
pub(crate) fn compile_query(
    criteria: &SmartPlaylistCriteria,
) -> Option<(String, Vec<SeaValue>)> {
    let mut filter = match criteria.logic {
        RuleLogic::And => Filter::all(),
        RuleLogic::Or => Filter::any(),
    };
    let mut applied = 0usize;

    for rule in &criteria.rules {
        let (next, matched) = apply_rule(filter, rule);
        filter = next;
        if matched {
            applied += 1;
        } else {
            tracing::warn!(
                field = %rule.field,
                operator = %rule.operator,
                "Skipping unknown smart-playlist rule"
            );
        }
    }
    if applied == 0 {
        return None;
    }

    let mut select = Query::select();
    select
        .column(ColumnRef::qualified("m", "id"))
        .from_as(Alias::new("media_items"), Alias::new("m"))
        .join_as(
            JoinType::LeftJoin,
            Alias::new("media_items"),
            Alias::new("album"),
            Expr::col(ColumnRef::qualified("m", "parent_id"))
                .equals(ColumnRef::qualified("album", "id")),
        )
        .join_as(
            JoinType::LeftJoin,
            Alias::new("media_items"),
            Alias::new("artist"),
            Expr::col(ColumnRef::qualified("album", "parent_id"))
                .equals(ColumnRef::qualified("artist", "id")),
        )
        .join_as(
            JoinType::LeftJoin,
            Alias::new("media_play_stats"),
            Alias::new("ps"),
            Expr::col(ColumnRef::qualified("ps", "media_item_id"))
                .equals(ColumnRef::qualified("m", "id")),
        )
        .cond_where(filter.build());

    apply_order(&mut select, &criteria.order);

    if criteria.limit > 0 {
        select.limit(criteria.limit as u64);
    }

    let (sql, values) = select.build(PostgresQueryBuilder);
    Some((sql, values.0))
}

/// Fold one rule into the filter; `false` means the (field, operator)
/// pair is unknown and was skipped
fn apply_rule(filter: Filter, rule: &SmartRule) -> (Filter, bool) {
    let op = rule.operator.as_str();
    match rule.field.as_str() {
        "genre" => string_rule(filter, ColumnRef::qualified("m", "genre"), op, &rule.value),
        "artist" => string_rule(filter, ColumnRef::qualified("artist", "title"), op, &rule.value),
        "album" => string_rule(filter, ColumnRef::qualified("album", "title"), op, &rule.value),
        "year" => numeric_rule(filter, ColumnRef::qualified("m", "year"), op, &rule.value),
        "rating" => numeric_rule(filter, ColumnRef::qualified("m", "rating"), op, &rule.value),
        "play_count" => play_count_rule(filter, op, &rule.value),
        "date_added" => date_added_rule(filter, op, &rule.value),
        _ => (filter, false),
    }
}

fn string_rule(filter: Filter, col: ColumnRef, op: &str, value: &JsonValue) -> (Filter, bool) {
    match op {
        "equals" => match value.as_str() {
            Some(s) => (filter.eq(col, s), true),
            None => (filter, false),
        },
        "contains" => match value.as_str() {
            Some(s) => (filter.ilike(col, format!("%{s}%")), true),
            None => (filter, false),
        },
        "starts_with" => match value.as_str() {
            Some(s) => (filter.ilike(col, format!("{s}%")), true),
            None => (filter, false),
        },
        "in" => match value.as_array() {
            Some(items) => {
                let values: Vec<FilterValue> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(FilterValue::from))
                    .collect();
                if values.is_empty() {
                    (filter, false)
                } else {
                    (filter.in_list(col, values), true)
                }
            }
            None => (filter, false),
        },
        _ => (filter, false),
    }
}

fn numeric_rule(filter: Filter, col: ColumnRef, op: &str, value: &JsonValue) -> (Filter, bool) {
    match op {
        "equals" => match numeric_value(value) {
            Some(v) => (filter.eq(col, v), true),
            None => (filter, false),
        },
        "greater_than" => match numeric_value(value) {
            Some(v) => (filter.gt(col, v), true),
            None => (filter, false),
        },
        "less_than" => match numeric_value(value) {
            Some(v) => (filter.lt(col, v), true),
            None => (filter, false),
        },
        "between" => match numeric_pair(value) {
            Some((low, high)) => (filter.between(col, low, high), true),
            None => (filter, false),
        },
        _ => (filter, false),
    }
}

/// play_count reads through COALESCE so never-played tracks count as 0
fn play_count_rule(filter: Filter, op: &str, value: &JsonValue) -> (Filter, bool) {
    let expr = |sql: &str, values: Vec<i64>| -> SimpleExpr {
        Expr::cust_with_values(sql, values)
    };
    match op {
        "equals" => match value.as_i64() {
            Some(v) => (
                filter.add_expr(expr("COALESCE(ps.play_count, 0) = ?", vec![v])),
                true,
            ),
            None => (filter, false),
        },
        "greater_than" => match value.as_i64() {
            Some(v) => (
                filter.add_expr(expr("COALESCE(ps.play_count, 0) > ?", vec![v])),
                true,
            ),
            None => (filter, false),
        },
        "less_than" => match value.as_i64() {
            Some(v) => (
                filter.add_expr(expr("COALESCE(ps.play_count, 0) < ?", vec![v])),
                true,
            ),
            None => (filter, false),
        },
        "between" => match numeric_pair(value) {
            Some((FilterValue::Int(low), FilterValue::Int(high))) => (
                filter.add_expr(expr(
                    "COALESCE(ps.play_count, 0) BETWEEN ? AND ?",
                    vec![low, high],
                )),
                true,
            ),
            _ => (filter, false),
        },
        _ => (filter, false),
    }
}

/// date_added compares against first_detected; values are ISO timestamps
fn date_added_rule(filter: Filter, op: &str, value: &JsonValue) -> (Filter, bool) {
    let Some(s) = value.as_str() else {
        return (filter, false);
    };
    let expr = |sql: &str| Expr::cust_with_values(sql, [s.to_string()]);
    match op {
        "equals" => (
            filter.add_expr(expr("m.first_detected::date = CAST(? AS date)")),
            true,
        ),
        "greater_than" => (
            filter.add_expr(expr("m.first_detected > CAST(? AS timestamptz)")),
            true,
        ),
        "less_than" => (
            filter.add_expr(expr("m.first_detected < CAST(? AS timestamptz)")),
            true,
        ),
        _ => (filter, false),
    }
}

fn numeric_value(value: &JsonValue) -> Option<FilterValue> {
    if let Some(i) = value.as_i64() {
        return Some(FilterValue::Int(i));
    }
    value.as_f64().map(FilterValue::Float)
}

fn numeric_pair(value: &JsonValue) -> Option<(FilterValue, FilterValue)> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    Some((numeric_value(&items[0])?, numeric_value(&items[1])?))
}

/// Ordering clause from the fixed set; unknown falls back to added_desc
fn apply_order(select: &mut sea_query::SelectStatement, order: &str) {
    match order {
        "added_asc" => {
            select.order_by(ColumnRef::qualified("m", "first_detected"), Order::Asc);
        }
        "play_count_desc" => {
            select.order_by_expr(Expr::cust("COALESCE(ps.play_count, 0)"), Order::Desc);
        }
        "rating_desc" => {
            select.order_by(ColumnRef::qualified("m", "rating"), Order::Desc);
        }
        "random" => {
            select.order_by_expr(Expr::cust("RANDOM()"), Order::Asc);
        }
        "title_asc" => {
            select.order_by(ColumnRef::qualified("m", "title"), Order::Asc);
        }
        "artist_asc" => {
            select.order_by(ColumnRef::qualified("artist", "title"), Order::Asc);
        }
        _ => {
            select.order_by(ColumnRef::qualified("m", "first_detected"), Order::Desc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SmartRule;
    use serde_json::json;

    fn rule(field: &str, operator: &str, value: JsonValue) -> SmartRule {
        SmartRule {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        }
    }

    fn criteria(rules: Vec<SmartRule>, logic: RuleLogic, order: &str, limit: i64) -> SmartPlaylistCriteria {
        SmartPlaylistCriteria {
            rules,
            logic,
            limit,
            order: order.to_string(),
        }
    }

    // ========== Compilation ==========

    #[test]
    fn test_rock_after_2000_compiles() {
        let c = criteria(
            vec![
                rule("genre", "contains", json!("Rock")),
                rule("year", "greater_than", json!(2000)),
            ],
            RuleLogic::And,
            "play_count_desc",
            50,
        );
        let (sql, values) = compile_query(&c).unwrap();

        assert!(sql.contains("ILIKE"));
        assert!(sql.contains(r#""m"."year" > "#));
        assert!(sql.contains("AND"));
        assert!(sql.contains("ORDER BY COALESCE(ps.play_count, 0) DESC"));
        assert!(sql.contains("LIMIT"));
        assert_eq!(values.len(), 3); // %Rock%, 2000, limit
    }

    #[test]
    fn test_or_logic() {
        let c = criteria(
            vec![
                rule("genre", "equals", json!("Rock")),
                rule("genre", "equals", json!("Jazz")),
            ],
            RuleLogic::Or,
            "",
            0,
        );
        let (sql, _) = compile_query(&c).unwrap();
        assert!(sql.contains("OR"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_empty_rules_compile_to_none() {
        let c = criteria(vec![], RuleLogic::And, "added_desc", 10);
        assert!(compile_query(&c).is_none());
    }

    #[test]
    fn test_unknown_pairs_are_skipped() {
        let c = criteria(
            vec![
                rule("mood", "equals", json!("happy")),
                rule("genre", "teleports", json!("Rock")),
                rule("year", "greater_than", json!(1990)),
            ],
            RuleLogic::And,
            "",
            0,
        );
        let (_, values) = compile_query(&c).unwrap();
        // only the year rule survives
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_all_rules_unknown_yields_none() {
        let c = criteria(
            vec![rule("mood", "equals", json!("happy"))],
            RuleLogic::And,
            "",
            0,
        );
        assert!(compile_query(&c).is_none());
    }

    #[test]
    fn test_between_and_in_operators() {
        let c = criteria(
            vec![
                rule("year", "between", json!([1990, 1999])),
                rule("genre", "in", json!(["Rock", "Grunge"])),
            ],
            RuleLogic::And,
            "",
            0,
        );
        let (sql, values) = compile_query(&c).unwrap();
        assert!(sql.contains("BETWEEN"));
        assert!(sql.contains("IN"));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_artist_rule_targets_grandparent_join() {
        let c = criteria(
            vec![rule("artist", "equals", json!("Pink Floyd"))],
            RuleLogic::And,
            "artist_asc",
            0,
        );
        let (sql, _) = compile_query(&c).unwrap();
        assert!(sql.contains(r#""artist"."title""#));
        assert!(sql.contains("LEFT JOIN"));
    }

    #[test]
    fn test_play_count_counts_unplayed_as_zero() {
        let c = criteria(
            vec![rule("play_count", "less_than", json!(5))],
            RuleLogic::And,
            "",
            0,
        );
        let (sql, _) = compile_query(&c).unwrap();
        assert!(sql.contains("COALESCE(ps.play_count, 0) <"));
    }

    #[test]
    fn test_date_added_rule() {
        let c = criteria(
            vec![rule("date_added", "greater_than", json!("2024-01-01T00:00:00Z"))],
            RuleLogic::And,
            "",
            0,
        );
        let (sql, values) = compile_query(&c).unwrap();
        assert!(sql.contains("first_detected"));
        assert_eq!(values.len(), 1);
    }

    // ========== Ordering ==========

    #[test]
    fn test_unknown_order_defaults_to_added_desc() {
        let c = criteria(
            vec![rule("genre", "equals", json!("Rock"))],
            RuleLogic::And,
            "sideways",
            0,
        );
        let (sql, _) = compile_query(&c).unwrap();
        assert!(sql.contains(r#"ORDER BY "m"."first_detected" DESC"#));
    }

    #[test]
    fn test_random_order() {
        let c = criteria(
            vec![rule("genre", "equals", json!("Rock"))],
            RuleLogic::And,
            "random",
            0,
        );
        let (sql, _) = compile_query(&c).unwrap();
        assert!(sql.contains("RANDOM()"));
    }
}
