//! Column-to-column lineage inference between two assets.
//!
//! Matching runs in priority order, and a column pair claimed by an earlier
//! rule is never re-matched by a later one:
//!
//! 1. cross-table SQL references (`source_table.source_col` in the target's
//!    SQL, or the symmetric check against the source's SQL)
//! 2. usage-based classification of each pair against the target's SQL
//! 3. naming heuristics, only when SQL evidence produced nothing

use super::model::{Asset, AssetColumn, ColumnLineage, ColumnRelationship};
use super::pii::detect_pii_in_column;
use std::collections::HashSet;

/// Suffixes stripped when matching columns by base name.
const NAME_SUFFIXES: &[&str] = &["_id", "_key", "_name", "_code", "_type", "_status"];

const AGGREGATION_FUNCS: &[&str] = &["count(", "sum(", "avg(", "min(", "max("];
const STRING_FUNCS: &[&str] = &["upper(", "lower(", "trim(", "substring(", "concat("];
const DATE_FUNCS: &[&str] = &["date(", "extract(", "format_date("];
const CLAUSE_ANCHORS: &[&str] = &["select ", "from ", "join ", "where ", "group by ", "order by "];

/// Per-column quality heuristic: described columns score higher.
pub fn column_quality_score(column: &AssetColumn) -> i64 {
    if column.description.trim().is_empty() {
        80
    } else {
        95
    }
}

type PairKey = (String, String);

fn pair_key(source_col: &str, target_col: &str) -> PairKey {
    (source_col.to_lowercase(), target_col.to_lowercase())
}

fn mapping(
    source: &Asset,
    target: &Asset,
    source_col: &AssetColumn,
    target_col: &AssetColumn,
    relationship: ColumnRelationship,
    impact: i64,
) -> ColumnLineage {
    let (contains_pii, _) = detect_pii_in_column(&source_col.name, &source_col.description);
    let quality = (column_quality_score(source_col) + column_quality_score(target_col)) / 2;
    ColumnLineage {
        source_table: source.id.clone(),
        source_column: source_col.name.clone(),
        target_table: target.id.clone(),
        target_column: target_col.name.clone(),
        relationship_type: relationship,
        contains_pii,
        data_quality_score: quality,
        impact_score: impact,
    }
}

/// Cross-table SQL references: the strongest SQL evidence short of a direct
/// clause match, scored at impact 9.
fn match_cross_table(
    source: &Asset,
    target: &Asset,
    matched: &mut HashSet<PairKey>,
) -> Vec<ColumnLineage> {
    let mut out = Vec::new();
    if source.columns.is_empty() || target.columns.is_empty() {
        return out;
    }

    let source_sql = source.sql.as_deref().unwrap_or("").to_lowercase();
    let target_sql = target.sql.as_deref().unwrap_or("").to_lowercase();
    let source_name = source.name.to_lowercase();
    let target_name = target.name.to_lowercase();

    if !target_sql.is_empty() && target_sql.contains(&source_name) {
        let referenced = qualified_references(source, &source_name, &target_sql);
        for target_col in &target.columns {
            for source_col in &referenced {
                let key = pair_key(&source_col.name, &target_col.name);
                if matched.contains(&key) {
                    continue;
                }
                matched.insert(key);
                out.push(mapping(
                    source,
                    target,
                    source_col,
                    target_col,
                    ColumnRelationship::CrossTableSql,
                    9,
                ));
            }
        }
    } else if !source_sql.is_empty() && source_sql.contains(&target_name) {
        let referenced = qualified_references(target, &target_name, &source_sql);
        for source_col in &source.columns {
            for target_col in &referenced {
                let key = pair_key(&source_col.name, &target_col.name);
                if matched.contains(&key) {
                    continue;
                }
                matched.insert(key);
                out.push(mapping(
                    source,
                    target,
                    source_col,
                    target_col,
                    ColumnRelationship::CrossTableSql,
                    9,
                ));
            }
        }
    }
    out
}

/// Columns of `asset` referenced as `table.column` (plain or backtick-quoted)
/// in the given SQL text.
fn qualified_references<'a>(
    asset: &'a Asset,
    table_name: &str,
    sql_lower: &str,
) -> Vec<&'a AssetColumn> {
    asset
        .columns
        .iter()
        .filter(|col| {
            let col_name = col.name.to_lowercase();
            sql_lower.contains(&format!("{}.{}", table_name, col_name))
                || sql_lower.contains(&format!("`{}`.`{}`", table_name, col_name))
        })
        .collect()
}

fn classify_usage(
    source_col_lower: &str,
    target_col_lower: &str,
    source_sql: &str,
    target_sql: &str,
) -> Option<(ColumnRelationship, i64)> {
    // Function-wrapped occurrences are classified before bare references so
    // an aggregated or transformed column is not reported as a plain read.
    if AGGREGATION_FUNCS
        .iter()
        .any(|f| target_sql.contains(&format!("{}{}", f, source_col_lower)))
    {
        return Some((ColumnRelationship::Aggregation, 6));
    }
    if STRING_FUNCS
        .iter()
        .any(|f| target_sql.contains(&format!("{}{}", f, source_col_lower)))
    {
        return Some((ColumnRelationship::StringTransform, 6));
    }
    if DATE_FUNCS
        .iter()
        .any(|f| target_sql.contains(&format!("{}{}", f, source_col_lower)))
    {
        return Some((ColumnRelationship::DateTransform, 6));
    }
    if CLAUSE_ANCHORS
        .iter()
        .any(|a| target_sql.contains(&format!("{}{}", a, source_col_lower)))
    {
        return Some((ColumnRelationship::SqlTransformation, 6));
    }
    if !target_sql.is_empty() && target_sql.contains(source_col_lower) {
        return Some((ColumnRelationship::SqlReference, 10));
    }
    if !source_sql.is_empty() && source_sql.contains(target_col_lower) {
        return Some((ColumnRelationship::SqlDerived, 8));
    }
    None
}

/// Usage-based matching of (target, source) column pairs against the SQL
/// definitions. Each column is consumed by at most one mapping.
fn match_usage(
    source: &Asset,
    target: &Asset,
    matched: &mut HashSet<PairKey>,
) -> Vec<ColumnLineage> {
    let mut out = Vec::new();
    if source.columns.is_empty() || target.columns.is_empty() {
        return out;
    }

    let source_sql = source.sql.as_deref().unwrap_or("").to_lowercase();
    let target_sql = target.sql.as_deref().unwrap_or("").to_lowercase();

    let mut used_source: HashSet<String> = HashSet::new();
    let mut used_target: HashSet<String> = HashSet::new();

    for target_col in &target.columns {
        let target_col_lower = target_col.name.to_lowercase();
        if used_target.contains(&target_col_lower) {
            continue;
        }
        for source_col in &source.columns {
            let source_col_lower = source_col.name.to_lowercase();
            if used_source.contains(&source_col_lower) {
                continue;
            }
            let key = pair_key(&source_col.name, &target_col.name);
            if matched.contains(&key) {
                continue;
            }
            if let Some((relationship, impact)) =
                classify_usage(&source_col_lower, &target_col_lower, &source_sql, &target_sql)
            {
                matched.insert(key);
                used_source.insert(source_col_lower);
                used_target.insert(target_col_lower.clone());
                out.push(mapping(
                    source,
                    target,
                    source_col,
                    target_col,
                    relationship,
                    impact,
                ));
                break;
            }
        }
    }
    out
}

/// Naming fallback: exact case-insensitive matches, then suffix-stripped
/// base-name matches, each column consumed at most once.
pub fn match_by_naming(source: &Asset, target: &Asset) -> Vec<ColumnLineage> {
    let mut out = Vec::new();
    if source.columns.is_empty() || target.columns.is_empty() {
        return out;
    }

    let mut matched_source: HashSet<String> = HashSet::new();
    let mut matched_target: HashSet<String> = HashSet::new();

    for target_col in &target.columns {
        let target_lower = target_col.name.to_lowercase();
        if let Some(source_col) = source
            .columns
            .iter()
            .find(|c| c.name.to_lowercase() == target_lower)
        {
            matched_source.insert(source_col.name.to_lowercase());
            matched_target.insert(target_lower.clone());
            out.push(mapping(
                source,
                target,
                source_col,
                target_col,
                ColumnRelationship::DirectMapping,
                7,
            ));
        }
    }

    for target_col in &target.columns {
        let target_lower = target_col.name.to_lowercase();
        if matched_target.contains(&target_lower) {
            continue;
        }
        let target_base = strip_suffix(&target_lower);
        if target_base.is_empty() {
            continue;
        }
        for source_col in &source.columns {
            let source_lower = source_col.name.to_lowercase();
            if matched_source.contains(&source_lower) {
                continue;
            }
            if strip_suffix(&source_lower) == target_base {
                matched_source.insert(source_lower);
                matched_target.insert(target_lower.clone());
                out.push(mapping(
                    source,
                    target,
                    source_col,
                    target_col,
                    ColumnRelationship::InferredMapping,
                    5,
                ));
                break;
            }
        }
    }

    out
}

fn strip_suffix(name: &str) -> &str {
    for suffix in NAME_SUFFIXES {
        if let Some(base) = name.strip_suffix(suffix) {
            return base;
        }
    }
    name
}

/// SQL-evidence matching only (cross-table + usage). The pairwise inference
/// fallback uses this variant so naming alone never fabricates edges between
/// unrelated same-shaped tables.
pub fn build_from_sql_evidence(source: &Asset, target: &Asset) -> Vec<ColumnLineage> {
    let mut matched = HashSet::new();
    let mut out = match_cross_table(source, target, &mut matched);
    out.extend(match_usage(source, target, &mut matched));
    out
}

/// Full column lineage: SQL evidence first, naming heuristics only when the
/// SQL stages produced nothing.
pub fn build_column_lineage(source: &Asset, target: &Asset) -> Vec<ColumnLineage> {
    let out = build_from_sql_evidence(source, target);
    if !out.is_empty() {
        return out;
    }
    match_by_naming(source, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::model::AssetType;

    fn table(id: &str, columns: &[&str]) -> Asset {
        let mut asset = Asset::new(id, AssetType::Table, id);
        for col in columns {
            asset = asset.with_column(AssetColumn::new(*col, "VARCHAR"));
        }
        asset
    }

    #[test]
    fn test_view_sql_reference_matching() {
        let customers = table("customers", &["id", "email"]);
        let view = table("customer_emails", &["id", "email"])
            .with_sql("SELECT id, email FROM customers");

        let lineage = build_column_lineage(&customers, &view);
        assert_eq!(lineage.len(), 2);
        let pairs: Vec<(&str, &str)> = lineage
            .iter()
            .map(|c| (c.source_column.as_str(), c.target_column.as_str()))
            .collect();
        assert!(pairs.contains(&("id", "id")));
        assert!(pairs.contains(&("email", "email")));
    }

    #[test]
    fn test_cross_table_reference_wins() {
        let orders = table("orders", &["order_id"]);
        let report = table("order_report", &["order_id"])
            .with_sql("SELECT orders.order_id FROM orders");

        let lineage = build_column_lineage(&orders, &report);
        assert!(!lineage.is_empty());
        assert_eq!(
            lineage[0].relationship_type,
            ColumnRelationship::CrossTableSql
        );
        assert_eq!(lineage[0].impact_score, 9);
        // The cross-table rule claimed the pair; usage must not re-emit it.
        let count = lineage
            .iter()
            .filter(|c| c.source_column == "order_id" && c.target_column == "order_id")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_aggregation_classified_before_bare_reference() {
        let orders = table("orders", &["amount"]);
        let summary = table("order_summary", &["total"])
            .with_sql("SELECT SUM(amount) AS total FROM orders");

        let lineage = build_column_lineage(&orders, &summary);
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].relationship_type, ColumnRelationship::Aggregation);
        assert_eq!(lineage[0].impact_score, 6);
    }

    #[test]
    fn test_naming_fallback_exact_and_suffix() {
        let source = table("src", &["customer_id", "region"]);
        let target = table("tgt", &["customer_key", "region"]);

        let lineage = build_column_lineage(&source, &target);
        assert_eq!(lineage.len(), 2);
        let direct = lineage
            .iter()
            .find(|c| c.relationship_type == ColumnRelationship::DirectMapping)
            .unwrap();
        assert_eq!(direct.source_column, "region");
        assert_eq!(direct.impact_score, 7);
        let inferred = lineage
            .iter()
            .find(|c| c.relationship_type == ColumnRelationship::InferredMapping)
            .unwrap();
        assert_eq!(inferred.source_column, "customer_id");
        assert_eq!(inferred.target_column, "customer_key");
        assert_eq!(inferred.impact_score, 5);
    }

    #[test]
    fn test_naming_skipped_when_sql_evidence_exists() {
        let source = table("src", &["id", "email"]);
        let target = table("tgt", &["id", "email"]).with_sql("SELECT id FROM src");

        let lineage = build_column_lineage(&source, &target);
        // "id" matched via SQL; naming stage must not run at all, so "email"
        // stays unmatched.
        assert!(lineage
            .iter()
            .all(|c| c.relationship_type != ColumnRelationship::DirectMapping));
        assert!(!lineage.iter().any(|c| c.source_column == "email"));
    }

    #[test]
    fn test_empty_columns_yield_no_lineage() {
        let source = table("src", &[]);
        let target = table("tgt", &["id"]);
        assert!(build_column_lineage(&source, &target).is_empty());
    }

    #[test]
    fn test_pii_and_quality_propagate() {
        let mut source = table("src", &[]);
        source = source.with_column(
            AssetColumn::new("user_ssn", "VARCHAR").with_description("tax identifier"),
        );
        let target = table("tgt", &["user_ssn"]);

        let lineage = build_column_lineage(&source, &target);
        assert_eq!(lineage.len(), 1);
        assert!(lineage[0].contains_pii);
        // (95 described + 80 undescribed) / 2, integer division
        assert_eq!(lineage[0].data_quality_score, 87);
    }
}
