//! Evidence-weighted confidence scoring for lineage edges.

use super::model::{round3, ColumnLineage, EdgeKind, QueryLogEntry};
use super::sql::Transformation;

/// Transformation types that mark a structural relationship.
const STRONG_TRANSFORMS: &[&str] = &[
    "FOREIGN_KEY",
    "ETL_PIPELINE",
    "ELT_PIPELINE",
    "ID_RELATIONSHIP",
];

/// Transformation types recorded as SQL-operation evidence (no score bump).
const SQL_OP_TRANSFORMS: &[&str] = &["COUNT", "SUM", "JOIN", "DISTINCT"];

/// Score a candidate edge from its relationship type, column evidence, and
/// transformation evidence. Returns a confidence in [0, 1] and the evidence
/// trail explaining it.
pub fn score_edge(
    relationship: &EdgeKind,
    column_lineage: &[ColumnLineage],
    transformations: &[Transformation],
) -> (f64, Vec<String>) {
    let mut base = 0.4;
    let mut evidence = Vec::new();

    if relationship.is_structural() {
        base = 0.6;
        evidence.push(format!("relationship_type:{}", relationship));
    }

    if !column_lineage.is_empty() {
        let mappings = column_lineage.len();
        let total_impact: i64 = column_lineage.iter().map(|c| c.impact_score.max(1)).sum();
        let avg_impact = total_impact as f64 / mappings as f64;
        base += (mappings as f64 * 0.03).min(0.3);
        base += ((avg_impact / 10.0) * 0.2).min(0.2);
        evidence.push(format!("column_mappings:{}", mappings));
    }

    if !transformations.is_empty() {
        if transformations
            .iter()
            .any(|t| STRONG_TRANSFORMS.contains(&t.op.as_str()))
        {
            base += 0.15;
            evidence.push("transformations:strong".to_string());
        }
        if transformations
            .iter()
            .any(|t| SQL_OP_TRANSFORMS.contains(&t.op.as_str()))
        {
            evidence.push("transformations:sql_ops".to_string());
        }
    }

    (round3(base.clamp(0.0, 1.0)), evidence)
}

/// Check recent query logs for co-occurrence of the two tables' short names.
/// A hit corroborates the relationship and counts toward the transformation
/// bonus as a `QUERY_LOG` entry.
pub fn logs_imply_relationship(source_id: &str, target_id: &str, logs: &[QueryLogEntry]) -> bool {
    let source_short = short_name(source_id);
    let target_short = short_name(target_id);
    logs.iter().any(|entry| {
        let sql = entry.sql.to_lowercase();
        sql.contains(&source_short) && sql.contains(&target_short)
    })
}

fn short_name(asset_id: &str) -> String {
    asset_id
        .rsplit('.')
        .next()
        .unwrap_or(asset_id)
        .to_lowercase()
}
