//! Primary/foreign-key validation over column lineage.
//!
//! Flags pk/fk-like column pairs on assembled edges and, when a sampler is
//! wired in, raises the confidence hint with a live distinct-ratio probe.
//! Sampling is strictly best-effort: probes run behind bounded retry and a
//! failed probe simply leaves the hint at its heuristic value.

use super::model::LineageGraph;
use crate::error::Result;
use crate::resilience::RetryExecutor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Capability for sampling the distinct ratio of a column in a source
/// system. Implementations may block on network I/O.
#[async_trait]
pub trait KeySampler: Send + Sync {
    async fn distinct_ratio(&self, table: &str, column: &str) -> Result<f64>;
}

/// One pk/fk-like column pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFinding {
    pub source: String,
    pub target: String,
    pub source_column: String,
    pub target_column: String,
    pub type_match: bool,
    pub name_pattern: String,
    pub confidence_hint: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_ratio_sample: Option<f64>,
}

/// Key validation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValidationReport {
    pub findings: Vec<KeyFinding>,
    pub count: usize,
}

fn key_like(name: &str) -> bool {
    name == "id" || name.ends_with("_id")
}

/// Scan the graph's column lineage for pk/fk-like pairs, optionally probing
/// the first `probe_limit` findings with a live distinct-ratio sample.
pub async fn validate_keys(
    graph: &LineageGraph,
    sampler: Option<&dyn KeySampler>,
    retry: &RetryExecutor,
    probe_limit: usize,
) -> KeyValidationReport {
    let mut findings = Vec::new();
    for edge in &graph.edges {
        for cl in &edge.column_lineage {
            let source_col = cl.source_column.to_lowercase();
            let target_col = cl.target_column.to_lowercase();
            if key_like(&source_col) || key_like(&target_col) {
                findings.push(KeyFinding {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    source_column: cl.source_column.clone(),
                    target_column: cl.target_column.clone(),
                    type_match: true,
                    name_pattern: "pkfk_like".to_string(),
                    confidence_hint: 0.7,
                    distinct_ratio_sample: None,
                });
            }
        }
    }

    if let Some(sampler) = sampler {
        for finding in findings.iter_mut().take(probe_limit) {
            let table = finding.source.clone();
            let column = finding.source_column.clone();
            match retry
                .execute(|| sampler.distinct_ratio(&table, &column))
                .await
            {
                Ok(ratio) => {
                    finding.distinct_ratio_sample = Some(ratio);
                    let boosted = if ratio > 0.9 { 0.85 } else { 0.7 };
                    finding.confidence_hint = finding.confidence_hint.max(boosted);
                }
                Err(e) => {
                    debug!(
                        table = %table,
                        column = %column,
                        error = %e,
                        "Distinct-ratio probe failed; keeping heuristic hint"
                    );
                }
            }
        }
    }

    KeyValidationReport {
        count: findings.len(),
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TorroError;
    use crate::lineage::model::{
        ColumnLineage, ColumnRelationship, EdgeKind, LineageEdge, LineageGraph,
    };
    use crate::resilience::RetryConfig;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn graph_with_mapping(source_col: &str, target_col: &str) -> LineageGraph {
        let mut edge = LineageEdge::new("t1", "t2", EdgeKind::ForeignKey, Utc::now());
        edge.column_lineage.push(ColumnLineage {
            source_table: "t1".into(),
            source_column: source_col.into(),
            target_table: "t2".into(),
            target_column: target_col.into(),
            relationship_type: ColumnRelationship::ForeignKey,
            contains_pii: false,
            data_quality_score: 95,
            impact_score: 10,
        });
        LineageGraph {
            edges: vec![edge],
            ..Default::default()
        }
    }

    struct FixedSampler {
        ratio: f64,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl KeySampler for FixedSampler {
        async fn distinct_ratio(&self, _table: &str, _column: &str) -> Result<f64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(TorroError::Upstream("sample query failed".to_string()))
            } else {
                Ok(self.ratio)
            }
        }
    }

    #[tokio::test]
    async fn test_finds_pkfk_like_pairs() {
        let graph = graph_with_mapping("id", "customer_id");
        let retry = RetryExecutor::new(RetryConfig::quick());
        let report = validate_keys(&graph, None, &retry, 5).await;
        assert_eq!(report.count, 1);
        assert!((report.findings[0].confidence_hint - 0.7).abs() < 1e-9);
        assert!(report.findings[0].distinct_ratio_sample.is_none());
    }

    #[tokio::test]
    async fn test_non_key_columns_ignored() {
        let graph = graph_with_mapping("email", "email_address");
        let retry = RetryExecutor::new(RetryConfig::quick());
        let report = validate_keys(&graph, None, &retry, 5).await;
        assert_eq!(report.count, 0);
    }

    #[tokio::test]
    async fn test_high_distinct_ratio_boosts_hint() {
        let graph = graph_with_mapping("id", "customer_id");
        let sampler = FixedSampler {
            ratio: 0.98,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        };
        let retry = RetryExecutor::new(RetryConfig::quick());
        let report = validate_keys(&graph, Some(&sampler), &retry, 5).await;
        assert_eq!(report.findings[0].distinct_ratio_sample, Some(0.98));
        assert!((report.findings[0].confidence_hint - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_probe_retries_transient_failures() {
        let graph = graph_with_mapping("id", "customer_id");
        let sampler = FixedSampler {
            ratio: 0.95,
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        };
        let retry = RetryExecutor::new(RetryConfig::quick());
        let report = validate_keys(&graph, Some(&sampler), &retry, 5).await;
        assert_eq!(report.findings[0].distinct_ratio_sample, Some(0.95));
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_probe_exhaustion_is_non_fatal() {
        let graph = graph_with_mapping("id", "customer_id");
        let sampler = FixedSampler {
            ratio: 0.95,
            failures_before_success: 100,
            calls: AtomicU32::new(0),
        };
        let retry = RetryExecutor::new(RetryConfig::quick());
        let report = validate_keys(&graph, Some(&sampler), &retry, 5).await;
        assert_eq!(report.count, 1);
        assert!(report.findings[0].distinct_ratio_sample.is_none());
        assert!((report.findings[0].confidence_hint - 0.7).abs() < 1e-9);
    }
}
