//! Health checks and impact analysis over an assembled graph.
//!
//! Pure read-only views: orphan and staleness detection rolled into a
//! composite health score, per-asset blast-radius scoring, and an ETL/ELT
//! pipeline summary.

use super::model::{round2, LineageGraph};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Overall health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

/// A detected issue or warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthFinding {
    #[serde(rename = "type")]
    pub finding_type: String,
    pub count: usize,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,
}

/// Statistics block of the health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub orphaned_nodes: usize,
    pub stale_edges: usize,
    pub completeness: f64,
    pub avg_confidence: f64,
    pub avg_data_quality: f64,
    pub avg_freshness_days: f64,
}

/// The health report returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub health_score: i64,
    pub status: HealthStatus,
    pub issues: Vec<HealthFinding>,
    pub warnings: Vec<HealthFinding>,
    pub statistics: HealthStatistics,
}

/// Analyze graph health as of `now`. Edges not validated within
/// `stale_after_days` count as stale.
pub fn analyze_health(graph: &LineageGraph, stale_after_days: i64, now: DateTime<Utc>) -> HealthReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let mut touched: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        touched.insert(edge.source.as_str());
        touched.insert(edge.target.as_str());
    }
    let orphaned: Vec<&str> = graph
        .nodes
        .iter()
        .filter(|n| !touched.contains(n.id.as_str()))
        .map(|n| n.name.as_str())
        .collect();
    if !orphaned.is_empty() {
        warnings.push(HealthFinding {
            finding_type: "orphaned_nodes".to_string(),
            count: orphaned.len(),
            severity: "medium".to_string(),
            nodes: Some(orphaned.iter().take(5).map(|n| n.to_string()).collect()),
        });
    }

    let edges_without_columns = graph
        .edges
        .iter()
        .filter(|e| e.column_lineage.is_empty())
        .count();
    if edges_without_columns > 0 {
        warnings.push(HealthFinding {
            finding_type: "missing_column_lineage".to_string(),
            count: edges_without_columns,
            severity: "low".to_string(),
            nodes: None,
        });
    }

    let mut stale_edges = 0usize;
    let mut freshness_days = Vec::new();
    for edge in &graph.edges {
        let age_days = (now - edge.last_validated).num_days().max(0);
        freshness_days.push(age_days as f64);
        if age_days > stale_after_days {
            stale_edges += 1;
        }
    }
    if stale_edges > 0 {
        issues.push(HealthFinding {
            finding_type: "stale_lineage".to_string(),
            count: stale_edges,
            severity: "medium".to_string(),
            nodes: None,
        });
    }

    let avg_freshness_days = if freshness_days.is_empty() {
        0.0
    } else {
        freshness_days.iter().sum::<f64>() / freshness_days.len() as f64
    };

    let total_findings = (issues.len() + warnings.len()) as f64;
    let confidence_penalty = (20.0 * (1.0 - graph.avg_confidence)).round().max(0.0);
    let quality_baseline = if graph.edges.is_empty() {
        95.0
    } else {
        graph.avg_data_quality
    };
    let quality_penalty = (0.5 * (95.0 - quality_baseline)).round().max(0.0);

    let score = 100.0
        - (5.0 * total_findings).min(40.0)
        - avg_freshness_days.min(20.0)
        - confidence_penalty
        - quality_penalty;
    let health_score = score.clamp(0.0, 100.0).round() as i64;

    let status = if health_score >= 80 {
        HealthStatus::Healthy
    } else if health_score >= 50 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Critical
    };

    HealthReport {
        health_score,
        status,
        issues,
        warnings,
        statistics: HealthStatistics {
            total_nodes: graph.nodes.len(),
            total_edges: graph.edges.len(),
            orphaned_nodes: orphaned.len(),
            stale_edges,
            completeness: graph.lineage_completeness,
            avg_confidence: graph.avg_confidence,
            avg_data_quality: graph.avg_data_quality,
            avg_freshness_days: round2(avg_freshness_days),
        },
    }
}

/// Change severity for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactSeverity {
    High,
    Medium,
    Low,
}

/// Upstream side of an impact report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamImpact {
    pub dependencies: usize,
    pub tables: Vec<String>,
}

/// Downstream side of an impact report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamImpact {
    pub dependent_tables: usize,
    pub tables: Vec<String>,
    pub column_relationships: usize,
}

/// Impact report for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub asset_id: String,
    pub impact_score: usize,
    pub upstream_impact: UpstreamImpact,
    pub downstream_impact: DownstreamImpact,
    pub severity: ImpactSeverity,
}

/// Score the blast radius of a change to `asset_id`.
pub fn analyze_impact(graph: &LineageGraph, asset_id: &str) -> ImpactReport {
    let upstream_edges: Vec<_> = graph.edges.iter().filter(|e| e.target == asset_id).collect();
    let downstream_edges: Vec<_> = graph.edges.iter().filter(|e| e.source == asset_id).collect();

    let upstream_count = upstream_edges
        .iter()
        .map(|e| e.source.as_str())
        .collect::<HashSet<_>>()
        .len();
    let downstream_count = downstream_edges
        .iter()
        .map(|e| e.target.as_str())
        .collect::<HashSet<_>>()
        .len();
    let total_column_impacts: usize = downstream_edges
        .iter()
        .map(|e| e.column_lineage.len())
        .sum();

    let severity = if downstream_count > 5 || total_column_impacts > 20 {
        ImpactSeverity::High
    } else if downstream_count > 0 {
        ImpactSeverity::Medium
    } else {
        ImpactSeverity::Low
    };

    ImpactReport {
        asset_id: asset_id.to_string(),
        impact_score: upstream_count * 10 + downstream_count * 20 + total_column_impacts * 5,
        upstream_impact: UpstreamImpact {
            dependencies: upstream_count,
            tables: upstream_edges.iter().map(|e| e.source.clone()).collect(),
        },
        downstream_impact: DownstreamImpact {
            dependent_tables: downstream_count,
            tables: downstream_edges.iter().map(|e| e.target.clone()).collect(),
            column_relationships: total_column_impacts,
        },
        severity,
    }
}

/// One hop of an ETL/ELT pipeline chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub source: String,
    pub target: String,
    pub stage: String,
    pub column_count: usize,
    pub pii_count: usize,
    pub quality: f64,
}

/// Counters for the pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCounts {
    pub total_etl_pipelines: usize,
    pub total_elt_pipelines: usize,
    pub total_direct_relationships: usize,
    pub total_etl_steps: usize,
    pub total_elt_steps: usize,
}

/// Visualization hints for the pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineVisualization {
    pub has_etl: bool,
    pub has_elt: bool,
    pub pipeline_complexity: String,
}

/// ETL/ELT pipeline summary over the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub pipeline_summary: PipelineCounts,
    pub etl_pipelines: Vec<PipelineStep>,
    pub elt_pipelines: Vec<PipelineStep>,
    pub visualization: PipelineVisualization,
}

/// Summarize pipeline-typed edges.
pub fn pipeline_summary(graph: &LineageGraph) -> PipelineReport {
    let mut etl = Vec::new();
    let mut elt = Vec::new();
    let mut direct = 0usize;

    for edge in &graph.edges {
        let step = PipelineStep {
            source: edge.source.clone(),
            target: edge.target.clone(),
            stage: edge.relationship.to_string(),
            column_count: edge.column_lineage.len(),
            pii_count: edge.total_pii_columns,
            quality: edge.avg_data_quality,
        };
        match edge.relationship.as_str() {
            "etl_pipeline" => etl.push(step),
            "elt_pipeline" => elt.push(step),
            _ => direct += 1,
        }
    }

    let total_steps = etl.len() + elt.len();
    let pipeline_complexity = if total_steps < 3 {
        "simple"
    } else if total_steps < 10 {
        "moderate"
    } else {
        "complex"
    };

    PipelineReport {
        pipeline_summary: PipelineCounts {
            total_etl_pipelines: etl.len(),
            total_elt_pipelines: elt.len(),
            total_direct_relationships: direct,
            total_etl_steps: etl.len(),
            total_elt_steps: elt.len(),
        },
        visualization: PipelineVisualization {
            has_etl: !etl.is_empty(),
            has_elt: !elt.is_empty(),
            pipeline_complexity: pipeline_complexity.to_string(),
        },
        etl_pipelines: etl,
        elt_pipelines: elt,
    }
}
