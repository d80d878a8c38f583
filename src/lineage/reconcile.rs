//! Reconciliation of externally ingested lineage artifacts.
//!
//! Each artifact kind maps into native edges with fixed provenance defaults:
//!
//! | kind        | relationship       | confidence |
//! |-------------|--------------------|-----------|
//! | openlineage | `openlineage_job`  | 0.8       |
//! | dbt         | `dbt_dependency`   | 0.75      |
//! | airflow     | `airflow_upstream` | 0.6       |
//! | metadata    | caller-specified   | 0.7       |
//!
//! Normalized edges are signed and upserted to the relation store. The
//! relation store deduplicates by (source, target); the normalizers
//! themselves emit one edge per artifact fact.

use super::model::{
    ArtifactKind, EdgeKind, IntegrationArtifact, LineageEdge, LineageRelation, ProvenanceTag,
    ValidationStatus,
};
use super::signing::EdgeSigner;
use crate::error::Result;
use crate::store::{IntegrationStore, RelationStore};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Converts ingested artifacts into native lineage relations.
pub struct Reconciler {
    integrations: Arc<dyn IntegrationStore>,
    relations: Arc<dyn RelationStore>,
    signer: EdgeSigner,
}

impl Reconciler {
    pub fn new(
        integrations: Arc<dyn IntegrationStore>,
        relations: Arc<dyn RelationStore>,
        signer: EdgeSigner,
    ) -> Self {
        Self {
            integrations,
            relations,
            signer,
        }
    }

    /// Normalize every stored artifact into edges and persist them. Returns
    /// the number of edges created.
    pub async fn reconcile(&self) -> Result<usize> {
        let now = Utc::now();
        let mut edges = Vec::new();

        let openlineage = self.integrations.load_artifacts(ArtifactKind::OpenLineage).await?;
        edges.extend(normalize_openlineage(&openlineage, now));
        let dbt = self.integrations.load_artifacts(ArtifactKind::Dbt).await?;
        edges.extend(normalize_dbt(&dbt, now));
        let airflow = self.integrations.load_artifacts(ArtifactKind::Airflow).await?;
        edges.extend(normalize_airflow(&airflow, now));
        let metadata = self.integrations.load_artifacts(ArtifactKind::Metadata).await?;
        edges.extend(normalize_metadata(&metadata, now));

        let created = edges.len();
        for mut edge in edges {
            edge.edge_signature = self.signer.sign_edge(&edge);
            let relation = LineageRelation {
                source_id: edge.source.clone(),
                target_id: edge.target.clone(),
                relation_type: edge.relationship.clone(),
                column_lineage: Vec::new(),
                notes: None,
                edge: Some(edge),
                updated_at: now,
            };
            if let Err(e) = self.relations.upsert_relation(relation).await {
                warn!(error = %e, "Failed to persist reconciled relation");
            }
        }

        info!(created = created, "Reconciled integration artifacts");
        Ok(created)
    }
}

fn external_edge(
    source: &str,
    target: &str,
    relationship: EdgeKind,
    confidence: f64,
    tag: ProvenanceTag,
    evidence: &str,
    now: DateTime<Utc>,
) -> LineageEdge {
    let mut edge = LineageEdge::new(source, target, relationship, now);
    edge.validation_status = ValidationStatus::Valid;
    edge.confidence_score = confidence;
    edge.evidence = vec![evidence.to_string()];
    edge.sources = vec![tag];
    edge
}

fn string_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// OpenLineage run events: every input feeds every output.
pub fn normalize_openlineage(
    artifacts: &[IntegrationArtifact],
    now: DateTime<Utc>,
) -> Vec<LineageEdge> {
    let mut edges = Vec::new();
    for artifact in artifacts {
        let empty = Vec::new();
        let inputs = artifact.data.get("inputs").and_then(Value::as_array).unwrap_or(&empty);
        let outputs = artifact.data.get("outputs").and_then(Value::as_array).unwrap_or(&empty);
        for input in inputs {
            let Some(source) = string_at(input, "name").or_else(|| string_at(input, "namespace"))
            else {
                continue;
            };
            for output in outputs {
                let Some(target) =
                    string_at(output, "name").or_else(|| string_at(output, "namespace"))
                else {
                    continue;
                };
                edges.push(external_edge(
                    source,
                    target,
                    EdgeKind::OpenLineageJob,
                    0.8,
                    ProvenanceTag::OpenLineage,
                    "openlineage",
                    now,
                ));
            }
        }
    }
    edges
}

/// dbt manifests: each node depends on its `depends_on` entries.
pub fn normalize_dbt(artifacts: &[IntegrationArtifact], now: DateTime<Utc>) -> Vec<LineageEdge> {
    let mut edges = Vec::new();
    for artifact in artifacts {
        let empty = Vec::new();
        let nodes = artifact.data.get("nodes").and_then(Value::as_array).unwrap_or(&empty);
        for node in nodes {
            let Some(target) = string_at(node, "name") else {
                continue;
            };
            let deps = node.get("depends_on").and_then(Value::as_array).unwrap_or(&empty);
            for dep in deps {
                let Some(source) = dep.as_str().filter(|s| !s.is_empty()) else {
                    continue;
                };
                edges.push(external_edge(
                    source,
                    target,
                    EdgeKind::DbtDependency,
                    0.75,
                    ProvenanceTag::Dbt,
                    "dbt",
                    now,
                ));
            }
        }
    }
    edges
}

/// Airflow DAGs: each task's upstream list feeds the task.
pub fn normalize_airflow(
    artifacts: &[IntegrationArtifact],
    now: DateTime<Utc>,
) -> Vec<LineageEdge> {
    let mut edges = Vec::new();
    for artifact in artifacts {
        let empty = Vec::new();
        let tasks = artifact.data.get("tasks").and_then(Value::as_array).unwrap_or(&empty);
        for task in tasks {
            let Some(target) = string_at(task, "task_id") else {
                continue;
            };
            let upstream = task.get("upstream").and_then(Value::as_array).unwrap_or(&empty);
            for up in upstream {
                let Some(source) = up.as_str().filter(|s| !s.is_empty()) else {
                    continue;
                };
                edges.push(external_edge(
                    source,
                    target,
                    EdgeKind::AirflowUpstream,
                    0.6,
                    ProvenanceTag::Airflow,
                    "airflow",
                    now,
                ));
            }
        }
    }
    edges
}

/// Generic metadata payloads: explicit relationship entries with a
/// caller-specified type.
pub fn normalize_metadata(
    artifacts: &[IntegrationArtifact],
    now: DateTime<Utc>,
) -> Vec<LineageEdge> {
    let mut edges = Vec::new();
    for artifact in artifacts {
        let empty = Vec::new();
        let relationships = artifact
            .data
            .get("payload")
            .and_then(|p| p.get("relationships"))
            .and_then(Value::as_array)
            .unwrap_or(&empty);
        for rel in relationships {
            let (Some(source), Some(target)) = (string_at(rel, "source"), string_at(rel, "target"))
            else {
                continue;
            };
            let kind: EdgeKind = string_at(rel, "type")
                .unwrap_or("metadata_relationship")
                .to_string()
                .into();
            edges.push(external_edge(
                source,
                target,
                kind,
                0.7,
                ProvenanceTag::Metadata,
                "metadata",
                now,
            ));
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryIntegrationStore, MemoryRelationStore};
    use serde_json::json;

    fn artifact(kind: ArtifactKind, data: Value) -> IntegrationArtifact {
        IntegrationArtifact {
            kind,
            data,
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn test_openlineage_inputs_cross_outputs() {
        let artifacts = vec![artifact(
            ArtifactKind::OpenLineage,
            json!({
                "inputs": [{"name": "raw.orders"}, {"name": "raw.customers"}],
                "outputs": [{"name": "mart.order_facts"}],
            }),
        )];
        let edges = normalize_openlineage(&artifacts, Utc::now());
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.relationship == EdgeKind::OpenLineageJob));
        assert!(edges.iter().all(|e| (e.confidence_score - 0.8).abs() < 1e-9));
        assert!(edges.iter().all(|e| e.sources == vec![ProvenanceTag::OpenLineage]));
    }

    #[test]
    fn test_openlineage_falls_back_to_namespace() {
        let artifacts = vec![artifact(
            ArtifactKind::OpenLineage,
            json!({
                "inputs": [{"namespace": "s3://bucket/raw"}],
                "outputs": [{"name": "mart.table"}],
            }),
        )];
        let edges = normalize_openlineage(&artifacts, Utc::now());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "s3://bucket/raw");
    }

    #[test]
    fn test_dbt_dependencies() {
        let artifacts = vec![artifact(
            ArtifactKind::Dbt,
            json!({
                "nodes": [
                    {"name": "stg_orders", "depends_on": ["raw_orders"]},
                    {"name": "orders", "depends_on": ["stg_orders", "stg_customers"]},
                    {"depends_on": ["ignored_no_name"]},
                ],
            }),
        )];
        let edges = normalize_dbt(&artifacts, Utc::now());
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0].source, "raw_orders");
        assert_eq!(edges[0].target, "stg_orders");
        assert!(edges.iter().all(|e| (e.confidence_score - 0.75).abs() < 1e-9));
    }

    #[test]
    fn test_airflow_upstreams() {
        let artifacts = vec![artifact(
            ArtifactKind::Airflow,
            json!({
                "dag_id": "nightly",
                "tasks": [
                    {"task_id": "load", "upstream": ["extract"]},
                    {"task_id": "transform", "upstream": ["load", ""]},
                ],
            }),
        )];
        let edges = normalize_airflow(&artifacts, Utc::now());
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.relationship == EdgeKind::AirflowUpstream));
        assert!(edges.iter().all(|e| (e.confidence_score - 0.6).abs() < 1e-9));
    }

    #[test]
    fn test_metadata_caller_specified_type() {
        let artifacts = vec![artifact(
            ArtifactKind::Metadata,
            json!({
                "payload": {
                    "relationships": [
                        {"source": "a", "target": "b", "type": "replication_feed"},
                        {"source": "a", "target": ""},
                    ],
                },
            }),
        )];
        let edges = normalize_metadata(&artifacts, Utc::now());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relationship.as_str(), "replication_feed");
        assert!((edges[0].confidence_score - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reconcile_persists_signed_edges() {
        let integrations = Arc::new(MemoryIntegrationStore::new());
        let relations = Arc::new(MemoryRelationStore::new());
        integrations
            .save_artifact(artifact(
                ArtifactKind::OpenLineage,
                json!({
                    "inputs": [{"name": "raw.orders"}],
                    "outputs": [{"name": "mart.orders"}],
                }),
            ))
            .await
            .unwrap();

        let reconciler = Reconciler::new(
            integrations,
            relations.clone(),
            EdgeSigner::new(Some("key".to_string())),
        );
        let created = reconciler.reconcile().await.unwrap();
        assert_eq!(created, 1);

        let persisted = relations.load_relations().await.unwrap();
        assert_eq!(persisted.len(), 1);
        let edge = persisted[0].edge.as_ref().unwrap();
        assert!(edge.edge_signature.is_some());
        assert_eq!(edge.relationship, EdgeKind::OpenLineageJob);
    }
}
