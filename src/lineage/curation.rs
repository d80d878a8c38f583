//! Manual curation of lineage edges.
//!
//! Two pathways exist by design:
//!
//! - `propose` is the direct-creation variant behind the primary endpoint:
//!   it materializes a relation immediately, with no approval gate.
//! - bulk `upload` creates proposals that sit in the `proposed` state until
//!   an admin approves (materializing a signed edge at confidence 0.95) or
//!   rejects them.

use super::model::{
    ColumnLineage, CurationProposal, EdgeKind, LineageEdge, LineageRelation, ProposalStatus,
    ProvenanceTag, ValidationStatus,
};
use super::signing::EdgeSigner;
use crate::error::{Result, TorroError};
use crate::store::{ProposalStore, RelationStore};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Confidence assigned to manually curated edges.
const CURATED_CONFIDENCE: f64 = 0.95;

/// A propose request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposeRequest {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub column_lineage: Vec<ColumnLineage>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Supported bulk upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Json,
}

impl std::str::FromStr for UploadFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "csv" => Ok(UploadFormat::Csv),
            "json" => Ok(UploadFormat::Json),
            other => Err(format!("unsupported upload format: {}", other)),
        }
    }
}

/// Proposal/approval state machine plus bulk ingestion.
pub struct CurationService {
    proposals: Arc<dyn ProposalStore>,
    relations: Arc<dyn RelationStore>,
    signer: EdgeSigner,
}

impl CurationService {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        relations: Arc<dyn RelationStore>,
        signer: EdgeSigner,
    ) -> Self {
        Self {
            proposals,
            relations,
            signer,
        }
    }

    /// Directly create a lineage relation from a manual submission.
    pub async fn propose(&self, request: ProposeRequest) -> Result<LineageRelation> {
        if request.source.is_empty() || request.target.is_empty() {
            return Err(TorroError::Validation(
                "Both source and target are required".to_string(),
            ));
        }

        let relation_type: EdgeKind = request
            .relationship
            .unwrap_or_else(|| "manual".to_string())
            .into();
        let relation = LineageRelation {
            source_id: request.source,
            target_id: request.target,
            relation_type,
            column_lineage: request.column_lineage,
            notes: request.notes,
            edge: None,
            updated_at: Utc::now(),
        };
        self.relations.upsert_relation(relation.clone()).await?;
        info!(
            source = %relation.source_id,
            target = %relation.target_id,
            "Created manual lineage relation"
        );
        Ok(relation)
    }

    /// Approve a proposed edge: materializes a signed edge at curated
    /// confidence and marks the proposal approved.
    pub async fn approve(&self, source: &str, target: &str) -> Result<LineageEdge> {
        let proposals = self.proposals.load_proposals(Some(ProposalStatus::Proposed)).await?;
        let proposal = proposals
            .into_iter()
            .find(|p| p.source == source && p.target == target)
            .ok_or_else(|| TorroError::NotFound("Proposal not found".to_string()))?;

        let now = Utc::now();
        let mut edge = LineageEdge::new(source, target, proposal.relationship.clone(), now);
        edge.column_lineage = proposal.column_lineage.clone();
        edge.validation_status = ValidationStatus::Valid;
        edge.confidence_score = CURATED_CONFIDENCE;
        edge.evidence = vec!["manual_curation".to_string()];
        edge.sources = vec![ProvenanceTag::User];
        edge.edge_signature = self.signer.sign_edge(&edge);

        self.proposals
            .update_status(source, target, ProposalStatus::Approved, Some(now))
            .await?;

        // Persist the approved edge so subsequent graph builds include it.
        self.relations
            .upsert_relation(LineageRelation {
                source_id: source.to_string(),
                target_id: target.to_string(),
                relation_type: edge.relationship.clone(),
                column_lineage: Vec::new(),
                notes: proposal.notes.clone(),
                edge: Some(edge.clone()),
                updated_at: now,
            })
            .await?;

        info!(source = %source, target = %target, "Approved lineage proposal");
        Ok(edge)
    }

    /// Reject a proposed edge. Terminal; no edge is produced.
    pub async fn reject(&self, source: &str, target: &str) -> Result<()> {
        let updated = self
            .proposals
            .update_status(source, target, ProposalStatus::Rejected, None)
            .await?;
        if !updated {
            return Err(TorroError::NotFound("Proposal not found".to_string()));
        }
        info!(source = %source, target = %target, "Rejected lineage proposal");
        Ok(())
    }

    /// List proposals, optionally filtered by status.
    pub async fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<CurationProposal>> {
        self.proposals.load_proposals(status).await
    }

    /// Bulk-ingest proposals from an uploaded file. Rows without both a
    /// source and a target are skipped, not fatal.
    pub async fn upload(
        &self,
        filename: &str,
        format: UploadFormat,
        content: &str,
    ) -> Result<Vec<CurationProposal>> {
        let drafts = match format {
            UploadFormat::Csv => parse_csv_upload(filename, content),
            UploadFormat::Json => parse_json_upload(filename, content)?,
        };

        let mut created = Vec::new();
        for draft in drafts {
            self.proposals.save_proposal(draft.clone()).await?;
            created.push(draft);
        }
        info!(file = %filename, created = created.len(), "Uploaded curation proposals");
        Ok(created)
    }
}

fn draft_proposal(
    source: String,
    target: String,
    relationship: Option<String>,
    column_lineage: Vec<ColumnLineage>,
    notes: Option<String>,
) -> CurationProposal {
    CurationProposal {
        id: Uuid::new_v4(),
        source,
        target,
        relationship: relationship.unwrap_or_else(|| "manual".to_string()).into(),
        column_lineage,
        notes,
        status: ProposalStatus::Proposed,
        proposed_at: Utc::now(),
        approved_at: None,
    }
}

/// Header-mapped CSV rows. Fields must not contain embedded commas.
fn parse_csv_upload(filename: &str, content: &str) -> Vec<CurationProposal> {
    let mut lines = content.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<String> = header
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut proposals = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: HashMap<&str, &str> = columns
            .iter()
            .zip(line.split(','))
            .map(|(name, value)| (name.as_str(), value.trim()))
            .collect();

        let source = fields
            .get("source_table")
            .or_else(|| fields.get("source"))
            .copied()
            .unwrap_or("");
        let target = fields
            .get("target_table")
            .or_else(|| fields.get("target"))
            .copied()
            .unwrap_or("");
        if source.is_empty() || target.is_empty() {
            continue;
        }

        let mut column_lineage = Vec::new();
        if let (Some(&source_column), Some(&target_column)) =
            (fields.get("source_column"), fields.get("target_column"))
        {
            if !source_column.is_empty() && !target_column.is_empty() {
                column_lineage.push(ColumnLineage {
                    source_table: source.to_string(),
                    source_column: source_column.to_string(),
                    target_table: target.to_string(),
                    target_column: target_column.to_string(),
                    relationship_type: fields
                        .get("column_relationship")
                        .filter(|r| !r.is_empty())
                        .map(|r| r.to_string().into())
                        .unwrap_or(super::model::ColumnRelationship::DirectMapping),
                    contains_pii: false,
                    data_quality_score: 95,
                    impact_score: 1,
                });
            }
        }

        proposals.push(draft_proposal(
            source.to_string(),
            target.to_string(),
            fields.get("relationship").filter(|r| !r.is_empty()).map(|r| r.to_string()),
            column_lineage,
            Some(
                fields
                    .get("notes")
                    .filter(|n| !n.is_empty())
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("Uploaded from CSV: {}", filename)),
            ),
        ));
    }
    proposals
}

#[derive(Debug, Deserialize)]
struct JsonUploadEntry {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_table: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    target_table: Option<String>,
    #[serde(default)]
    relationship: Option<String>,
    #[serde(default)]
    column_lineage: Vec<ColumnLineage>,
    #[serde(default)]
    notes: Option<String>,
}

fn parse_json_upload(filename: &str, content: &str) -> Result<Vec<CurationProposal>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| TorroError::Validation(format!("Invalid JSON upload: {}", e)))?;
    let entries: Vec<JsonUploadEntry> = if value.is_array() {
        serde_json::from_value(value)
            .map_err(|e| TorroError::Validation(format!("Invalid JSON upload: {}", e)))?
    } else {
        vec![serde_json::from_value(value)
            .map_err(|e| TorroError::Validation(format!("Invalid JSON upload: {}", e)))?]
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let source = entry.source.or(entry.source_table).unwrap_or_default();
            let target = entry.target.or(entry.target_table).unwrap_or_default();
            if source.is_empty() || target.is_empty() {
                return None;
            }
            Some(draft_proposal(
                source,
                target,
                entry.relationship,
                entry.column_lineage,
                entry
                    .notes
                    .or_else(|| Some(format!("Uploaded from JSON: {}", filename))),
            ))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryProposalStore, MemoryRelationStore};

    fn service() -> (CurationService, Arc<MemoryProposalStore>, Arc<MemoryRelationStore>) {
        let proposals = Arc::new(MemoryProposalStore::new());
        let relations = Arc::new(MemoryRelationStore::new());
        let service = CurationService::new(
            proposals.clone(),
            relations.clone(),
            EdgeSigner::new(Some("key".to_string())),
        );
        (service, proposals, relations)
    }

    fn proposed(source: &str, target: &str) -> CurationProposal {
        draft_proposal(source.to_string(), target.to_string(), None, vec![], None)
    }

    #[tokio::test]
    async fn test_propose_creates_relation_directly() {
        let (service, _, relations) = service();
        service
            .propose(ProposeRequest {
                source: "x".into(),
                target: "y".into(),
                relationship: Some("derives_from".into()),
                column_lineage: vec![],
                notes: Some("hand entered".into()),
            })
            .await
            .unwrap();

        let saved = relations.load_relations().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].relation_type, EdgeKind::DerivesFrom);
        assert_eq!(saved[0].notes.as_deref(), Some("hand entered"));
    }

    #[tokio::test]
    async fn test_propose_requires_source_and_target() {
        let (service, _, _) = service();
        let err = service
            .propose(ProposeRequest {
                source: "x".into(),
                target: "".into(),
                relationship: None,
                column_lineage: vec![],
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TorroError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approve_materializes_curated_edge() {
        let (service, proposals, relations) = service();
        proposals.save_proposal(proposed("x", "y")).await.unwrap();

        let edge = service.approve("x", "y").await.unwrap();
        assert!((edge.confidence_score - 0.95).abs() < f64::EPSILON);
        assert_eq!(edge.evidence, vec!["manual_curation".to_string()]);
        assert_eq!(edge.sources, vec![ProvenanceTag::User]);
        assert!(edge.edge_signature.is_some());

        let approved = service.list(Some(ProposalStatus::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert!(approved[0].approved_at.is_some());

        let saved = relations.load_relations().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].edge.is_some());
    }

    #[tokio::test]
    async fn test_approve_missing_proposal_not_found() {
        let (service, _, _) = service();
        let err = service.approve("x", "y").await.unwrap_err();
        assert!(matches!(err, TorroError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reject_is_terminal_without_edge() {
        let (service, proposals, relations) = service();
        proposals.save_proposal(proposed("x", "y")).await.unwrap();

        service.reject("x", "y").await.unwrap();
        let rejected = service.list(Some(ProposalStatus::Rejected)).await.unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(relations.load_relations().await.unwrap().is_empty());

        // Rejection is terminal; the proposal cannot be approved afterwards.
        assert!(service.approve("x", "y").await.is_err());
    }

    #[tokio::test]
    async fn test_csv_upload_skips_malformed_rows() {
        let (service, _, _) = service();
        let content = "source_table,target_table,relationship,source_column,target_column\n\
                       raw.orders,mart.orders,feeds_into,id,order_id\n\
                       ,mart.orphans,feeds_into,,\n\
                       raw.items,mart.items,,,\n";
        let created = service
            .upload("lineage.csv", UploadFormat::Csv, content)
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].source, "raw.orders");
        assert_eq!(created[0].column_lineage.len(), 1);
        assert_eq!(created[0].column_lineage[0].source_column, "id");
        assert_eq!(created[1].relationship, EdgeKind::Manual);
        assert!(created[1].column_lineage.is_empty());

        let pending = service.list(Some(ProposalStatus::Proposed)).await.unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_json_upload_accepts_array_and_object() {
        let (service, _, _) = service();
        let array = r#"[
            {"source": "a", "target": "b"},
            {"source_table": "c", "target_table": "d", "relationship": "feeds_into"},
            {"source": "", "target": "e"}
        ]"#;
        let created = service
            .upload("lineage.json", UploadFormat::Json, array)
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].relationship, EdgeKind::FeedsInto);

        let single = r#"{"source": "x", "target": "y"}"#;
        let created = service
            .upload("one.json", UploadFormat::Json, single)
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_json_upload_rejects_invalid_payload() {
        let (service, _, _) = service();
        let err = service
            .upload("bad.json", UploadFormat::Json, "not json at all")
            .await
            .unwrap_err();
        assert!(matches!(err, TorroError::Validation(_)));
    }
}
