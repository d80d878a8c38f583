//! Lineage reconciliation and confidence scoring
//!
//! Turns heterogeneous, partial evidence into a directed graph of typed,
//! column-level, confidence-scored relationships:
//! - SQL reference extraction (grammar parser with pattern fallback)
//! - Multi-strategy column matching with tie-breaks
//! - Evidence-weighted confidence scoring with an audit trail
//! - Tamper-evident edge and snapshot signing
//! - Reconciliation of external lineage artifacts
//! - Manual curation with a proposal/approval workflow
//! - Health scoring and impact analysis

pub mod assemble;
pub mod columns;
pub mod confidence;
pub mod curation;
pub mod health;
pub mod keys;
pub mod model;
pub mod pii;
pub mod reconcile;
pub mod signing;
pub mod sql;

pub use assemble::{GraphAssembler, GraphOptions};
pub use curation::{CurationService, ProposeRequest, UploadFormat};
pub use health::{analyze_health, analyze_impact, HealthReport, ImpactReport};
pub use model::{
    Asset, AssetColumn, AssetType, ColumnLineage, ColumnRelationship, Connector, CurationProposal,
    EdgeKind, Engine, LineageEdge, LineageGraph, LineageNode, ProposalStatus, ProvenanceTag,
    ValidationStatus,
};
pub use reconcile::Reconciler;
pub use signing::EdgeSigner;
