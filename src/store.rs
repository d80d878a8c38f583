//! Collaborator store interfaces.
//!
//! The lineage core never owns persistence: assets, connectors, relations,
//! proposals, artifacts, query logs, and snapshots live behind the traits in
//! this module and are injected into the services that need them. The
//! bundled memory implementations back tests and single-node deployments.

use crate::error::Result;
use crate::lineage::model::{
    ArtifactKind, Asset, Connector, CurationProposal, IntegrationArtifact, LineageRelation,
    ProposalStatus, QueryLogEntry, Snapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read access to discovered assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn load_assets(&self) -> Result<Vec<Asset>>;
    async fn get_asset(&self, id: &str) -> Result<Option<Asset>>;
}

/// Read access to configured connectors.
#[async_trait]
pub trait ConnectorStore: Send + Sync {
    async fn load_connectors(&self) -> Result<Vec<Connector>>;
}

/// Persisted lineage relations. Writes are upserts keyed by
/// (source, target); the last writer wins.
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn upsert_relation(&self, relation: LineageRelation) -> Result<()>;
    async fn load_relations(&self) -> Result<Vec<LineageRelation>>;
}

/// Curation proposals.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn save_proposal(&self, proposal: CurationProposal) -> Result<()>;
    async fn load_proposals(&self, status: Option<ProposalStatus>)
        -> Result<Vec<CurationProposal>>;
    /// Transition the first matching proposed record. Returns false when no
    /// proposed record matches.
    async fn update_status(
        &self,
        source: &str,
        target: &str,
        status: ProposalStatus,
        decided_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;
}

/// Ingested third-party artifacts, append-only.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn save_artifact(&self, artifact: IntegrationArtifact) -> Result<()>;
    async fn load_artifacts(&self, kind: ArtifactKind) -> Result<Vec<IntegrationArtifact>>;
}

/// Captured query logs.
#[async_trait]
pub trait QueryLogStore: Send + Sync {
    async fn save_entry(&self, entry: QueryLogEntry) -> Result<()>;
    async fn recent(&self, limit: usize) -> Result<Vec<QueryLogEntry>>;
    async fn count(&self) -> Result<usize>;
}

/// Graph snapshots, append-only.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn append_snapshot(&self, snapshot: Snapshot) -> Result<()>;
    async fn count(&self) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Memory implementations
// ---------------------------------------------------------------------------

/// In-memory asset store.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: Arc<RwLock<HashMap<String, Asset>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an asset.
    pub async fn put(&self, asset: Asset) {
        let mut assets = self.assets.write().await;
        assets.insert(asset.id.clone(), asset);
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn load_assets(&self) -> Result<Vec<Asset>> {
        let assets = self.assets.read().await;
        let mut list: Vec<Asset> = assets.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        let assets = self.assets.read().await;
        Ok(assets.get(id).cloned())
    }
}

/// In-memory connector store.
#[derive(Default)]
pub struct MemoryConnectorStore {
    connectors: Arc<RwLock<HashMap<String, Connector>>>,
}

impl MemoryConnectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, connector: Connector) {
        let mut connectors = self.connectors.write().await;
        connectors.insert(connector.id.clone(), connector);
    }
}

#[async_trait]
impl ConnectorStore for MemoryConnectorStore {
    async fn load_connectors(&self) -> Result<Vec<Connector>> {
        let connectors = self.connectors.read().await;
        let mut list: Vec<Connector> = connectors.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }
}

/// In-memory relation store keyed by (source, target).
#[derive(Default)]
pub struct MemoryRelationStore {
    relations: Arc<RwLock<BTreeMap<(String, String), LineageRelation>>>,
}

impl MemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationStore for MemoryRelationStore {
    async fn upsert_relation(&self, relation: LineageRelation) -> Result<()> {
        let mut relations = self.relations.write().await;
        relations.insert(
            (relation.source_id.clone(), relation.target_id.clone()),
            relation,
        );
        Ok(())
    }

    async fn load_relations(&self) -> Result<Vec<LineageRelation>> {
        let relations = self.relations.read().await;
        Ok(relations.values().cloned().collect())
    }
}

/// In-memory proposal store.
#[derive(Default)]
pub struct MemoryProposalStore {
    proposals: Arc<RwLock<Vec<CurationProposal>>>,
}

impl MemoryProposalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProposalStore for MemoryProposalStore {
    async fn save_proposal(&self, proposal: CurationProposal) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        proposals.push(proposal);
        Ok(())
    }

    async fn load_proposals(
        &self,
        status: Option<ProposalStatus>,
    ) -> Result<Vec<CurationProposal>> {
        let proposals = self.proposals.read().await;
        Ok(proposals
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        source: &str,
        target: &str,
        status: ProposalStatus,
        decided_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut proposals = self.proposals.write().await;
        for proposal in proposals.iter_mut() {
            if proposal.status == ProposalStatus::Proposed
                && proposal.source == source
                && proposal.target == target
            {
                proposal.status = status;
                proposal.approved_at = decided_at;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// In-memory integration artifact store.
#[derive(Default)]
pub struct MemoryIntegrationStore {
    artifacts: Arc<RwLock<Vec<IntegrationArtifact>>>,
}

impl MemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn save_artifact(&self, artifact: IntegrationArtifact) -> Result<()> {
        let mut artifacts = self.artifacts.write().await;
        artifacts.push(artifact);
        Ok(())
    }

    async fn load_artifacts(&self, kind: ArtifactKind) -> Result<Vec<IntegrationArtifact>> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.iter().filter(|a| a.kind == kind).cloned().collect())
    }
}

/// In-memory query log store.
#[derive(Default)]
pub struct MemoryQueryLogStore {
    entries: Arc<RwLock<Vec<QueryLogEntry>>>,
}

impl MemoryQueryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryLogStore for MemoryQueryLogStore {
    async fn save_entry(&self, entry: QueryLogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueryLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// In-memory snapshot store.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<RwLock<Vec<Snapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot, if any.
    pub async fn latest(&self) -> Option<Snapshot> {
        self.snapshots.read().await.last().cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn append_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.push(snapshot);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.snapshots.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::model::{AssetType, EdgeKind};

    #[tokio::test]
    async fn test_relation_upsert_last_write_wins() {
        let store = MemoryRelationStore::new();
        let now = Utc::now();

        for kind in [EdgeKind::Manual, EdgeKind::DbtDependency] {
            store
                .upsert_relation(LineageRelation {
                    source_id: "a".into(),
                    target_id: "b".into(),
                    relation_type: kind,
                    column_lineage: vec![],
                    notes: None,
                    edge: None,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let relations = store.load_relations().await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, EdgeKind::DbtDependency);
    }

    #[tokio::test]
    async fn test_proposal_status_transition() {
        let store = MemoryProposalStore::new();
        store
            .save_proposal(CurationProposal {
                id: uuid::Uuid::new_v4(),
                source: "a".into(),
                target: "b".into(),
                relationship: EdgeKind::Manual,
                column_lineage: vec![],
                notes: None,
                status: ProposalStatus::Proposed,
                proposed_at: Utc::now(),
                approved_at: None,
            })
            .await
            .unwrap();

        let updated = store
            .update_status("a", "b", ProposalStatus::Approved, Some(Utc::now()))
            .await
            .unwrap();
        assert!(updated);

        // The record left the proposed state; a second transition finds
        // nothing to update.
        let again = store
            .update_status("a", "b", ProposalStatus::Rejected, None)
            .await
            .unwrap();
        assert!(!again);

        let approved = store
            .load_proposals(Some(ProposalStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
    }

    #[tokio::test]
    async fn test_query_log_recent_returns_newest_first() {
        let store = MemoryQueryLogStore::new();
        for i in 0..5 {
            store
                .save_entry(QueryLogEntry {
                    system: "warehouse".into(),
                    sql: format!("SELECT {}", i),
                    logged_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sql, "SELECT 4");
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_asset_store_roundtrip() {
        let store = MemoryAssetStore::new();
        store
            .put(Asset::new("t1", AssetType::Table, "orders"))
            .await;

        assert!(store.get_asset("t1").await.unwrap().is_some());
        assert!(store.get_asset("missing").await.unwrap().is_none());
        assert_eq!(store.load_assets().await.unwrap().len(), 1);
    }
}
