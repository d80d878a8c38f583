// Shared fixtures for lineage integration tests

use std::sync::Arc;
use torro::config::LineageConfig;
use torro::lineage::assemble::GraphAssembler;
use torro::lineage::curation::CurationService;
use torro::lineage::model::{Asset, AssetColumn, AssetType, Connector, Engine};
use torro::lineage::reconcile::Reconciler;
use torro::lineage::signing::EdgeSigner;
use torro::store::{
    MemoryAssetStore, MemoryConnectorStore, MemoryIntegrationStore, MemoryProposalStore,
    MemoryQueryLogStore, MemoryRelationStore, MemorySnapshotStore,
};

/// A fully wired lineage stack over memory stores.
pub struct TestStack {
    pub assets: Arc<MemoryAssetStore>,
    pub connectors: Arc<MemoryConnectorStore>,
    pub relations: Arc<MemoryRelationStore>,
    pub proposals: Arc<MemoryProposalStore>,
    pub integrations: Arc<MemoryIntegrationStore>,
    pub query_logs: Arc<MemoryQueryLogStore>,
    pub snapshots: Arc<MemorySnapshotStore>,
    pub assembler: GraphAssembler,
    pub curation: CurationService,
    pub reconciler: Reconciler,
}

impl TestStack {
    pub fn new() -> Self {
        let config = LineageConfig {
            signing_key: Some("integration-test-key".to_string()),
            ..LineageConfig::default()
        };
        let signer = EdgeSigner::new(config.signing_key.clone());

        let assets = Arc::new(MemoryAssetStore::new());
        let connectors = Arc::new(MemoryConnectorStore::new());
        let relations = Arc::new(MemoryRelationStore::new());
        let proposals = Arc::new(MemoryProposalStore::new());
        let integrations = Arc::new(MemoryIntegrationStore::new());
        let query_logs = Arc::new(MemoryQueryLogStore::new());
        let snapshots = Arc::new(MemorySnapshotStore::new());

        let assembler = GraphAssembler::new(
            assets.clone(),
            connectors.clone(),
            relations.clone(),
            query_logs.clone(),
            snapshots.clone(),
            signer.clone(),
            config,
        );
        let curation = CurationService::new(proposals.clone(), relations.clone(), signer.clone());
        let reconciler = Reconciler::new(integrations.clone(), relations.clone(), signer);

        Self {
            assets,
            connectors,
            relations,
            proposals,
            integrations,
            query_logs,
            snapshots,
            assembler,
            curation,
            reconciler,
        }
    }

    /// Seed a warehouse connector plus the customers table / customer_emails
    /// view pair.
    pub async fn seed_customer_view(&self) {
        self.connectors
            .put(Connector::enabled("starburst_main", Engine::Warehouse))
            .await;
        self.assets
            .put(
                Asset::new("customers", AssetType::Table, "customers")
                    .with_catalog("crm")
                    .with_connector("starburst_main")
                    .with_column(
                        AssetColumn::new("id", "BIGINT").with_description("customer key"),
                    )
                    .with_column(AssetColumn::new("email", "VARCHAR")),
            )
            .await;
        self.assets
            .put(
                Asset::new("customer_emails", AssetType::View, "customer_emails")
                    .with_catalog("crm")
                    .with_connector("starburst_main")
                    .with_column(AssetColumn::new("id", "BIGINT"))
                    .with_column(AssetColumn::new("email", "VARCHAR"))
                    .with_sql("SELECT id, email FROM customers"),
            )
            .await;
    }
}
