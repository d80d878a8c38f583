//! Torro - a metadata catalog lineage engine.
//!
//! Torro reconciles heterogeneous lineage evidence (SQL text, schema
//! metadata, naming conventions, query logs, and externally-ingested
//! artifacts) into one directed graph of typed, column-level,
//! confidence-scored relationships, with tamper-evident signing and a
//! manual-curation overlay.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Lineage API (axum)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Graph Assembler: views | structural | pairwise | relations  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SQL Extractor │ Column Matcher │ Scorer │ Signer │ Curation │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Collaborator stores: assets, connectors, relations, logs    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use torro::config::TorroConfig;
//!
//! #[tokio::main]
//! async fn main() -> torro::Result<()> {
//!     let config = TorroConfig::development();
//!     torro::run(config).await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lineage;
pub mod observability;
pub mod resilience;
pub mod store;

// Re-exports
pub use error::{Result, TorroError};

use crate::api::ApiState;
use crate::auth::AuthState;
use crate::config::TorroConfig;
use crate::lineage::assemble::GraphAssembler;
use crate::lineage::curation::CurationService;
use crate::lineage::reconcile::Reconciler;
use crate::lineage::signing::EdgeSigner;
use crate::store::{
    MemoryAssetStore, MemoryConnectorStore, MemoryIntegrationStore, MemoryProposalStore,
    MemoryQueryLogStore, MemoryRelationStore, MemorySnapshotStore,
};
use std::sync::Arc;
use tracing::info;

/// Run the Torro lineage server with the given configuration, backed by
/// in-memory collaborator stores.
pub async fn run(config: TorroConfig) -> Result<()> {
    config.validate()?;

    let assets = Arc::new(MemoryAssetStore::new());
    let connectors = Arc::new(MemoryConnectorStore::new());
    let relations = Arc::new(MemoryRelationStore::new());
    let proposals = Arc::new(MemoryProposalStore::new());
    let integrations = Arc::new(MemoryIntegrationStore::new());
    let query_logs = Arc::new(MemoryQueryLogStore::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());

    let signer = EdgeSigner::new(config.lineage.signing_key.clone());
    if !signer.is_enabled() {
        info!("Lineage signing disabled (no signing key configured)");
    }

    let assembler = Arc::new(GraphAssembler::new(
        assets.clone(),
        connectors.clone(),
        relations.clone(),
        query_logs.clone(),
        snapshots.clone(),
        signer.clone(),
        config.lineage.clone(),
    ));
    let curation = Arc::new(CurationService::new(
        proposals.clone(),
        relations.clone(),
        signer.clone(),
    ));
    let reconciler = Arc::new(Reconciler::new(
        integrations.clone(),
        relations.clone(),
        signer.clone(),
    ));

    let state = ApiState {
        assembler,
        curation,
        reconciler,
        assets,
        integrations,
        query_logs,
        sampler: None,
        signer,
        config: config.lineage.clone(),
    };
    let auth = AuthState::new(&config.auth);
    let app = api::router(state, auth);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "Torro lineage API listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| TorroError::Internal(e.to_string()))?;

    Ok(())
}
