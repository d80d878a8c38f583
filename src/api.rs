//! HTTP surface for the lineage engine.
//!
//! Routes are thin: parse and validate at the boundary, call into the
//! lineage services, map [`TorroError`] onto the status taxonomy. Internal
//! computation errors surface as 500 with a logged context; best-effort side
//! effects never change the response.

use crate::auth::{auth_middleware, require_role, AuthInfo, AuthState};
use crate::config::LineageConfig;
use crate::error::{Result, TorroError};
use crate::lineage::assemble::{GraphAssembler, GraphOptions};
use crate::lineage::curation::{CurationService, ProposeRequest, UploadFormat};
use crate::lineage::health::{analyze_health, analyze_impact, pipeline_summary};
use crate::lineage::keys::{validate_keys, KeySampler};
use crate::lineage::model::{
    ArtifactKind, IntegrationArtifact, LineageGraph, ProposalStatus, QueryLogEntry, SearchKind,
};
use crate::lineage::reconcile::Reconciler;
use crate::lineage::signing::EdgeSigner;
use crate::resilience::{RetryConfig, RetryExecutor};
use crate::store::{AssetStore, IntegrationStore, QueryLogStore};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

impl IntoResponse for TorroError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared state for lineage handlers.
#[derive(Clone)]
pub struct ApiState {
    pub assembler: Arc<GraphAssembler>,
    pub curation: Arc<CurationService>,
    pub reconciler: Arc<Reconciler>,
    pub assets: Arc<dyn AssetStore>,
    pub integrations: Arc<dyn IntegrationStore>,
    pub query_logs: Arc<dyn QueryLogStore>,
    pub sampler: Option<Arc<dyn KeySampler>>,
    pub signer: EdgeSigner,
    pub config: LineageConfig,
}

impl ApiState {
    /// Assemble the full, unpaginated graph for derived read endpoints.
    async fn full_graph(&self) -> Result<LineageGraph> {
        self.assembler
            .assemble(&GraphOptions {
                page: 0,
                page_size: 0,
                as_of: None,
                snapshot: false,
            })
            .await
    }
}

/// Build the lineage router.
pub fn router(state: ApiState, auth: AuthState) -> Router {
    Router::new()
        .route("/lineage", get(get_lineage))
        .route("/lineage/export", get(export_lineage))
        .route("/lineage/search", get(search_lineage))
        .route("/lineage/health", get(lineage_health))
        .route("/lineage-analysis/pipelines", get(pipeline_lineage))
        .route("/lineage/impact/:asset_id", get(impact_analysis))
        .route("/lineage/validate/keys", post(validate_keys_handler))
        .route("/lineage/curation/propose", post(propose_lineage))
        .route("/lineage/curation/approve", post(approve_lineage))
        .route("/lineage/curation/reject", post(reject_lineage))
        .route("/lineage/curation/upload", post(upload_lineage))
        .route("/lineage/curation/list", get(list_proposals))
        .route("/lineage/ingest", post(ingest_artifact))
        .route("/lineage/ingest/:kind", post(ingest_kind))
        .route("/lineage/reconcile", post(reconcile_artifacts))
        .route("/lineage/:asset_id", get(asset_lineage))
        .with_state(state)
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
}

#[derive(Debug, Deserialize)]
struct LineageParams {
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    use_cache: Option<bool>,
    #[serde(default)]
    as_of: Option<String>,
    #[serde(default)]
    snapshot: Option<bool>,
}

fn parse_as_of(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else { return Ok(None) };
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| TorroError::Validation(format!("Invalid as_of timestamp: {}", raw)))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

async fn get_lineage(
    State(state): State<ApiState>,
    Query(params): Query<LineageParams>,
) -> Result<Json<LineageGraph>> {
    if params.use_cache.is_some() {
        // The build is a pure function per request; there is no cache.
        debug!("use_cache requested; lineage builds are uncached");
    }
    let opts = GraphOptions {
        page: params.page.unwrap_or(0),
        page_size: params.page_size.unwrap_or(state.config.default_page_size),
        as_of: parse_as_of(params.as_of.as_deref())?,
        snapshot: params.snapshot.unwrap_or(false),
    };
    let graph = state.assembler.assemble(&opts).await?;
    Ok(Json(graph))
}

async fn asset_lineage(
    State(state): State<ApiState>,
    Path(asset_id): Path<String>,
) -> Result<Json<LineageGraph>> {
    if state.assets.get_asset(&asset_id).await?.is_none() {
        return Err(TorroError::NotFound("Asset not found".to_string()));
    }
    let graph = state.full_graph().await?;
    Ok(Json(graph.asset_subgraph(&asset_id)))
}

async fn impact_analysis(
    State(state): State<ApiState>,
    Path(asset_id): Path<String>,
) -> Result<Json<crate::lineage::health::ImpactReport>> {
    let graph = state.full_graph().await?;
    Ok(Json(analyze_impact(&graph, &asset_id)))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    asset_id: Option<String>,
}

async fn export_lineage(
    State(state): State<ApiState>,
    Query(params): Query<ExportParams>,
) -> Result<Json<Value>> {
    let graph = state.full_graph().await?;
    let graph = match params.asset_id.as_deref() {
        Some(asset_id) => graph.asset_subgraph(asset_id),
        None => graph,
    };

    match params.format.as_deref().unwrap_or("json") {
        "csv" => Ok(Json(json!({ "format": "csv", "data": graph.to_csv() }))),
        "json" => Ok(Json(json!({
            "format": "json",
            "export_date": Utc::now(),
            "total_nodes": graph.nodes.len(),
            "total_edges": graph.edges.len(),
            "total_column_relationships": graph.column_relationships,
            "nodes": graph.nodes.iter().map(|n| json!({
                "id": n.id,
                "name": n.name,
                "type": n.node_type,
                "catalog": n.catalog,
            })).collect::<Vec<_>>(),
            "edges": graph.edges.iter().map(|e| json!({
                "source": e.source,
                "target": e.target,
                "relationship": e.relationship,
                "column_lineage": e.column_lineage,
            })).collect::<Vec<_>>(),
        }))),
        other => Err(TorroError::Validation(format!(
            "Unsupported export format: {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    search_type: Option<String>,
}

async fn search_lineage(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    let query = params
        .query
        .filter(|q| !q.is_empty())
        .ok_or_else(|| TorroError::Validation("Search query is required".to_string()))?;
    let kind: SearchKind = params
        .search_type
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(TorroError::Validation)?;

    let graph = state.full_graph().await?;
    let results = graph.search(&query, kind, state.config.max_search_results);
    Ok(Json(json!({
        "query": results.query,
        "results": {
            "nodes": results.node_count,
            "edges": results.edge_count,
            "matching_nodes": results.matching_nodes,
            "matching_edges": results.matching_edges,
        },
    })))
}

async fn lineage_health(
    State(state): State<ApiState>,
) -> Result<Json<crate::lineage::health::HealthReport>> {
    let graph = state.full_graph().await?;
    Ok(Json(analyze_health(
        &graph,
        state.config.stale_after_days,
        Utc::now(),
    )))
}

async fn pipeline_lineage(
    State(state): State<ApiState>,
) -> Result<Json<crate::lineage::health::PipelineReport>> {
    let graph = state.full_graph().await?;
    Ok(Json(pipeline_summary(&graph)))
}

#[derive(Debug, Deserialize)]
struct ValidateKeysParams {
    #[serde(default)]
    sample_size: Option<u64>,
}

async fn validate_keys_handler(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
    Query(params): Query<ValidateKeysParams>,
) -> Result<Json<crate::lineage::keys::KeyValidationReport>> {
    require_role(&auth, "admin")?;
    let graph = state.full_graph().await?;

    let sampling = state.config.sampling.clone();
    let retry = RetryExecutor::new(RetryConfig {
        max_attempts: sampling.max_attempts,
        initial_delay: Duration::from_millis(sampling.initial_backoff_ms),
        ..RetryConfig::default()
    });
    let sampler = if params.sample_size.unwrap_or(0) > 0 {
        state.sampler.as_deref()
    } else {
        None
    };
    let report = validate_keys(&graph, sampler, &retry, sampling.probe_limit).await;
    Ok(Json(report))
}

async fn propose_lineage(
    State(state): State<ApiState>,
    Json(request): Json<ProposeRequest>,
) -> Result<Json<Value>> {
    let relation = state.curation.propose(request).await?;
    Ok(Json(json!({
        "status": "ok",
        "message": "Lineage relation created successfully",
        "relation": relation,
    })))
}

#[derive(Debug, Deserialize)]
struct SourceTargetParams {
    source: Option<String>,
    target: Option<String>,
}

impl SourceTargetParams {
    fn require(self) -> Result<(String, String)> {
        match (self.source, self.target) {
            (Some(source), Some(target)) if !source.is_empty() && !target.is_empty() => {
                Ok((source, target))
            }
            _ => Err(TorroError::Validation(
                "Source and target are required".to_string(),
            )),
        }
    }
}

async fn approve_lineage(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
    Query(params): Query<SourceTargetParams>,
) -> Result<Json<Value>> {
    require_role(&auth, "admin")?;
    let (source, target) = params.require()?;
    let edge = state.curation.approve(&source, &target).await?;
    Ok(Json(json!({ "status": "ok", "edge": edge })))
}

async fn reject_lineage(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
    Query(params): Query<SourceTargetParams>,
) -> Result<Json<Value>> {
    require_role(&auth, "admin")?;
    let (source, target) = params.require()?;
    state.curation.reject(&source, &target).await?;
    Ok(Json(json!({ "status": "ok", "message": "Proposal rejected" })))
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

async fn upload_lineage(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
    Query(params): Query<UploadParams>,
    body: String,
) -> Result<Json<Value>> {
    require_role(&auth, "admin")?;
    if body.is_empty() {
        return Err(TorroError::Validation("No file content provided".to_string()));
    }
    let filename = params.filename.unwrap_or_else(|| "upload".to_string());
    let format: UploadFormat = params
        .format
        .as_deref()
        .or_else(|| filename.rsplit('.').next())
        .unwrap_or("")
        .parse()
        .map_err(|_| {
            TorroError::Validation("Unsupported file format. Use CSV or JSON".to_string())
        })?;

    let created = state.curation.upload(&filename, format, &body).await?;
    Ok(Json(json!({
        "status": "ok",
        "proposals_created": created.len(),
        "proposals": created.iter().take(10).collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    status: Option<String>,
}

async fn list_proposals(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    let status: Option<ProposalStatus> = match params.status.as_deref() {
        Some(raw) => Some(raw.parse().map_err(TorroError::Validation)?),
        None => None,
    };
    let proposals = state.curation.list(status).await?;
    Ok(Json(json!({
        "status": "ok",
        "count": proposals.len(),
        "proposals": proposals,
    })))
}

/// Signed artifact ingestion: `X-Torro-Signature` is verified when a signing
/// key is configured, and a mismatch is rejected outright.
async fn ingest_artifact(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>> {
    require_role(&auth, "admin")?;
    if let Some(signature) = headers
        .get("X-Torro-Signature")
        .and_then(|v| v.to_str().ok())
    {
        state.signer.verify(&payload, signature)?;
    }
    state
        .integrations
        .save_artifact(IntegrationArtifact {
            kind: ArtifactKind::LineageArtifact,
            data: payload,
            ingested_at: Utc::now(),
        })
        .await?;
    Ok(Json(json!({ "status": "ok", "stored": true })))
}

async fn ingest_kind(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
    Path(kind): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>> {
    require_role(&auth, "admin")?;
    let kind: ArtifactKind = kind.parse().map_err(TorroError::Validation)?;
    let now = Utc::now();

    match kind {
        ArtifactKind::QueryLog => {
            let sql = payload
                .get("sql")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let system = payload
                .get("system")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let logged_at = payload
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(now);
            state
                .query_logs
                .save_entry(QueryLogEntry {
                    system,
                    sql,
                    logged_at,
                })
                .await?;
            let count = state.query_logs.count().await?;
            Ok(Json(json!({ "status": "ok", "stored": true, "count": count })))
        }
        ArtifactKind::Dbt => {
            let data = json!({ "nodes": payload.get("nodes").cloned().unwrap_or(json!([])) });
            let count = store_artifact(&state, kind, data).await?;
            Ok(Json(json!({ "status": "ok", "stored": true, "dbt_batches": count })))
        }
        ArtifactKind::Airflow => {
            let data = json!({
                "dag_id": payload.get("dag_id").cloned().unwrap_or(Value::Null),
                "tasks": payload.get("tasks").cloned().unwrap_or(json!([])),
            });
            let count = store_artifact(&state, kind, data).await?;
            Ok(Json(json!({ "status": "ok", "stored": true, "airflow_batches": count })))
        }
        ArtifactKind::OpenLineage => {
            let count = store_artifact(&state, kind, payload).await?;
            Ok(Json(json!({ "status": "ok", "stored": true, "openlineage_events": count })))
        }
        ArtifactKind::Metadata => {
            let data = json!({ "payload": payload });
            let count = store_artifact(&state, kind, data).await?;
            Ok(Json(json!({ "status": "ok", "stored": true, "metadata_batches": count })))
        }
        ArtifactKind::LineageArtifact => Err(TorroError::Validation(
            "Use /lineage/ingest for signed artifacts".to_string(),
        )),
    }
}

async fn store_artifact(state: &ApiState, kind: ArtifactKind, data: Value) -> Result<usize> {
    state
        .integrations
        .save_artifact(IntegrationArtifact {
            kind,
            data,
            ingested_at: Utc::now(),
        })
        .await?;
    Ok(state.integrations.load_artifacts(kind).await?.len())
}

async fn reconcile_artifacts(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<Json<Value>> {
    require_role(&auth, "admin")?;
    let created = state.reconciler.reconcile().await?;
    Ok(Json(json!({ "status": "ok", "created_edges": created })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_of_accepts_rfc3339() {
        let parsed = parse_as_of(Some("2024-06-01T00:00:00Z")).unwrap();
        assert!(parsed.is_some());
        assert!(parse_as_of(None).unwrap().is_none());
    }

    #[test]
    fn test_parse_as_of_rejects_garbage() {
        let err = parse_as_of(Some("yesterday")).unwrap_err();
        assert!(matches!(err, TorroError::Validation(_)));
    }

    #[test]
    fn test_source_target_params_required() {
        let params = SourceTargetParams {
            source: Some("a".into()),
            target: None,
        };
        assert!(params.require().is_err());

        let params = SourceTargetParams {
            source: Some("a".into()),
            target: Some("b".into()),
        };
        assert_eq!(params.require().unwrap(), ("a".into(), "b".into()));
    }
}
