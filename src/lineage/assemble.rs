//! Graph assembly.
//!
//! The assembler turns the asset catalog plus persisted lineage facts into
//! one [`LineageGraph`] per request. The build is a pure function of
//! (assets, connectors, persisted relations, query logs, current time): no
//! state survives between calls.
//!
//! Assembly order:
//!
//! 1. load assets and connectors, keep enabled connectors only
//! 2. project a node per surviving asset
//! 3. view lineage from SQL definitions (`feeds_into` edges)
//! 4. structural lineage for warehouse tables (foreign keys, id patterns,
//!    pipeline naming stages)
//! 5. pairwise inference fallback while the edge count stays low
//! 6. temporal filtering ("as of")
//! 7. merge of persisted manual/reconciled relations
//! 8. signing, 9. relation writeback (best-effort), 10. aggregates,
//! 11. pagination, 12. optional snapshot

use super::columns;
use super::confidence::{logs_imply_relationship, score_edge};
use super::model::{
    Asset, AssetType, ColumnLineage, ColumnRelationship, Connector, EdgeKind, Engine,
    LineageEdge, LineageGraph, LineageNode, LineageRelation, ProvenanceTag, QueryLogEntry,
    Snapshot, ValidationStatus,
};
use super::pii::detect_pii_in_column;
use super::signing::{EdgeSigner, SIGNATURE_ALG};
use super::sql::{SqlAnalyzer, TransformCategory, Transformation};
use crate::config::LineageConfig;
use crate::error::Result;
use crate::store::{AssetStore, ConnectorStore, QueryLogStore, RelationStore, SnapshotStore};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request build options.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub page: usize,
    pub page_size: usize,
    pub as_of: Option<DateTime<Utc>>,
    pub snapshot: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 1000,
            as_of: None,
            snapshot: false,
        }
    }
}

/// Ordered edge collection keyed by (source, target). A second evidence path
/// for a known pair merges instead of duplicating.
struct EdgeSet {
    edges: Vec<LineageEdge>,
    index: HashMap<(String, String), usize>,
}

impl EdgeSet {
    fn new() -> Self {
        Self {
            edges: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.edges.len()
    }

    fn contains(&self, source: &str, target: &str) -> bool {
        self.index
            .contains_key(&(source.to_string(), target.to_string()))
    }

    fn insert(&mut self, edge: LineageEdge) {
        let key = edge.key();
        match self.index.get(&key) {
            Some(&i) => self.edges[i].merge_from(edge),
            None => {
                self.index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }

    fn retain<F: FnMut(&LineageEdge) -> bool>(&mut self, mut keep: F) {
        self.edges.retain(|e| keep(e));
        self.index = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key(), i))
            .collect();
    }

    fn iter(&self) -> impl Iterator<Item = &LineageEdge> {
        self.edges.iter()
    }

    fn into_vec(self) -> Vec<LineageEdge> {
        self.edges
    }
}

/// A structural relationship recovered from engine metadata.
struct StructuralLink {
    source: String,
    target: String,
    kind: EdgeKind,
    /// (source column, target column) pair, when the constraint names one
    columns: Option<(String, String)>,
}

impl StructuralLink {
    fn priority(&self) -> u8 {
        match self.kind {
            EdgeKind::EtlPipeline => 3,
            EdgeKind::EltPipeline => 2,
            EdgeKind::IdRelationship => 1,
            _ => 0,
        }
    }

    fn transformation(&self) -> Transformation {
        match self.kind {
            EdgeKind::ForeignKey => Transformation::new("FOREIGN_KEY", TransformCategory::Constraint),
            EdgeKind::EtlPipeline => Transformation::new("ETL_PIPELINE", TransformCategory::Pipeline),
            EdgeKind::EltPipeline => Transformation::new("ELT_PIPELINE", TransformCategory::Pipeline),
            _ => Transformation::new("ID_RELATIONSHIP", TransformCategory::Metadata),
        }
    }
}

/// Builds lineage graphs from injected collaborator stores.
pub struct GraphAssembler {
    assets: Arc<dyn AssetStore>,
    connectors: Arc<dyn ConnectorStore>,
    relations: Arc<dyn RelationStore>,
    query_logs: Arc<dyn QueryLogStore>,
    snapshots: Arc<dyn SnapshotStore>,
    signer: EdgeSigner,
    analyzer: SqlAnalyzer,
    config: LineageConfig,
}

impl GraphAssembler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assets: Arc<dyn AssetStore>,
        connectors: Arc<dyn ConnectorStore>,
        relations: Arc<dyn RelationStore>,
        query_logs: Arc<dyn QueryLogStore>,
        snapshots: Arc<dyn SnapshotStore>,
        signer: EdgeSigner,
        config: LineageConfig,
    ) -> Self {
        let analyzer = SqlAnalyzer::new(config.prefer_grammar_parser);
        Self {
            assets,
            connectors,
            relations,
            query_logs,
            snapshots,
            signer,
            analyzer,
            config,
        }
    }

    /// Assemble the lineage graph for one request.
    pub async fn assemble(&self, opts: &GraphOptions) -> Result<LineageGraph> {
        let now = Utc::now();

        // 1. Load collaborator state; only enabled connectors survive.
        let all_assets = self.assets.load_assets().await?;
        let connectors = self.connectors.load_connectors().await?;
        let connector_map: HashMap<String, Connector> = connectors
            .into_iter()
            .filter(|c| c.enabled)
            .map(|c| (c.id.clone(), c))
            .collect();

        let active: Vec<Asset> = all_assets
            .into_iter()
            .filter(|a| connector_map.contains_key(&a.connector_id))
            .collect();

        let mut asset_map: HashMap<String, Asset> =
            active.iter().map(|a| (a.id.clone(), a.clone())).collect();

        // 2. One node per surviving asset.
        let mut nodes: Vec<LineageNode> = active.iter().map(LineageNode::from_asset).collect();

        // Corroboration source; failures just lose the boost.
        let logs = match self.query_logs.recent(self.config.query_log_scan_limit).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(error = %e, "Failed to load query logs; skipping corroboration");
                Vec::new()
            }
        };

        let mut edges = EdgeSet::new();

        // 3. View lineage from SQL definitions.
        self.build_view_edges(&active, &asset_map, &logs, now, &mut edges);

        // 4. Structural lineage for warehouse tables.
        self.build_structural_edges(&active, &asset_map, &connector_map, &logs, now, &mut edges);

        // 5. Pairwise fallback inference on sparse graphs.
        if edges.len() < self.config.pairwise_edge_threshold {
            self.build_pairwise_edges(&active, &logs, now, &mut edges);
        }

        // 6. Temporal filter.
        if let Some(as_of) = opts.as_of {
            edges.retain(|e| e.created_at <= as_of);
        }

        // 7. Merge persisted manual/reconciled relations.
        self.merge_saved_relations(&mut nodes, &mut asset_map, opts.as_of, now, &mut edges)
            .await;

        if opts.as_of.is_some() {
            let kept: HashSet<String> = edges
                .iter()
                .flat_map(|e| [e.source.clone(), e.target.clone()])
                .collect();
            nodes.retain(|n| kept.contains(&n.id));
        }

        // 8. Sign every edge.
        let mut edge_list = edges.into_vec();
        for edge in &mut edge_list {
            edge.edge_signature = self.signer.sign_edge(edge);
        }

        // 9. Write edges back to the relation store, best-effort.
        for edge in &edge_list {
            let relation = LineageRelation {
                source_id: edge.source.clone(),
                target_id: edge.target.clone(),
                relation_type: edge.relationship.clone(),
                column_lineage: Vec::new(),
                notes: None,
                edge: Some(edge.clone()),
                updated_at: now,
            };
            if let Err(e) = self.relations.upsert_relation(relation).await {
                warn!(
                    source = %edge.source,
                    target = %edge.target,
                    error = %e,
                    "Failed to persist lineage relation"
                );
            }
        }

        // 10. Aggregates over the full graph.
        let mut graph = LineageGraph {
            nodes,
            edges: edge_list,
            ..Default::default()
        };
        graph.refresh_summary(asset_map.len());

        // 12. Snapshot covers the full, unpaginated response.
        if opts.snapshot {
            self.persist_snapshot(&graph, now).await;
        }

        // 11. Pagination restricts edges to the page's node set.
        Ok(graph.page(opts.page, opts.page_size))
    }

    fn build_view_edges(
        &self,
        active: &[Asset],
        asset_map: &HashMap<String, Asset>,
        logs: &[QueryLogEntry],
        now: DateTime<Utc>,
        edges: &mut EdgeSet,
    ) {
        for asset in active.iter().filter(|a| a.asset_type == AssetType::View) {
            let Some(ref sql) = asset.sql else { continue };
            let qualifier = (!asset.catalog.is_empty()).then_some(asset.catalog.as_str());
            let analysis = self.analyzer.analyze(sql, qualifier);

            for upstream_id in &analysis.tables {
                let Some(source_asset) = asset_map.get(upstream_id) else {
                    continue;
                };
                if source_asset.id == asset.id {
                    continue;
                }
                let column_lineage = columns::build_column_lineage(source_asset, asset);

                let mut transformations = analysis.transformations.clone();
                if logs_imply_relationship(upstream_id, &asset.id, logs) {
                    transformations
                        .push(Transformation::new("QUERY_LOG", TransformCategory::Corroboration));
                }
                let (confidence, evidence) =
                    score_edge(&EdgeKind::FeedsInto, &column_lineage, &transformations);

                let mut edge = LineageEdge::new(upstream_id, &asset.id, EdgeKind::FeedsInto, now);
                edge.column_lineage = column_lineage;
                edge.refresh_column_stats();
                edge.validation_status = ValidationStatus::Valid;
                edge.confidence_score = confidence;
                edge.evidence = evidence;
                edge.sources = vec![ProvenanceTag::ViewSql];
                edges.insert(edge);
            }
        }
    }

    fn build_structural_edges(
        &self,
        active: &[Asset],
        asset_map: &HashMap<String, Asset>,
        connector_map: &HashMap<String, Connector>,
        logs: &[QueryLogEntry],
        now: DateTime<Utc>,
        edges: &mut EdgeSet,
    ) {
        let mut grouped: BTreeMap<(String, String), Vec<StructuralLink>> = BTreeMap::new();
        for asset in active.iter().filter(|a| {
            a.asset_type == AssetType::Table
                && connector_map
                    .get(&a.connector_id)
                    .is_some_and(|c| c.engine == Engine::Warehouse)
        }) {
            for link in structural_links(asset, active) {
                grouped
                    .entry((link.source.clone(), link.target.clone()))
                    .or_default()
                    .push(link);
            }
        }

        for ((source_id, target_id), mut links) in grouped {
            let (Some(source_asset), Some(target_asset)) =
                (asset_map.get(&source_id), asset_map.get(&target_id))
            else {
                continue;
            };

            links.sort_by_key(|l| std::cmp::Reverse(l.priority()));
            let kind = links[0].kind.clone();

            let mut column_lineage = Vec::new();
            for link in &links {
                if let Some((ref source_col, ref target_col)) = link.columns {
                    let relationship = match link.kind {
                        EdgeKind::IdRelationship => ColumnRelationship::IdRelationship,
                        _ => ColumnRelationship::ForeignKey,
                    };
                    column_lineage.push(constraint_mapping(
                        source_asset,
                        target_asset,
                        source_col,
                        target_col,
                        relationship,
                        10,
                    ));
                }
            }
            if column_lineage.is_empty() {
                column_lineage = id_inference_mappings(source_asset, target_asset);
            }
            if column_lineage.is_empty() {
                continue;
            }

            let mut transformations: Vec<Transformation> =
                links.iter().map(|l| l.transformation()).collect();
            if logs_imply_relationship(&source_id, &target_id, logs) {
                transformations
                    .push(Transformation::new("QUERY_LOG", TransformCategory::Corroboration));
            }
            let (confidence, evidence) = score_edge(&kind, &column_lineage, &transformations);

            let mut edge = LineageEdge::new(&source_id, &target_id, kind, now);
            edge.column_lineage = column_lineage;
            edge.refresh_column_stats();
            edge.validation_status = ValidationStatus::Valid;
            edge.confidence_score = confidence;
            edge.evidence = evidence;
            edge.sources = vec![ProvenanceTag::StarburstMetadata];
            edges.insert(edge);
        }
    }

    fn build_pairwise_edges(
        &self,
        active: &[Asset],
        logs: &[QueryLogEntry],
        now: DateTime<Utc>,
        edges: &mut EdgeSet,
    ) {
        let mut by_catalog: BTreeMap<&str, Vec<&Asset>> = BTreeMap::new();
        for asset in active.iter().filter(|a| {
            matches!(a.asset_type, AssetType::Table | AssetType::View)
        }) {
            let bucket = if asset.catalog.is_empty() {
                asset.connector_id.as_str()
            } else {
                asset.catalog.as_str()
            };
            by_catalog.entry(bucket).or_default().push(asset);
        }

        for bucket in by_catalog.values() {
            for (i, first) in bucket.iter().enumerate() {
                for second in bucket.iter().skip(i + 1) {
                    let column_lineage = columns::build_from_sql_evidence(first, second);
                    if column_lineage.len() < self.config.pairwise_min_column_matches {
                        continue;
                    }

                    let (source, target, kind) = infer_direction(first, second);
                    if edges.contains(&source.id, &target.id) {
                        continue;
                    }

                    let column_lineage = if source.id == first.id {
                        column_lineage
                    } else {
                        column_lineage.into_iter().map(flip_mapping).collect()
                    };

                    let mut transformations = Vec::new();
                    if logs_imply_relationship(&source.id, &target.id, logs) {
                        transformations.push(Transformation::new(
                            "QUERY_LOG",
                            TransformCategory::Corroboration,
                        ));
                    }
                    let (confidence, evidence) =
                        score_edge(&kind, &column_lineage, &transformations);

                    let mut edge = LineageEdge::new(&source.id, &target.id, kind, now);
                    edge.column_lineage = column_lineage;
                    edge.refresh_column_stats();
                    edge.validation_status = ValidationStatus::Inferred;
                    edge.confidence_score = confidence;
                    edge.evidence = evidence;
                    edge.sources = vec![ProvenanceTag::MetadataInference];
                    edges.insert(edge);
                }
            }
        }
    }

    async fn merge_saved_relations(
        &self,
        nodes: &mut Vec<LineageNode>,
        asset_map: &mut HashMap<String, Asset>,
        as_of: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        edges: &mut EdgeSet,
    ) {
        let saved = match self.relations.load_relations().await {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "Failed to load saved lineage relations");
                return;
            }
        };
        debug!(count = saved.len(), "Merging saved lineage relations");

        for relation in saved {
            if edges.contains(&relation.source_id, &relation.target_id) {
                continue;
            }
            // Persisted edges carry their true creation time; honor the
            // temporal filter for them as well.
            let created_at = relation.edge.as_ref().map(|e| e.created_at).unwrap_or(now);
            if as_of.is_some_and(|cutoff| created_at > cutoff) {
                continue;
            }

            let source_asset = self
                .resolve_relation_asset(&relation.source_id, nodes, asset_map)
                .await;
            let target_asset = self
                .resolve_relation_asset(&relation.target_id, nodes, asset_map)
                .await;
            let (Some(source_asset), Some(target_asset)) = (source_asset, target_asset) else {
                warn!(
                    source = %relation.source_id,
                    target = %relation.target_id,
                    "Skipping saved relation with unknown asset"
                );
                continue;
            };

            let mut column_lineage = relation.column_lineage.clone();
            if column_lineage.is_empty() {
                if let Some(ref persisted) = relation.edge {
                    column_lineage = persisted.column_lineage.clone();
                }
            }
            if column_lineage.is_empty() {
                column_lineage = columns::build_column_lineage(&source_asset, &target_asset);
            }
            if column_lineage.is_empty() {
                column_lineage = common_column_mappings(&source_asset, &target_asset);
            }

            let (confidence, mut evidence) =
                score_edge(&relation.relation_type, &column_lineage, &[]);
            evidence.push("saved_relation".to_string());

            let mut edge = LineageEdge::new(
                &relation.source_id,
                &relation.target_id,
                relation.relation_type.clone(),
                now,
            );
            edge.created_at = created_at;
            edge.column_lineage = column_lineage;
            edge.refresh_column_stats();
            edge.validation_status = ValidationStatus::Valid;
            edge.confidence_score = confidence;
            edge.evidence = evidence;
            edge.sources = vec![ProvenanceTag::Database];
            edges.insert(edge);
        }
    }

    /// Find an asset referenced by a saved relation, loading it from the
    /// asset store and adding a synthetic node when it is not already in
    /// memory.
    async fn resolve_relation_asset(
        &self,
        asset_id: &str,
        nodes: &mut Vec<LineageNode>,
        asset_map: &mut HashMap<String, Asset>,
    ) -> Option<Asset> {
        if let Some(asset) = asset_map.get(asset_id) {
            return Some(asset.clone());
        }
        match self.assets.get_asset(asset_id).await {
            Ok(Some(asset)) => {
                if !nodes.iter().any(|n| n.id == asset_id) {
                    nodes.push(LineageNode::from_asset(&asset));
                }
                asset_map.insert(asset_id.to_string(), asset.clone());
                Some(asset)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "Failed to load relation asset");
                None
            }
        }
    }

    async fn persist_snapshot(&self, graph: &LineageGraph, now: DateTime<Utc>) {
        let body = match serde_json::to_value(graph) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize snapshot body");
                return;
            }
        };
        let signature = self.signer.sign_value(&body);
        let signature_alg = signature.as_ref().map(|_| SIGNATURE_ALG.to_string());
        let snapshot = Snapshot {
            body,
            signature,
            signature_alg,
            created_at: now,
        };
        if let Err(e) = self.snapshots.append_snapshot(snapshot).await {
            warn!(error = %e, "Failed to persist lineage snapshot");
        }
    }
}

const RAW_STAGE: &[&str] = &["raw", "landing", "source"];
const PROCESSED_STAGE: &[&str] = &["processed", "stage", "staged"];
const STAGING_STAGE: &[&str] = &["stage", "staging"];
const ANALYTICS_STAGE: &[&str] = &["analytics", "report", "summary", "final", "prod"];

fn name_has(name: &str, stems: &[&str]) -> bool {
    stems.iter().any(|s| name.contains(s))
}

/// Structural relationships for one warehouse table: declared foreign keys,
/// id-pattern column matches, and pipeline naming stages.
fn structural_links(asset: &Asset, all: &[Asset]) -> Vec<StructuralLink> {
    let mut links = Vec::new();
    let name_lower = asset.name.to_lowercase();

    // Declared foreign keys point at upstream tables in the same schema.
    for fk in &asset.foreign_keys {
        let referenced = all.iter().find(|other| {
            other.catalog == asset.catalog
                && other.schema == asset.schema
                && other.name == fk.referenced_table
        });
        if let Some(referenced) = referenced {
            let columns = match fk.columns.len() {
                0 | 1 => None,
                _ => Some((fk.columns[0].clone(), fk.columns[1].clone())),
            };
            links.push(StructuralLink {
                source: referenced.id.clone(),
                target: asset.id.clone(),
                kind: EdgeKind::ForeignKey,
                columns,
            });
        }
    }

    // Id-pattern matches: same-typed id-like columns across same-catalog
    // tables suggest a relationship even without a declared constraint.
    for col in &asset.columns {
        let col_name = col.name.to_lowercase();
        if !is_id_like(&col_name) {
            continue;
        }
        for other in all.iter().filter(|o| {
            o.id != asset.id && o.asset_type == AssetType::Table && o.catalog == asset.catalog
        }) {
            for other_col in &other.columns {
                let other_name = other_col.name.to_lowercase();
                if other_col.data_type == col.data_type
                    && is_id_like(&other_name)
                    && other_name != col_name
                {
                    links.push(StructuralLink {
                        source: other.id.clone(),
                        target: asset.id.clone(),
                        kind: EdgeKind::IdRelationship,
                        columns: Some((other_col.name.clone(), col.name.clone())),
                    });
                }
            }
        }
    }

    // Pipeline naming stages: raw/landing/source feeds processed/staged,
    // staged feeds analytics.
    for other in all.iter().filter(|o| {
        o.id != asset.id && o.asset_type == AssetType::Table && o.catalog == asset.catalog
    }) {
        let other_lower = other.name.to_lowercase();
        if name_has(&name_lower, RAW_STAGE) && name_has(&other_lower, PROCESSED_STAGE) {
            links.push(StructuralLink {
                source: asset.id.clone(),
                target: other.id.clone(),
                kind: EdgeKind::EtlPipeline,
                columns: None,
            });
        } else if name_has(&name_lower, STAGING_STAGE) && name_has(&other_lower, ANALYTICS_STAGE) {
            links.push(StructuralLink {
                source: asset.id.clone(),
                target: other.id.clone(),
                kind: EdgeKind::EltPipeline,
                columns: None,
            });
        }
    }

    links
}

fn is_id_like(name: &str) -> bool {
    name.contains("_id") || name.contains("_key") || name.contains("id_") || name.contains("key_")
}

fn constraint_mapping(
    source: &Asset,
    target: &Asset,
    source_col: &str,
    target_col: &str,
    relationship: ColumnRelationship,
    impact: i64,
) -> ColumnLineage {
    let description = source
        .columns
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(source_col))
        .map(|c| c.description.clone())
        .unwrap_or_default();
    let (contains_pii, _) = detect_pii_in_column(source_col, &description);
    ColumnLineage {
        source_table: source.id.clone(),
        source_column: source_col.to_string(),
        target_table: target.id.clone(),
        target_column: target_col.to_string(),
        relationship_type: relationship,
        contains_pii,
        data_quality_score: 95,
        impact_score: impact,
    }
}

/// Shared id-like columns between two tables, capped at three, used when a
/// structural link carries no explicit column pair.
fn id_inference_mappings(source: &Asset, target: &Asset) -> Vec<ColumnLineage> {
    let target_names: HashSet<String> =
        target.columns.iter().map(|c| c.name.to_lowercase()).collect();
    source
        .columns
        .iter()
        .filter(|c| {
            let name = c.name.to_lowercase();
            (name == "id" || name.ends_with("_id") || name.contains("id_"))
                && target_names.contains(&name)
        })
        .take(3)
        .map(|col| {
            let (contains_pii, _) = detect_pii_in_column(&col.name, &col.description);
            ColumnLineage {
                source_table: source.id.clone(),
                source_column: col.name.clone(),
                target_table: target.id.clone(),
                target_column: col.name.clone(),
                relationship_type: ColumnRelationship::IdInference,
                contains_pii,
                data_quality_score: columns::column_quality_score(col),
                impact_score: 4,
            }
        })
        .collect()
}

/// Same-named columns between two assets, the last-resort mapping for saved
/// relations with no other evidence.
fn common_column_mappings(source: &Asset, target: &Asset) -> Vec<ColumnLineage> {
    let target_cols: HashMap<String, &super::model::AssetColumn> = target
        .columns
        .iter()
        .map(|c| (c.name.to_lowercase(), c))
        .collect();
    source
        .columns
        .iter()
        .filter_map(|source_col| {
            let target_col = target_cols.get(&source_col.name.to_lowercase())?;
            let (contains_pii, _) =
                detect_pii_in_column(&source_col.name, &source_col.description);
            Some(ColumnLineage {
                source_table: source.id.clone(),
                source_column: source_col.name.clone(),
                target_table: target.id.clone(),
                target_column: target_col.name.clone(),
                relationship_type: ColumnRelationship::DirectMapping,
                contains_pii,
                data_quality_score: 95,
                impact_score: 7,
            })
        })
        .collect()
}

/// Infer edge direction for a pairwise-matched asset pair from naming
/// conventions and asset types.
fn infer_direction<'a>(first: &'a Asset, second: &'a Asset) -> (&'a Asset, &'a Asset, EdgeKind) {
    let first_name = first.name.to_lowercase();
    let second_name = second.name.to_lowercase();

    if name_has(&first_name, RAW_STAGE) && name_has(&second_name, PROCESSED_STAGE) {
        return (first, second, EdgeKind::EtlPipeline);
    }
    if name_has(&first_name, RAW_STAGE) && name_has(&second_name, ANALYTICS_STAGE) {
        return (first, second, EdgeKind::EltPipeline);
    }
    if name_has(&first_name, STAGING_STAGE) && name_has(&second_name, ANALYTICS_STAGE) {
        return (first, second, EdgeKind::EltPipeline);
    }
    // Reversed naming order: analytics-named first asset is downstream.
    if name_has(&second_name, RAW_STAGE) && name_has(&first_name, ANALYTICS_STAGE) {
        return (second, first, EdgeKind::EtlPipeline);
    }
    // A view's source table precedes the view.
    if first.asset_type == AssetType::View && second.asset_type == AssetType::Table {
        return (second, first, EdgeKind::InferredFromMetadata);
    }
    (first, second, EdgeKind::InferredFromMetadata)
}

fn flip_mapping(mapping: ColumnLineage) -> ColumnLineage {
    ColumnLineage {
        source_table: mapping.target_table,
        source_column: mapping.target_column,
        target_table: mapping.source_table,
        target_column: mapping.source_column,
        ..mapping
    }
}
