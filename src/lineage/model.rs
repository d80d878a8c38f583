// Data model for the lineage graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A column of a cataloged asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetColumn {
    /// Column name
    pub name: String,
    /// Declared type
    #[serde(default)]
    pub data_type: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Governance tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AssetColumn {
    /// Creates a new column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: String::new(),
            tags: Vec::new(),
        }
    }

    /// Adds a description
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Adds a tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }
}

/// A foreign-key constraint captured from engine metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table name (unqualified)
    pub referenced_table: String,
    /// Constraint columns: referenced column first, local column second
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Asset type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetType {
    Table,
    View,
    Other(String),
}

impl AssetType {
    pub fn as_str(&self) -> &str {
        match self {
            AssetType::Table => "Table",
            AssetType::View => "View",
            AssetType::Other(s) => s,
        }
    }
}

impl From<String> for AssetType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Table" | "table" | "TABLE" => AssetType::Table,
            "View" | "view" | "VIEW" => AssetType::View,
            _ => AssetType::Other(s),
        }
    }
}

impl From<AssetType> for String {
    fn from(t: AssetType) -> String {
        t.as_str().to_string()
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered data asset, read-only to the lineage core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Unique asset ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Asset type
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    /// Catalog (or project) the asset lives in
    #[serde(default)]
    pub catalog: String,
    /// Schema (or dataset)
    #[serde(default)]
    pub schema: Option<String>,
    /// Connector that discovered the asset
    #[serde(default)]
    pub connector_id: String,
    /// Columns
    #[serde(default)]
    pub columns: Vec<AssetColumn>,
    /// Raw SQL definition, for views and derived tables
    #[serde(default)]
    pub sql: Option<String>,
    /// Foreign-key constraints from engine metadata
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyRef>,
    /// Source system label, when the connector reported one
    #[serde(default)]
    pub source_system: Option<String>,
    /// Dataset, for BigQuery-style assets
    #[serde(default)]
    pub dataset: Option<String>,
    /// Project, for BigQuery-style assets
    #[serde(default)]
    pub project_id: Option<String>,
    /// Account domain, for Starburst-style assets
    #[serde(default)]
    pub account_domain: Option<String>,
}

impl Asset {
    /// Creates a new asset
    pub fn new(id: impl Into<String>, asset_type: AssetType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            asset_type,
            catalog: String::new(),
            schema: None,
            connector_id: String::new(),
            columns: Vec::new(),
            sql: None,
            foreign_keys: Vec::new(),
            source_system: None,
            dataset: None,
            project_id: None,
            account_domain: None,
        }
    }

    /// Sets the catalog
    pub fn with_catalog(mut self, catalog: &str) -> Self {
        self.catalog = catalog.to_string();
        self
    }

    /// Sets the schema
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    /// Sets the connector
    pub fn with_connector(mut self, connector_id: &str) -> Self {
        self.connector_id = connector_id.to_string();
        self
    }

    /// Adds a column
    pub fn with_column(mut self, column: AssetColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the SQL definition
    pub fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Some(sql.to_string());
        self
    }

    /// Adds a foreign key
    pub fn with_foreign_key(mut self, fk: ForeignKeyRef) -> Self {
        self.foreign_keys.push(fk);
        self
    }
}

/// Query engine family behind a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Warehouse-style engine exposing structural metadata (constraints,
    /// foreign keys) usable for table lineage.
    Warehouse,
    /// Object-store or lake connector
    Lake,
    /// Anything else
    Other,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::Other
    }
}

/// A configured connector, read-only to the lineage core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    /// Connector ID
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Whether the connector is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Engine family
    #[serde(default)]
    pub engine: Engine,
}

impl Connector {
    /// Creates an enabled connector
    pub fn enabled(id: impl Into<String>, engine: Engine) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            engine,
        }
    }
}

/// Source system label for a connector id, used when the asset itself does
/// not carry one.
pub fn source_system_label(connector_id: &str) -> &'static str {
    if connector_id.starts_with("bq_") {
        "BigQuery"
    } else if connector_id.starts_with("starburst_") {
        "Starburst Galaxy"
    } else if connector_id.starts_with("s3_") {
        "Amazon S3"
    } else if connector_id.is_empty() || connector_id == "manual" {
        "Manual"
    } else {
        "Unknown"
    }
}

/// Column-to-column relationship type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnRelationship {
    DirectMapping,
    InferredMapping,
    SqlReference,
    SqlDerived,
    SqlTransformation,
    Aggregation,
    StringTransform,
    DateTransform,
    CrossTableSql,
    IdRelationship,
    IdInference,
    ForeignKey,
    Other(String),
}

impl ColumnRelationship {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnRelationship::DirectMapping => "direct_mapping",
            ColumnRelationship::InferredMapping => "inferred_mapping",
            ColumnRelationship::SqlReference => "sql_reference",
            ColumnRelationship::SqlDerived => "sql_derived",
            ColumnRelationship::SqlTransformation => "sql_transformation",
            ColumnRelationship::Aggregation => "aggregation",
            ColumnRelationship::StringTransform => "string_transform",
            ColumnRelationship::DateTransform => "date_transform",
            ColumnRelationship::CrossTableSql => "cross_table_sql",
            ColumnRelationship::IdRelationship => "id_relationship",
            ColumnRelationship::IdInference => "id_inference",
            ColumnRelationship::ForeignKey => "foreign_key",
            ColumnRelationship::Other(s) => s,
        }
    }
}

impl From<String> for ColumnRelationship {
    fn from(s: String) -> Self {
        match s.as_str() {
            "direct_mapping" => ColumnRelationship::DirectMapping,
            "inferred_mapping" => ColumnRelationship::InferredMapping,
            "sql_reference" => ColumnRelationship::SqlReference,
            "sql_derived" => ColumnRelationship::SqlDerived,
            "sql_transformation" => ColumnRelationship::SqlTransformation,
            "aggregation" => ColumnRelationship::Aggregation,
            "string_transform" => ColumnRelationship::StringTransform,
            "date_transform" => ColumnRelationship::DateTransform,
            "cross_table_sql" => ColumnRelationship::CrossTableSql,
            "id_relationship" => ColumnRelationship::IdRelationship,
            "id_inference" => ColumnRelationship::IdInference,
            "foreign_key" => ColumnRelationship::ForeignKey,
            _ => ColumnRelationship::Other(s),
        }
    }
}

impl From<ColumnRelationship> for String {
    fn from(r: ColumnRelationship) -> String {
        r.as_str().to_string()
    }
}

impl fmt::Display for ColumnRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship type of a lineage edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    FeedsInto,
    ForeignKey,
    EtlPipeline,
    EltPipeline,
    IdRelationship,
    InferredFromMetadata,
    DerivesFrom,
    Manual,
    OpenLineageJob,
    DbtDependency,
    AirflowUpstream,
    Other(String),
}

impl EdgeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::FeedsInto => "feeds_into",
            EdgeKind::ForeignKey => "foreign_key",
            EdgeKind::EtlPipeline => "etl_pipeline",
            EdgeKind::EltPipeline => "elt_pipeline",
            EdgeKind::IdRelationship => "id_relationship",
            EdgeKind::InferredFromMetadata => "inferred_from_metadata",
            EdgeKind::DerivesFrom => "derives_from",
            EdgeKind::Manual => "manual",
            EdgeKind::OpenLineageJob => "openlineage_job",
            EdgeKind::DbtDependency => "dbt_dependency",
            EdgeKind::AirflowUpstream => "airflow_upstream",
            EdgeKind::Other(s) => s,
        }
    }

    /// Structural relationship types start from a higher confidence base.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EdgeKind::ForeignKey
                | EdgeKind::EtlPipeline
                | EdgeKind::EltPipeline
                | EdgeKind::IdRelationship
        )
    }
}

impl From<String> for EdgeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "feeds_into" => EdgeKind::FeedsInto,
            "foreign_key" => EdgeKind::ForeignKey,
            "etl_pipeline" => EdgeKind::EtlPipeline,
            "elt_pipeline" => EdgeKind::EltPipeline,
            "id_relationship" => EdgeKind::IdRelationship,
            "inferred_from_metadata" => EdgeKind::InferredFromMetadata,
            "derives_from" => EdgeKind::DerivesFrom,
            "manual" => EdgeKind::Manual,
            "openlineage_job" => EdgeKind::OpenLineageJob,
            "dbt_dependency" => EdgeKind::DbtDependency,
            "airflow_upstream" => EdgeKind::AirflowUpstream,
            _ => EdgeKind::Other(s),
        }
    }
}

impl From<EdgeKind> for String {
    fn from(k: EdgeKind) -> String {
        k.as_str().to_string()
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag recording which evidence path produced an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceTag {
    ViewSql,
    StarburstMetadata,
    MetadataInference,
    Database,
    OpenLineage,
    Dbt,
    Airflow,
    Metadata,
    User,
}

/// Validation status of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Inferred,
    Unknown,
}

impl ValidationStatus {
    fn rank(self) -> u8 {
        match self {
            ValidationStatus::Valid => 2,
            ValidationStatus::Inferred => 1,
            ValidationStatus::Unknown => 0,
        }
    }
}

/// PII sensitivity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PiiSensitivity {
    High,
    Medium,
    Low,
    None,
}

/// A column-to-column lineage mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnLineage {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub relationship_type: ColumnRelationship,
    /// Source column matched a PII pattern
    #[serde(default)]
    pub contains_pii: bool,
    /// Data quality score, 0-100
    #[serde(default = "default_quality")]
    pub data_quality_score: i64,
    /// Evidence strength, higher is stronger
    #[serde(default = "default_impact")]
    pub impact_score: i64,
}

fn default_quality() -> i64 {
    95
}

fn default_impact() -> i64 {
    1
}

/// A node in the lineage graph: an asset projected for the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: AssetType,
    pub catalog: String,
    pub connector_id: String,
    pub source_system: String,
    pub columns: Vec<AssetColumn>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub account_domain: Option<String>,
}

impl LineageNode {
    /// Projects an asset into a graph node.
    pub fn from_asset(asset: &Asset) -> Self {
        let source_system = asset
            .source_system
            .clone()
            .unwrap_or_else(|| source_system_label(&asset.connector_id).to_string());
        Self {
            id: asset.id.clone(),
            name: asset.name.clone(),
            node_type: asset.asset_type.clone(),
            catalog: asset.catalog.clone(),
            connector_id: if asset.connector_id.is_empty() {
                "manual".to_string()
            } else {
                asset.connector_id.clone()
            },
            source_system,
            columns: asset.columns.clone(),
            dataset: asset.dataset.clone(),
            project_id: asset.project_id.clone(),
            schema: asset.schema.clone(),
            account_domain: asset.account_domain.clone(),
        }
    }
}

/// A directed, confidence-scored lineage edge between two assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEdge {
    pub source: String,
    pub target: String,
    pub relationship: EdgeKind,
    #[serde(default)]
    pub column_lineage: Vec<ColumnLineage>,
    #[serde(default)]
    pub total_pii_columns: usize,
    pub avg_data_quality: f64,
    pub last_validated: DateTime<Utc>,
    pub validation_status: ValidationStatus,
    pub confidence_score: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub sources: Vec<ProvenanceTag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub edge_signature: Option<String>,
}

impl LineageEdge {
    /// Creates an edge with default scores.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: EdgeKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship,
            column_lineage: Vec::new(),
            total_pii_columns: 0,
            avg_data_quality: 95.0,
            last_validated: now,
            validation_status: ValidationStatus::Unknown,
            confidence_score: 0.0,
            evidence: Vec::new(),
            sources: Vec::new(),
            created_at: now,
            updated_at: now,
            edge_signature: None,
        }
    }

    /// Key used for assembly-time deduplication.
    pub fn key(&self) -> (String, String) {
        (self.source.clone(), self.target.clone())
    }

    /// Recompute PII count and average quality from column lineage.
    pub fn refresh_column_stats(&mut self) {
        self.total_pii_columns = self.column_lineage.iter().filter(|c| c.contains_pii).count();
        if !self.column_lineage.is_empty() {
            let total: i64 = self.column_lineage.iter().map(|c| c.data_quality_score).sum();
            let avg = total as f64 / self.column_lineage.len() as f64;
            self.avg_data_quality = (avg * 100.0).round() / 100.0;
        }
    }

    /// Merge another evidence path for the same (source, target) pair into
    /// this edge: union provenance and evidence, append unseen column pairs,
    /// keep the strongest confidence and validation status.
    pub fn merge_from(&mut self, other: LineageEdge) {
        let seen: HashSet<(String, String)> = self
            .column_lineage
            .iter()
            .map(|c| (c.source_column.to_lowercase(), c.target_column.to_lowercase()))
            .collect();
        for cl in other.column_lineage {
            let key = (cl.source_column.to_lowercase(), cl.target_column.to_lowercase());
            if !seen.contains(&key) {
                self.column_lineage.push(cl);
            }
        }
        for tag in other.sources {
            if !self.sources.contains(&tag) {
                self.sources.push(tag);
            }
        }
        for ev in other.evidence {
            if !self.evidence.contains(&ev) {
                self.evidence.push(ev);
            }
        }
        if other.confidence_score > self.confidence_score {
            self.confidence_score = other.confidence_score;
        }
        if other.validation_status.rank() > self.validation_status.rank() {
            self.validation_status = other.validation_status;
        }
        if other.created_at < self.created_at {
            self.created_at = other.created_at;
        }
        if other.updated_at > self.updated_at {
            self.updated_at = other.updated_at;
        }
        self.refresh_column_stats();
        // The merged content differs from what either signature covered.
        self.edge_signature = None;
    }
}

/// The assembled lineage graph returned by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageGraph {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
    /// Total column-level mappings across edges
    pub column_relationships: usize,
    pub total_pii_columns: usize,
    pub avg_data_quality: f64,
    /// Share of cataloged assets represented in the graph, 0-100
    pub lineage_completeness: f64,
    pub avg_confidence: f64,
}

impl LineageGraph {
    /// Recompute the aggregate block from nodes/edges. `total_assets` is the
    /// number of distinct assets known at assembly time.
    pub fn refresh_summary(&mut self, total_assets: usize) {
        self.column_relationships = self.edges.iter().map(|e| e.column_lineage.len()).sum();
        self.total_pii_columns = self.edges.iter().map(|e| e.total_pii_columns).sum();
        self.avg_data_quality = if self.edges.is_empty() {
            0.0
        } else {
            let total: f64 = self.edges.iter().map(|e| e.avg_data_quality).sum();
            round2(total / self.edges.len() as f64)
        };
        self.lineage_completeness = if total_assets == 0 {
            0.0
        } else {
            round2(self.nodes.len() as f64 / total_assets as f64 * 100.0)
        };
        self.avg_confidence = if self.edges.is_empty() {
            0.0
        } else {
            let total: f64 = self.edges.iter().map(|e| e.confidence_score).sum();
            round3(total / self.edges.len() as f64)
        };
    }

    /// Subgraph limited to an asset and its direct neighbors.
    pub fn asset_subgraph(&self, asset_id: &str) -> LineageGraph {
        let mut related: HashSet<&str> = HashSet::new();
        related.insert(asset_id);
        for edge in &self.edges {
            if edge.target == asset_id {
                related.insert(&edge.source);
            }
            if edge.source == asset_id {
                related.insert(&edge.target);
            }
        }

        let nodes: Vec<LineageNode> = self
            .nodes
            .iter()
            .filter(|n| related.contains(n.id.as_str()))
            .cloned()
            .collect();
        let edges: Vec<LineageEdge> = self
            .edges
            .iter()
            .filter(|e| related.contains(e.source.as_str()) && related.contains(e.target.as_str()))
            .cloned()
            .collect();

        let mut graph = LineageGraph {
            nodes,
            edges,
            ..Default::default()
        };
        graph.column_relationships =
            graph.edges.iter().map(|e| e.column_lineage.len()).sum();
        graph.total_pii_columns = graph.edges.iter().map(|e| e.total_pii_columns).sum();
        graph.avg_data_quality = if graph.edges.is_empty() {
            0.0
        } else {
            let total: f64 = graph.edges.iter().map(|e| e.avg_data_quality).sum();
            round2(total / graph.edges.len() as f64)
        };
        graph.lineage_completeness = if graph.nodes.is_empty() { 0.0 } else { 100.0 };
        graph.avg_confidence = if graph.edges.is_empty() {
            0.0
        } else {
            let total: f64 = graph.edges.iter().map(|e| e.confidence_score).sum();
            round3(total / graph.edges.len() as f64)
        };
        graph
    }

    /// Restrict to a page of nodes; edges keep only the page's node set.
    /// Aggregates other than `avg_confidence` keep their full-graph values.
    pub fn page(&self, page: usize, page_size: usize) -> LineageGraph {
        if page_size == 0 || page_size >= self.nodes.len() {
            return self.clone();
        }
        let start = page * page_size;
        let nodes: Vec<LineageNode> =
            self.nodes.iter().skip(start).take(page_size).cloned().collect();
        let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges: Vec<LineageEdge> = self
            .edges
            .iter()
            .filter(|e| node_ids.contains(e.source.as_str()) && node_ids.contains(e.target.as_str()))
            .cloned()
            .collect();
        let avg_confidence = if edges.is_empty() {
            0.0
        } else {
            let total: f64 = edges.iter().map(|e| e.confidence_score).sum();
            round3(total / edges.len() as f64)
        };
        LineageGraph {
            nodes,
            edges,
            avg_confidence,
            ..self.clone()
        }
    }

    /// CSV export: one row per column mapping, or a dash-filled row for an
    /// edge without column detail.
    pub fn to_csv(&self) -> String {
        let mut lines =
            vec!["Source Table,Source Column,Target Table,Target Column,Relationship Type"
                .to_string()];
        for edge in &self.edges {
            let source_name = self
                .nodes
                .iter()
                .find(|n| n.id == edge.source)
                .map(|n| n.name.as_str())
                .unwrap_or(edge.source.as_str());
            let target_name = self
                .nodes
                .iter()
                .find(|n| n.id == edge.target)
                .map(|n| n.name.as_str())
                .unwrap_or(edge.target.as_str());
            if edge.column_lineage.is_empty() {
                lines.push(format!(
                    "{},-,{},-,{}",
                    source_name, target_name, edge.relationship
                ));
            } else {
                for cl in &edge.column_lineage {
                    lines.push(format!(
                        "{},{},{},{},{}",
                        source_name,
                        cl.source_column,
                        target_name,
                        cl.target_column,
                        cl.relationship_type
                    ));
                }
            }
        }
        lines.join("\n")
    }

    /// Search over nodes and edges.
    pub fn search(&self, query: &str, kind: SearchKind, cap: usize) -> SearchResults {
        let query_lower = query.to_lowercase();
        let mut matching_nodes: Vec<&LineageNode> = Vec::new();

        for node in &self.nodes {
            let table_hit = matches!(kind, SearchKind::All | SearchKind::Table)
                && (node.name.to_lowercase().contains(&query_lower)
                    || node.id.to_lowercase().contains(&query_lower));
            let column_hit = matches!(kind, SearchKind::All | SearchKind::Column)
                && node
                    .columns
                    .iter()
                    .any(|c| c.name.to_lowercase().contains(&query_lower));
            if table_hit || column_hit {
                matching_nodes.push(node);
            }
        }

        let matching_ids: HashSet<&str> = matching_nodes.iter().map(|n| n.id.as_str()).collect();
        let mut matching_edges: Vec<&LineageEdge> = Vec::new();
        for edge in &self.edges {
            let touches_node = matching_ids.contains(edge.source.as_str())
                || matching_ids.contains(edge.target.as_str());
            let column_match = edge.column_lineage.iter().any(|cl| {
                cl.source_column.to_lowercase().contains(&query_lower)
                    || cl.target_column.to_lowercase().contains(&query_lower)
            });
            if touches_node || column_match {
                matching_edges.push(edge);
            }
        }

        SearchResults {
            query: query.to_string(),
            node_count: matching_nodes.len(),
            edge_count: matching_edges.len(),
            matching_nodes: matching_nodes.into_iter().take(cap).cloned().collect(),
            matching_edges: matching_edges.into_iter().take(cap).cloned().collect(),
        }
    }
}

/// What a lineage search should match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    All,
    Table,
    Column,
}

impl std::str::FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(SearchKind::All),
            "table" => Ok(SearchKind::Table),
            "column" => Ok(SearchKind::Column),
            other => Err(format!("unknown search_type: {}", other)),
        }
    }
}

/// Search results, capped for the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub matching_nodes: Vec<LineageNode>,
    pub matching_edges: Vec<LineageEdge>,
}

/// Proposal lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Proposed,
    Approved,
    Rejected,
}

impl std::str::FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(ProposalStatus::Proposed),
            "approved" => Ok(ProposalStatus::Approved),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(format!("unknown proposal status: {}", other)),
        }
    }
}

/// A manually supplied candidate lineage edge awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationProposal {
    pub id: uuid::Uuid,
    pub source: String,
    pub target: String,
    pub relationship: EdgeKind,
    #[serde(default)]
    pub column_lineage: Vec<ColumnLineage>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: ProposalStatus,
    pub proposed_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Kind of an ingested third-party artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    OpenLineage,
    Dbt,
    Airflow,
    Metadata,
    LineageArtifact,
    QueryLog,
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "openlineage" => Ok(ArtifactKind::OpenLineage),
            "dbt" => Ok(ArtifactKind::Dbt),
            "airflow" => Ok(ArtifactKind::Airflow),
            "metadata" => Ok(ArtifactKind::Metadata),
            "lineage_artifact" => Ok(ArtifactKind::LineageArtifact),
            "querylog" | "query_log" => Ok(ArtifactKind::QueryLog),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// An opaque ingested payload, never mutated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationArtifact {
    pub kind: ArtifactKind,
    pub data: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

/// A persisted relation: the storage form of an edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageRelation {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: EdgeKind,
    /// Curated column attachments, when supplied manually
    #[serde(default)]
    pub column_lineage: Vec<ColumnLineage>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Full edge payload when the relation was persisted from a build or a
    /// reconcile pass
    #[serde(default)]
    pub edge: Option<LineageEdge>,
    pub updated_at: DateTime<Utc>,
}

/// A captured query-log entry used for corroboration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub system: String,
    pub sql: String,
    pub logged_at: DateTime<Utc>,
}

/// A signed, point-in-time serialization of the full graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub body: serde_json::Value,
    pub signature: Option<String>,
    pub signature_alg: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str) -> LineageEdge {
        LineageEdge::new(source, target, EdgeKind::FeedsInto, Utc::now())
    }

    fn mapping(src: &str, tgt: &str) -> ColumnLineage {
        ColumnLineage {
            source_table: "a".into(),
            source_column: src.into(),
            target_table: "b".into(),
            target_column: tgt.into(),
            relationship_type: ColumnRelationship::DirectMapping,
            contains_pii: false,
            data_quality_score: 90,
            impact_score: 7,
        }
    }

    #[test]
    fn test_edge_kind_string_roundtrip() {
        let kind: EdgeKind = "etl_pipeline".to_string().into();
        assert_eq!(kind, EdgeKind::EtlPipeline);
        assert!(kind.is_structural());

        let custom: EdgeKind = "replication_feed".to_string().into();
        assert_eq!(custom.as_str(), "replication_feed");
        assert!(!custom.is_structural());
    }

    #[test]
    fn test_merge_unions_sources_and_columns() {
        let mut left = edge("a", "b");
        left.column_lineage.push(mapping("id", "id"));
        left.sources.push(ProvenanceTag::ViewSql);
        left.confidence_score = 0.5;
        left.refresh_column_stats();

        let mut right = edge("a", "b");
        right.column_lineage.push(mapping("id", "id"));
        right.column_lineage.push(mapping("email", "email"));
        right.sources.push(ProvenanceTag::Database);
        right.confidence_score = 0.8;
        right.validation_status = ValidationStatus::Valid;

        left.merge_from(right);
        assert_eq!(left.column_lineage.len(), 2);
        assert_eq!(
            left.sources,
            vec![ProvenanceTag::ViewSql, ProvenanceTag::Database]
        );
        assert!((left.confidence_score - 0.8).abs() < f64::EPSILON);
        assert_eq!(left.validation_status, ValidationStatus::Valid);
        assert!(left.edge_signature.is_none());
    }

    #[test]
    fn test_page_restricts_edges_to_page_nodes() {
        let asset_a = Asset::new("a", AssetType::Table, "a");
        let asset_b = Asset::new("b", AssetType::Table, "b");
        let asset_c = Asset::new("c", AssetType::Table, "c");
        let mut graph = LineageGraph {
            nodes: vec![
                LineageNode::from_asset(&asset_a),
                LineageNode::from_asset(&asset_b),
                LineageNode::from_asset(&asset_c),
            ],
            edges: vec![edge("a", "b"), edge("b", "c")],
            ..Default::default()
        };
        graph.refresh_summary(3);

        let page = graph.page(0, 2);
        assert_eq!(page.nodes.len(), 2);
        assert_eq!(page.edges.len(), 1);
        assert_eq!(page.edges[0].source, "a");
    }

    #[test]
    fn test_csv_dash_row_for_edge_without_columns() {
        let asset_a = Asset::new("a", AssetType::Table, "orders");
        let asset_b = Asset::new("b", AssetType::View, "order_stats");
        let graph = LineageGraph {
            nodes: vec![
                LineageNode::from_asset(&asset_a),
                LineageNode::from_asset(&asset_b),
            ],
            edges: vec![edge("a", "b")],
            ..Default::default()
        };

        let csv = graph.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "orders,-,order_stats,-,feeds_into");
    }

    #[test]
    fn test_subgraph_keeps_direct_neighbors_only() {
        let assets: Vec<Asset> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Asset::new(*id, AssetType::Table, *id))
            .collect();
        let graph = LineageGraph {
            nodes: assets.iter().map(LineageNode::from_asset).collect(),
            edges: vec![edge("a", "b"), edge("b", "c"), edge("c", "d")],
            ..Default::default()
        };

        let sub = graph.asset_subgraph("b");
        let ids: Vec<&str> = sub.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(sub.edges.len(), 2);
        assert_eq!(sub.lineage_completeness, 100.0);
    }

    #[test]
    fn test_search_by_column_name() {
        let asset = Asset::new("t1", AssetType::Table, "customers")
            .with_column(AssetColumn::new("email", "VARCHAR"));
        let graph = LineageGraph {
            nodes: vec![LineageNode::from_asset(&asset)],
            edges: vec![],
            ..Default::default()
        };

        let hits = graph.search("email", SearchKind::Column, 20);
        assert_eq!(hits.node_count, 1);
        let miss = graph.search("email", SearchKind::Table, 20);
        assert_eq!(miss.node_count, 0);
    }

    #[test]
    fn test_source_system_labels() {
        assert_eq!(source_system_label("bq_prod"), "BigQuery");
        assert_eq!(source_system_label("starburst_1"), "Starburst Galaxy");
        assert_eq!(source_system_label("s3_lake"), "Amazon S3");
        assert_eq!(source_system_label(""), "Manual");
        assert_eq!(source_system_label("pg_main"), "Unknown");
    }
}
