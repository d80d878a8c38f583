//! SQL reference extraction.
//!
//! Turns raw SQL text into the table references, transformation categories,
//! and per-clause column usage the column lineage builder consumes. Two
//! interchangeable strategies sit behind [`SqlAnalyzer`]:
//!
//! - a grammar strategy backed by `sqlparser`, used when configured and the
//!   statement parses
//! - a pattern strategy over a fixed, ordered regex list, always available
//!
//! Both produce the same [`SqlAnalysis`] shape, so callers never know which
//! one ran. Empty input yields empty results, never an error.

use crate::error::{Result, TorroError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{visit_expressions, visit_relations, Expr};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;
use tracing::debug;

/// Transformation category detected in SQL or engine metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformCategory {
    Aggregation,
    DataQuality,
    Conditional,
    JoinType,
    Distinct,
    DateTransform,
    StringTransform,
    Constraint,
    Pipeline,
    Metadata,
    Corroboration,
}

/// A detected transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    /// Operation tag, e.g. `COUNT`, `FOREIGN_KEY`, `QUERY_LOG`
    #[serde(rename = "type")]
    pub op: String,
    pub category: TransformCategory,
}

impl Transformation {
    pub fn new(op: &str, category: TransformCategory) -> Self {
        Self {
            op: op.to_string(),
            category,
        }
    }
}

/// Extraction result shared by both parser strategies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlAnalysis {
    /// Referenced table identifiers, qualified where possible
    pub tables: Vec<String>,
    /// Detected transformations
    pub transformations: Vec<Transformation>,
    /// Table aliases found in FROM clauses
    pub aliases: HashMap<String, String>,
    /// Column names referenced per table key
    pub column_usage: HashMap<String, Vec<String>>,
    pub has_joins: bool,
    pub has_unions: bool,
    pub has_subqueries: bool,
}

trait SqlStrategy {
    fn analyze(&self, sql: &str, qualifier: Option<&str>) -> Result<SqlAnalysis>;
}

/// Analyzer facade selecting a strategy per call.
pub struct SqlAnalyzer {
    grammar: Option<GrammarStrategy>,
    patterns: PatternStrategy,
}

impl SqlAnalyzer {
    /// Build an analyzer; `prefer_grammar` enables the grammar strategy.
    pub fn new(prefer_grammar: bool) -> Self {
        Self {
            grammar: prefer_grammar.then(GrammarStrategy::new),
            patterns: PatternStrategy::new(),
        }
    }

    /// Analyze SQL text. Grammar parse failures fall back to pattern
    /// matching; empty input yields an empty analysis.
    pub fn analyze(&self, sql: &str, qualifier: Option<&str>) -> SqlAnalysis {
        if sql.trim().is_empty() {
            return SqlAnalysis::default();
        }
        if let Some(ref grammar) = self.grammar {
            match grammar.analyze(sql, qualifier) {
                Ok(analysis) => return analysis,
                Err(e) => {
                    debug!(error = %e, "Grammar parse failed, falling back to patterns");
                }
            }
        }
        self.patterns
            .analyze(sql, qualifier)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Grammar strategy
// ---------------------------------------------------------------------------

/// Exact table and function extraction via `sqlparser`.
struct GrammarStrategy;

impl GrammarStrategy {
    fn new() -> Self {
        Self
    }
}

impl SqlStrategy for GrammarStrategy {
    fn analyze(&self, sql: &str, qualifier: Option<&str>) -> Result<SqlAnalysis> {
        let statements = Parser::parse_sql(&GenericDialect {}, sql)
            .map_err(|e| TorroError::Validation(format!("SQL parse error: {}", e)))?;

        let mut tables: BTreeSet<String> = BTreeSet::new();
        let _ = visit_relations(&statements, |relation| {
            let parts: Vec<String> = relation.0.iter().map(|i| i.value.clone()).collect();
            tables.insert(qualify(&parts, qualifier));
            ControlFlow::<()>::Continue(())
        });

        let mut functions: BTreeSet<String> = BTreeSet::new();
        let _ = visit_expressions(&statements, |expr| {
            if let Expr::Function(func) = expr {
                let name: Vec<String> = func.name.0.iter().map(|i| i.value.clone()).collect();
                if let Some(last) = name.last() {
                    functions.insert(last.to_uppercase());
                }
            }
            ControlFlow::<()>::Continue(())
        });

        let upper = sql.to_uppercase();
        let mut transformations = Vec::new();
        for op in ["COUNT", "SUM", "AVG", "MIN", "MAX", "COALESCE"] {
            if functions.contains(op) {
                let category = if op == "COALESCE" {
                    TransformCategory::DataQuality
                } else {
                    TransformCategory::Aggregation
                };
                transformations.push(Transformation::new(op, category));
            }
        }
        if upper.contains("CASE") {
            transformations.push(Transformation::new("CASE", TransformCategory::Conditional));
        }
        if upper.contains("DISTINCT") {
            transformations.push(Transformation::new("DISTINCT", TransformCategory::Distinct));
        }

        Ok(SqlAnalysis {
            tables: tables.into_iter().collect(),
            transformations,
            aliases: HashMap::new(),
            column_usage: extract_column_usage(sql, "query"),
            has_joins: upper.contains("JOIN"),
            has_unions: upper.contains("UNION"),
            has_subqueries: upper.contains("SELECT") && sql.contains('(') && sql.contains(')'),
        })
    }
}

// ---------------------------------------------------------------------------
// Pattern strategy
// ---------------------------------------------------------------------------

/// Regex fallback covering backtick/quoted/unquoted two- and three-part
/// identifiers and common JOIN/FROM/UNION forms.
struct PatternStrategy {
    table_patterns: Vec<Regex>,
    transform_patterns: Vec<(Regex, TransformCategory, &'static str)>,
    alias_patterns: Vec<Regex>,
    join_re: Option<Regex>,
    union_re: Option<Regex>,
    subquery_re: Option<Regex>,
}

const TABLE_PATTERNS: &[&str] = &[
    // backtick-quoted
    r"(?i)`([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)`",
    r"(?i)`([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)`",
    // double-quoted
    r#"(?i)"([A-Za-z0-9_-]+)"\."([A-Za-z0-9_-]+)"\."([A-Za-z0-9_-]+)""#,
    r#"(?i)"([A-Za-z0-9_-]+)"\."([A-Za-z0-9_-]+)""#,
    // FROM / JOIN with unquoted three-part names
    r"(?i)\bFROM\s+([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)",
    r"(?i)\b(?:LEFT\s+|RIGHT\s+|INNER\s+|OUTER\s+|CROSS\s+)?JOIN\s+([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)",
    // FROM / JOIN with optionally quoted two-part names
    r#"(?i)\bFROM\s+[`"]?([A-Za-z0-9_-]+)[`"]?\.[`"]?([A-Za-z0-9_-]+)[`"]?"#,
    r#"(?i)\b(?:LEFT\s+|RIGHT\s+|INNER\s+|OUTER\s+|CROSS\s+)?JOIN\s+[`"]?([A-Za-z0-9_-]+)[`"]?\.[`"]?([A-Za-z0-9_-]+)[`"]?"#,
    // UNION branches
    r#"(?is)UNION\s+ALL\s+SELECT.*?FROM\s+[`"]?([A-Za-z0-9_-]+)[`"]?\.[`"]?([A-Za-z0-9_-]+)[`"]?"#,
    // bare dotted names anywhere
    r"(?i)\b([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_-]+)\b",
];

const TRANSFORM_PATTERNS: &[(&str, TransformCategory, &str)] = &[
    (r"(?i)\bCOUNT\s*\(", TransformCategory::Aggregation, "COUNT"),
    (r"(?i)\bSUM\s*\(", TransformCategory::Aggregation, "SUM"),
    (r"(?i)\bAVG\s*\(", TransformCategory::Aggregation, "AVG"),
    (r"(?i)\bMIN\s*\(", TransformCategory::Aggregation, "MIN"),
    (r"(?i)\bMAX\s*\(", TransformCategory::Aggregation, "MAX"),
    (r"(?i)\bCOALESCE\s*\(", TransformCategory::DataQuality, "COALESCE"),
    (r"(?i)\bCASE\s+WHEN", TransformCategory::Conditional, "CASE"),
    (r"(?i)\bCROSS\s+JOIN", TransformCategory::JoinType, "CROSS_JOIN"),
    (r"(?i)\bGROUP\s+BY", TransformCategory::Aggregation, "GROUP_BY"),
    (r"(?i)\bDISTINCT\b", TransformCategory::Distinct, "DISTINCT"),
    (r"(?i)\bDATE\s*\(", TransformCategory::DateTransform, "DATE"),
    (r"(?i)\bTRIM\s*\(", TransformCategory::StringTransform, "TRIM"),
    (r"(?i)\bUPPER\s*\(", TransformCategory::StringTransform, "UPPER"),
    (r"(?i)\bLOWER\s*\(", TransformCategory::StringTransform, "LOWER"),
];

const ALIAS_PATTERNS: &[&str] = &[
    r"(?i)FROM\s+`?([A-Za-z0-9_.-]+)`?\s+AS\s+([A-Za-z0-9_]+)",
    r"(?i)FROM\s+`?([A-Za-z0-9_.-]+)`?\s+([A-Za-z0-9_]+)",
];

impl PatternStrategy {
    fn new() -> Self {
        let mut table_patterns = Vec::new();
        for pattern in TABLE_PATTERNS {
            if let Ok(re) = Regex::new(pattern) {
                table_patterns.push(re);
            }
        }

        let mut transform_patterns = Vec::new();
        for (pattern, category, op) in TRANSFORM_PATTERNS {
            if let Ok(re) = Regex::new(pattern) {
                transform_patterns.push((re, *category, *op));
            }
        }

        let mut alias_patterns = Vec::new();
        for pattern in ALIAS_PATTERNS {
            if let Ok(re) = Regex::new(pattern) {
                alias_patterns.push(re);
            }
        }

        Self {
            table_patterns,
            transform_patterns,
            alias_patterns,
            join_re: Regex::new(r"(?i)\bJOIN\b").ok(),
            union_re: Regex::new(r"(?i)\bUNION\b").ok(),
            subquery_re: Regex::new(r"(?is)\(.*SELECT.*\)").ok(),
        }
    }
}

impl SqlStrategy for PatternStrategy {
    fn analyze(&self, sql: &str, qualifier: Option<&str>) -> Result<SqlAnalysis> {
        let mut tables: BTreeSet<String> = BTreeSet::new();
        for re in &self.table_patterns {
            for caps in re.captures_iter(sql) {
                let parts: Vec<String> = caps
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str().to_string())
                    .collect();
                if parts.len() >= 2 {
                    tables.insert(qualify(&parts, qualifier));
                }
            }
        }

        let mut transformations = Vec::new();
        for (re, category, op) in &self.transform_patterns {
            if re.is_match(sql) {
                transformations.push(Transformation::new(op, *category));
            }
        }

        let mut aliases = HashMap::new();
        for re in &self.alias_patterns {
            for caps in re.captures_iter(sql) {
                if let (Some(table), Some(alias)) = (caps.get(1), caps.get(2)) {
                    aliases
                        .entry(alias.as_str().to_string())
                        .or_insert_with(|| table.as_str().to_string());
                }
            }
        }

        Ok(SqlAnalysis {
            tables: tables.into_iter().collect(),
            transformations,
            aliases,
            column_usage: extract_column_usage(sql, "query"),
            has_joins: self.join_re.as_ref().is_some_and(|re| re.is_match(sql)),
            has_unions: self.union_re.as_ref().is_some_and(|re| re.is_match(sql)),
            has_subqueries: self
                .subquery_re
                .as_ref()
                .is_some_and(|re| re.is_match(sql)),
        })
    }
}

/// Qualify a dotted name: two-part references pick up the catalog/project
/// qualifier when one is supplied.
fn qualify(parts: &[String], qualifier: Option<&str>) -> String {
    match (parts.len(), qualifier) {
        (2, Some(q)) => format!("{}.{}.{}", q, parts[0], parts[1]),
        _ => parts.join("."),
    }
}

const CLAUSE_PATTERNS: &[&str] = &[
    r"(?is)\bSELECT\s+(.+?)(?:\s+FROM|\s+WHERE|\s+GROUP|\s+ORDER|\s+HAVING|\s+UNION|\s*$)",
    r"(?is)\bWHERE\s+(.+?)(?:\s+GROUP|\s+ORDER|\s+HAVING|\s+UNION|\s*$)",
    r"(?is)\bGROUP\s+BY\s+(.+?)(?:\s+ORDER|\s+HAVING|\s+UNION|\s*$)",
    r"(?is)\bORDER\s+BY\s+(.+?)(?:\s+UNION|\s*$)",
    r"(?is)\bHAVING\s+(.+?)(?:\s+UNION|\s*$)",
];

const JOIN_ON_PATTERN: &str =
    r"(?is)\bJOIN\s+\S+\s+ON\s+(.+?)(?:\s+WHERE|\s+GROUP|\s+ORDER|\s+HAVING|\s+UNION|\s*$)";

const SKIP_TOKENS: &[&str] = &["*", "COUNT", "SUM", "AVG", "MIN", "MAX", "DISTINCT"];

/// Extract column names referenced in SELECT/WHERE/GROUP BY/ORDER BY/HAVING
/// and JOIN-ON clauses, keyed by `table_key`.
pub fn extract_column_usage(sql: &str, table_key: &str) -> HashMap<String, Vec<String>> {
    let mut usage: HashMap<String, Vec<String>> = HashMap::new();
    if sql.trim().is_empty() {
        return usage;
    }

    let mut columns: HashSet<String> = HashSet::new();
    for pattern in CLAUSE_PATTERNS {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        for caps in re.captures_iter(sql) {
            let Some(chunk) = caps.get(1) else { continue };
            for piece in chunk.as_str().split(',') {
                let token = piece
                    .trim()
                    .rsplit('.')
                    .next()
                    .unwrap_or("")
                    .trim_matches(|c| c == '`' || c == '"' || c == '\'');
                if token.is_empty() || SKIP_TOKENS.contains(&token.to_uppercase().as_str()) {
                    continue;
                }
                columns.insert(token.to_string());
            }
        }
    }

    if let Ok(join_re) = Regex::new(JOIN_ON_PATTERN) {
        let ident_re = Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\b").ok();
        for caps in join_re.captures_iter(sql) {
            let Some(condition) = caps.get(1) else { continue };
            if let Some(ref ident_re) = ident_re {
                for ident in ident_re.captures_iter(condition.as_str()) {
                    let token = &ident[1];
                    if matches!(token.to_uppercase().as_str(), "ON" | "AND" | "OR") {
                        continue;
                    }
                    columns.insert(token.to_string());
                }
            }
        }
    }

    if !columns.is_empty() {
        let mut list: Vec<String> = columns.into_iter().collect();
        list.sort();
        usage.insert(table_key.to_string(), list);
    }
    usage
}
