//! Configuration module for Torro.

use crate::error::{Result, TorroError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Main configuration for a Torro server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorroConfig {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Lineage engine configuration.
    pub lineage: LineageConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl TorroConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TorroError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| TorroError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.lineage.default_page_size == 0 {
            return Err(TorroError::InvalidConfig {
                field: "lineage.default_page_size".to_string(),
                reason: "Page size must be non-zero".to_string(),
            });
        }

        if self.lineage.stale_after_days <= 0 {
            return Err(TorroError::InvalidConfig {
                field: "lineage.stale_after_days".to_string(),
                reason: "Staleness window must be positive".to_string(),
            });
        }

        if let Some(ref key) = self.lineage.signing_key {
            if key.is_empty() {
                return Err(TorroError::InvalidConfig {
                    field: "lineage.signing_key".to_string(),
                    reason: "Signing key must not be empty when set".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8700".parse().expect("valid socket address"),
            },
            lineage: LineageConfig {
                signing_key: Some("dev-signing-key".to_string()),
                ..LineageConfig::default()
            },
            auth: AuthConfig {
                allow_anonymous: true,
                admin_tokens: vec!["dev-admin-token".to_string()],
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the lineage API.
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8700".parse().expect("valid socket address"),
        }
    }
}

/// Lineage engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Key used to sign edges and snapshots. Signing is skipped when unset.
    pub signing_key: Option<String>,
    /// Run the pairwise inference fallback only while the edge count is
    /// below this threshold.
    pub pairwise_edge_threshold: usize,
    /// Minimum column matches required for a pairwise-inferred edge.
    pub pairwise_min_column_matches: usize,
    /// Edges whose last validation is older than this are stale.
    pub stale_after_days: i64,
    /// Default page size for graph responses.
    pub default_page_size: usize,
    /// Cap on nodes/edges returned by search.
    pub max_search_results: usize,
    /// How many recent query-log entries to scan for corroboration.
    pub query_log_scan_limit: usize,
    /// Prefer the grammar-based SQL parser over pattern matching.
    pub prefer_grammar_parser: bool,
    /// Distinct-ratio sampling for key validation.
    pub sampling: SamplingConfig,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            pairwise_edge_threshold: 50,
            pairwise_min_column_matches: 2,
            stale_after_days: 30,
            default_page_size: 1000,
            max_search_results: 20,
            query_log_scan_limit: 1000,
            prefer_grammar_parser: true,
            sampling: SamplingConfig::default(),
        }
    }
}

/// Configuration for best-effort distinct-ratio sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Maximum attempts per probe before giving up.
    pub max_attempts: u32,
    /// Initial backoff between attempts, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum findings probed per validation request.
    pub probe_limit: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            probe_limit: 5,
        }
    }
}

/// Authentication configuration.
///
/// Role checks are consumed as a capability: a bearer token listed in
/// `admin_tokens` carries the admin role, any other token carries the user
/// role, and anonymous requests are allowed only when `allow_anonymous` is
/// set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Allow requests without an Authorization header.
    pub allow_anonymous: bool,
    /// Bearer tokens that carry the admin role.
    pub admin_tokens: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (overridden by RUST_LOG).
    pub log_level: String,
    /// Emit logs as JSON.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config_is_valid() {
        let config = TorroConfig::development();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let mut config = TorroConfig::development();
        config.lineage.default_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_signing_key() {
        let mut config = TorroConfig::development();
        config.lineage.signing_key = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrips_through_json() {
        let config = TorroConfig::development();
        let raw = serde_json::to_string(&config).unwrap();
        let parsed: TorroConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.lineage.pairwise_edge_threshold, 50);
        assert_eq!(parsed.auth.admin_tokens.len(), 1);
    }
}
