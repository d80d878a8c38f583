//! Tamper-evident signing for edges and snapshots.
//!
//! Signatures are HMAC-SHA256 over a canonical serialization: `serde_json`
//! maps are ordered by key, so serializing a [`serde_json::Value`] already
//! yields a stable byte sequence. Signing is best-effort: a missing key
//! degrades to unsigned output with a logged warning, never an error.
//! Verification failure is a hard error.

use crate::error::{Result, TorroError};
use crate::lineage::model::LineageEdge;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm tag recorded on signed snapshots.
pub const SIGNATURE_ALG: &str = "HMAC-SHA256";

/// Keyed signer for edges and snapshot bodies.
#[derive(Clone)]
pub struct EdgeSigner {
    key: Option<String>,
}

impl EdgeSigner {
    /// Create a signer; `None` disables signing.
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }

    /// Whether a signing key is configured.
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Sign an edge's identity tuple. Returns `None` (with a warning) when
    /// no key is configured.
    pub fn sign_edge(&self, edge: &LineageEdge) -> Option<String> {
        let payload = json!({
            "source": edge.source,
            "target": edge.target,
            "relationship": edge.relationship,
            "created_at": edge.created_at,
        });
        self.sign_value(&payload)
    }

    /// Sign an arbitrary canonical payload.
    pub fn sign_value(&self, payload: &Value) -> Option<String> {
        let Some(ref key) = self.key else {
            warn!("No signing key configured; emitting unsigned payload");
            return None;
        };
        let encoded = payload.to_string();
        let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
            Ok(mac) => mac,
            Err(e) => {
                warn!(error = %e, "Failed to initialize HMAC; emitting unsigned payload");
                return None;
            }
        };
        mac.update(encoded.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a hex-encoded signature against a payload. Comparison is
    /// constant-time; a mismatch is a hard forbidden error. With no key
    /// configured the check is skipped with a warning.
    pub fn verify(&self, payload: &Value, signature: &str) -> Result<()> {
        let Some(ref key) = self.key else {
            warn!("Signature provided but no signing key configured; skipping validation");
            return Ok(());
        };
        let provided = hex::decode(signature)
            .map_err(|_| TorroError::Forbidden("Invalid signature.".to_string()))?;
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| TorroError::Internal(format!("HMAC init failed: {}", e)))?;
        mac.update(payload.to_string().as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| TorroError::Forbidden("Invalid signature.".to_string()))
    }
}
