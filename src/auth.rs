//! Authentication middleware for Axum.
//!
//! Role checks are a consumed capability, not a session system: bearer
//! tokens map to roles via configuration, and handlers ask [`require_role`]
//! before admin operations.

use crate::config::AuthConfig;
use crate::error::{Result, TorroError};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;

/// Identity attached to a request.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub subject: String,
    pub roles: Vec<String>,
}

impl AuthInfo {
    /// Anonymous identity with no roles.
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
            roles: Vec::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Shared authentication state.
#[derive(Clone)]
pub struct AuthState {
    admin_tokens: Arc<HashSet<String>>,
    allow_anonymous: bool,
}

impl AuthState {
    /// Create auth state from configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            admin_tokens: Arc::new(config.admin_tokens.iter().cloned().collect()),
            allow_anonymous: config.allow_anonymous,
        }
    }

    fn identify(&self, token: &str) -> AuthInfo {
        if self.admin_tokens.contains(token) {
            AuthInfo {
                subject: "admin-token".to_string(),
                roles: vec!["admin".to_string(), "user".to_string()],
            }
        } else {
            AuthInfo {
                subject: "bearer-token".to_string(),
                roles: vec!["user".to_string()],
            }
        }
    }
}

/// Extract auth info from the request and stash it in extensions.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let auth_info = match auth_header {
        Some(header) if header.starts_with("Bearer ") => state.identify(&header[7..]),
        Some(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header format",
            )
                .into_response();
        }
        None => {
            if state.allow_anonymous {
                AuthInfo::anonymous()
            } else {
                return (StatusCode::UNAUTHORIZED, "Authorization required").into_response();
            }
        }
    };

    request.extensions_mut().insert(auth_info);
    next.run(request).await
}

/// Require a role on the request identity. Anonymous callers get 401,
/// authenticated callers without the role get 403.
pub fn require_role(info: &AuthInfo, role: &str) -> Result<()> {
    if info.is_anonymous() {
        return Err(TorroError::Auth("Authorization required".to_string()));
    }
    if !info.has_role(role) {
        return Err(TorroError::Forbidden("Insufficient permissions".to_string()));
    }
    Ok(())
}
