//! Bearer token authentication middleware.
//!
//! A single admin token from configuration gates every management route.
//! Upstream identity (SSO, per-user tokens) is expected to replace it.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ManagementError;

/// Identity attached to authenticated requests, recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity(pub String);

#[derive(Clone)]
pub struct AdminAuth {
    token: Arc<str>,
}

impl AdminAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        !self.token.trim().is_empty() && presented == &*self.token
    }
}

/// Rejects requests without `Authorization: Bearer <admin token>`.
pub async fn require_admin(State(auth): State<AdminAuth>, mut req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if auth.accepts(token) => {
            req.extensions_mut()
                .insert(AdminIdentity("admin".to_string()));
            next.run(req).await
        }
        _ => {
            warn!(path = %req.uri().path(), "Rejected management request without valid admin token");
            ManagementError::Unauthorized.into_response()
        }
    }
}
