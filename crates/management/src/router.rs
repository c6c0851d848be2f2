//! Management API router — mounts all management endpoints under /api/v1/management.

use crate::auth::{self, AdminAuth};
use crate::handlers::{self, ManagementState};
use crate::service::CampaignService;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Build the management router with all endpoints behind the admin token.
/// Returns a Router that should be merged into the main app.
pub fn management_router(service: Arc<CampaignService>, admin_token: &str) -> Router {
    let state = ManagementState { service };
    let admin_auth = AdminAuth::new(admin_token);

    Router::new()
        // Segments
        .route("/api/v1/management/segments/validate", post(handlers::validate_segment))
        .route("/api/v1/management/segments/preview", post(handlers::preview_segment))
        .route("/api/v1/management/segments/resolve", post(handlers::resolve_segment))
        .route("/api/v1/management/segments/csv", post(handlers::import_csv))
        .route("/api/v1/management/audience/stats", get(handlers::audience_stats))
        // Campaigns
        .route("/api/v1/management/campaigns", get(handlers::list_campaigns).post(handlers::create_campaign))
        .route("/api/v1/management/campaigns/:id", get(handlers::get_campaign).delete(handlers::delete_campaign))
        .route("/api/v1/management/campaigns/:id/preview", post(handlers::preview_campaign))
        .route("/api/v1/management/campaigns/:id/send", post(handlers::send_campaign))
        .route("/api/v1/management/campaigns/:id/report", get(handlers::campaign_report))
        // Audit log
        .route("/api/v1/management/audit-log", get(handlers::audit_log))
        .route_layer(middleware::from_fn_with_state(admin_auth, auth::require_admin))
        .with_state(state)
}
