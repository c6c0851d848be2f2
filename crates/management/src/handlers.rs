//! Axum REST handlers for the management API.

use crate::auth::AdminIdentity;
use crate::error::{ManagementError, ManagementResult};
use crate::models::*;
use crate::service::CampaignService;
use axum::extract::{FromRequest, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use campaign_segmentation::EmailImport;
use std::sync::Arc;
use uuid::Uuid;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub service: Arc<CampaignService>,
}

/// `Json` body extractor whose rejections render as [`ErrorResponse`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ManagementError))]
pub struct ApiJson<T>(pub T);

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn validate_segment(
    State(state): State<ManagementState>,
    ApiJson(filter): ApiJson<serde_json::Value>,
) -> Json<ValidateResponse> {
    Json(state.service.validate_filter(&filter))
}

pub async fn preview_segment(
    State(state): State<ManagementState>,
    ApiJson(filter): ApiJson<serde_json::Value>,
) -> ManagementResult<Json<PreviewResponse>> {
    let user_count = state.service.preview_filter(&filter).await?;
    Ok(Json(PreviewResponse { user_count }))
}

pub async fn resolve_segment(
    State(state): State<ManagementState>,
    ApiJson(filter): ApiJson<serde_json::Value>,
) -> ManagementResult<Json<ResolveResponse>> {
    let user_ids = state.service.resolve_filter(&filter).await?;
    Ok(Json(ResolveResponse { user_ids }))
}

/// Raw CSV body in, cleaned `csvEmails` list out.
pub async fn import_csv(
    State(state): State<ManagementState>,
    body: String,
) -> ManagementResult<Json<EmailImport>> {
    state.service.import_csv(&body).map(Json)
}

pub async fn audience_stats(
    State(state): State<ManagementState>,
) -> ManagementResult<Json<AudienceStats>> {
    state.service.audience_stats().await.map(Json)
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn list_campaigns(State(state): State<ManagementState>) -> Json<Vec<MarketingCampaign>> {
    Json(state.service.store().list_campaigns())
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
) -> ManagementResult<Json<MarketingCampaign>> {
    state.service.get_campaign(id).map(Json)
}

pub async fn create_campaign(
    State(state): State<ManagementState>,
    Extension(admin): Extension<AdminIdentity>,
    ApiJson(req): ApiJson<CreateCampaignRequest>,
) -> ManagementResult<(StatusCode, Json<MarketingCampaign>)> {
    let campaign = state.service.create_campaign(req, &admin.0)?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn delete_campaign(
    State(state): State<ManagementState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<Uuid>,
) -> ManagementResult<StatusCode> {
    state.service.delete_campaign(id, &admin.0)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn preview_campaign(
    State(state): State<ManagementState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<Uuid>,
) -> ManagementResult<Json<PreviewResponse>> {
    let user_count = state.service.preview_campaign(id, &admin.0).await?;
    Ok(Json(PreviewResponse { user_count }))
}

pub async fn send_campaign(
    State(state): State<ManagementState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<Uuid>,
) -> ManagementResult<Json<SendReport>> {
    state.service.send_campaign(id, &admin.0).await.map(Json)
}

pub async fn campaign_report(
    State(state): State<ManagementState>,
    Path(id): Path<Uuid>,
) -> ManagementResult<Json<SendReport>> {
    state.service.campaign_report(id).map(Json)
}

// ─── Audit Log ─────────────────────────────────────────────────────────────

pub async fn audit_log(State(state): State<ManagementState>) -> Json<Vec<AuditLogEntry>> {
    Json(state.service.store().get_audit_log())
}
