//! Management API errors and their HTTP rendering.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campaign_segmentation::csv_import::CsvImportError;
use campaign_segmentation::SegmentError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CampaignStatus, ErrorResponse};

#[derive(Debug, Error)]
pub enum ManagementError {
    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error("campaign {0} not found")]
    NotFound(Uuid),

    #[error("campaign {id} has already left draft (status {status:?})")]
    AlreadySent { id: Uuid, status: CampaignStatus },

    #[error("campaign {0} is being sent")]
    SendInProgress(Uuid),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{}", .0.body_text())]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Csv(#[from] CsvImportError),

    #[error("missing or invalid admin token")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ManagementResult<T> = Result<T, ManagementError>;

impl ManagementError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Segment(SegmentError::InvalidFilter(_)) => StatusCode::BAD_REQUEST,
            Self::Segment(SegmentError::QueryFailure(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadySent { .. } | Self::SendInProgress(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) | Self::Csv(_) => StatusCode::BAD_REQUEST,
            Self::Json(rejection) => rejection.status(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Segment(SegmentError::InvalidFilter(_)) => "invalid_filter",
            Self::Segment(SegmentError::QueryFailure(_)) => "query_failure",
            Self::NotFound(_) => "not_found",
            Self::AlreadySent { .. } => "already_sent",
            Self::SendInProgress(_) => "send_in_progress",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Json(_) => "invalid_json",
            Self::Csv(_) => "invalid_csv",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Segment(SegmentError::InvalidFilter(invalid)) => invalid.reason().to_string(),
            // Store details stay in the logs.
            Self::Segment(SegmentError::QueryFailure(_)) => "Audience query failed".to_string(),
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ManagementError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_segmentation::{InvalidFilter, StoreError};

    #[test]
    fn test_status_mapping() {
        let invalid = ManagementError::from(SegmentError::from(InvalidFilter::new("bad")));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.message(), "bad");

        let failure = ManagementError::from(SegmentError::from(StoreError::Unavailable(
            "connection refused".into(),
        )));
        assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.message(), "Audience query failed");

        assert_eq!(
            ManagementError::NotFound(Uuid::new_v4()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ManagementError::AlreadySent {
                id: Uuid::new_v4(),
                status: CampaignStatus::Sent,
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ManagementError::SendInProgress(Uuid::new_v4()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ManagementError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
