//! HTTP error response handling for the API
//!
//! This module provides conversions from domain errors to HTTP responses
//! with appropriate status codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Default to 500 if we're directly converting an ApiError
        // (usually errors go through Error::into_response which has the status code)
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CampaignError, ValidationError};

    async fn into_parts(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_campaign_not_found_response() {
        let (status, body) = into_parts(Error::Campaign(CampaignError::NotFound { id: 9 })).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "campaign_not_found");
        assert_eq!(body["error"]["message"], "campaign 9 not found");
        assert_eq!(body["error"]["details"]["campaign_id"], 9);
    }

    #[tokio::test]
    async fn test_already_in_state_response() {
        let (status, body) = into_parts(Error::Campaign(CampaignError::AlreadyInState {
            id: 3,
            state: "paused".into(),
        }))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "already_in_state");
        assert_eq!(body["error"]["details"]["state"], "paused");
    }

    #[tokio::test]
    async fn test_validation_response_is_unprocessable() {
        let (status, body) =
            into_parts(ValidationError::invalid("send_type.batch_size", "too large").into()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"]["field"], "send_type.batch_size");
    }

    #[tokio::test]
    async fn test_shutting_down_response_has_no_details() {
        let (status, body) = into_parts(Error::ShuttingDown).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "shutting_down");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_api_error_defaults_to_internal_server_error() {
        let api_error: ApiError = Error::PoolBusy("owners".into()).into();
        let response = api_error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
