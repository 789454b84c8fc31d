//! API error types with structured JSON responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::attachments::AttachmentError;
use crate::core_state::CoreError;
use crate::error::{ServiceError, PERMISSION_DENIED_MESSAGE};
use crate::validation::ValidationErrors;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Validation failed")]
    Validation(ValidationErrors),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                "Please correct the errors below.".to_string(),
                Some(errors),
            ),
            ApiError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                PERMISSION_DENIED_MESSAGE.to_string(),
                None,
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                fields,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => ApiError::Validation(errors),
            ServiceError::PermissionDenied => ApiError::PermissionDenied,
            ServiceError::NotFound { entity } => ApiError::NotFound(format!("{entity} not found")),
            ServiceError::Attachment(e) => e.into(),
            ServiceError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AttachmentError> for ApiError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::TooLarge { .. } | AttachmentError::Empty | AttachmentError::NotAnImage => {
                ApiError::Validation(ValidationErrors::single("file", err.to_string()))
            }
            AttachmentError::Missing => ApiError::NotFound("File not found".into()),
            AttachmentError::InvalidPath(_) | AttachmentError::Io(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
        assert!(json["error"].get("fields").is_none());
    }

    #[tokio::test]
    async fn validation_returns_422_with_fields() {
        let err: ApiError =
            ServiceError::invalid("discount", "Discount amount cannot be greater than the total amount.")
                .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(
            json["error"]["fields"]["discount"][0],
            "Discount amount cannot be greater than the total amount."
        );
    }

    #[tokio::test]
    async fn permission_denied_is_uniform_403() {
        let response = ApiError::from(ServiceError::PermissionDenied).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "PERMISSION_DENIED");
        assert_eq!(json["error"]["message"], PERMISSION_DENIED_MESSAGE);
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::from(ServiceError::not_found("Patient")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Patient not found");
    }

    #[tokio::test]
    async fn oversized_upload_is_field_error() {
        let response = ApiError::from(AttachmentError::TooLarge { max_bytes: 10 }).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"]["fields"]["file"].is_array());
    }

    #[tokio::test]
    async fn internal_returns_500() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        // Internal errors hide details from client
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
