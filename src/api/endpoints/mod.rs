//! API endpoint handlers.
//!
//! One module per resource. Handlers only extract, delegate to the record
//! services under the connection lock, and shape the response.

pub mod accounts;
pub mod appointments;
pub mod billing;
pub mod checkups;
pub mod dashboard;
pub mod doctors;
pub mod employees;
pub mod health;
pub mod history;
pub mod medical_records;
pub mod notifications;
pub mod patients;
pub mod prescriptions;

use axum::async_trait;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::attachments::StoredFile;
use crate::validation::ValidationErrors;

// ─── Extractors with JSON error bodies ──────────────────────────────────────

/// `:id` path segment.
pub struct Id(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Id {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, ApiError> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state).await?;
        Ok(Id(id))
    }
}

/// Query-string filter.
pub struct Filter<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Filter<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, ApiError> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Filter(value))
    }
}

/// JSON request body.
pub struct Body<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Body(value))
    }
}

// ─── Files ──────────────────────────────────────────────────────────────────

/// First file part of a multipart upload, as `(file name, bytes)`.
pub(crate) async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, Vec<u8>), ApiError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError::Validation(ValidationErrors::single(
        "file",
        "No file provided.",
    )))
}

/// Stored bytes with their guessed content type.
pub(crate) fn file_response(file: StoredFile) -> Response {
    let mut response = file.bytes.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&file.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file.file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
