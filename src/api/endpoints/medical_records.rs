//! Medical records and their single attachment.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};

use crate::api::endpoints::{file_response, read_upload, Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::medical_records::{
    attach_file, attachment, create_medical_record, deactivate_medical_record, get_medical_record,
    list_medical_records, update_medical_record,
};
use crate::models::{MedicalRecordDetails, MedicalRecordView};
use crate::search::{MedicalRecordFilter, Page};

/// `GET /api/medical-records`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<MedicalRecordFilter>,
) -> Result<Json<Page<MedicalRecordView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_medical_records(conn, &actor, &filter))?))
}

/// `POST /api/medical-records`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(details): Body<MedicalRecordDetails>,
) -> Result<(StatusCode, Json<MedicalRecordView>), ApiError> {
    let view = ctx.run(|conn| create_medical_record(conn, &actor, details))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<MedicalRecordView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_medical_record(conn, &actor, &id))?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<MedicalRecordDetails>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_medical_record(conn, &actor, &id, details))?))
}

pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<StatusCode, ApiError> {
    ctx.run(|conn| deactivate_medical_record(conn, &actor, &id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/medical-records/:id/attachment`: replaces any previous file.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let store = &ctx.core.attachments;
    let view = ctx.run(|conn| attach_file(conn, store, &actor, &id, &file_name, &bytes))?;
    Ok(Json(view))
}

/// `GET /api/medical-records/:id/attachment`
pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Response, ApiError> {
    let store = &ctx.core.attachments;
    let file = ctx.run(|conn| attachment(conn, store, &actor, &id))?;
    Ok(file_response(file))
}
