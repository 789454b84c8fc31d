//! Patient register endpoints.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::endpoints::{file_response, read_upload, Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::models::{PatientDetails, PatientView};
use crate::patients::{
    autocomplete_patients, deactivate_patient, get_patient, list_patients, patient_photo,
    register_patient, set_patient_photo, update_patient, PatientSuggestion,
};
use crate::search::{Page, PatientFilter};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<PatientFilter>,
) -> Result<Json<Page<PatientView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_patients(conn, &actor, &filter))?))
}

/// `POST /api/patients`: the caller becomes the owner.
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(details): Body<PatientDetails>,
) -> Result<(StatusCode, Json<PatientView>), ApiError> {
    let view = ctx.run(|conn| register_patient(conn, &actor, details))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/patients/search?q=`
pub async fn search(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(query): Filter<SearchQuery>,
) -> Result<Json<Vec<PatientSuggestion>>, ApiError> {
    Ok(Json(ctx.run(|conn| autocomplete_patients(conn, &actor, &query.q))?))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<PatientView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_patient(conn, &actor, &id))?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<PatientDetails>,
) -> Result<Json<PatientView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_patient(conn, &actor, &id, details))?))
}

pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<StatusCode, ApiError> {
    ctx.run(|conn| deactivate_patient(conn, &actor, &id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/patients/:id/photo`: multipart, first file part wins.
pub async fn upload_photo(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PatientView>, ApiError> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let store = &ctx.core.attachments;
    let view = ctx.run(|conn| set_patient_photo(conn, store, &actor, &id, &file_name, &bytes))?;
    Ok(Json(view))
}

/// `GET /api/patients/:id/photo`
pub async fn photo(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Response, ApiError> {
    let store = &ctx.core.attachments;
    let file = ctx.run(|conn| patient_photo(conn, store, &actor, &id))?;
    Ok(file_response(file))
}
