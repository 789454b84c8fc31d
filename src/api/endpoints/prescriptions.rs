//! Prescriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::{Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::prescriptions::{create_prescription, discontinue_prescription, get_prescription, list_prescriptions, update_prescription};
use crate::models::{PrescriptionDetails, PrescriptionView};
use crate::search::{PrescriptionFilter, Page};

/// `GET /api/prescriptions`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<PrescriptionFilter>,
) -> Result<Json<Page<PrescriptionView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_prescriptions(conn, &actor, &filter))?))
}

/// `POST /api/prescriptions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(details): Body<PrescriptionDetails>,
) -> Result<(StatusCode, Json<PrescriptionView>), ApiError> {
    let view = ctx.run(|conn| create_prescription(conn, &actor, details))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/prescriptions/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<PrescriptionView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_prescription(conn, &actor, &id))?))
}

/// `PUT /api/prescriptions/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<PrescriptionDetails>,
) -> Result<Json<PrescriptionView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_prescription(conn, &actor, &id, details))?))
}

/// `DELETE /api/prescriptions/:id`: marks the prescription inactive and returns it.
pub async fn discontinue(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<PrescriptionView>, ApiError> {
    Ok(Json(ctx.run(|conn| discontinue_prescription(conn, &actor, &id))?))
}
