//! Doctor profiles.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::{Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::doctors::{create_doctor, deactivate_doctor, get_doctor, list_doctors, update_doctor, NewDoctor};
use crate::models::{DoctorDetails, DoctorView};
use crate::search::{DoctorFilter, Page};

/// `GET /api/doctors`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<DoctorFilter>,
) -> Result<Json<Page<DoctorView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_doctors(conn, &actor, &filter))?))
}

/// `POST /api/doctors`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(new): Body<NewDoctor>,
) -> Result<(StatusCode, Json<DoctorView>), ApiError> {
    let view = ctx.run(|conn| create_doctor(conn, &actor, new))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/doctors/:id`: any signed-in account may view a profile.
pub async fn get(
    State(ctx): State<ApiContext>,
    Id(id): Id,
) -> Result<Json<DoctorView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_doctor(conn, &id))?))
}

/// `PUT /api/doctors/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<DoctorDetails>,
) -> Result<Json<DoctorView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_doctor(conn, &actor, &id, details))?))
}

/// `DELETE /api/doctors/:id`: hides the profile from lists and pickers.
pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<StatusCode, ApiError> {
    ctx.run(|conn| deactivate_doctor(conn, &actor, &id))?;
    Ok(StatusCode::NO_CONTENT)
}
