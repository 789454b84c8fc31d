//! Appointment booking and status workflow.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::{Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::appointments::{
    book_appointment, change_status, get_appointment, list_appointments, update_appointment,
    StatusChange,
};
use crate::authorization::Actor;
use crate::models::{AppointmentDetails, AppointmentView};
use crate::search::{AppointmentFilter, Page};

/// `GET /api/appointments`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<AppointmentFilter>,
) -> Result<Json<Page<AppointmentView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_appointments(conn, &actor, &filter))?))
}

/// `POST /api/appointments`
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(details): Body<AppointmentDetails>,
) -> Result<(StatusCode, Json<AppointmentView>), ApiError> {
    let view = ctx.run(|conn| book_appointment(conn, &actor, details))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<AppointmentView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_appointment(conn, &actor, &id))?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<AppointmentDetails>,
) -> Result<Json<AppointmentView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_appointment(conn, &actor, &id, details))?))
}

/// `POST /api/appointments/:id/status`: `{"status": "Confirmed"}`.
pub async fn set_status(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(change): Body<StatusChange>,
) -> Result<Json<AppointmentView>, ApiError> {
    Ok(Json(ctx.run(|conn| change_status(conn, &actor, &id, change.status))?))
}
