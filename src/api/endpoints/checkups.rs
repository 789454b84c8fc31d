//! Checkup records.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::{Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::checkups::{create_checkup, get_checkup, list_checkups, update_checkup};
use crate::models::{CheckupDetails, CheckupView};
use crate::search::{CheckupFilter, Page};

/// `GET /api/checkups`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<CheckupFilter>,
) -> Result<Json<Page<CheckupView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_checkups(conn, &actor, &filter))?))
}

/// `POST /api/checkups`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(details): Body<CheckupDetails>,
) -> Result<(StatusCode, Json<CheckupView>), ApiError> {
    let view = ctx.run(|conn| create_checkup(conn, &actor, details))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<CheckupView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_checkup(conn, &actor, &id))?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<CheckupDetails>,
) -> Result<Json<CheckupView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_checkup(conn, &actor, &id, details))?))
}
