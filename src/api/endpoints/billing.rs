//! Bills and payments.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::{Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::billing::{cancel_billing, create_billing, get_billing, list_billings, update_billing};
use crate::models::{BillingDetails, BillingView};
use crate::search::{BillingFilter, Page};

/// `GET /api/billing`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<BillingFilter>,
) -> Result<Json<Page<BillingView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_billings(conn, &actor, &filter))?))
}

/// `POST /api/billing`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(details): Body<BillingDetails>,
) -> Result<(StatusCode, Json<BillingView>), ApiError> {
    let view = ctx.run(|conn| create_billing(conn, &actor, details))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/billing/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<BillingView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_billing(conn, &actor, &id))?))
}

/// `PUT /api/billing/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<BillingDetails>,
) -> Result<Json<BillingView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_billing(conn, &actor, &id, details))?))
}

/// `DELETE /api/billing/:id`: moves the bill to Cancelled.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<BillingView>, ApiError> {
    Ok(Json(ctx.run(|conn| cancel_billing(conn, &actor, &id))?))
}
