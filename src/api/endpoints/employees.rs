//! Employee register. Staff only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::{Body, Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::employees::{create_employee, deactivate_employee, get_employee, list_employees, update_employee, NewEmployee};
use crate::models::{EmployeeDetails, EmployeeView};
use crate::search::{EmployeeFilter, Page};

/// `GET /api/employees`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<EmployeeFilter>,
) -> Result<Json<Page<EmployeeView>>, ApiError> {
    Ok(Json(ctx.run(|conn| list_employees(conn, &actor, &filter))?))
}

/// `POST /api/employees`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Body(new): Body<NewEmployee>,
) -> Result<(StatusCode, Json<EmployeeView>), ApiError> {
    let view = ctx.run(|conn| create_employee(conn, &actor, new))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<EmployeeView>, ApiError> {
    Ok(Json(ctx.run(|conn| get_employee(conn, &actor, &id))?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
    Body(details): Body<EmployeeDetails>,
) -> Result<Json<EmployeeView>, ApiError> {
    Ok(Json(ctx.run(|conn| update_employee(conn, &actor, &id, details))?))
}

/// `DELETE /api/employees/:id`: soft delete.
pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<StatusCode, ApiError> {
    ctx.run(|conn| deactivate_employee(conn, &actor, &id))?;
    Ok(StatusCode::NO_CONTENT)
}
