//! Home dashboard, aggregate stats and report totals.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::home::{self, Dashboard, DashboardStats, ReportTotals};

/// `GET /api/dashboard`
pub async fn overview(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(ctx.run(|conn| home::dashboard(conn, &actor))?))
}

/// `GET /api/dashboard/stats`
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(ctx.run(|conn| home::dashboard_stats(conn, &actor))?))
}

/// `GET /api/reports`
pub async fn reports(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ReportTotals>, ApiError> {
    Ok(Json(ctx.run(|conn| home::report_totals(conn, &actor))?))
}
