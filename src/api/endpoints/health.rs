//! Liveness check.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::APP_VERSION;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`: unauthenticated. Fails with 500 if the store is
/// unusable.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    drop(ctx.core.db()?);
    Ok(Json(HealthResponse {
        status: "ok",
        version: APP_VERSION,
    }))
}
