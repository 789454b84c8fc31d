//! Version log of a single record.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::history::entity_history;
use crate::models::HistoryEntry;

/// `GET /api/history/:entity/:id`: oldest version first.
pub async fn versions(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    path: Result<Path<(String, Uuid)>, axum::extract::rejection::PathRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Path((entity, id)) = path?;
    Ok(Json(ctx.run(|conn| entity_history(conn, &actor, &entity, &id))?))
}
