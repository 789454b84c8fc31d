//! Notification inbox of the calling account.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::endpoints::{Filter, Id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::models::Notification;
use crate::notifications::{list_notifications, mark_read, NotificationPage};
use crate::search::NotificationFilter;

/// `GET /api/notifications?unread=true`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Filter(filter): Filter<NotificationFilter>,
) -> Result<Json<NotificationPage>, ApiError> {
    Ok(Json(ctx.run(|conn| list_notifications(conn, &actor, &filter))?))
}

/// `POST /api/notifications/:id/read`
pub async fn read(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Id(id): Id,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(ctx.run(|conn| mark_read(conn, &actor, &id))?))
}
