//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, maps it to an active account,
//! resolves the account's role once, and injects the [`Actor`] into request
//! extensions for downstream handlers.

use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::accounts::{authenticate, resolve_actor};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?.to_string();

    let actor: Actor = ctx.run(|conn| match authenticate(conn, &token)? {
        Some(account) => Ok(Some(resolve_actor(conn, &account)?)),
        None => Ok(None),
    })?
    .ok_or_else(|| {
        tracing::warn!(path = %req.uri().path(), "Rejected unknown bearer token");
        ApiError::Unauthorized
    })?;
    // connection guard dropped here, before any .await

    tracing::debug!(account_id = %actor.account_id, role = ?actor.role, "Authenticated");
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
