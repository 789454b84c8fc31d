//! Audit logging middleware.
//!
//! Logs every API request with account, method, path, and response
//! status. Runs innermost (after auth has injected the Actor).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::core_state::audit_row;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let account_id = req
        .extensions()
        .get::<Actor>()
        .map(|actor| actor.account_id.to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16();
    tracing::info!(
        account_id = account_id.as_deref().unwrap_or("-"),
        %method,
        %path,
        status,
        "API request"
    );
    if let Some(ctx) = ctx {
        ctx.core
            .log_request(audit_row(account_id, &method, &path, status));
    }

    response
}
