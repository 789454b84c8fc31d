//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Auth validator → 2. Audit logger

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{self, HeaderValue};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::AppConfig;
use crate::core_state::CoreState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Build the API router.
///
/// Every route except `/api/health` requires a bearer token.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    use endpoints::*;

    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/dashboard", get(dashboard::overview))
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/reports", get(dashboard::reports))
        .route("/accounts", post(accounts::create))
        .route("/patients", get(patients::list).post(patients::register))
        .route("/patients/search", get(patients::search))
        .route(
            "/patients/:id",
            get(patients::get)
                .put(patients::update)
                .delete(patients::deactivate),
        )
        .route(
            "/patients/:id/photo",
            get(patients::photo).post(patients::upload_photo),
        )
        .route("/checkups", get(checkups::list).post(checkups::create))
        .route("/checkups/:id", get(checkups::get).put(checkups::update))
        .route(
            "/appointments",
            get(appointments::list).post(appointments::book),
        )
        .route(
            "/appointments/:id",
            get(appointments::get).put(appointments::update),
        )
        .route("/appointments/:id/status", post(appointments::set_status))
        .route("/doctors", get(doctors::list).post(doctors::create))
        .route(
            "/doctors/:id",
            get(doctors::get)
                .put(doctors::update)
                .delete(doctors::deactivate),
        )
        .route(
            "/prescriptions",
            get(prescriptions::list).post(prescriptions::create),
        )
        .route(
            "/prescriptions/:id",
            get(prescriptions::get)
                .put(prescriptions::update)
                .delete(prescriptions::discontinue),
        )
        .route(
            "/medical-records",
            get(medical_records::list).post(medical_records::create),
        )
        .route(
            "/medical-records/:id",
            get(medical_records::get)
                .put(medical_records::update)
                .delete(medical_records::deactivate),
        )
        .route(
            "/medical-records/:id/attachment",
            get(medical_records::download).post(medical_records::upload),
        )
        .route("/lab-tests", get(lab_tests::list).post(lab_tests::create))
        .route(
            "/lab-tests/:id",
            get(lab_tests::get)
                .put(lab_tests::update)
                .delete(lab_tests::cancel),
        )
        .route("/billing", get(billing::list).post(billing::create))
        .route(
            "/billing/:id",
            get(billing::get)
                .put(billing::update)
                .delete(billing::cancel),
        )
        .route("/employees", get(employees::list).post(employees::create))
        .route(
            "/employees/:id",
            get(employees::get)
                .put(employees::update)
                .delete(employees::deactivate),
        )
        .route("/notifications", get(notifications::list))
        .route("/notifications/:id/read", post(notifications::read))
        .route("/history/:entity/:id", get(history::versions))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (audited, no auth required)
    let unprotected = Router::new()
        .route("/health", get(health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx.clone()));

    let config = &ctx.core.config;
    let body_limit = usize::try_from(config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(config))
}

/// Cross-origin access for a configured browser front end; same-origin only
/// when none is set.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match config
        .cors_origin
        .as_deref()
        .map(HeaderValue::from_str)
    {
        Some(Ok(origin)) => layer.allow_origin(AllowOrigin::exact(origin)),
        Some(Err(_)) => {
            tracing::warn!("Ignoring unparseable CORS origin");
            layer
        }
        None => layer,
    }
}
