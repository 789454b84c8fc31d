//! JSON API over the record services.
//!
//! Routes are nested under `/api/` and protected by a middleware stack:
//! Auth → Audit → Handler. `api_router()` returns a composable `Router`;
//! `server::start_server()` binds and runs it.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ServerError};
pub use types::ApiContext;
