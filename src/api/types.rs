//! Shared request context for the API.

use std::sync::Arc;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::error::ServiceError;

/// Shared state for all API handlers and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run one synchronous service call under the connection lock.
    ///
    /// The guard is released when this returns, so callers may `.await`
    /// freely afterwards.
    pub fn run<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, ServiceError>,
    ) -> Result<T, ApiError> {
        let conn = self.core.db()?;
        Ok(op(&conn)?)
    }
}
