//! Service-layer errors shared by every record operation.

use thiserror::Error;

use crate::attachments::AttachmentError;
use crate::db::DatabaseError;
use crate::validation::ValidationErrors;

/// Message returned for every refused access, whatever the record.
pub const PERMISSION_DENIED_MESSAGE: &str = "You don't have permission to access this record.";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{PERMISSION_DENIED_MESSAGE}")]
    PermissionDenied,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str) -> Self {
        ServiceError::NotFound { entity }
    }

    /// Field-level error for a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ServiceError::Validation(ValidationErrors::single(field, message))
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { .. } => ServiceError::NotFound { entity: "Record" },
            other => ServiceError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlite(err))
    }
}

/// Turn a UNIQUE-index rejection into a field error; pass anything else on.
pub(crate) fn unique_as_field(
    err: DatabaseError,
    field: &str,
    message: &str,
) -> ServiceError {
    if err.is_unique_violation() {
        ServiceError::invalid(field, message)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_message_is_uniform() {
        assert_eq!(
            ServiceError::PermissionDenied.to_string(),
            "You don't have permission to access this record."
        );
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: ServiceError = DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: "x".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
