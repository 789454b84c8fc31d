//! Read side of the version log.

use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{ensure_staff, Actor};
use crate::db::repository as repo;
use crate::error::ServiceError;
use crate::models::{AuditedEntity, HistoryEntry};

/// Versions of one entity, oldest first. Staff only.
///
/// `entity` takes the URL segment (`patients`, `lab-tests`, ...) or the
/// storage name. An entity with no versions is reported as not found.
pub fn entity_history(
    conn: &Connection,
    actor: &Actor,
    entity: &str,
    id: &Uuid,
) -> Result<Vec<HistoryEntry>, ServiceError> {
    ensure_staff(actor, "view history")?;
    let kind = AuditedEntity::from_path(entity).ok_or(ServiceError::not_found("Entity type"))?;
    let entries = repo::list_history(conn, kind, id)?;
    if entries.is_empty() {
        return Err(ServiceError::not_found("History"));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ChangeKind;
    use crate::patients::{register_patient, update_patient};

    #[test]
    fn staff_reads_versions_in_order() {
        let conn = open_memory_database().unwrap();
        let desk = fixtures::account(&conn, "desk", true);
        let staff = Actor {
            account_id: desk.id,
            username: desk.username.clone(),
            role: Role::Staff,
        };
        let details = fixtures::patient_details("Asha", "Rao", "1990-05-01");
        let view = register_patient(&conn, &staff, details.clone()).unwrap();
        let mut edited = details;
        edited.occupation = Some("Teacher".into());
        update_patient(&conn, &staff, &view.patient.id, edited).unwrap();

        let entries = entity_history(&conn, &staff, "patients", &view.patient.id).unwrap();
        let versions: Vec<i64> = entries.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(entries[0].change, ChangeKind::Created);
        assert_eq!(entries[1].snapshot["occupation"], "Teacher");
        assert_eq!(entries[1].changed_by, Some(desk.id));
    }

    #[test]
    fn unknown_entity_and_non_staff() {
        let conn = open_memory_database().unwrap();
        let desk = fixtures::account(&conn, "desk", true);
        let staff = Actor {
            account_id: desk.id,
            username: desk.username.clone(),
            role: Role::Staff,
        };
        let id = Uuid::new_v4();
        assert!(matches!(
            entity_history(&conn, &staff, "invoices", &id),
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            entity_history(&conn, &staff, "patients", &id),
            Err(ServiceError::NotFound { .. })
        ));

        let patient = Actor {
            role: Role::Patient,
            ..staff
        };
        assert!(matches!(
            entity_history(&conn, &patient, "patients", &id),
            Err(ServiceError::PermissionDenied)
        ));
    }
}
