//! Prescriptions written by staff or doctors.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{ensure_access, ensure_clinician, ensure_own_doctor, Actor, RecordScope};
use crate::checkups::check_checkup_ref;
use crate::clinical;
use crate::config::PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::doctors::referenced_doctor;
use crate::error::ServiceError;
use crate::models::enums::{ChangeKind, PrescriptionStatus};
use crate::models::{AuditedEntity, Prescription, PrescriptionDetails, PrescriptionView};
use crate::patients::{owner_of, referenced_patient};
use crate::search::{visibility, DoctorLink, Page, PrescriptionFilter};
use crate::validation::validate_prescription;

fn load(conn: &Connection, id: &Uuid) -> Result<PrescriptionView, ServiceError> {
    repo::get_prescription_view(conn, id)?.ok_or(ServiceError::not_found("Prescription"))
}

fn scope_of(conn: &Connection, rx: &Prescription) -> Result<RecordScope, ServiceError> {
    let owner_id = owner_of(conn, &rx.details.patient_id)?;
    Ok(RecordScope::clinical(owner_id, Some(rx.details.doctor_id)))
}

fn check(
    conn: &Connection,
    actor: &Actor,
    details: &PrescriptionDetails,
    action: &str,
) -> Result<(), ServiceError> {
    validate_prescription(details)?;
    referenced_patient(conn, &details.patient_id)?;
    referenced_doctor(conn, &details.doctor_id)?;
    ensure_own_doctor(actor, Some(details.doctor_id), action)?;
    check_checkup_ref(conn, details.checkup_id, &details.patient_id)
}

fn save(
    conn: &Connection,
    actor: &Actor,
    rx: &Prescription,
    change: ChangeKind,
) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    match change {
        ChangeKind::Created => repo::insert_prescription(&tx, rx)?,
        _ => repo::update_prescription(&tx, rx)?,
    }
    append_history(
        &tx,
        AuditedEntity::Prescription,
        &rx.id,
        change,
        Some(&actor.account_id),
        &rx.updated_at,
        rx,
    )?;
    tx.commit()?;
    Ok(())
}

pub fn create_prescription(
    conn: &Connection,
    actor: &Actor,
    details: PrescriptionDetails,
) -> Result<PrescriptionView, ServiceError> {
    ensure_clinician(actor, "create prescription")?;
    check(conn, actor, &details, "create prescription")?;

    let now = Utc::now();
    let rx = Prescription {
        id: Uuid::new_v4(),
        details,
        prescribed_date: clinical::now(),
        created_at: now,
        updated_at: now,
    };
    save(conn, actor, &rx, ChangeKind::Created)?;

    tracing::info!(
        prescription_id = %rx.id,
        patient_id = %rx.details.patient_id,
        "Prescription created"
    );
    load(conn, &rx.id)
}

pub fn get_prescription(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
) -> Result<PrescriptionView, ServiceError> {
    let view = load(conn, id)?;
    ensure_access(actor, &scope_of(conn, &view.prescription)?, "view prescription")?;
    Ok(view)
}

pub fn update_prescription(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: PrescriptionDetails,
) -> Result<PrescriptionView, ServiceError> {
    ensure_clinician(actor, "edit prescription")?;
    let mut rx = load(conn, id)?.prescription;
    ensure_access(actor, &scope_of(conn, &rx)?, "edit prescription")?;
    check(conn, actor, &details, "edit prescription")?;

    rx.details = details;
    rx.updated_at = Utc::now();
    save(conn, actor, &rx, ChangeKind::Updated)?;

    tracing::info!(prescription_id = %rx.id, status = %rx.details.status, "Prescription updated");
    load(conn, &rx.id)
}

/// Soft delete: the prescription moves to Discontinued.
pub fn discontinue_prescription(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
) -> Result<PrescriptionView, ServiceError> {
    ensure_clinician(actor, "discontinue prescription")?;
    let mut rx = load(conn, id)?.prescription;
    ensure_access(actor, &scope_of(conn, &rx)?, "discontinue prescription")?;
    if rx.details.status == PrescriptionStatus::Discontinued {
        return load(conn, id);
    }

    rx.details.status = PrescriptionStatus::Discontinued;
    rx.updated_at = Utc::now();
    save(conn, actor, &rx, ChangeKind::Deactivated)?;

    tracing::info!(prescription_id = %rx.id, "Prescription discontinued");
    load(conn, &rx.id)
}

/// Staff see all; doctors their own.
pub fn list_prescriptions(
    conn: &Connection,
    actor: &Actor,
    filter: &PrescriptionFilter,
) -> Result<Page<PrescriptionView>, ServiceError> {
    ensure_clinician(actor, "list prescriptions")?;
    let mut conditions = visibility(actor, DoctorLink::Required("r.doctor_id"));
    filter.apply(&mut conditions);
    Ok(repo::list_prescriptions(conn, &conditions, PER_PAGE, filter.page.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Account;
    use crate::validation::NON_FIELD;
    use serde_json::json;

    fn actor(account: &Account, role: Role) -> Actor {
        Actor {
            account_id: account.id,
            username: account.username.clone(),
            role,
        }
    }

    fn details(patient_id: Uuid, doctor_id: Uuid, end: &str) -> PrescriptionDetails {
        serde_json::from_value(json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "medication_name": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "Twice daily",
            "duration": "7 days",
            "instructions": "After meals",
            "start_date": "2024-01-10",
            "end_date": end
        }))
        .unwrap()
    }

    #[test]
    fn end_date_must_follow_start_date() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let doctor = fixtures::doctor(&conn, staff.id, "LIC-1");
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");

        let err = create_prescription(
            &conn,
            &actor(&staff, Role::Staff),
            details(patient.id, doctor.id, "2024-01-10"),
        )
        .unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get(NON_FIELD).unwrap()[0],
            "End date must be after start date."
        );
    }

    #[test]
    fn discontinue_is_terminal_soft_delete() {
        let conn = open_memory_database().unwrap();
        let doc_account = fixtures::account(&conn, "grey", false);
        let doctor = fixtures::doctor(&conn, doc_account.id, "LIC-1");
        let owner = fixtures::account(&conn, "pat", false);
        let patient = fixtures::patient(&conn, owner.id, "Asha", "Rao");
        let doc = actor(&doc_account, Role::Doctor { doctor_id: doctor.id });

        let view = create_prescription(&conn, &doc, details(patient.id, doctor.id, "2024-01-17")).unwrap();
        assert_eq!(view.prescription.details.status, PrescriptionStatus::Active);
        assert_eq!(view.doctor_name, "Dr. GREY Tester");

        let id = view.prescription.id;
        let view = discontinue_prescription(&conn, &doc, &id).unwrap();
        assert_eq!(view.prescription.details.status, PrescriptionStatus::Discontinued);
        let history = repo::list_history(&conn, AuditedEntity::Prescription, &id).unwrap();
        assert_eq!(history.last().map(|h| h.change), Some(ChangeKind::Deactivated));

        // owner can read, not list
        let owner = actor(&owner, Role::Patient);
        assert!(get_prescription(&conn, &owner, &id).is_ok());
        assert!(matches!(
            list_prescriptions(&conn, &owner, &PrescriptionFilter::default()),
            Err(ServiceError::PermissionDenied)
        ));
    }

    #[test]
    fn doctors_list_only_their_own() {
        let conn = open_memory_database().unwrap();
        let staff_account = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff_account.id, "Asha", "Rao");
        let a = fixtures::account(&conn, "a", false);
        let b = fixtures::account(&conn, "b", false);
        let doc_a = fixtures::doctor(&conn, a.id, "LIC-1");
        let doc_b = fixtures::doctor(&conn, b.id, "LIC-2");
        let staff = actor(&staff_account, Role::Staff);
        create_prescription(&conn, &staff, details(patient.id, doc_a.id, "2024-01-17")).unwrap();
        create_prescription(&conn, &staff, details(patient.id, doc_b.id, "2024-01-17")).unwrap();

        let filter = PrescriptionFilter::default();
        let a = actor(&a, Role::Doctor { doctor_id: doc_a.id });
        assert_eq!(list_prescriptions(&conn, &staff, &filter).unwrap().total, 2);
        assert_eq!(list_prescriptions(&conn, &a, &filter).unwrap().total, 1);
        assert!(matches!(
            create_prescription(&conn, &a, details(patient.id, doc_b.id, "2024-01-17")),
            Err(ServiceError::PermissionDenied)
        ));
    }
}
