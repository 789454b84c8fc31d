//! Lab test orders and results.

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
use crate::models::enums::{ChangeKind, LabTestStatus, NotificationPriority, NotificationType};
use crate::models::{AuditedEntity, LabTest, LabTestDetails, LabTestView};
use crate::notifications::notify;
use crate::patients::{owner_of, referenced_patient};
use crate::search::{visibility, DoctorLink, LabTestFilter, Page};
use crate::validation::validate_lab_test;

fn load(conn: &Connection, id: &Uuid) -> Result<LabTestView, ServiceError> {
    repo::get_lab_test_view(conn, id)?.ok_or(ServiceError::not_found("Lab test"))
}

fn scope_of(conn: &Connection, test: &LabTest) -> Result<RecordScope, ServiceError> {
    let owner_id = owner_of(conn, &test.details.patient_id)?;
    Ok(RecordScope::clinical(owner_id, Some(test.details.doctor_id)))
}

/// Validate a form. A completed test without a completion date is
/// stamped now.
fn prepare(
    conn: &Connection,
    actor: &Actor,
    mut details: LabTestDetails,
    action: &str,
) -> Result<LabTestDetails, ServiceError> {
    if details.status == LabTestStatus::Completed && details.completed_date.is_none() {
        details.completed_date = Some(clinical::now());
    }
    validate_lab_test(&details)?;
    referenced_patient(conn, &details.patient_id)?;
    referenced_doctor(conn, &details.doctor_id)?;
    ensure_own_doctor(actor, Some(details.doctor_id), action)?;
    check_checkup_ref(conn, details.checkup_id, &details.patient_id)?;
    Ok(details)
}

/// Write the test and its history entry; tell the patient's owner when
/// results just became available.
fn save(
    conn: &Connection,
    actor: &Actor,
    test: &LabTest,
    change: ChangeKind,
    newly_completed: bool,
) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    match change {
        ChangeKind::Created => repo::insert_lab_test(&tx, test)?,
        _ => repo::update_lab_test(&tx, test)?,
    }
    append_history(
        &tx,
        AuditedEntity::LabTest,
        &test.id,
        change,
        Some(&actor.account_id),
        &test.updated_at,
        test,
    )?;
    if newly_completed {
        let owner_id = owner_of(&tx, &test.details.patient_id)?;
        notify(
            &tx,
            owner_id,
            NotificationType::LabTest,
            NotificationPriority::High,
            "Lab results available",
            format!("Results for {} are ready.", test.details.test_name),
            Some(format!("/api/lab-tests/{}", test.id)),
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn order_lab_test(
    conn: &Connection,
    actor: &Actor,
    details: LabTestDetails,
) -> Result<LabTestView, ServiceError> {
    ensure_clinician(actor, "order lab test")?;
    let details = prepare(conn, actor, details, "order lab test")?;

    let now = Utc::now();
    let test = LabTest {
        id: Uuid::new_v4(),
        details,
        created_at: now,
        updated_at: now,
    };
    let completed = test.details.status == LabTestStatus::Completed;
    save(conn, actor, &test, ChangeKind::Created, completed)?;

    tracing::info!(
        lab_test_id = %test.id,
        patient_id = %test.details.patient_id,
        test_type = %test.details.test_type,
        "Lab test ordered"
    );
    load(conn, &test.id)
}

pub fn get_lab_test(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<LabTestView, ServiceError> {
    let view = load(conn, id)?;
    ensure_access(actor, &scope_of(conn, &view.lab_test)?, "view lab test")?;
    Ok(view)
}

pub fn update_lab_test(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: LabTestDetails,
) -> Result<LabTestView, ServiceError> {
    ensure_clinician(actor, "edit lab test")?;
    let mut test = load(conn, id)?.lab_test;
    ensure_access(actor, &scope_of(conn, &test)?, "edit lab test")?;
    let details = prepare(conn, actor, details, "edit lab test")?;

    let newly_completed = test.details.status != LabTestStatus::Completed
        && details.status == LabTestStatus::Completed;
    test.details = details;
    test.updated_at = Utc::now();
    save(conn, actor, &test, ChangeKind::Updated, newly_completed)?;

    tracing::info!(lab_test_id = %test.id, status = %test.details.status, "Lab test updated");
    load(conn, &test.id)
}

/// Soft delete: the order moves to Cancelled.
pub fn cancel_lab_test(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<LabTestView, ServiceError> {
    ensure_clinician(actor, "cancel lab test")?;
    let mut test = load(conn, id)?.lab_test;
    ensure_access(actor, &scope_of(conn, &test)?, "cancel lab test")?;
    if test.details.status == LabTestStatus::Cancelled {
        return load(conn, id);
    }

    test.details.status = LabTestStatus::Cancelled;
    test.updated_at = Utc::now();
    save(conn, actor, &test, ChangeKind::Deactivated, false)?;

    tracing::info!(lab_test_id = %test.id, "Lab test cancelled");
    load(conn, &test.id)
}

pub fn list_lab_tests(
    conn: &Connection,
    actor: &Actor,
    filter: &LabTestFilter,
) -> Result<Page<LabTestView>, ServiceError> {
    let mut conditions = visibility(actor, DoctorLink::Required("l.doctor_id"));
    filter.apply(&mut conditions);
    Ok(repo::list_lab_tests(conn, &conditions, PER_PAGE, filter.page.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Account;
    use serde_json::json;

    fn actor(account: &Account, role: Role) -> Actor {
        Actor {
            account_id: account.id,
            username: account.username.clone(),
            role,
        }
    }

    fn details(patient_id: Uuid, doctor_id: Uuid) -> LabTestDetails {
        serde_json::from_value(json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "test_type": "Blood",
            "test_name": "CBC",
            "test_description": "Complete blood count",
            "ordered_date": "2024-03-01T09:00:00"
        }))
        .unwrap()
    }

    #[test]
    fn completion_notifies_owner_once() {
        let conn = open_memory_database().unwrap();
        let doc_account = fixtures::account(&conn, "grey", false);
        let doctor = fixtures::doctor(&conn, doc_account.id, "LIC-1");
        let owner = fixtures::account(&conn, "pat", false);
        let patient = fixtures::patient(&conn, owner.id, "Asha", "Rao");
        let doc = actor(&doc_account, Role::Doctor { doctor_id: doctor.id });

        let view = order_lab_test(&conn, &doc, details(patient.id, doctor.id)).unwrap();
        assert_eq!(view.lab_test.details.status, LabTestStatus::Ordered);
        assert_eq!(repo::count_unread_notifications(&conn, &owner.id).unwrap(), 0);

        let mut d = view.lab_test.details.clone();
        d.status = LabTestStatus::Completed;
        d.results = Some("Normal".into());
        let view = update_lab_test(&conn, &doc, &view.lab_test.id, d.clone()).unwrap();
        assert!(view.lab_test.details.completed_date.is_some());
        assert_eq!(repo::count_unread_notifications(&conn, &owner.id).unwrap(), 1);

        // saving again while already completed does not notify twice
        update_lab_test(&conn, &doc, &view.lab_test.id, view.lab_test.details.clone()).unwrap();
        assert_eq!(repo::count_unread_notifications(&conn, &owner.id).unwrap(), 1);
    }

    #[test]
    fn completed_before_ordered_rejected() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let doctor = fixtures::doctor(&conn, staff.id, "LIC-1");
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let mut d = details(patient.id, doctor.id);
        d.completed_date = Some(d.ordered_date - chrono::Duration::days(1));

        let ServiceError::Validation(errors) =
            order_lab_test(&conn, &actor(&staff, Role::Staff), d).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.get("completed_date").is_some());
    }

    #[test]
    fn owner_lists_own_tests_and_cancel_is_clinician_only() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let doctor = fixtures::doctor(&conn, staff.id, "LIC-1");
        let owner = fixtures::account(&conn, "pat", false);
        let stranger = fixtures::account(&conn, "stranger", false);
        let patient = fixtures::patient(&conn, owner.id, "Asha", "Rao");
        let staff = actor(&staff, Role::Staff);
        let owner = actor(&owner, Role::Patient);

        let id = order_lab_test(&conn, &staff, details(patient.id, doctor.id))
            .unwrap()
            .lab_test
            .id;
        let filter = LabTestFilter::default();
        assert_eq!(list_lab_tests(&conn, &owner, &filter).unwrap().total, 1);
        assert_eq!(
            list_lab_tests(&conn, &actor(&stranger, Role::Patient), &filter).unwrap().total,
            0
        );

        assert!(matches!(
            cancel_lab_test(&conn, &owner, &id),
            Err(ServiceError::PermissionDenied)
        ));
        let view = cancel_lab_test(&conn, &staff, &id).unwrap();
        assert_eq!(view.lab_test.details.status, LabTestStatus::Cancelled);
    }
}
