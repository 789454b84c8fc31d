//! Appointment booking, edits and the status lifecycle.
//!
//! Status only moves through [`crate::scheduling::transition`]; edits never
//! touch it.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{ensure_access, ensure_allowed, ensure_own_doctor, Actor, RecordScope};
use crate::clinical;
use crate::config::PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::doctors::referenced_doctor;
use crate::error::ServiceError;
use crate::models::enums::{AppointmentStatus, ChangeKind, NotificationPriority, NotificationType};
use crate::models::{Appointment, AppointmentDetails, AppointmentView, AuditedEntity, Doctor, Patient};
use crate::notifications::notify;
use crate::patients::{owner_of, referenced_patient};
use crate::scheduling::{transition, Transition};
use crate::search::{visibility, AppointmentFilter, DoctorLink, Page};
use crate::validation::validate_appointment;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
}

fn load(conn: &Connection, id: &Uuid) -> Result<AppointmentView, ServiceError> {
    repo::get_appointment_view(conn, id)?.ok_or(ServiceError::not_found("Appointment"))
}

/// Owning account of the appointment's patient, and the access scope.
fn scope_of(conn: &Connection, appt: &Appointment) -> Result<(Uuid, RecordScope), ServiceError> {
    let owner_id = owner_of(conn, &appt.details.patient_id)?;
    Ok((owner_id, RecordScope::clinical(owner_id, Some(appt.details.doctor_id))))
}

fn action_url(id: &Uuid) -> Option<String> {
    Some(format!("/api/appointments/{id}"))
}

/// Patient and doctor named in the form must exist, the patient must be
/// visible to the actor, and a doctor may only book with themselves.
fn check_references(
    conn: &Connection,
    actor: &Actor,
    details: &AppointmentDetails,
    action: &str,
) -> Result<(Patient, Doctor), ServiceError> {
    let patient = referenced_patient(conn, &details.patient_id)?;
    ensure_access(
        actor,
        &RecordScope::PatientOwned {
            owner_id: patient.owner_id,
        },
        action,
    )?;
    let doctor = referenced_doctor(conn, &details.doctor_id)?;
    ensure_own_doctor(actor, Some(doctor.id), action)?;
    Ok((patient, doctor))
}

pub fn book_appointment(
    conn: &Connection,
    actor: &Actor,
    details: AppointmentDetails,
) -> Result<AppointmentView, ServiceError> {
    validate_appointment(&details, clinical::now(), true)?;
    let (patient, doctor) = check_references(conn, actor, &details, "book appointment")?;

    let now = Utc::now();
    let appt = Appointment {
        id: Uuid::new_v4(),
        details,
        status: AppointmentStatus::Scheduled,
        created_at: now,
        updated_at: now,
    };
    let when = appt.details.appointment_date.format("%Y-%m-%d %H:%M").to_string();

    let tx = conn.unchecked_transaction()?;
    repo::insert_appointment(&tx, &appt)?;
    append_history(
        &tx,
        AuditedEntity::Appointment,
        &appt.id,
        ChangeKind::Created,
        Some(&actor.account_id),
        &now,
        &appt,
    )?;
    notify(
        &tx,
        patient.owner_id,
        NotificationType::Appointment,
        NotificationPriority::Medium,
        "Appointment scheduled",
        format!("An appointment for {} was booked for {when}.", patient.full_name()),
        action_url(&appt.id),
    )?;
    if doctor.account_id != patient.owner_id {
        notify(
            &tx,
            doctor.account_id,
            NotificationType::Appointment,
            NotificationPriority::Medium,
            "New appointment",
            format!("{} booked an appointment with you for {when}.", patient.full_name()),
            action_url(&appt.id),
        )?;
    }
    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        patient_id = %appt.details.patient_id,
        doctor_id = %appt.details.doctor_id,
        "Appointment booked"
    );
    load(conn, &appt.id)
}

pub fn get_appointment(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<AppointmentView, ServiceError> {
    let view = load(conn, id)?;
    let (_, scope) = scope_of(conn, &view.appointment)?;
    ensure_access(actor, &scope, "view appointment")?;
    Ok(view)
}

/// Edit booking details. A past date is kept as-is on edit.
pub fn update_appointment(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: AppointmentDetails,
) -> Result<AppointmentView, ServiceError> {
    let mut appt = load(conn, id)?.appointment;
    let (_, scope) = scope_of(conn, &appt)?;
    ensure_access(actor, &scope, "edit appointment")?;
    validate_appointment(&details, clinical::now(), false)?;
    check_references(conn, actor, &details, "edit appointment")?;

    appt.details = details;
    appt.updated_at = Utc::now();

    let tx = conn.unchecked_transaction()?;
    repo::update_appointment(&tx, &appt)?;
    append_history(
        &tx,
        AuditedEntity::Appointment,
        &appt.id,
        ChangeKind::Updated,
        Some(&actor.account_id),
        &appt.updated_at,
        &appt,
    )?;
    tx.commit()?;

    tracing::info!(appointment_id = %appt.id, "Appointment updated");
    load(conn, &appt.id)
}

/// Staff and the assigned doctor drive the lifecycle; the owning patient
/// may only cancel.
pub fn change_status(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    requested: AppointmentStatus,
) -> Result<AppointmentView, ServiceError> {
    let view = load(conn, id)?;
    let mut appt = view.appointment;
    let (owner_id, scope) = scope_of(conn, &appt)?;
    ensure_access(actor, &scope, "change appointment status")?;

    let may_drive = actor.is_staff() || actor.doctor_id() == Some(appt.details.doctor_id);
    let owner_cancel = owner_id == actor.account_id && requested == AppointmentStatus::Cancelled;
    ensure_allowed(actor, may_drive || owner_cancel, "change appointment status")?;

    let next = match transition(appt.status, requested)? {
        Transition::Unchanged => return load(conn, id),
        Transition::Move(next) => next,
    };
    let previous = appt.status;
    appt.status = next;
    appt.updated_at = Utc::now();

    let tx = conn.unchecked_transaction()?;
    repo::update_appointment(&tx, &appt)?;
    append_history(
        &tx,
        AuditedEntity::Appointment,
        &appt.id,
        ChangeKind::Updated,
        Some(&actor.account_id),
        &appt.updated_at,
        &appt,
    )?;
    let priority = if next == AppointmentStatus::Cancelled {
        NotificationPriority::High
    } else {
        NotificationPriority::Medium
    };
    notify(
        &tx,
        owner_id,
        NotificationType::Appointment,
        priority,
        format!("Appointment {}", next.as_str().to_lowercase()),
        format!(
            "The appointment for {} on {} is now {next}.",
            view.patient_name,
            appt.details.appointment_date.format("%Y-%m-%d %H:%M")
        ),
        action_url(&appt.id),
    )?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        from = %previous,
        to = %next,
        "Appointment status changed"
    );
    load(conn, &appt.id)
}

/// Doctors see their own appointments, patients those of their patients.
pub fn list_appointments(
    conn: &Connection,
    actor: &Actor,
    filter: &AppointmentFilter,
) -> Result<Page<AppointmentView>, ServiceError> {
    let mut conditions = visibility(actor, DoctorLink::Required("a.doctor_id"));
    filter.apply(&mut conditions, clinical::today());
    Ok(repo::list_appointments(conn, &conditions, PER_PAGE, filter.page.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Account;
    use crate::search::NotificationFilter;
    use chrono::{Duration, NaiveDateTime};

    struct Clinic {
        conn: Connection,
        staff: Actor,
        owner: Actor,
        doctor: Doctor,
        doctor_actor: Actor,
        patient: Patient,
    }

    fn actor(account: &Account, role: Role) -> Actor {
        Actor {
            account_id: account.id,
            username: account.username.clone(),
            role,
        }
    }

    fn clinic() -> Clinic {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let owner = fixtures::account(&conn, "pat", false);
        let doc_account = fixtures::account(&conn, "grey", false);
        let doctor = fixtures::doctor(&conn, doc_account.id, "LIC-1");
        let patient = fixtures::patient(&conn, owner.id, "Asha", "Rao");
        Clinic {
            staff: actor(&staff, Role::Staff),
            owner: actor(&owner, Role::Patient),
            doctor_actor: actor(&doc_account, Role::Doctor { doctor_id: doctor.id }),
            doctor,
            patient,
            conn,
        }
    }

    fn tomorrow() -> NaiveDateTime {
        clinical::now() + Duration::days(1)
    }

    fn details(c: &Clinic, at: NaiveDateTime) -> AppointmentDetails {
        serde_json::from_value(serde_json::json!({
            "patient_id": c.patient.id,
            "doctor_id": c.doctor.id,
            "appointment_date": at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "reason": "Cough"
        }))
        .unwrap()
    }

    #[test]
    fn booking_notifies_owner_and_doctor() {
        let c = clinic();
        let view = book_appointment(&c.conn, &c.owner, details(&c, tomorrow())).unwrap();
        assert_eq!(view.appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(view.patient_name, "Asha Rao");

        let unread = |a: &Actor| repo::count_unread_notifications(&c.conn, &a.account_id).unwrap();
        assert_eq!(unread(&c.owner), 1);
        assert_eq!(unread(&c.doctor_actor), 1);
        let history =
            repo::list_history(&c.conn, AuditedEntity::Appointment, &view.appointment.id).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn past_date_rejected_at_creation() {
        let c = clinic();
        let err = book_appointment(&c.conn, &c.staff, details(&c, clinical::now() - Duration::days(1)))
            .unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.get("appointment_date").is_some());
    }

    #[test]
    fn doctor_books_only_with_themselves() {
        let c = clinic();
        let other_account = fixtures::account(&c.conn, "other", false);
        let other = fixtures::doctor(&c.conn, other_account.id, "LIC-2");
        let mut d = details(&c, tomorrow());
        d.doctor_id = other.id;
        assert!(matches!(
            book_appointment(&c.conn, &c.doctor_actor, d),
            Err(ServiceError::PermissionDenied)
        ));
        assert!(book_appointment(&c.conn, &c.doctor_actor, details(&c, tomorrow())).is_ok());
    }

    #[test]
    fn stranger_cannot_book_for_someone_elses_patient() {
        let c = clinic();
        let stranger = fixtures::account(&c.conn, "stranger", false);
        assert!(matches!(
            book_appointment(&c.conn, &actor(&stranger, Role::Patient), details(&c, tomorrow())),
            Err(ServiceError::PermissionDenied)
        ));
    }

    #[test]
    fn lifecycle_enforced_and_terminal() {
        let c = clinic();
        let id = book_appointment(&c.conn, &c.staff, details(&c, tomorrow()))
            .unwrap()
            .appointment
            .id;

        let err = change_status(&c.conn, &c.doctor_actor, &id, AppointmentStatus::Completed).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        for status in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
        ] {
            let view = change_status(&c.conn, &c.doctor_actor, &id, status).unwrap();
            assert_eq!(view.appointment.status, status);
        }
        // same status again is a no-op
        assert!(change_status(&c.conn, &c.staff, &id, AppointmentStatus::Completed).is_ok());
        assert!(change_status(&c.conn, &c.staff, &id, AppointmentStatus::Cancelled).is_err());

        let history = repo::list_history(&c.conn, AuditedEntity::Appointment, &id).unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn owner_may_cancel_but_not_confirm() {
        let c = clinic();
        let id = book_appointment(&c.conn, &c.owner, details(&c, tomorrow()))
            .unwrap()
            .appointment
            .id;
        assert!(matches!(
            change_status(&c.conn, &c.owner, &id, AppointmentStatus::Confirmed),
            Err(ServiceError::PermissionDenied)
        ));
        let view = change_status(&c.conn, &c.owner, &id, AppointmentStatus::Cancelled).unwrap();
        assert_eq!(view.appointment.status, AppointmentStatus::Cancelled);

        let filter = NotificationFilter::default();
        let page = crate::notifications::list_notifications(&c.conn, &c.owner, &filter).unwrap();
        assert!(page.page.items.iter().any(|n| n.title == "Appointment cancelled"));
    }

    #[test]
    fn list_scoped_by_role() {
        let c = clinic();
        book_appointment(&c.conn, &c.staff, details(&c, tomorrow())).unwrap();
        let other_account = fixtures::account(&c.conn, "other", false);
        let other = fixtures::doctor(&c.conn, other_account.id, "LIC-2");
        let other_actor = actor(&other_account, Role::Doctor { doctor_id: other.id });
        let stranger = fixtures::account(&c.conn, "stranger", false);

        let filter = AppointmentFilter::default();
        assert_eq!(list_appointments(&c.conn, &c.staff, &filter).unwrap().total, 1);
        assert_eq!(list_appointments(&c.conn, &c.doctor_actor, &filter).unwrap().total, 1);
        assert_eq!(list_appointments(&c.conn, &c.owner, &filter).unwrap().total, 1);
        assert_eq!(list_appointments(&c.conn, &other_actor, &filter).unwrap().total, 0);
        assert_eq!(
            list_appointments(&c.conn, &actor(&stranger, Role::Patient), &filter).unwrap().total,
            0
        );
    }
}
