//! Checkups: vitals and clinical notes recorded by staff or doctors.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{ensure_access, ensure_clinician, ensure_own_doctor, Actor, RecordScope};
use crate::config::PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::doctors::resolve_doctor;
use crate::error::{unique_as_field, ServiceError};
use crate::models::enums::ChangeKind;
use crate::models::{AuditedEntity, Checkup, CheckupDetails, CheckupView};
use crate::patients::{owner_of, referenced_patient};
use crate::search::{visibility, CheckupFilter, DoctorLink, Page};
use crate::validation::validate_checkup;

const APPOINTMENT_LINKED: &str = "This appointment already has a checkup.";

fn load(conn: &Connection, id: &Uuid) -> Result<CheckupView, ServiceError> {
    repo::get_checkup_view(conn, id)?.ok_or(ServiceError::not_found("Checkup"))
}

fn scope_of(conn: &Connection, checkup: &Checkup) -> Result<RecordScope, ServiceError> {
    let owner_id = owner_of(conn, &checkup.details.patient_id)?;
    Ok(RecordScope::clinical(owner_id, checkup.details.doctor_id))
}

/// A checkup named by another record must exist and belong to the same
/// patient.
pub(crate) fn check_checkup_ref(
    conn: &Connection,
    checkup_id: Option<Uuid>,
    patient_id: &Uuid,
) -> Result<(), ServiceError> {
    let Some(id) = checkup_id else {
        return Ok(());
    };
    match repo::get_checkup(conn, &id)? {
        Some(checkup) if checkup.details.patient_id == *patient_id => Ok(()),
        Some(_) => Err(ServiceError::invalid(
            "checkup_id",
            "The checkup belongs to a different patient.",
        )),
        None => Err(ServiceError::invalid("checkup_id", "Select a valid checkup.")),
    }
}

/// The linked appointment must be the same patient's and not already
/// carry another checkup.
fn check_appointment_link(
    conn: &Connection,
    details: &CheckupDetails,
    except: Option<&Uuid>,
) -> Result<(), ServiceError> {
    let Some(appointment_id) = details.appointment_id else {
        return Ok(());
    };
    let appt = repo::get_appointment(conn, &appointment_id)?
        .ok_or_else(|| ServiceError::invalid("appointment_id", "Select a valid appointment."))?;
    if appt.details.patient_id != details.patient_id {
        return Err(ServiceError::invalid(
            "appointment_id",
            "The appointment belongs to a different patient.",
        ));
    }
    if repo::appointment_checkup(conn, &appointment_id, except)?.is_some() {
        return Err(ServiceError::invalid("appointment_id", APPOINTMENT_LINKED));
    }
    Ok(())
}

/// Validate and normalise a form: a doctor actor is recorded as the
/// checkup's doctor when none is named.
fn prepare(
    conn: &Connection,
    actor: &Actor,
    mut details: CheckupDetails,
    except: Option<&Uuid>,
    action: &str,
) -> Result<CheckupDetails, ServiceError> {
    validate_checkup(&details)?;
    referenced_patient(conn, &details.patient_id)?;
    let doctor = resolve_doctor(conn, actor, details.doctor_id)?;
    details.doctor_id = doctor.map(|d| d.id);
    ensure_own_doctor(actor, details.doctor_id, action)?;
    check_appointment_link(conn, &details, except)?;
    Ok(details)
}

pub fn create_checkup(
    conn: &Connection,
    actor: &Actor,
    details: CheckupDetails,
) -> Result<CheckupView, ServiceError> {
    ensure_clinician(actor, "create checkup")?;
    let details = prepare(conn, actor, details, None, "create checkup")?;

    let now = Utc::now();
    let checkup = Checkup {
        id: Uuid::new_v4(),
        details,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    repo::insert_checkup(&tx, &checkup)
        .map_err(|e| unique_as_field(e, "appointment_id", APPOINTMENT_LINKED))?;
    append_history(
        &tx,
        AuditedEntity::Checkup,
        &checkup.id,
        ChangeKind::Created,
        Some(&actor.account_id),
        &now,
        &checkup,
    )?;
    tx.commit()?;

    tracing::info!(
        checkup_id = %checkup.id,
        patient_id = %checkup.details.patient_id,
        "Checkup recorded"
    );
    load(conn, &checkup.id)
}

pub fn get_checkup(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<CheckupView, ServiceError> {
    let view = load(conn, id)?;
    ensure_access(actor, &scope_of(conn, &view.checkup)?, "view checkup")?;
    Ok(view)
}

pub fn update_checkup(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: CheckupDetails,
) -> Result<CheckupView, ServiceError> {
    ensure_clinician(actor, "edit checkup")?;
    let mut checkup = load(conn, id)?.checkup;
    ensure_access(actor, &scope_of(conn, &checkup)?, "edit checkup")?;
    checkup.details = prepare(conn, actor, details, Some(&checkup.id), "edit checkup")?;
    checkup.updated_at = Utc::now();

    let tx = conn.unchecked_transaction()?;
    repo::update_checkup(&tx, &checkup)
        .map_err(|e| unique_as_field(e, "appointment_id", APPOINTMENT_LINKED))?;
    append_history(
        &tx,
        AuditedEntity::Checkup,
        &checkup.id,
        ChangeKind::Updated,
        Some(&actor.account_id),
        &checkup.updated_at,
        &checkup,
    )?;
    tx.commit()?;

    tracing::info!(checkup_id = %checkup.id, "Checkup updated");
    load(conn, &checkup.id)
}

pub fn list_checkups(
    conn: &Connection,
    actor: &Actor,
    filter: &CheckupFilter,
) -> Result<Page<CheckupView>, ServiceError> {
    let mut conditions = visibility(actor, DoctorLink::Optional("c.doctor_id"));
    filter.apply(&mut conditions);
    Ok(repo::list_checkups(conn, &conditions, PER_PAGE, filter.page.as_deref())?)
}
