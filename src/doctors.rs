//! Doctor profiles.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{ensure_allowed, ensure_staff, Actor};
use crate::config::DOCTORS_PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::error::{unique_as_field, ServiceError};
use crate::models::enums::ChangeKind;
use crate::models::{AuditedEntity, Doctor, DoctorDetails, DoctorView};
use crate::search::{DoctorFilter, Page};
use crate::validation::validate_doctor;

const LICENSE_TAKEN: &str = "A doctor with this license number already exists.";
const PROFILE_EXISTS: &str = "This account already has a doctor profile.";

/// Body of a create request. Without `account_id` the profile is the
/// caller's own.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDoctor {
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(flatten)]
    pub details: DoctorDetails,
}

/// Active doctor named in a form, or a field error on `doctor_id`.
pub(crate) fn referenced_doctor(conn: &Connection, id: &Uuid) -> Result<Doctor, ServiceError> {
    repo::get_doctor(conn, id)?
        .ok_or_else(|| ServiceError::invalid("doctor_id", "Select a valid doctor."))
}

/// Optional doctor reference; a doctor actor defaults to themselves.
pub(crate) fn resolve_doctor(
    conn: &Connection,
    actor: &Actor,
    requested: Option<Uuid>,
) -> Result<Option<Doctor>, ServiceError> {
    match requested.or(actor.doctor_id()) {
        Some(id) => referenced_doctor(conn, &id).map(Some),
        None => Ok(None),
    }
}

fn load(conn: &Connection, id: &Uuid) -> Result<DoctorView, ServiceError> {
    repo::get_doctor_view(conn, id)?.ok_or(ServiceError::not_found("Doctor"))
}

pub fn create_doctor(
    conn: &Connection,
    actor: &Actor,
    new: NewDoctor,
) -> Result<DoctorView, ServiceError> {
    ensure_staff(actor, "create doctor profile")?;
    validate_doctor(&new.details)?;

    let account_id = new.account_id.unwrap_or(actor.account_id);
    if repo::get_account(conn, &account_id)?.is_none() {
        return Err(ServiceError::invalid("account_id", "Select a valid account."));
    }
    if repo::doctor_exists_for_account(conn, &account_id)? {
        return Err(ServiceError::invalid("account_id", PROFILE_EXISTS));
    }
    if repo::license_in_use(conn, &new.details.license_number, None)? {
        return Err(ServiceError::invalid("license_number", LICENSE_TAKEN));
    }

    let now = Utc::now();
    let doctor = Doctor {
        id: Uuid::new_v4(),
        account_id,
        details: new.details,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    repo::insert_doctor(&tx, &doctor)
        .map_err(|e| unique_as_field(e, "license_number", LICENSE_TAKEN))?;
    append_history(
        &tx,
        AuditedEntity::Doctor,
        &doctor.id,
        ChangeKind::Created,
        Some(&actor.account_id),
        &now,
        &doctor,
    )?;
    tx.commit()?;

    tracing::info!(doctor_id = %doctor.id, account_id = %account_id, "Doctor profile created");
    load(conn, &doctor.id)
}

/// Any authenticated actor may look up a doctor.
pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<DoctorView, ServiceError> {
    load(conn, id)
}

/// Staff, or the doctor editing their own profile.
pub fn update_doctor(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: DoctorDetails,
) -> Result<DoctorView, ServiceError> {
    let mut doctor = load(conn, id)?.doctor;
    ensure_allowed(
        actor,
        actor.is_staff() || actor.doctor_id() == Some(doctor.id),
        "edit doctor profile",
    )?;
    validate_doctor(&details)?;
    if repo::license_in_use(conn, &details.license_number, Some(&doctor.id))? {
        return Err(ServiceError::invalid("license_number", LICENSE_TAKEN));
    }

    doctor.details = details;
    doctor.updated_at = Utc::now();
    save(conn, actor, &doctor, ChangeKind::Updated)?;

    tracing::info!(doctor_id = %doctor.id, "Doctor profile updated");
    load(conn, &doctor.id)
}

pub fn deactivate_doctor(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    ensure_staff(actor, "deactivate doctor profile")?;
    let mut doctor = load(conn, id)?.doctor;
    doctor.is_active = false;
    doctor.updated_at = Utc::now();
    save(conn, actor, &doctor, ChangeKind::Deactivated)?;

    tracing::info!(doctor_id = %doctor.id, "Doctor profile deactivated");
    Ok(())
}

pub fn list_doctors(
    conn: &Connection,
    actor: &Actor,
    filter: &DoctorFilter,
) -> Result<Page<DoctorView>, ServiceError> {
    ensure_staff(actor, "list doctors")?;
    let mut conditions = crate::search::Conditions::new();
    filter.apply(&mut conditions);
    Ok(repo::list_doctors(
        conn,
        &mut conditions,
        DOCTORS_PER_PAGE,
        filter.page.as_deref(),
    )?)
}

fn save(conn: &Connection, actor: &Actor, doctor: &Doctor, change: ChangeKind) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    repo::update_doctor(&tx, doctor)
        .map_err(|e| unique_as_field(e, "license_number", LICENSE_TAKEN))?;
    append_history(
        &tx,
        AuditedEntity::Doctor,
        &doctor.id,
        change,
        Some(&actor.account_id),
        &doctor.updated_at,
        doctor,
    )?;
    tx.commit()?;
    Ok(())
}
