//! Medical records and their file attachments.
//!
//! Records hang off a patient only, so any doctor has clinical access.
//! Confidential records are withheld from the owning patient.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::attachments::{discard_upload, AttachmentKind, AttachmentStore, StoredFile};
use crate::authorization::{ensure_access, ensure_allowed, ensure_clinician, Actor, RecordScope};
use crate::checkups::check_checkup_ref;
use crate::config::PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::error::ServiceError;
use crate::models::enums::ChangeKind;
use crate::models::{AuditedEntity, MedicalRecord, MedicalRecordDetails, MedicalRecordView};
use crate::patients::{owner_of, referenced_patient};
use crate::search::{visibility, DoctorLink, MedicalRecordFilter, Page};
use crate::validation::validate_medical_record;

fn load(conn: &Connection, id: &Uuid) -> Result<MedicalRecordView, ServiceError> {
    repo::get_medical_record_view(conn, id)?.ok_or(ServiceError::not_found("Medical record"))
}

fn ensure_readable(
    conn: &Connection,
    actor: &Actor,
    record: &MedicalRecord,
    action: &str,
) -> Result<(), ServiceError> {
    let owner_id = owner_of(conn, &record.details.patient_id)?;
    ensure_access(actor, &RecordScope::PatientOwned { owner_id }, action)?;
    ensure_allowed(
        actor,
        !record.details.is_confidential || actor.is_clinician(),
        action,
    )
}

fn check(conn: &Connection, details: &MedicalRecordDetails) -> Result<(), ServiceError> {
    validate_medical_record(details)?;
    referenced_patient(conn, &details.patient_id)?;
    check_checkup_ref(conn, details.checkup_id, &details.patient_id)
}

fn save(
    conn: &Connection,
    actor: &Actor,
    record: &MedicalRecord,
    change: ChangeKind,
) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    match change {
        ChangeKind::Created => repo::insert_medical_record(&tx, record)?,
        _ => repo::update_medical_record(&tx, record)?,
    }
    append_history(
        &tx,
        AuditedEntity::MedicalRecord,
        &record.id,
        change,
        Some(&actor.account_id),
        &record.updated_at,
        record,
    )?;
    tx.commit()?;
    Ok(())
}

pub fn create_medical_record(
    conn: &Connection,
    actor: &Actor,
    details: MedicalRecordDetails,
) -> Result<MedicalRecordView, ServiceError> {
    ensure_clinician(actor, "create medical record")?;
    check(conn, &details)?;

    let now = Utc::now();
    let record = MedicalRecord {
        id: Uuid::new_v4(),
        details,
        attachment_path: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    save(conn, actor, &record, ChangeKind::Created)?;

    tracing::info!(
        record_id = %record.id,
        patient_id = %record.details.patient_id,
        record_type = %record.details.record_type,
        "Medical record created"
    );
    load(conn, &record.id)
}

pub fn get_medical_record(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
) -> Result<MedicalRecordView, ServiceError> {
    let view = load(conn, id)?;
    ensure_readable(conn, actor, &view.record, "view medical record")?;
    Ok(view)
}

pub fn update_medical_record(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: MedicalRecordDetails,
) -> Result<MedicalRecordView, ServiceError> {
    ensure_clinician(actor, "edit medical record")?;
    let mut record = load(conn, id)?.record;
    check(conn, &details)?;

    record.details = details;
    record.updated_at = Utc::now();
    save(conn, actor, &record, ChangeKind::Updated)?;

    tracing::info!(record_id = %record.id, "Medical record updated");
    load(conn, &record.id)
}

pub fn deactivate_medical_record(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
) -> Result<(), ServiceError> {
    ensure_clinician(actor, "deactivate medical record")?;
    let mut record = load(conn, id)?.record;
    record.is_active = false;
    record.updated_at = Utc::now();
    save(conn, actor, &record, ChangeKind::Deactivated)?;

    tracing::info!(record_id = %record.id, "Medical record deactivated");
    Ok(())
}

pub fn list_medical_records(
    conn: &Connection,
    actor: &Actor,
    filter: &MedicalRecordFilter,
) -> Result<Page<MedicalRecordView>, ServiceError> {
    ensure_clinician(actor, "list medical records")?;
    let mut conditions = visibility(actor, DoctorLink::None);
    filter.apply(&mut conditions);
    Ok(repo::list_medical_records(
        conn,
        &mut conditions,
        PER_PAGE,
        filter.page.as_deref(),
    )?)
}

/// Store (or replace) the record's file.
pub fn attach_file(
    conn: &Connection,
    store: &AttachmentStore,
    actor: &Actor,
    id: &Uuid,
    file_name: &str,
    bytes: &[u8],
) -> Result<MedicalRecordView, ServiceError> {
    ensure_clinician(actor, "upload medical record attachment")?;
    let mut record = load(conn, id)?.record;

    let path = store.save(
        AttachmentKind::MedicalRecord,
        &record.details.patient_id,
        file_name,
        bytes,
    )?;
    let previous = record.attachment_path.replace(path.clone());
    record.updated_at = Utc::now();
    if let Err(e) = save(conn, actor, &record, ChangeKind::Updated) {
        discard_upload(store, &path);
        return Err(e);
    }

    if let Some(old) = previous {
        if let Err(e) = store.remove(&old) {
            tracing::warn!(error = %e, path = %old, "Failed to remove replaced attachment");
        }
    }
    tracing::info!(record_id = %record.id, path = %path, "Medical record attachment stored");
    load(conn, &record.id)
}

pub fn attachment(
    conn: &Connection,
    store: &AttachmentStore,
    actor: &Actor,
    id: &Uuid,
) -> Result<StoredFile, ServiceError> {
    let record = load(conn, id)?.record;
    ensure_readable(conn, actor, &record, "download medical record attachment")?;
    let path = record.attachment_path.ok_or(ServiceError::not_found("Attachment"))?;
    Ok(store.load(&path)?)
}
