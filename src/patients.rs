//! Patient register: registration, edits, soft delete, listing and
//! autocomplete, plus the patient photo.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::attachments::{discard_upload, AttachmentKind, AttachmentStore, StoredFile};
use crate::authorization::{ensure_access, Actor, RecordScope};
use crate::clinical;
use crate::config::{AUTOCOMPLETE_LIMIT, AUTOCOMPLETE_MIN_CHARS, PATIENTS_PER_PAGE};
use crate::db::repository::{self as repo, append_history};
use crate::error::ServiceError;
use crate::models::enums::ChangeKind;
use crate::models::{AuditedEntity, Patient, PatientDetails, PatientView};
use crate::search::{visibility, DoctorLink, Page, PatientFilter};
use crate::validation::validate_patient;

// ─── Types ────────────────────────────────────────────────────────────────────

/// One autocomplete row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSuggestion {
    pub id: Uuid,
    /// "Full Name (ID: 1a2b3c4d)"
    pub text: String,
    pub age: i32,
    pub gender: &'static str,
}

// ─── Lookups shared with other record services ───────────────────────────────

/// Active patient or `NotFound`.
pub(crate) fn load_patient(conn: &Connection, id: &Uuid) -> Result<Patient, ServiceError> {
    repo::get_patient(conn, id)?.ok_or(ServiceError::not_found("Patient"))
}

/// Owner of a patient named in a form, or a field error on `patient_id`.
pub(crate) fn referenced_patient(conn: &Connection, id: &Uuid) -> Result<Patient, ServiceError> {
    repo::get_patient(conn, id)?
        .ok_or_else(|| ServiceError::invalid("patient_id", "Select a valid patient."))
}

/// Owner account of a record's patient, whether or not still active.
pub(crate) fn owner_of(conn: &Connection, patient_id: &Uuid) -> Result<Uuid, ServiceError> {
    repo::patient_owner(conn, patient_id)?.ok_or(ServiceError::not_found("Patient"))
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Any actor may register a patient; the actor becomes its owner.
pub fn register_patient(
    conn: &Connection,
    actor: &Actor,
    details: PatientDetails,
) -> Result<PatientView, ServiceError> {
    let today = clinical::today();
    validate_patient(&details, today)?;

    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        owner_id: actor.account_id,
        details,
        photo_path: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    repo::insert_patient(&tx, &patient)?;
    append_history(
        &tx,
        AuditedEntity::Patient,
        &patient.id,
        ChangeKind::Created,
        Some(&actor.account_id),
        &now,
        &patient,
    )?;
    tx.commit()?;

    tracing::info!(patient_id = %patient.id, account_id = %actor.account_id, "Patient registered");
    Ok(PatientView::new(patient, today))
}

pub fn get_patient(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<PatientView, ServiceError> {
    let patient = load_patient(conn, id)?;
    ensure_access(actor, &scope_of(&patient), "view patient")?;
    Ok(PatientView::new(patient, clinical::today()))
}

pub fn update_patient(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: PatientDetails,
) -> Result<PatientView, ServiceError> {
    let mut patient = load_patient(conn, id)?;
    ensure_access(actor, &scope_of(&patient), "edit patient")?;
    let today = clinical::today();
    validate_patient(&details, today)?;

    let now = Utc::now();
    patient.details = details;
    patient.updated_at = now;
    save(conn, actor, &patient, ChangeKind::Updated)?;

    tracing::info!(patient_id = %patient.id, "Patient updated");
    Ok(PatientView::new(patient, today))
}

/// Soft delete: the record stays, but is hidden from every lookup.
pub fn deactivate_patient(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    let mut patient = load_patient(conn, id)?;
    ensure_access(actor, &scope_of(&patient), "deactivate patient")?;

    patient.is_active = false;
    patient.updated_at = Utc::now();
    save(conn, actor, &patient, ChangeKind::Deactivated)?;

    tracing::info!(patient_id = %patient.id, "Patient deactivated");
    Ok(())
}

pub fn list_patients(
    conn: &Connection,
    actor: &Actor,
    filter: &PatientFilter,
) -> Result<Page<PatientView>, ServiceError> {
    let today = clinical::today();
    let mut conditions = visibility(actor, DoctorLink::None);
    filter.apply(&mut conditions, today);
    let page = repo::list_patients(conn, &mut conditions, PATIENTS_PER_PAGE, filter.page.as_deref())?;
    Ok(page.map(|p| PatientView::new(p, today)))
}

/// Name/id lookahead for pickers. Short queries return nothing.
pub fn autocomplete_patients(
    conn: &Connection,
    actor: &Actor,
    query: &str,
) -> Result<Vec<PatientSuggestion>, ServiceError> {
    let query = query.trim();
    if query.chars().count() < AUTOCOMPLETE_MIN_CHARS {
        return Ok(Vec::new());
    }

    let today = clinical::today();
    let mut conditions = visibility(actor, DoctorLink::None);
    conditions.push_search(&["p.first_name", "p.last_name", "p.id"], query);
    let patients = repo::search_patients_limited(conn, &mut conditions, AUTOCOMPLETE_LIMIT)?;

    Ok(patients
        .into_iter()
        .map(|p| PatientSuggestion {
            id: p.id,
            text: format!("{} (ID: {})", p.full_name(), p.short_id()),
            age: p.age_on(today),
            gender: p.details.gender.label(),
        })
        .collect())
}

/// Replace the patient's photo.
pub fn set_patient_photo(
    conn: &Connection,
    store: &AttachmentStore,
    actor: &Actor,
    id: &Uuid,
    file_name: &str,
    bytes: &[u8],
) -> Result<PatientView, ServiceError> {
    let mut patient = load_patient(conn, id)?;
    ensure_access(actor, &scope_of(&patient), "upload patient photo")?;

    let path = store.save(AttachmentKind::PatientPhoto, &patient.id, file_name, bytes)?;
    let previous = patient.photo_path.replace(path.clone());
    patient.updated_at = Utc::now();
    if let Err(e) = save(conn, actor, &patient, ChangeKind::Updated) {
        discard_upload(store, &path);
        return Err(e);
    }

    if let Some(old) = previous {
        if let Err(e) = store.remove(&old) {
            tracing::warn!(error = %e, path = %old, "Failed to remove replaced photo");
        }
    }
    Ok(PatientView::new(patient, clinical::today()))
}

pub fn patient_photo(
    conn: &Connection,
    store: &AttachmentStore,
    actor: &Actor,
    id: &Uuid,
) -> Result<StoredFile, ServiceError> {
    let patient = load_patient(conn, id)?;
    ensure_access(actor, &scope_of(&patient), "view patient photo")?;
    let path = patient.photo_path.ok_or(ServiceError::not_found("Photo"))?;
    Ok(store.load(&path)?)
}

fn scope_of(patient: &Patient) -> RecordScope {
    RecordScope::PatientOwned {
        owner_id: patient.owner_id,
    }
}

fn save(conn: &Connection, actor: &Actor, patient: &Patient, change: ChangeKind) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    repo::update_patient(&tx, patient)?;
    append_history(
        &tx,
        AuditedEntity::Patient,
        &patient.id,
        change,
        Some(&actor.account_id),
        &patient.updated_at,
        patient,
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ChangeKind;
    use crate::search::Conditions;

    fn actor_for(account: &crate::models::Account, role: Role) -> Actor {
        Actor {
            account_id: account.id,
            username: account.username.clone(),
            role,
        }
    }

    #[test]
    fn register_sets_owner_and_writes_history() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "pat", false);
        let actor = actor_for(&account, Role::Patient);

        let view = register_patient(&conn, &actor, fixtures::patient_details("Asha", "Rao", "1990-05-20"))
            .unwrap();
        assert_eq!(view.patient.owner_id, account.id);
        assert_eq!(view.full_name, "Asha Rao");

        let history = repo::list_history(&conn, AuditedEntity::Patient, &view.patient.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change, ChangeKind::Created);
        assert_eq!(history[0].changed_by, Some(account.id));
    }

    #[test]
    fn future_birth_date_is_rejected_without_writing() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "pat", false);
        let actor = actor_for(&account, Role::Patient);

        let details = fixtures::patient_details("Asha", "Rao", "2999-01-01");
        let err = register_patient(&conn, &actor, details).unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.get("date_of_birth").is_some());
        let mut all = Conditions::new();
        assert_eq!(repo::count_patients(&conn, &mut all).unwrap(), 0);
    }

    #[test]
    fn other_owner_cannot_view_or_find_patient() {
        let conn = open_memory_database().unwrap();
        let alice = fixtures::account(&conn, "alice", false);
        let bob = fixtures::account(&conn, "bob", false);
        let patient = fixtures::patient(&conn, alice.id, "Asha", "Rao");
        let bob = actor_for(&bob, Role::Patient);

        assert!(matches!(
            get_patient(&conn, &bob, &patient.id),
            Err(ServiceError::PermissionDenied)
        ));
        let filter = PatientFilter {
            search: Some("asha".into()),
            ..Default::default()
        };
        assert_eq!(list_patients(&conn, &bob, &filter).unwrap().total, 0);
        assert!(autocomplete_patients(&conn, &bob, "Asha").unwrap().is_empty());
        assert!(matches!(
            update_patient(&conn, &bob, &patient.id, patient.details.clone()),
            Err(ServiceError::PermissionDenied)
        ));
    }

    #[test]
    fn doctor_sees_register() {
        let conn = open_memory_database().unwrap();
        let owner = fixtures::account(&conn, "owner", false);
        let doc_account = fixtures::account(&conn, "doc", false);
        let doctor = fixtures::doctor(&conn, doc_account.id, "LIC-1");
        fixtures::patient(&conn, owner.id, "Asha", "Rao");
        let doc = actor_for(&doc_account, Role::Doctor { doctor_id: doctor.id });

        let page = list_patients(&conn, &doc, &PatientFilter::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.per_page, PATIENTS_PER_PAGE);
    }

    #[test]
    fn autocomplete_shape_and_minimum_length() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let actor = actor_for(&staff, Role::Staff);

        assert!(autocomplete_patients(&conn, &actor, "a").unwrap().is_empty());
        let results = autocomplete_patients(&conn, &actor, "ash").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].text,
            format!("Asha Rao (ID: {})", &patient.id.to_string()[..8])
        );
        assert_eq!(results[0].gender, "Female");
    }

    #[test]
    fn deactivated_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let actor = actor_for(&staff, Role::Staff);

        deactivate_patient(&conn, &actor, &patient.id).unwrap();
        assert!(matches!(
            get_patient(&conn, &actor, &patient.id),
            Err(ServiceError::NotFound { .. })
        ));
        let history = repo::list_history(&conn, AuditedEntity::Patient, &patient.id).unwrap();
        assert_eq!(history.last().map(|h| h.change), Some(ChangeKind::Deactivated));
    }

    #[test]
    fn photo_roundtrip() {
        let conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path(), 1024);
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let actor = actor_for(&staff, Role::Staff);

        let view = set_patient_photo(&conn, &store, &actor, &patient.id, "me.png", b"png").unwrap();
        let first = view.patient.photo_path.unwrap();
        assert!(first.starts_with(&format!("patients/{}/", patient.id)));
        assert!(first.ends_with("/me.png"));
        let file = patient_photo(&conn, &store, &actor, &patient.id).unwrap();
        assert_eq!(file.content_type, "image/png");

        let view = set_patient_photo(&conn, &store, &actor, &patient.id, "me.png", b"png2").unwrap();
        assert_ne!(view.patient.photo_path.as_deref(), Some(first.as_str()));
        assert_eq!(patient_photo(&conn, &store, &actor, &patient.id).unwrap().bytes, b"png2");
        assert!(!dir.path().join(&first).exists());
    }

    #[test]
    fn failed_photo_save_removes_upload() {
        let conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path(), 1024);
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let actor = actor_for(&staff, Role::Staff);
        conn.execute_batch(
            "CREATE TRIGGER block_patient_update BEFORE UPDATE ON patients
             BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
        )
        .unwrap();

        assert!(set_patient_photo(&conn, &store, &actor, &patient.id, "me.png", b"png").is_err());
        let folder = dir.path().join("patients").join(patient.id.to_string());
        let leftovers = std::fs::read_dir(&folder).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }
}
