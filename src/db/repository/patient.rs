use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{count_where, expect_one, optional, select_limited, select_page};
use crate::db::columns::{self, fmt_date, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Patient, PatientDetails};
use crate::search::{Conditions, Page};

pub(crate) const PATIENT_COLUMNS: &str = "p.id, p.owner_id, p.first_name, p.middle_name, p.last_name,
    p.date_of_birth, p.gender, p.contact_number, p.email, p.address, p.city, p.state, p.zip_code,
    p.country, p.blood_type, p.height, p.weight, p.allergies, p.medical_history,
    p.current_medications, p.marital_status, p.occupation, p.emergency_contact_name,
    p.emergency_contact_phone, p.emergency_contact_relationship, p.insurance_provider,
    p.insurance_number, p.insurance_expiry, p.preferred_language, p.smoking_status,
    p.alcohol_consumption, p.photo_path, p.is_active, p.created_at, p.updated_at";

/// Active patients only; deactivated rows behave as missing.
const PATIENT_FROM: &str = "FROM patients p";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: columns::uuid(row, 0)?,
        owner_id: columns::uuid(row, 1)?,
        details: PatientDetails {
            first_name: row.get(2)?,
            middle_name: row.get(3)?,
            last_name: row.get(4)?,
            date_of_birth: columns::date(row, 5)?,
            gender: columns::parsed(row, 6)?,
            contact_number: row.get(7)?,
            email: row.get(8)?,
            address: row.get(9)?,
            city: row.get(10)?,
            state: row.get(11)?,
            zip_code: row.get(12)?,
            country: row.get(13)?,
            blood_type: columns::parsed(row, 14)?,
            height: row.get(15)?,
            weight: row.get(16)?,
            allergies: row.get(17)?,
            medical_history: row.get(18)?,
            current_medications: row.get(19)?,
            marital_status: columns::parsed(row, 20)?,
            occupation: row.get(21)?,
            emergency_contact_name: row.get(22)?,
            emergency_contact_phone: row.get(23)?,
            emergency_contact_relationship: row.get(24)?,
            insurance_provider: row.get(25)?,
            insurance_number: row.get(26)?,
            insurance_expiry: columns::date_opt(row, 27)?,
            preferred_language: row.get(28)?,
            smoking_status: columns::parsed(row, 29)?,
            alcohol_consumption: columns::parsed(row, 30)?,
        },
        photo_path: row.get(31)?,
        is_active: row.get(32)?,
        created_at: columns::timestamp(row, 33)?,
        updated_at: columns::timestamp(row, 34)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let d = &patient.details;
    conn.execute(
        "INSERT INTO patients (id, owner_id, first_name, middle_name, last_name, date_of_birth,
         gender, contact_number, email, address, city, state, zip_code, country, blood_type,
         height, weight, allergies, medical_history, current_medications, marital_status,
         occupation, emergency_contact_name, emergency_contact_phone,
         emergency_contact_relationship, insurance_provider, insurance_number, insurance_expiry,
         preferred_language, smoking_status, alcohol_consumption, photo_path, is_active,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
         ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35)",
        params![
            patient.id.to_string(),
            patient.owner_id.to_string(),
            d.first_name,
            d.middle_name,
            d.last_name,
            fmt_date(&d.date_of_birth),
            d.gender.as_str(),
            d.contact_number,
            d.email,
            d.address,
            d.city,
            d.state,
            d.zip_code,
            d.country,
            d.blood_type.as_str(),
            d.height,
            d.weight,
            d.allergies,
            d.medical_history,
            d.current_medications,
            d.marital_status.as_str(),
            d.occupation,
            d.emergency_contact_name,
            d.emergency_contact_phone,
            d.emergency_contact_relationship,
            d.insurance_provider,
            d.insurance_number,
            d.insurance_expiry.as_ref().map(fmt_date),
            d.preferred_language,
            d.smoking_status.as_str(),
            d.alcohol_consumption.as_str(),
            patient.photo_path,
            patient.is_active,
            fmt_timestamp(&patient.created_at),
            fmt_timestamp(&patient.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column with the given state.
pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let d = &patient.details;
    let changed = conn.execute(
        "UPDATE patients SET first_name = ?2, middle_name = ?3, last_name = ?4,
         date_of_birth = ?5, gender = ?6, contact_number = ?7, email = ?8, address = ?9,
         city = ?10, state = ?11, zip_code = ?12, country = ?13, blood_type = ?14, height = ?15,
         weight = ?16, allergies = ?17, medical_history = ?18, current_medications = ?19,
         marital_status = ?20, occupation = ?21, emergency_contact_name = ?22,
         emergency_contact_phone = ?23, emergency_contact_relationship = ?24,
         insurance_provider = ?25, insurance_number = ?26, insurance_expiry = ?27,
         preferred_language = ?28, smoking_status = ?29, alcohol_consumption = ?30,
         photo_path = ?31, is_active = ?32, updated_at = ?33
         WHERE id = ?1",
        params![
            patient.id.to_string(),
            d.first_name,
            d.middle_name,
            d.last_name,
            fmt_date(&d.date_of_birth),
            d.gender.as_str(),
            d.contact_number,
            d.email,
            d.address,
            d.city,
            d.state,
            d.zip_code,
            d.country,
            d.blood_type.as_str(),
            d.height,
            d.weight,
            d.allergies,
            d.medical_history,
            d.current_medications,
            d.marital_status.as_str(),
            d.occupation,
            d.emergency_contact_name,
            d.emergency_contact_phone,
            d.emergency_contact_relationship,
            d.insurance_provider,
            d.insurance_number,
            d.insurance_expiry.as_ref().map(fmt_date),
            d.preferred_language,
            d.smoking_status.as_str(),
            d.alcohol_consumption.as_str(),
            patient.photo_path,
            patient.is_active,
            fmt_timestamp(&patient.updated_at),
        ],
    )?;
    expect_one(changed, "Patient", &patient.id)
}

/// Active patient by id.
pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} {PATIENT_FROM} WHERE p.id = ?1 AND p.is_active = 1"),
        params![id.to_string()],
        patient_from_row,
    ))
}

/// Owning account of a patient, active or not. Dependent records keep
/// their ownership after the patient is deactivated.
pub fn patient_owner(conn: &Connection, id: &Uuid) -> Result<Option<Uuid>, DatabaseError> {
    optional(conn.query_row(
        "SELECT owner_id FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| columns::uuid(row, 0),
    ))
}

/// Caller supplies scope and filters; inactive rows are always excluded.
pub fn list_patients(
    conn: &Connection,
    conditions: &mut Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<Patient>, DatabaseError> {
    conditions.push("p.is_active = 1", []);
    select_page(
        conn,
        PATIENT_COLUMNS,
        PATIENT_FROM,
        "ORDER BY p.last_name, p.first_name",
        conditions,
        per_page,
        page,
        patient_from_row,
    )
}

pub fn search_patients_limited(
    conn: &Connection,
    conditions: &mut Conditions,
    limit: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    conditions.push("p.is_active = 1", []);
    select_limited(
        conn,
        PATIENT_COLUMNS,
        PATIENT_FROM,
        "ORDER BY p.last_name, p.first_name",
        conditions,
        limit,
        patient_from_row,
    )
}

pub fn recent_patients(
    conn: &Connection,
    conditions: &mut Conditions,
    limit: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    conditions.push("p.is_active = 1", []);
    select_limited(
        conn,
        PATIENT_COLUMNS,
        PATIENT_FROM,
        "ORDER BY p.created_at DESC",
        conditions,
        limit,
        patient_from_row,
    )
}

pub fn count_patients(conn: &Connection, conditions: &mut Conditions) -> Result<u64, DatabaseError> {
    conditions.push("p.is_active = 1", []);
    count_where(conn, PATIENT_FROM, conditions)
}
