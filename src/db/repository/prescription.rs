use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{count_where, expect_one, optional, select_page};
use super::{DOCTOR_NAME_SQL, PATIENT_NAME_SQL};
use crate::db::columns::{self, fmt_date, fmt_datetime, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Prescription, PrescriptionDetails, PrescriptionView};
use crate::search::{Conditions, Page};

const PRESCRIPTION_FROM: &str = "FROM prescriptions r
    JOIN patients p ON p.id = r.patient_id
    JOIN doctors d ON d.id = r.doctor_id
    JOIN accounts u ON u.id = d.account_id";

fn prescription_columns() -> String {
    format!(
        "r.id, r.patient_id, r.doctor_id, r.checkup_id, r.medication_name, r.dosage,
         r.frequency, r.duration, r.instructions, r.prescribed_date, r.start_date, r.end_date,
         r.status, r.created_at, r.updated_at, {PATIENT_NAME_SQL}, {DOCTOR_NAME_SQL}"
    )
}

fn prescription_view_from_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionView> {
    Ok(PrescriptionView {
        prescription: Prescription {
            id: columns::uuid(row, 0)?,
            details: PrescriptionDetails {
                patient_id: columns::uuid(row, 1)?,
                doctor_id: columns::uuid(row, 2)?,
                checkup_id: columns::uuid_opt(row, 3)?,
                medication_name: row.get(4)?,
                dosage: row.get(5)?,
                frequency: row.get(6)?,
                duration: row.get(7)?,
                instructions: row.get(8)?,
                start_date: columns::date(row, 10)?,
                end_date: columns::date_opt(row, 11)?,
                status: columns::parsed(row, 12)?,
            },
            prescribed_date: columns::datetime(row, 9)?,
            created_at: columns::timestamp(row, 13)?,
            updated_at: columns::timestamp(row, 14)?,
        },
        patient_name: row.get(15)?,
        doctor_name: row.get(16)?,
    })
}

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    let d = &rx.details;
    conn.execute(
        "INSERT INTO prescriptions (id, patient_id, doctor_id, checkup_id, medication_name,
         dosage, frequency, duration, instructions, prescribed_date, start_date, end_date,
         status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            rx.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.to_string(),
            d.checkup_id.map(|id| id.to_string()),
            d.medication_name,
            d.dosage,
            d.frequency,
            d.duration,
            d.instructions,
            fmt_datetime(&rx.prescribed_date),
            fmt_date(&d.start_date),
            d.end_date.as_ref().map(fmt_date),
            d.status.as_str(),
            fmt_timestamp(&rx.created_at),
            fmt_timestamp(&rx.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    let d = &rx.details;
    let changed = conn.execute(
        "UPDATE prescriptions SET patient_id = ?2, doctor_id = ?3, checkup_id = ?4,
         medication_name = ?5, dosage = ?6, frequency = ?7, duration = ?8, instructions = ?9,
         start_date = ?10, end_date = ?11, status = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            rx.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.to_string(),
            d.checkup_id.map(|id| id.to_string()),
            d.medication_name,
            d.dosage,
            d.frequency,
            d.duration,
            d.instructions,
            fmt_date(&d.start_date),
            d.end_date.as_ref().map(fmt_date),
            d.status.as_str(),
            fmt_timestamp(&rx.updated_at),
        ],
    )?;
    expect_one(changed, "Prescription", &rx.id)
}

pub fn get_prescription_view(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<PrescriptionView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} {PRESCRIPTION_FROM} WHERE r.id = ?1", prescription_columns()),
        params![id.to_string()],
        prescription_view_from_row,
    ))
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    Ok(get_prescription_view(conn, id)?.map(|view| view.prescription))
}

/// Newest first.
pub fn list_prescriptions(
    conn: &Connection,
    conditions: &Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<PrescriptionView>, DatabaseError> {
    select_page(
        conn,
        &prescription_columns(),
        PRESCRIPTION_FROM,
        "ORDER BY r.prescribed_date DESC",
        conditions,
        per_page,
        page,
        prescription_view_from_row,
    )
}

pub fn count_prescriptions(conn: &Connection, conditions: &Conditions) -> Result<u64, DatabaseError> {
    count_where(conn, PRESCRIPTION_FROM, conditions)
}
