use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::PATIENT_NAME_SQL;
use super::{expect_one, optional, select_page};
use crate::db::columns::{self, fmt_date, fmt_datetime, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{MedicalRecord, MedicalRecordDetails, MedicalRecordView};
use crate::search::{Conditions, Page};

const RECORD_FROM: &str = "FROM medical_records m JOIN patients p ON p.id = m.patient_id";

fn record_columns() -> String {
    format!(
        "m.id, m.patient_id, m.checkup_id, m.record_type, m.title, m.description,
         m.record_date, m.attachment_path, m.is_confidential, m.requires_followup,
         m.followup_date, m.lab_results, m.imaging_results, m.interpretation, m.is_active,
         m.created_at, m.updated_at, {PATIENT_NAME_SQL}"
    )
}

fn record_view_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecordView> {
    let record = MedicalRecord {
        id: columns::uuid(row, 0)?,
        details: MedicalRecordDetails {
            patient_id: columns::uuid(row, 1)?,
            checkup_id: columns::uuid_opt(row, 2)?,
            record_type: columns::parsed(row, 3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            record_date: columns::datetime(row, 6)?,
            is_confidential: row.get(8)?,
            requires_followup: row.get(9)?,
            followup_date: columns::date_opt(row, 10)?,
            lab_results: row.get(11)?,
            imaging_results: row.get(12)?,
            interpretation: row.get(13)?,
        },
        attachment_path: row.get(7)?,
        is_active: row.get(14)?,
        created_at: columns::timestamp(row, 15)?,
        updated_at: columns::timestamp(row, 16)?,
    };
    Ok(MedicalRecordView {
        has_attachment: record.attachment_path.is_some(),
        patient_name: row.get(17)?,
        record,
    })
}

pub fn insert_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    let d = &record.details;
    conn.execute(
        "INSERT INTO medical_records (id, patient_id, checkup_id, record_type, title,
         description, record_date, attachment_path, is_confidential, requires_followup,
         followup_date, lab_results, imaging_results, interpretation, is_active, created_at,
         updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.id.to_string(),
            d.patient_id.to_string(),
            d.checkup_id.map(|id| id.to_string()),
            d.record_type.as_str(),
            d.title,
            d.description,
            fmt_datetime(&d.record_date),
            record.attachment_path,
            d.is_confidential,
            d.requires_followup,
            d.followup_date.as_ref().map(fmt_date),
            d.lab_results,
            d.imaging_results,
            d.interpretation,
            record.is_active,
            fmt_timestamp(&record.created_at),
            fmt_timestamp(&record.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    let d = &record.details;
    let changed = conn.execute(
        "UPDATE medical_records SET patient_id = ?2, checkup_id = ?3, record_type = ?4,
         title = ?5, description = ?6, record_date = ?7, attachment_path = ?8,
         is_confidential = ?9, requires_followup = ?10, followup_date = ?11, lab_results = ?12,
         imaging_results = ?13, interpretation = ?14, is_active = ?15, updated_at = ?16
         WHERE id = ?1",
        params![
            record.id.to_string(),
            d.patient_id.to_string(),
            d.checkup_id.map(|id| id.to_string()),
            d.record_type.as_str(),
            d.title,
            d.description,
            fmt_datetime(&d.record_date),
            record.attachment_path,
            d.is_confidential,
            d.requires_followup,
            d.followup_date.as_ref().map(fmt_date),
            d.lab_results,
            d.imaging_results,
            d.interpretation,
            record.is_active,
            fmt_timestamp(&record.updated_at),
        ],
    )?;
    expect_one(changed, "MedicalRecord", &record.id)
}

/// Active record by id.
pub fn get_medical_record_view(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MedicalRecordView>, DatabaseError> {
    optional(conn.query_row(
        &format!(
            "SELECT {} {RECORD_FROM} WHERE m.id = ?1 AND m.is_active = 1",
            record_columns()
        ),
        params![id.to_string()],
        record_view_from_row,
    ))
}

/// Newest first; inactive rows excluded.
pub fn list_medical_records(
    conn: &Connection,
    conditions: &mut Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<MedicalRecordView>, DatabaseError> {
    conditions.push("m.is_active = 1", []);
    select_page(
        conn,
        &record_columns(),
        RECORD_FROM,
        "ORDER BY m.record_date DESC",
        conditions,
        per_page,
        page,
        record_view_from_row,
    )
}
