use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{count_where, expect_one, optional, select_limited, select_page};
use super::{DOCTOR_NAME_SQL, PATIENT_NAME_SQL};
use crate::db::columns::{self, fmt_datetime, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Checkup, CheckupDetails, CheckupView};
use crate::search::{Conditions, Page};

const CHECKUP_FROM: &str = "FROM checkups c
    JOIN patients p ON p.id = c.patient_id
    LEFT JOIN doctors d ON d.id = c.doctor_id
    LEFT JOIN accounts u ON u.id = d.account_id";

fn checkup_columns() -> String {
    format!(
        "c.id, c.patient_id, c.doctor_id, c.appointment_id, c.checkup_date, c.checkup_type,
         c.temperature, c.blood_pressure_systolic, c.blood_pressure_diastolic, c.heart_rate,
         c.respiratory_rate, c.oxygen_saturation, c.height, c.weight, c.chief_complaint,
         c.symptoms, c.physical_examination, c.diagnosis, c.treatment_plan,
         c.medications_prescribed, c.follow_up_instructions, c.lab_tests_ordered, c.referrals,
         c.notes, c.pain_scale, c.mental_status, c.skin_color, c.created_at, c.updated_at,
         {PATIENT_NAME_SQL}, {DOCTOR_NAME_SQL}"
    )
}

fn checkup_view_from_row(row: &Row<'_>) -> rusqlite::Result<CheckupView> {
    let checkup = Checkup {
        id: columns::uuid(row, 0)?,
        details: CheckupDetails {
            patient_id: columns::uuid(row, 1)?,
            doctor_id: columns::uuid_opt(row, 2)?,
            appointment_id: columns::uuid_opt(row, 3)?,
            checkup_date: columns::datetime(row, 4)?,
            checkup_type: columns::parsed(row, 5)?,
            temperature: row.get(6)?,
            blood_pressure_systolic: row.get(7)?,
            blood_pressure_diastolic: row.get(8)?,
            heart_rate: row.get(9)?,
            respiratory_rate: row.get(10)?,
            oxygen_saturation: row.get(11)?,
            height: row.get(12)?,
            weight: row.get(13)?,
            chief_complaint: row.get(14)?,
            symptoms: row.get(15)?,
            physical_examination: row.get(16)?,
            diagnosis: row.get(17)?,
            treatment_plan: row.get(18)?,
            medications_prescribed: row.get(19)?,
            follow_up_instructions: row.get(20)?,
            lab_tests_ordered: row.get(21)?,
            referrals: row.get(22)?,
            notes: row.get(23)?,
            pain_scale: row.get(24)?,
            mental_status: columns::parsed(row, 25)?,
            skin_color: columns::parsed(row, 26)?,
        },
        created_at: columns::timestamp(row, 27)?,
        updated_at: columns::timestamp(row, 28)?,
    };
    Ok(CheckupView::new(checkup, row.get(29)?, row.get(30)?))
}

pub fn insert_checkup(conn: &Connection, checkup: &Checkup) -> Result<(), DatabaseError> {
    let d = &checkup.details;
    conn.execute(
        "INSERT INTO checkups (id, patient_id, doctor_id, appointment_id, checkup_date,
         checkup_type, temperature, blood_pressure_systolic, blood_pressure_diastolic,
         heart_rate, respiratory_rate, oxygen_saturation, height, weight, chief_complaint,
         symptoms, physical_examination, diagnosis, treatment_plan, medications_prescribed,
         follow_up_instructions, lab_tests_ordered, referrals, notes, pain_scale, mental_status,
         skin_color, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
         ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
        params![
            checkup.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.map(|id| id.to_string()),
            d.appointment_id.map(|id| id.to_string()),
            fmt_datetime(&d.checkup_date),
            d.checkup_type.as_str(),
            d.temperature,
            d.blood_pressure_systolic,
            d.blood_pressure_diastolic,
            d.heart_rate,
            d.respiratory_rate,
            d.oxygen_saturation,
            d.height,
            d.weight,
            d.chief_complaint,
            d.symptoms,
            d.physical_examination,
            d.diagnosis,
            d.treatment_plan,
            d.medications_prescribed,
            d.follow_up_instructions,
            d.lab_tests_ordered,
            d.referrals,
            d.notes,
            d.pain_scale,
            d.mental_status.as_str(),
            d.skin_color.as_str(),
            fmt_timestamp(&checkup.created_at),
            fmt_timestamp(&checkup.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_checkup(conn: &Connection, checkup: &Checkup) -> Result<(), DatabaseError> {
    let d = &checkup.details;
    let changed = conn.execute(
        "UPDATE checkups SET patient_id = ?2, doctor_id = ?3, appointment_id = ?4,
         checkup_date = ?5, checkup_type = ?6, temperature = ?7, blood_pressure_systolic = ?8,
         blood_pressure_diastolic = ?9, heart_rate = ?10, respiratory_rate = ?11,
         oxygen_saturation = ?12, height = ?13, weight = ?14, chief_complaint = ?15,
         symptoms = ?16, physical_examination = ?17, diagnosis = ?18, treatment_plan = ?19,
         medications_prescribed = ?20, follow_up_instructions = ?21, lab_tests_ordered = ?22,
         referrals = ?23, notes = ?24, pain_scale = ?25, mental_status = ?26, skin_color = ?27,
         updated_at = ?28
         WHERE id = ?1",
        params![
            checkup.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.map(|id| id.to_string()),
            d.appointment_id.map(|id| id.to_string()),
            fmt_datetime(&d.checkup_date),
            d.checkup_type.as_str(),
            d.temperature,
            d.blood_pressure_systolic,
            d.blood_pressure_diastolic,
            d.heart_rate,
            d.respiratory_rate,
            d.oxygen_saturation,
            d.height,
            d.weight,
            d.chief_complaint,
            d.symptoms,
            d.physical_examination,
            d.diagnosis,
            d.treatment_plan,
            d.medications_prescribed,
            d.follow_up_instructions,
            d.lab_tests_ordered,
            d.referrals,
            d.notes,
            d.pain_scale,
            d.mental_status.as_str(),
            d.skin_color.as_str(),
            fmt_timestamp(&checkup.updated_at),
        ],
    )?;
    expect_one(changed, "Checkup", &checkup.id)
}

pub fn get_checkup_view(conn: &Connection, id: &Uuid) -> Result<Option<CheckupView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} {CHECKUP_FROM} WHERE c.id = ?1", checkup_columns()),
        params![id.to_string()],
        checkup_view_from_row,
    ))
}

pub fn get_checkup(conn: &Connection, id: &Uuid) -> Result<Option<Checkup>, DatabaseError> {
    Ok(get_checkup_view(conn, id)?.map(|view| view.checkup))
}

/// Newest first.
pub fn list_checkups(
    conn: &Connection,
    conditions: &Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<CheckupView>, DatabaseError> {
    select_page(
        conn,
        &checkup_columns(),
        CHECKUP_FROM,
        "ORDER BY c.checkup_date DESC",
        conditions,
        per_page,
        page,
        checkup_view_from_row,
    )
}

pub fn recent_checkups(
    conn: &Connection,
    conditions: &Conditions,
    limit: u32,
) -> Result<Vec<CheckupView>, DatabaseError> {
    select_limited(
        conn,
        &checkup_columns(),
        CHECKUP_FROM,
        "ORDER BY c.checkup_date DESC",
        conditions,
        limit,
        checkup_view_from_row,
    )
}

pub fn count_checkups(conn: &Connection, conditions: &Conditions) -> Result<u64, DatabaseError> {
    count_where(conn, CHECKUP_FROM, conditions)
}
