use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{count_where, expect_one, optional, select_limited, select_page};
use super::{DOCTOR_NAME_SQL, PATIENT_NAME_SQL};
use crate::db::columns::{self, fmt_datetime, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentDetails, AppointmentView};
use crate::search::{Conditions, Page};

const APPOINTMENT_FROM: &str = "FROM appointments a
    JOIN patients p ON p.id = a.patient_id
    JOIN doctors d ON d.id = a.doctor_id
    JOIN accounts u ON u.id = d.account_id";

fn appointment_columns() -> String {
    format!(
        "a.id, a.patient_id, a.doctor_id, a.appointment_date, a.duration, a.appointment_type,
         a.status, a.reason, a.notes, a.created_at, a.updated_at,
         {PATIENT_NAME_SQL}, {DOCTOR_NAME_SQL}"
    )
}

fn appointment_view_from_row(row: &Row<'_>) -> rusqlite::Result<AppointmentView> {
    let appointment = Appointment {
        id: columns::uuid(row, 0)?,
        details: AppointmentDetails {
            patient_id: columns::uuid(row, 1)?,
            doctor_id: columns::uuid(row, 2)?,
            appointment_date: columns::datetime(row, 3)?,
            duration: row.get(4)?,
            appointment_type: columns::parsed(row, 5)?,
            reason: row.get(7)?,
            notes: row.get(8)?,
        },
        status: columns::parsed(row, 6)?,
        created_at: columns::timestamp(row, 9)?,
        updated_at: columns::timestamp(row, 10)?,
    };
    Ok(AppointmentView {
        ends_at: appointment.ends_at(),
        patient_name: row.get(11)?,
        doctor_name: row.get(12)?,
        appointment,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let d = &appt.details;
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, appointment_date, duration,
         appointment_type, status, reason, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appt.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.to_string(),
            fmt_datetime(&d.appointment_date),
            d.duration,
            d.appointment_type.as_str(),
            appt.status.as_str(),
            d.reason,
            d.notes,
            fmt_timestamp(&appt.created_at),
            fmt_timestamp(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let d = &appt.details;
    let changed = conn.execute(
        "UPDATE appointments SET patient_id = ?2, doctor_id = ?3, appointment_date = ?4,
         duration = ?5, appointment_type = ?6, status = ?7, reason = ?8, notes = ?9,
         updated_at = ?10
         WHERE id = ?1",
        params![
            appt.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.to_string(),
            fmt_datetime(&d.appointment_date),
            d.duration,
            d.appointment_type.as_str(),
            appt.status.as_str(),
            d.reason,
            d.notes,
            fmt_timestamp(&appt.updated_at),
        ],
    )?;
    expect_one(changed, "Appointment", &appt.id)
}

pub fn get_appointment_view(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<AppointmentView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} {APPOINTMENT_FROM} WHERE a.id = ?1", appointment_columns()),
        params![id.to_string()],
        appointment_view_from_row,
    ))
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    Ok(get_appointment_view(conn, id)?.map(|view| view.appointment))
}

/// Ordered by appointment time, soonest first.
pub fn list_appointments(
    conn: &Connection,
    conditions: &Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<AppointmentView>, DatabaseError> {
    select_page(
        conn,
        &appointment_columns(),
        APPOINTMENT_FROM,
        "ORDER BY a.appointment_date",
        conditions,
        per_page,
        page,
        appointment_view_from_row,
    )
}

/// Soonest first, for "upcoming" widgets the caller narrows with date and
/// status conditions.
pub fn next_appointments(
    conn: &Connection,
    conditions: &Conditions,
    limit: u32,
) -> Result<Vec<AppointmentView>, DatabaseError> {
    select_limited(
        conn,
        &appointment_columns(),
        APPOINTMENT_FROM,
        "ORDER BY a.appointment_date",
        conditions,
        limit,
        appointment_view_from_row,
    )
}

pub fn count_appointments(conn: &Connection, conditions: &Conditions) -> Result<u64, DatabaseError> {
    count_where(conn, APPOINTMENT_FROM, conditions)
}

/// Checkup already linked to the appointment, other than `except`.
pub fn appointment_checkup(
    conn: &Connection,
    appointment_id: &Uuid,
    except: Option<&Uuid>,
) -> Result<Option<Uuid>, DatabaseError> {
    optional(conn.query_row(
        "SELECT id FROM checkups WHERE appointment_id = ?1 AND id != ?2",
        params![
            appointment_id.to_string(),
            except.map(Uuid::to_string).unwrap_or_default()
        ],
        |row| columns::uuid(row, 0),
    ))
}
