//! Repository layer: entity-scoped database operations.
//!
//! Functions take `&Connection` so they run equally on a plain connection
//! or inside a `Transaction` (which derefs to one).

mod account;
mod appointment;
mod audit;
mod billing;
mod checkup;
mod doctor;
mod employee;
mod history;
mod lab_test;
mod medical_record;
mod notification;
mod patient;
mod prescription;

use rusqlite::{params_from_iter, Connection, Row};

use super::DatabaseError;
use crate::search::{Conditions, Page, PageWindow};

pub use account::*;
pub use appointment::*;
pub use audit::*;
pub use billing::*;
pub use checkup::*;
pub use doctor::*;
pub use employee::*;
pub use history::*;
pub use lab_test::*;
pub use medical_record::*;
pub use notification::*;
pub use patient::*;
pub use prescription::*;

/// Display name of the joined patients row `p`, middle name included.
pub(crate) const PATIENT_NAME_SQL: &str = "p.first_name || COALESCE(' ' || NULLIF(TRIM(p.middle_name), ''), '') || ' ' || p.last_name";

/// Display name of the doctor's joined accounts row `u`.
pub(crate) const DOCTOR_NAME_SQL: &str =
    "'Dr. ' || COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username)";

/// Count rows matching `conditions`, then fetch the requested page.
///
/// `from_sql` is everything after SELECT's column list (`FROM ... JOIN ...`);
/// `order_sql` the ORDER BY clause.
#[allow(clippy::too_many_arguments)]
pub(crate) fn select_page<T>(
    conn: &Connection,
    columns_sql: &str,
    from_sql: &str,
    order_sql: &str,
    conditions: &Conditions,
    per_page: u32,
    requested_page: Option<&str>,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Page<T>, DatabaseError> {
    let where_sql = conditions.where_sql();
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from_sql}{where_sql}"),
        params_from_iter(conditions.params()),
        |row| row.get(0),
    )?;

    let window = PageWindow::resolve(requested_page, per_page, total.max(0) as u64);
    let sql = format!("SELECT {columns_sql} {from_sql}{where_sql} {order_sql} LIMIT ? OFFSET ?");
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(conditions.params_with_window(&window)), map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(window.into_page(items))
}

/// Fetch at most `limit` rows matching `conditions`.
pub(crate) fn select_limited<T>(
    conn: &Connection,
    columns_sql: &str,
    from_sql: &str,
    order_sql: &str,
    conditions: &Conditions,
    limit: u32,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, DatabaseError> {
    let sql = format!(
        "SELECT {columns_sql} {from_sql}{} {order_sql} LIMIT {limit}",
        conditions.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.params()), map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn count_where(
    conn: &Connection,
    from_sql: &str,
    conditions: &Conditions,
) -> Result<u64, DatabaseError> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from_sql}{}", conditions.where_sql()),
        params_from_iter(conditions.params()),
        |row| row.get(0),
    )?;
    Ok(total.max(0) as u64)
}

/// Map "no rows" to `None`.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, DatabaseError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Fail with `NotFound` when an UPDATE touched nothing.
pub(crate) fn expect_one(
    changed: usize,
    entity_type: &str,
    id: &uuid::Uuid,
) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Seed rows shared by the repository and service tests.

    use chrono::{NaiveDate, Utc};
    use rusqlite::Connection;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::models::*;

    pub fn account(conn: &Connection, username: &str, is_staff: bool) -> Account {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            username: username.into(),
            first_name: username.to_uppercase(),
            last_name: "Tester".into(),
            email: None,
            is_staff,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        insert_account(conn, &account).unwrap();
        account
    }

    pub fn patient_details(first: &str, last: &str, dob: &str) -> PatientDetails {
        serde_json::from_value(json!({
            "first_name": first,
            "last_name": last,
            "date_of_birth": dob,
            "gender": "F",
            "blood_type": "O+",
            "height": 170.0,
            "weight": 70.0
        }))
        .unwrap()
    }

    pub fn patient(conn: &Connection, owner_id: Uuid, first: &str, last: &str) -> Patient {
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            owner_id,
            details: patient_details(first, last, "1990-05-20"),
            photo_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        insert_patient(conn, &patient).unwrap();
        patient
    }

    pub fn doctor_details(license: &str) -> DoctorDetails {
        serde_json::from_value(json!({
            "license_number": license,
            "specialization": "Cardiology",
            "phone_number": "+1 555 0100",
            "years_of_experience": 7,
            "qualification": "MD"
        }))
        .unwrap()
    }

    pub fn doctor(conn: &Connection, account_id: Uuid, license: &str) -> Doctor {
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            account_id,
            details: doctor_details(license),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        insert_doctor(conn, &doctor).unwrap();
        doctor
    }

    pub fn appointment(
        conn: &Connection,
        patient_id: Uuid,
        doctor_id: Uuid,
        at: &str,
    ) -> Appointment {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            details: serde_json::from_value(json!({
                "patient_id": patient_id,
                "doctor_id": doctor_id,
                "appointment_date": at,
                "reason": "Review"
            }))
            .unwrap(),
            status: crate::models::enums::AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };
        insert_appointment(conn, &appointment).unwrap();
        appointment
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}
