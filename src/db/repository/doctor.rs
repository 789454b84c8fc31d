use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{expect_one, optional, select_page};
use crate::db::columns::{self, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Doctor, DoctorDetails, DoctorView, Money};
use crate::search::{Conditions, Page};

const DOCTOR_COLUMNS: &str = "d.id, d.account_id, d.license_number, d.specialization,
    d.phone_number, d.years_of_experience, d.qualification, d.hospital_affiliation, d.bio,
    d.consultation_fee, d.available_days, d.available_hours, d.languages_spoken, d.is_active,
    d.created_at, d.updated_at,
    COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username)";

const DOCTOR_FROM: &str = "FROM doctors d JOIN accounts u ON u.id = d.account_id";

fn doctor_view_from_row(row: &Row<'_>) -> rusqlite::Result<DoctorView> {
    let doctor = Doctor {
        id: columns::uuid(row, 0)?,
        account_id: columns::uuid(row, 1)?,
        details: DoctorDetails {
            license_number: row.get(2)?,
            specialization: columns::parsed(row, 3)?,
            phone_number: row.get(4)?,
            years_of_experience: row.get(5)?,
            qualification: row.get(6)?,
            hospital_affiliation: row.get(7)?,
            bio: row.get(8)?,
            consultation_fee: row.get::<_, Option<i64>>(9)?.map(Money::from_cents),
            available_days: row.get(10)?,
            available_hours: row.get(11)?,
            languages_spoken: row.get(12)?,
        },
        is_active: row.get(13)?,
        created_at: columns::timestamp(row, 14)?,
        updated_at: columns::timestamp(row, 15)?,
    };
    Ok(DoctorView {
        experience_level: doctor.experience_level(),
        full_name: format!("Dr. {}", row.get::<_, String>(16)?),
        doctor,
    })
}

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let d = &doctor.details;
    conn.execute(
        "INSERT INTO doctors (id, account_id, license_number, specialization, phone_number,
         years_of_experience, qualification, hospital_affiliation, bio, consultation_fee,
         available_days, available_hours, languages_spoken, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            doctor.id.to_string(),
            doctor.account_id.to_string(),
            d.license_number,
            d.specialization.as_str(),
            d.phone_number,
            d.years_of_experience,
            d.qualification,
            d.hospital_affiliation,
            d.bio,
            d.consultation_fee.map(Money::cents),
            d.available_days,
            d.available_hours,
            d.languages_spoken,
            doctor.is_active,
            fmt_timestamp(&doctor.created_at),
            fmt_timestamp(&doctor.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let d = &doctor.details;
    let changed = conn.execute(
        "UPDATE doctors SET license_number = ?2, specialization = ?3, phone_number = ?4,
         years_of_experience = ?5, qualification = ?6, hospital_affiliation = ?7, bio = ?8,
         consultation_fee = ?9, available_days = ?10, available_hours = ?11,
         languages_spoken = ?12, is_active = ?13, updated_at = ?14
         WHERE id = ?1",
        params![
            doctor.id.to_string(),
            d.license_number,
            d.specialization.as_str(),
            d.phone_number,
            d.years_of_experience,
            d.qualification,
            d.hospital_affiliation,
            d.bio,
            d.consultation_fee.map(Money::cents),
            d.available_days,
            d.available_hours,
            d.languages_spoken,
            doctor.is_active,
            fmt_timestamp(&doctor.updated_at),
        ],
    )?;
    expect_one(changed, "Doctor", &doctor.id)
}

/// Active doctor with the account's display name.
pub fn get_doctor_view(conn: &Connection, id: &Uuid) -> Result<Option<DoctorView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {DOCTOR_COLUMNS} {DOCTOR_FROM} WHERE d.id = ?1 AND d.is_active = 1"),
        params![id.to_string()],
        doctor_view_from_row,
    ))
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    Ok(get_doctor_view(conn, id)?.map(|view| view.doctor))
}

/// Any profile, active or not, linked to the account.
pub fn doctor_exists_for_account(conn: &Connection, account_id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctors WHERE account_id = ?1",
        params![account_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn license_in_use(
    conn: &Connection,
    license_number: &str,
    except: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctors WHERE license_number = ?1 AND id != ?2",
        params![license_number, except.map(Uuid::to_string).unwrap_or_default()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_doctors(
    conn: &Connection,
    conditions: &mut Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<DoctorView>, DatabaseError> {
    conditions.push("d.is_active = 1", []);
    select_page(
        conn,
        DOCTOR_COLUMNS,
        DOCTOR_FROM,
        "ORDER BY u.last_name, u.first_name",
        conditions,
        per_page,
        page,
        doctor_view_from_row,
    )
}
