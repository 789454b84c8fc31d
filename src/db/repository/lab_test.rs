use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{expect_one, optional, select_page};
use super::{DOCTOR_NAME_SQL, PATIENT_NAME_SQL};
use crate::db::columns::{self, fmt_datetime, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{LabTest, LabTestDetails, LabTestView};
use crate::search::{Conditions, Page};

const LAB_TEST_FROM: &str = "FROM lab_tests l
    JOIN patients p ON p.id = l.patient_id
    JOIN doctors d ON d.id = l.doctor_id
    JOIN accounts u ON u.id = d.account_id";

fn lab_test_columns() -> String {
    format!(
        "l.id, l.patient_id, l.doctor_id, l.checkup_id, l.test_type, l.test_name,
         l.test_description, l.ordered_date, l.scheduled_date, l.completed_date, l.status,
         l.results, l.normal_range, l.interpretation, l.recommendations, l.created_at,
         l.updated_at, {PATIENT_NAME_SQL}, {DOCTOR_NAME_SQL}"
    )
}

fn lab_test_view_from_row(row: &Row<'_>) -> rusqlite::Result<LabTestView> {
    Ok(LabTestView {
        lab_test: LabTest {
            id: columns::uuid(row, 0)?,
            details: LabTestDetails {
                patient_id: columns::uuid(row, 1)?,
                doctor_id: columns::uuid(row, 2)?,
                checkup_id: columns::uuid_opt(row, 3)?,
                test_type: columns::parsed(row, 4)?,
                test_name: row.get(5)?,
                test_description: row.get(6)?,
                ordered_date: columns::datetime(row, 7)?,
                scheduled_date: columns::datetime_opt(row, 8)?,
                completed_date: columns::datetime_opt(row, 9)?,
                status: columns::parsed(row, 10)?,
                results: row.get(11)?,
                normal_range: row.get(12)?,
                interpretation: row.get(13)?,
                recommendations: row.get(14)?,
            },
            created_at: columns::timestamp(row, 15)?,
            updated_at: columns::timestamp(row, 16)?,
        },
        patient_name: row.get(17)?,
        doctor_name: row.get(18)?,
    })
}

pub fn insert_lab_test(conn: &Connection, test: &LabTest) -> Result<(), DatabaseError> {
    let d = &test.details;
    conn.execute(
        "INSERT INTO lab_tests (id, patient_id, doctor_id, checkup_id, test_type, test_name,
         test_description, ordered_date, scheduled_date, completed_date, status, results,
         normal_range, interpretation, recommendations, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            test.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.to_string(),
            d.checkup_id.map(|id| id.to_string()),
            d.test_type.as_str(),
            d.test_name,
            d.test_description,
            fmt_datetime(&d.ordered_date),
            d.scheduled_date.as_ref().map(fmt_datetime),
            d.completed_date.as_ref().map(fmt_datetime),
            d.status.as_str(),
            d.results,
            d.normal_range,
            d.interpretation,
            d.recommendations,
            fmt_timestamp(&test.created_at),
            fmt_timestamp(&test.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_lab_test(conn: &Connection, test: &LabTest) -> Result<(), DatabaseError> {
    let d = &test.details;
    let changed = conn.execute(
        "UPDATE lab_tests SET patient_id = ?2, doctor_id = ?3, checkup_id = ?4, test_type = ?5,
         test_name = ?6, test_description = ?7, ordered_date = ?8, scheduled_date = ?9,
         completed_date = ?10, status = ?11, results = ?12, normal_range = ?13,
         interpretation = ?14, recommendations = ?15, updated_at = ?16
         WHERE id = ?1",
        params![
            test.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.to_string(),
            d.checkup_id.map(|id| id.to_string()),
            d.test_type.as_str(),
            d.test_name,
            d.test_description,
            fmt_datetime(&d.ordered_date),
            d.scheduled_date.as_ref().map(fmt_datetime),
            d.completed_date.as_ref().map(fmt_datetime),
            d.status.as_str(),
            d.results,
            d.normal_range,
            d.interpretation,
            d.recommendations,
            fmt_timestamp(&test.updated_at),
        ],
    )?;
    expect_one(changed, "LabTest", &test.id)
}

pub fn get_lab_test_view(conn: &Connection, id: &Uuid) -> Result<Option<LabTestView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} {LAB_TEST_FROM} WHERE l.id = ?1", lab_test_columns()),
        params![id.to_string()],
        lab_test_view_from_row,
    ))
}

pub fn get_lab_test(conn: &Connection, id: &Uuid) -> Result<Option<LabTest>, DatabaseError> {
    Ok(get_lab_test_view(conn, id)?.map(|view| view.lab_test))
}

/// Newest orders first.
pub fn list_lab_tests(
    conn: &Connection,
    conditions: &Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<LabTestView>, DatabaseError> {
    select_page(
        conn,
        &lab_test_columns(),
        LAB_TEST_FROM,
        "ORDER BY l.ordered_date DESC",
        conditions,
        per_page,
        page,
        lab_test_view_from_row,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::LabTestStatus;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn insert_and_complete() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let doctor = fixtures::doctor(&conn, staff.id, "LIC-1");
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let now = Utc::now();
        let mut test = LabTest {
            id: Uuid::new_v4(),
            details: serde_json::from_value(json!({
                "patient_id": patient.id,
                "doctor_id": doctor.id,
                "test_type": "Blood",
                "test_name": "CBC",
                "test_description": "Complete blood count",
                "ordered_date": "2024-02-01T08:00:00"
            }))
            .unwrap(),
            created_at: now,
            updated_at: now,
        };
        insert_lab_test(&conn, &test).unwrap();
        assert_eq!(
            get_lab_test(&conn, &test.id).unwrap().unwrap().details.status,
            LabTestStatus::Ordered
        );

        test.details.status = LabTestStatus::Completed;
        test.details.completed_date = Some(fixtures::date(2024, 2, 2).and_hms_opt(9, 0, 0).unwrap());
        update_lab_test(&conn, &test).unwrap();
        let view = get_lab_test_view(&conn, &test.id).unwrap().unwrap();
        assert_eq!(view.lab_test.details, test.details);
        assert_eq!(list_lab_tests(&conn, &Conditions::new(), 15, None).unwrap().total, 1);
    }
}
