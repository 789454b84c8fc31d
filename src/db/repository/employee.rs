use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{expect_one, optional, select_page};
use crate::db::columns::{self, fmt_date, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Employee, EmployeeDetails, EmployeeView};
use crate::search::{Conditions, Page};

const EMPLOYEE_COLUMNS: &str = "e.id, e.account_id, e.employee_number, e.role, e.department,
    e.employment_status, e.hire_date, e.phone_number, e.emergency_contact_name,
    e.emergency_contact_phone, e.is_active, e.created_at, e.updated_at,
    COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username)";

const EMPLOYEE_FROM: &str = "FROM employees e JOIN accounts u ON u.id = e.account_id";

fn employee_view_from_row(row: &Row<'_>) -> rusqlite::Result<EmployeeView> {
    Ok(EmployeeView {
        employee: Employee {
            id: columns::uuid(row, 0)?,
            account_id: columns::uuid(row, 1)?,
            details: EmployeeDetails {
                employee_number: row.get(2)?,
                role: columns::parsed(row, 3)?,
                department: row.get(4)?,
                employment_status: columns::parsed(row, 5)?,
                hire_date: columns::date(row, 6)?,
                phone_number: row.get(7)?,
                emergency_contact_name: row.get(8)?,
                emergency_contact_phone: row.get(9)?,
            },
            is_active: row.get(10)?,
            created_at: columns::timestamp(row, 11)?,
            updated_at: columns::timestamp(row, 12)?,
        },
        full_name: row.get(13)?,
    })
}

pub fn insert_employee(conn: &Connection, employee: &Employee) -> Result<(), DatabaseError> {
    let d = &employee.details;
    conn.execute(
        "INSERT INTO employees (id, account_id, employee_number, role, department,
         employment_status, hire_date, phone_number, emergency_contact_name,
         emergency_contact_phone, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            employee.id.to_string(),
            employee.account_id.to_string(),
            d.employee_number,
            d.role.as_str(),
            d.department,
            d.employment_status.as_str(),
            fmt_date(&d.hire_date),
            d.phone_number,
            d.emergency_contact_name,
            d.emergency_contact_phone,
            employee.is_active,
            fmt_timestamp(&employee.created_at),
            fmt_timestamp(&employee.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_employee(conn: &Connection, employee: &Employee) -> Result<(), DatabaseError> {
    let d = &employee.details;
    let changed = conn.execute(
        "UPDATE employees SET employee_number = ?2, role = ?3, department = ?4,
         employment_status = ?5, hire_date = ?6, phone_number = ?7,
         emergency_contact_name = ?8, emergency_contact_phone = ?9, is_active = ?10,
         updated_at = ?11
         WHERE id = ?1",
        params![
            employee.id.to_string(),
            d.employee_number,
            d.role.as_str(),
            d.department,
            d.employment_status.as_str(),
            fmt_date(&d.hire_date),
            d.phone_number,
            d.emergency_contact_name,
            d.emergency_contact_phone,
            employee.is_active,
            fmt_timestamp(&employee.updated_at),
        ],
    )?;
    expect_one(changed, "Employee", &employee.id)
}

/// Active employee by id.
pub fn get_employee_view(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<EmployeeView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {EMPLOYEE_COLUMNS} {EMPLOYEE_FROM} WHERE e.id = ?1 AND e.is_active = 1"),
        params![id.to_string()],
        employee_view_from_row,
    ))
}

pub fn get_employee(conn: &Connection, id: &Uuid) -> Result<Option<Employee>, DatabaseError> {
    Ok(get_employee_view(conn, id)?.map(|view| view.employee))
}

pub fn employee_number_in_use(
    conn: &Connection,
    employee_number: &str,
    except: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM employees WHERE employee_number = ?1 AND id != ?2",
        params![employee_number, except.map(Uuid::to_string).unwrap_or_default()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn employee_exists_for_account(
    conn: &Connection,
    account_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM employees WHERE account_id = ?1",
        params![account_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_employees(
    conn: &Connection,
    conditions: &mut Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<EmployeeView>, DatabaseError> {
    conditions.push("e.is_active = 1", []);
    select_page(
        conn,
        EMPLOYEE_COLUMNS,
        EMPLOYEE_FROM,
        "ORDER BY u.last_name, u.first_name",
        conditions,
        per_page,
        page,
        employee_view_from_row,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::EmployeeRole;
    use crate::search::EmployeeFilter;
    use chrono::Utc;
    use serde_json::json;

    fn employee(account_id: Uuid, number: &str, role: &str) -> Employee {
        let now = Utc::now();
        Employee {
            id: Uuid::new_v4(),
            account_id,
            details: serde_json::from_value(json!({
                "employee_number": number,
                "role": role,
                "department": "Cardiology",
                "hire_date": "2020-04-01",
                "phone_number": "+1 555 0101",
                "emergency_contact_name": "Sam",
                "emergency_contact_phone": "+1 555 0102"
            }))
            .unwrap(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duplicate_employee_number_detected() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::account(&conn, "nurse1", true);
        let b = fixtures::account(&conn, "nurse2", true);
        let first = employee(a.id, "E-001", "Nurse");
        insert_employee(&conn, &first).unwrap();

        assert!(employee_number_in_use(&conn, "E-001", None).unwrap());
        assert!(!employee_number_in_use(&conn, "E-001", Some(&first.id)).unwrap());
        let dup = employee(b.id, "E-001", "Nurse");
        assert!(insert_employee(&conn, &dup).unwrap_err().is_unique_violation());
        assert!(employee_exists_for_account(&conn, &a.id).unwrap());
    }

    #[test]
    fn role_filter_and_department_search() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::account(&conn, "nurse1", true);
        let b = fixtures::account(&conn, "tech1", true);
        insert_employee(&conn, &employee(a.id, "E-001", "Nurse")).unwrap();
        insert_employee(&conn, &employee(b.id, "E-002", "Lab Technician")).unwrap();

        let mut conditions = Conditions::new();
        EmployeeFilter {
            role: Some(EmployeeRole::LabTechnician),
            department: Some("cardiology".into()),
            ..Default::default()
        }
        .apply(&mut conditions);
        let page = list_employees(&conn, &mut conditions, 15, None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].full_name, "TECH1 Tester");
    }
}
