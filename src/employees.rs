//! Staff records. Everything here is staff-only administration.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{ensure_staff, Actor};
use crate::config::PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::error::{unique_as_field, ServiceError};
use crate::models::enums::ChangeKind;
use crate::models::{AuditedEntity, Employee, EmployeeDetails, EmployeeView};
use crate::search::{Conditions, EmployeeFilter, Page};
use crate::validation::validate_employee;

const NUMBER_TAKEN: &str = "An employee with this number already exists.";

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub account_id: Uuid,
    #[serde(flatten)]
    pub details: EmployeeDetails,
}

fn load(conn: &Connection, id: &Uuid) -> Result<EmployeeView, ServiceError> {
    repo::get_employee_view(conn, id)?.ok_or(ServiceError::not_found("Employee"))
}

fn save(
    conn: &Connection,
    actor: &Actor,
    employee: &Employee,
    change: ChangeKind,
) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    let written = match change {
        ChangeKind::Created => repo::insert_employee(&tx, employee),
        _ => repo::update_employee(&tx, employee),
    };
    written.map_err(|e| unique_as_field(e, "employee_number", NUMBER_TAKEN))?;
    append_history(
        &tx,
        AuditedEntity::Employee,
        &employee.id,
        change,
        Some(&actor.account_id),
        &employee.updated_at,
        employee,
    )?;
    tx.commit()?;
    Ok(())
}

pub fn create_employee(
    conn: &Connection,
    actor: &Actor,
    new: NewEmployee,
) -> Result<EmployeeView, ServiceError> {
    ensure_staff(actor, "create employee")?;
    validate_employee(&new.details)?;
    if repo::get_account(conn, &new.account_id)?.is_none() {
        return Err(ServiceError::invalid("account_id", "Select a valid account."));
    }
    if repo::employee_exists_for_account(conn, &new.account_id)? {
        return Err(ServiceError::invalid(
            "account_id",
            "This account already has an employee record.",
        ));
    }
    if repo::employee_number_in_use(conn, &new.details.employee_number, None)? {
        return Err(ServiceError::invalid("employee_number", NUMBER_TAKEN));
    }

    let now = Utc::now();
    let employee = Employee {
        id: Uuid::new_v4(),
        account_id: new.account_id,
        details: new.details,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    save(conn, actor, &employee, ChangeKind::Created)?;

    tracing::info!(
        employee_id = %employee.id,
        role = %employee.details.role,
        "Employee created"
    );
    load(conn, &employee.id)
}

pub fn get_employee(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<EmployeeView, ServiceError> {
    ensure_staff(actor, "view employee")?;
    load(conn, id)
}

pub fn update_employee(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: EmployeeDetails,
) -> Result<EmployeeView, ServiceError> {
    ensure_staff(actor, "edit employee")?;
    let mut employee = load(conn, id)?.employee;
    validate_employee(&details)?;
    if repo::employee_number_in_use(conn, &details.employee_number, Some(&employee.id))? {
        return Err(ServiceError::invalid("employee_number", NUMBER_TAKEN));
    }

    employee.details = details;
    employee.updated_at = Utc::now();
    save(conn, actor, &employee, ChangeKind::Updated)?;

    tracing::info!(employee_id = %employee.id, "Employee updated");
    load(conn, &employee.id)
}

pub fn deactivate_employee(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    ensure_staff(actor, "deactivate employee")?;
    let mut employee = load(conn, id)?.employee;
    employee.is_active = false;
    employee.updated_at = Utc::now();
    save(conn, actor, &employee, ChangeKind::Deactivated)?;

    tracing::info!(employee_id = %employee.id, "Employee deactivated");
    Ok(())
}

pub fn list_employees(
    conn: &Connection,
    actor: &Actor,
    filter: &EmployeeFilter,
) -> Result<Page<EmployeeView>, ServiceError> {
    ensure_staff(actor, "list employees")?;
    let mut conditions = Conditions::new();
    filter.apply(&mut conditions);
    Ok(repo::list_employees(
        conn,
        &mut conditions,
        PER_PAGE,
        filter.page.as_deref(),
    )?)
}
