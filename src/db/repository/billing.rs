use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::PATIENT_NAME_SQL;
use super::{expect_one, optional, select_page};
use crate::db::columns::{self, fmt_date, fmt_datetime, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{Billing, BillingDetails, BillingView, Money};
use crate::search::{Conditions, Page};

const BILLING_FROM: &str = "FROM billings b JOIN patients p ON p.id = b.patient_id";

fn billing_columns() -> String {
    format!(
        "b.id, b.patient_id, b.doctor_id, b.appointment_id, b.checkup_id, b.billing_type,
         b.description, b.amount, b.tax_amount, b.discount_amount, b.total_amount,
         b.billing_date, b.due_date, b.paid_date, b.status, b.payment_method,
         b.insurance_covered, b.insurance_amount, b.created_at, b.updated_at, {PATIENT_NAME_SQL}"
    )
}

fn money(row: &Row<'_>, idx: usize) -> rusqlite::Result<Money> {
    row.get::<_, i64>(idx).map(Money::from_cents)
}

fn billing_view_from_row(row: &Row<'_>) -> rusqlite::Result<BillingView> {
    Ok(BillingView {
        billing: Billing {
            id: columns::uuid(row, 0)?,
            details: BillingDetails {
                patient_id: columns::uuid(row, 1)?,
                doctor_id: columns::uuid_opt(row, 2)?,
                appointment_id: columns::uuid_opt(row, 3)?,
                checkup_id: columns::uuid_opt(row, 4)?,
                billing_type: columns::parsed(row, 5)?,
                description: row.get(6)?,
                amount: money(row, 7)?,
                tax_amount: money(row, 8)?,
                discount_amount: money(row, 9)?,
                total_amount: Some(money(row, 10)?),
                billing_date: columns::datetime(row, 11)?,
                due_date: columns::date(row, 12)?,
                paid_date: columns::datetime_opt(row, 13)?,
                status: columns::parsed(row, 14)?,
                payment_method: row.get(15)?,
                insurance_covered: row.get(16)?,
                insurance_amount: money(row, 17)?,
            },
            created_at: columns::timestamp(row, 18)?,
            updated_at: columns::timestamp(row, 19)?,
        },
        patient_name: row.get(20)?,
    })
}

/// `billing.total()` is stored, so callers finalize the total first.
pub fn insert_billing(conn: &Connection, billing: &Billing) -> Result<(), DatabaseError> {
    let d = &billing.details;
    conn.execute(
        "INSERT INTO billings (id, patient_id, doctor_id, appointment_id, checkup_id,
         billing_type, description, amount, tax_amount, discount_amount, total_amount,
         billing_date, due_date, paid_date, status, payment_method, insurance_covered,
         insurance_amount, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
         ?18, ?19, ?20)",
        params![
            billing.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.map(|id| id.to_string()),
            d.appointment_id.map(|id| id.to_string()),
            d.checkup_id.map(|id| id.to_string()),
            d.billing_type.as_str(),
            d.description,
            d.amount.cents(),
            d.tax_amount.cents(),
            d.discount_amount.cents(),
            billing.total().cents(),
            fmt_datetime(&d.billing_date),
            fmt_date(&d.due_date),
            d.paid_date.as_ref().map(fmt_datetime),
            d.status.as_str(),
            d.payment_method,
            d.insurance_covered,
            d.insurance_amount.cents(),
            fmt_timestamp(&billing.created_at),
            fmt_timestamp(&billing.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_billing(conn: &Connection, billing: &Billing) -> Result<(), DatabaseError> {
    let d = &billing.details;
    let changed = conn.execute(
        "UPDATE billings SET patient_id = ?2, doctor_id = ?3, appointment_id = ?4,
         checkup_id = ?5, billing_type = ?6, description = ?7, amount = ?8, tax_amount = ?9,
         discount_amount = ?10, total_amount = ?11, billing_date = ?12, due_date = ?13,
         paid_date = ?14, status = ?15, payment_method = ?16, insurance_covered = ?17,
         insurance_amount = ?18, updated_at = ?19
         WHERE id = ?1",
        params![
            billing.id.to_string(),
            d.patient_id.to_string(),
            d.doctor_id.map(|id| id.to_string()),
            d.appointment_id.map(|id| id.to_string()),
            d.checkup_id.map(|id| id.to_string()),
            d.billing_type.as_str(),
            d.description,
            d.amount.cents(),
            d.tax_amount.cents(),
            d.discount_amount.cents(),
            billing.total().cents(),
            fmt_datetime(&d.billing_date),
            fmt_date(&d.due_date),
            d.paid_date.as_ref().map(fmt_datetime),
            d.status.as_str(),
            d.payment_method,
            d.insurance_covered,
            d.insurance_amount.cents(),
            fmt_timestamp(&billing.updated_at),
        ],
    )?;
    expect_one(changed, "Billing", &billing.id)
}

pub fn get_billing_view(conn: &Connection, id: &Uuid) -> Result<Option<BillingView>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {} {BILLING_FROM} WHERE b.id = ?1", billing_columns()),
        params![id.to_string()],
        billing_view_from_row,
    ))
}

pub fn get_billing(conn: &Connection, id: &Uuid) -> Result<Option<Billing>, DatabaseError> {
    Ok(get_billing_view(conn, id)?.map(|view| view.billing))
}

/// Newest first.
pub fn list_billings(
    conn: &Connection,
    conditions: &Conditions,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<BillingView>, DatabaseError> {
    select_page(
        conn,
        &billing_columns(),
        BILLING_FROM,
        "ORDER BY b.billing_date DESC",
        conditions,
        per_page,
        page,
        billing_view_from_row,
    )
}
