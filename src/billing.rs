//! Billing: totals and the bill records service.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{ensure_access, ensure_clinician, ensure_own_doctor, Actor, RecordScope};
use crate::checkups::check_checkup_ref;
use crate::clinical;
use crate::config::PER_PAGE;
use crate::db::repository::{self as repo, append_history};
use crate::doctors::resolve_doctor;
use crate::error::ServiceError;
use crate::models::enums::{BillingStatus, ChangeKind};
use crate::models::{AuditedEntity, Billing, BillingDetails, BillingView, Money};
use crate::patients::{owner_of, referenced_patient};
use crate::search::{visibility, BillingFilter, DoctorLink, Page};
use crate::validation::{validate_billing, ValidationErrors};

const TOTAL_OUT_OF_RANGE: &str = "Ensure that there are no more than 10 digits in total.";

/// amount + tax − discount, or `None` when it does not fit.
pub fn compute_total(details: &BillingDetails) -> Option<Money> {
    details
        .amount
        .checked_add(details.tax_amount)?
        .checked_sub(details.discount_amount)
}

/// Fill in the total at save time. A supplied total is kept as-is.
pub fn finalize_total(details: &mut BillingDetails) -> Result<Money, ValidationErrors> {
    let total = match details.total_amount {
        Some(total) => total,
        None => compute_total(details)
            .filter(|total| *total <= Money::MAX)
            .ok_or_else(|| ValidationErrors::single("total_amount", TOTAL_OUT_OF_RANGE))?,
    };
    details.total_amount = Some(total);
    Ok(total)
}

// ═══════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════

fn load(conn: &Connection, id: &Uuid) -> Result<BillingView, ServiceError> {
    repo::get_billing_view(conn, id)?.ok_or(ServiceError::not_found("Billing"))
}

fn scope_of(conn: &Connection, billing: &Billing) -> Result<RecordScope, ServiceError> {
    let owner_id = owner_of(conn, &billing.details.patient_id)?;
    Ok(RecordScope::clinical(owner_id, billing.details.doctor_id))
}

fn check_appointment_ref(conn: &Connection, details: &BillingDetails) -> Result<(), ServiceError> {
    let Some(id) = details.appointment_id else {
        return Ok(());
    };
    match repo::get_appointment(conn, &id)? {
        Some(appt) if appt.details.patient_id == details.patient_id => Ok(()),
        Some(_) => Err(ServiceError::invalid(
            "appointment_id",
            "The appointment belongs to a different patient.",
        )),
        None => Err(ServiceError::invalid("appointment_id", "Select a valid appointment.")),
    }
}

/// Validate, resolve references and fill in derived amounts.
fn prepare(
    conn: &Connection,
    actor: &Actor,
    mut details: BillingDetails,
    action: &str,
) -> Result<BillingDetails, ServiceError> {
    validate_billing(&details)?;
    referenced_patient(conn, &details.patient_id)?;
    details.doctor_id = resolve_doctor(conn, actor, details.doctor_id)?.map(|d| d.id);
    ensure_own_doctor(actor, details.doctor_id, action)?;
    check_appointment_ref(conn, &details)?;
    check_checkup_ref(conn, details.checkup_id, &details.patient_id)?;

    finalize_total(&mut details)?;
    if details.status == BillingStatus::Paid && details.paid_date.is_none() {
        details.paid_date = Some(clinical::now());
    }
    Ok(details)
}

fn save(
    conn: &Connection,
    actor: &Actor,
    billing: &Billing,
    change: ChangeKind,
) -> Result<(), ServiceError> {
    let tx = conn.unchecked_transaction()?;
    match change {
        ChangeKind::Created => repo::insert_billing(&tx, billing)?,
        _ => repo::update_billing(&tx, billing)?,
    }
    append_history(
        &tx,
        AuditedEntity::Billing,
        &billing.id,
        change,
        Some(&actor.account_id),
        &billing.updated_at,
        billing,
    )?;
    tx.commit()?;
    Ok(())
}

pub fn create_billing(
    conn: &Connection,
    actor: &Actor,
    details: BillingDetails,
) -> Result<BillingView, ServiceError> {
    ensure_clinician(actor, "create billing")?;
    let details = prepare(conn, actor, details, "create billing")?;

    let now = Utc::now();
    let billing = Billing {
        id: Uuid::new_v4(),
        details,
        created_at: now,
        updated_at: now,
    };
    save(conn, actor, &billing, ChangeKind::Created)?;

    tracing::info!(
        billing_id = %billing.id,
        patient_id = %billing.details.patient_id,
        total = %billing.total(),
        "Bill created"
    );
    load(conn, &billing.id)
}

pub fn get_billing(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<BillingView, ServiceError> {
    let view = load(conn, id)?;
    ensure_access(actor, &scope_of(conn, &view.billing)?, "view billing")?;
    Ok(view)
}

/// Omitting `total_amount` recomputes it from the submitted amounts.
pub fn update_billing(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    details: BillingDetails,
) -> Result<BillingView, ServiceError> {
    ensure_clinician(actor, "edit billing")?;
    let mut billing = load(conn, id)?.billing;
    ensure_access(actor, &scope_of(conn, &billing)?, "edit billing")?;

    billing.details = prepare(conn, actor, details, "edit billing")?;
    billing.updated_at = Utc::now();
    save(conn, actor, &billing, ChangeKind::Updated)?;

    tracing::info!(billing_id = %billing.id, status = %billing.details.status, "Bill updated");
    load(conn, &billing.id)
}

/// Soft delete: the bill moves to Cancelled.
pub fn cancel_billing(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<BillingView, ServiceError> {
    ensure_clinician(actor, "cancel billing")?;
    let mut billing = load(conn, id)?.billing;
    ensure_access(actor, &scope_of(conn, &billing)?, "cancel billing")?;
    if billing.details.status == BillingStatus::Cancelled {
        return load(conn, id);
    }

    billing.details.status = BillingStatus::Cancelled;
    billing.updated_at = Utc::now();
    save(conn, actor, &billing, ChangeKind::Deactivated)?;

    tracing::info!(billing_id = %billing.id, "Bill cancelled");
    load(conn, &billing.id)
}

pub fn list_billings(
    conn: &Connection,
    actor: &Actor,
    filter: &BillingFilter,
) -> Result<Page<BillingView>, ServiceError> {
    let mut conditions = visibility(actor, DoctorLink::Optional("b.doctor_id"));
    filter.apply(&mut conditions);
    Ok(repo::list_billings(conn, &conditions, PER_PAGE, filter.page.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Account;
    use crate::validation::NON_FIELD;
    use serde_json::json;

    fn details(total: Option<f64>) -> BillingDetails {
        serde_json::from_value(json!({
            "patient_id": uuid::Uuid::new_v4(),
            "billing_type": "Consultation",
            "description": "Visit",
            "amount": 100.0,
            "tax_amount": 10.0,
            "discount_amount": 5.0,
            "total_amount": total,
            "due_date": "2024-02-01"
        }))
        .unwrap()
    }

    #[test]
    fn total_computed_when_missing() {
        let mut d = details(None);
        assert_eq!(finalize_total(&mut d).unwrap(), Money::from_units(105));
        assert_eq!(d.total_amount, Some(Money::from_units(105)));
    }

    #[test]
    fn supplied_total_kept() {
        let mut d = details(Some(99.5));
        assert_eq!(finalize_total(&mut d).unwrap(), Money::from_cents(9950));
    }

    fn actor(account: &Account, role: Role) -> Actor {
        Actor {
            account_id: account.id,
            username: account.username.clone(),
            role,
        }
    }

    #[test]
    fn create_stores_computed_total() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let mut d = details(None);
        d.patient_id = patient.id;

        let view = create_billing(&conn, &actor(&staff, Role::Staff), d).unwrap();
        assert_eq!(view.billing.total(), Money::from_units(105));
        assert_eq!(view.billing.details.status, BillingStatus::Pending);
        assert_eq!(view.patient_name, "Asha Rao");
    }

    #[test]
    fn discount_above_amount_rejected() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let mut d = details(None);
        d.patient_id = patient.id;
        d.discount_amount = Money::from_units(150);

        let ServiceError::Validation(errors) =
            create_billing(&conn, &actor(&staff, Role::Staff), d).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get(NON_FIELD).unwrap()[0],
            "Discount amount cannot be greater than the total amount."
        );
    }

    #[test]
    fn oversized_amounts_are_field_errors() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let mut d = details(None);
        d.patient_id = patient.id;
        d.amount = Money::from_cents(9_000_000_000_000_000_000);
        d.tax_amount = Money::from_cents(9_000_000_000_000_000_000);

        let ServiceError::Validation(errors) =
            create_billing(&conn, &actor(&staff, Role::Staff), d).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.get("amount").is_some());
        assert!(errors.get("tax_amount").is_some());
    }

    #[test]
    fn total_beyond_ten_digits_rejected() {
        let mut d = details(None);
        d.amount = Money::MAX;
        d.tax_amount = Money::MAX;
        d.discount_amount = Money::ZERO;
        let errors = finalize_total(&mut d).unwrap_err();
        assert!(errors.get("total_amount").is_some());
        assert_eq!(d.total_amount, None);

        d.amount = Money::from_cents(i64::MAX);
        assert!(compute_total(&d).is_none());
    }

    #[test]
    fn owner_sees_bill_but_cannot_cancel() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let owner = fixtures::account(&conn, "pat", false);
        let patient = fixtures::patient(&conn, owner.id, "Asha", "Rao");
        let staff = actor(&staff, Role::Staff);
        let owner = actor(&owner, Role::Patient);
        let mut d = details(None);
        d.patient_id = patient.id;
        let id = create_billing(&conn, &staff, d).unwrap().billing.id;

        assert!(get_billing(&conn, &owner, &id).is_ok());
        assert_eq!(list_billings(&conn, &owner, &BillingFilter::default()).unwrap().total, 1);
        assert!(matches!(
            cancel_billing(&conn, &owner, &id),
            Err(ServiceError::PermissionDenied)
        ));
        let view = cancel_billing(&conn, &staff, &id).unwrap();
        assert_eq!(view.billing.details.status, BillingStatus::Cancelled);
    }

    #[test]
    fn paid_status_stamps_paid_date() {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::account(&conn, "desk", true);
        let patient = fixtures::patient(&conn, staff.id, "Asha", "Rao");
        let staff = actor(&staff, Role::Staff);
        let mut d = details(None);
        d.patient_id = patient.id;
        let view = create_billing(&conn, &staff, d).unwrap();

        let mut d = view.billing.details.clone();
        d.status = BillingStatus::Paid;
        d.total_amount = None;
        let view = update_billing(&conn, &staff, &view.billing.id, d).unwrap();
        assert!(view.billing.details.paid_date.is_some());
        assert_eq!(view.billing.total(), Money::from_units(105));
    }
}
