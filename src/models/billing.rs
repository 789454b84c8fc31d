use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::default_now;
use super::enums::{BillingStatus, BillingType};
use super::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub checkup_id: Option<Uuid>,
    pub billing_type: BillingType,
    pub description: String,
    pub amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub discount_amount: Money,
    /// Filled in from the other amounts at save time when not supplied.
    #[serde(default)]
    pub total_amount: Option<Money>,
    #[serde(default = "default_now")]
    pub billing_date: NaiveDateTime,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub paid_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: BillingStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub insurance_covered: bool,
    #[serde(default)]
    pub insurance_amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Billing {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: BillingDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Billing {
    /// Stored total; every persisted bill has one.
    pub fn total(&self) -> Money {
        self.details
            .total_amount
            .or_else(|| crate::billing::compute_total(&self.details))
            .unwrap_or(Money::ZERO)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingView {
    #[serde(flatten)]
    pub billing: Billing,
    pub patient_name: String,
}
