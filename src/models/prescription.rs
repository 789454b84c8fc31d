use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PrescriptionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionDetails {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub checkup_id: Option<Uuid>,
    pub medication_name: String,
    /// e.g. "500mg"
    pub dosage: String,
    /// e.g. "Twice daily"
    pub frequency: String,
    /// e.g. "7 days"
    pub duration: String,
    pub instructions: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: PrescriptionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: PrescriptionDetails,
    pub prescribed_date: NaiveDateTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub patient_name: String,
    pub doctor_name: String,
}
