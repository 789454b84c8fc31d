use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::default_now;
use super::enums::RecordType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecordDetails {
    pub patient_id: Uuid,
    #[serde(default)]
    pub checkup_id: Option<Uuid>,
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    #[serde(default = "default_now")]
    pub record_date: NaiveDateTime,
    #[serde(default)]
    pub is_confidential: bool,
    #[serde(default)]
    pub requires_followup: bool,
    #[serde(default)]
    pub followup_date: Option<NaiveDate>,
    #[serde(default)]
    pub lab_results: Option<String>,
    #[serde(default)]
    pub imaging_results: Option<String>,
    #[serde(default)]
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: MedicalRecordDetails,
    /// Relative to the media root.
    pub attachment_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecordView {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub patient_name: String,
    pub has_attachment: bool,
}
