use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::default_now;
use super::enums::{CheckupType, MentalStatus, SkinColor};
use crate::clinical;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckupDetails {
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[serde(default = "default_now")]
    pub checkup_date: NaiveDateTime,
    #[serde(default)]
    pub checkup_type: CheckupType,

    /// Degrees Fahrenheit.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub blood_pressure_systolic: Option<u32>,
    #[serde(default)]
    pub blood_pressure_diastolic: Option<u32>,
    #[serde(default)]
    pub heart_rate: Option<u32>,
    #[serde(default)]
    pub respiratory_rate: Option<u32>,
    /// SpO2 percentage.
    #[serde(default)]
    pub oxygen_saturation: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,

    pub chief_complaint: String,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub physical_examination: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub medications_prescribed: Option<String>,
    #[serde(default)]
    pub follow_up_instructions: Option<String>,
    #[serde(default)]
    pub lab_tests_ordered: Option<String>,
    #[serde(default)]
    pub referrals: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub pain_scale: Option<u32>,
    #[serde(default)]
    pub mental_status: MentalStatus,
    #[serde(default)]
    pub skin_color: SkinColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkup {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: CheckupDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkup {
    pub fn blood_pressure(&self) -> Option<String> {
        clinical::blood_pressure_display(
            self.details.blood_pressure_systolic,
            self.details.blood_pressure_diastolic,
        )
    }

    /// Uses this checkup's own measurements, never the patient's.
    pub fn bmi(&self) -> Option<f64> {
        clinical::bmi(self.details.height, self.details.weight)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckupView {
    #[serde(flatten)]
    pub checkup: Checkup,
    pub patient_name: String,
    pub doctor_name: Option<String>,
    pub blood_pressure: Option<String>,
    pub bmi: Option<f64>,
}

impl CheckupView {
    pub fn new(checkup: Checkup, patient_name: String, doctor_name: Option<String>) -> Self {
        Self {
            blood_pressure: checkup.blood_pressure(),
            bmi: checkup.bmi(),
            checkup,
            patient_name,
            doctor_name,
        }
    }
}
