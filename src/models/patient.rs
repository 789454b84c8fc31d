use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::default_unknown;
use super::enums::{AlcoholConsumption, BloodType, Gender, MaritalStatus, SmokingStatus};
use crate::clinical::{self, BmiCategory};

/// Editable patient demographics and medical background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_unknown")]
    pub city: String,
    #[serde(default = "default_unknown")]
    pub state: String,
    #[serde(default = "default_zip")]
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub blood_type: BloodType,
    /// Centimetres.
    #[serde(default)]
    pub height: Option<f64>,
    /// Kilograms.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub current_medications: Option<String>,
    #[serde(default)]
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default = "default_unknown")]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default = "default_unknown")]
    pub emergency_contact_relationship: String,
    #[serde(default)]
    pub insurance_provider: Option<String>,
    #[serde(default)]
    pub insurance_number: Option<String>,
    #[serde(default)]
    pub insurance_expiry: Option<NaiveDate>,
    #[serde(default = "default_language")]
    pub preferred_language: String,
    #[serde(default)]
    pub smoking_status: SmokingStatus,
    #[serde(default)]
    pub alcohol_consumption: AlcoholConsumption,
}

fn default_zip() -> String {
    "00000".into()
}

fn default_country() -> String {
    "India".into()
}

fn default_language() -> String {
    "English".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Account that registered the patient.
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub details: PatientDetails,
    pub photo_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        self.details.full_name()
    }

    pub fn age_on(&self, today: NaiveDate) -> i32 {
        clinical::age_on(self.details.date_of_birth, today)
    }

    pub fn bmi(&self) -> Option<f64> {
        clinical::bmi(self.details.height, self.details.weight)
    }

    pub fn bmi_category(&self) -> BmiCategory {
        clinical::bmi_category(self.bmi())
    }

    /// Short form of the identifier used in list labels.
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

impl PatientDetails {
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().map(str::trim) {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// Patient as returned by detail and list endpoints, with derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: Patient,
    pub full_name: String,
    pub age: i32,
    pub bmi: Option<f64>,
    pub bmi_category: BmiCategory,
}

impl PatientView {
    pub fn new(patient: Patient, today: NaiveDate) -> Self {
        Self {
            full_name: patient.full_name(),
            age: patient.age_on(today),
            bmi: patient.bmi(),
            bmi_category: patient.bmi_category(),
            patient,
        }
    }
}
