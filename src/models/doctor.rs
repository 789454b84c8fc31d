use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Specialization;
use super::money::Money;
use crate::clinical::{self, ExperienceLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorDetails {
    pub license_number: String,
    pub specialization: Specialization,
    pub phone_number: String,
    #[serde(default)]
    pub years_of_experience: u32,
    pub qualification: String,
    #[serde(default)]
    pub hospital_affiliation: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub consultation_fee: Option<Money>,
    #[serde(default = "default_days")]
    pub available_days: String,
    #[serde(default = "default_hours")]
    pub available_hours: String,
    #[serde(default = "default_languages")]
    pub languages_spoken: String,
}

fn default_days() -> String {
    "Monday-Friday".into()
}

fn default_hours() -> String {
    "9:00 AM - 5:00 PM".into()
}

fn default_languages() -> String {
    "English".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(flatten)]
    pub details: DoctorDetails,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn experience_level(&self) -> ExperienceLevel {
        clinical::experience_level(self.details.years_of_experience)
    }
}

/// Doctor joined with the account name, as shown in lists.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub full_name: String,
    pub experience_level: ExperienceLevel,
}
