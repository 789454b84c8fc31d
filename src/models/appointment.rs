use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, AppointmentType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDateTime,
    /// Minutes.
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_duration() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: AppointmentDetails,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn ends_at(&self) -> NaiveDateTime {
        self.details.appointment_date + Duration::minutes(i64::from(self.details.duration))
    }
}

/// Appointment with the names a list row needs.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
    pub ends_at: NaiveDateTime,
}
