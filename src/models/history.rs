use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::ChangeKind;

/// One saved state of an audited entity.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub seq: i64,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub version: i64,
    pub change: ChangeKind,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub snapshot: serde_json::Value,
}

/// Entity kinds that carry a version log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditedEntity {
    Patient,
    Doctor,
    Appointment,
    Checkup,
    Prescription,
    MedicalRecord,
    LabTest,
    Billing,
    Employee,
}

impl AuditedEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditedEntity::Patient => "patient",
            AuditedEntity::Doctor => "doctor",
            AuditedEntity::Appointment => "appointment",
            AuditedEntity::Checkup => "checkup",
            AuditedEntity::Prescription => "prescription",
            AuditedEntity::MedicalRecord => "medical_record",
            AuditedEntity::LabTest => "lab_test",
            AuditedEntity::Billing => "billing",
            AuditedEntity::Employee => "employee",
        }
    }

    /// Accepts both the storage name and the URL segment used by the API.
    pub fn from_path(s: &str) -> Option<Self> {
        match s {
            "patient" | "patients" => Some(AuditedEntity::Patient),
            "doctor" | "doctors" => Some(AuditedEntity::Doctor),
            "appointment" | "appointments" => Some(AuditedEntity::Appointment),
            "checkup" | "checkups" => Some(AuditedEntity::Checkup),
            "prescription" | "prescriptions" => Some(AuditedEntity::Prescription),
            "medical_record" | "medical-records" => Some(AuditedEntity::MedicalRecord),
            "lab_test" | "lab-tests" => Some(AuditedEntity::LabTest),
            "billing" => Some(AuditedEntity::Billing),
            "employee" | "employees" => Some(AuditedEntity::Employee),
            _ => None,
        }
    }
}
