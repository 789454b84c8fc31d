//! Record access authorization.
//!
//! The actor's role is resolved once per request (see `api::middleware::auth`)
//! and every record is reduced to a [`RecordScope`] before checking. Rules are
//! checked in order, default deny:
//! 1. Staff → any record
//! 2. Assigned doctor → doctor-scoped records naming them
//! 3. Any doctor → patient-level records (clinical access to the register)
//! 4. Owner → records of a patient the account registered
//! 5. Account holder → records addressed to the account
//! 6. Default → DENY

use serde::Serialize;
use uuid::Uuid;

use crate::error::ServiceError;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// What the authenticated account is acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor { doctor_id: Uuid },
    Staff,
}

/// The authenticated identity performing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff)
    }

    pub fn doctor_id(&self) -> Option<Uuid> {
        match self.role {
            Role::Doctor { doctor_id } => Some(doctor_id),
            _ => None,
        }
    }

    /// Staff or doctor: the clinical side of the house.
    pub fn is_clinician(&self) -> bool {
        !matches!(self.role, Role::Patient)
    }
}

/// The ownership facts of a record that access depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Patient register entries and records that hang only off a patient.
    PatientOwned { owner_id: Uuid },
    /// Records naming a treating doctor.
    DoctorScoped { owner_id: Uuid, doctor_id: Uuid },
    /// Records addressed to a single account.
    Account { account_id: Uuid },
    /// Administration data only staff may touch.
    Administrative,
}

impl RecordScope {
    /// Scope for a record that references a patient and maybe a doctor.
    pub fn clinical(owner_id: Uuid, doctor_id: Option<Uuid>) -> Self {
        match doctor_id {
            Some(doctor_id) => RecordScope::DoctorScoped { owner_id, doctor_id },
            None => RecordScope::PatientOwned { owner_id },
        }
    }
}

/// Why access was granted (or denied), for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    Staff,
    AssignedDoctor,
    ClinicalAccess,
    Owner,
    AccountHolder,
    Denied,
}

#[derive(Debug, Clone, Copy)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

pub fn check_access(actor: &Actor, scope: &RecordScope) -> AccessDecision {
    // Rule 1: Staff
    if actor.is_staff() {
        return AccessDecision::allow(AccessReason::Staff);
    }

    match (*scope, actor.role) {
        // Rule 2: Assigned doctor
        (RecordScope::DoctorScoped { doctor_id, .. }, Role::Doctor { doctor_id: own })
            if doctor_id == own =>
        {
            AccessDecision::allow(AccessReason::AssignedDoctor)
        }
        // Rule 3: Clinical access
        (RecordScope::PatientOwned { .. }, Role::Doctor { .. }) => {
            AccessDecision::allow(AccessReason::ClinicalAccess)
        }
        // Rule 4: Owner
        (RecordScope::PatientOwned { owner_id }, _)
        | (RecordScope::DoctorScoped { owner_id, .. }, _)
            if owner_id == actor.account_id =>
        {
            AccessDecision::allow(AccessReason::Owner)
        }
        // Rule 5: Account holder
        (RecordScope::Account { account_id }, _) if account_id == actor.account_id => {
            AccessDecision::allow(AccessReason::AccountHolder)
        }
        // Rule 6: Default deny
        _ => AccessDecision::deny(),
    }
}

pub fn can_access(actor: &Actor, scope: &RecordScope) -> bool {
    check_access(actor, scope).allowed
}

// ═══════════════════════════════════════════════════════════
// Enforcement
// ═══════════════════════════════════════════════════════════

fn denied(actor: &Actor, action: &str) -> ServiceError {
    tracing::warn!(
        account_id = %actor.account_id,
        username = %actor.username,
        action,
        "Access denied"
    );
    ServiceError::PermissionDenied
}

/// Refuse (and log) unless the actor may access the record.
pub fn ensure_access(actor: &Actor, scope: &RecordScope, action: &str) -> Result<(), ServiceError> {
    let decision = check_access(actor, scope);
    if decision.allowed {
        tracing::debug!(account_id = %actor.account_id, action, reason = ?decision.reason, "Access granted");
        Ok(())
    } else {
        Err(denied(actor, action))
    }
}

/// Refuse (and log) unless a rule decided elsewhere allowed the action.
pub fn ensure_allowed(actor: &Actor, allowed: bool, action: &str) -> Result<(), ServiceError> {
    if allowed {
        Ok(())
    } else {
        Err(denied(actor, action))
    }
}

pub fn ensure_staff(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    ensure_allowed(actor, actor.is_staff(), action)
}

/// Staff or doctor.
pub fn ensure_clinician(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    ensure_allowed(actor, actor.is_clinician(), action)
}

/// A doctor may only name themselves as the treating doctor.
pub fn ensure_own_doctor(actor: &Actor, doctor_id: Option<Uuid>, action: &str) -> Result<(), ServiceError> {
    match (actor.doctor_id(), doctor_id) {
        (Some(own), Some(named)) if own != named => Err(denied(actor, action)),
        _ => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            account_id: Uuid::new_v4(),
            username: "someone".into(),
            role,
        }
    }

    fn doctor() -> (Actor, Uuid) {
        let doctor_id = Uuid::new_v4();
        (actor(Role::Doctor { doctor_id }), doctor_id)
    }

    #[test]
    fn staff_sees_everything() {
        let staff = actor(Role::Staff);
        for scope in [
            RecordScope::PatientOwned { owner_id: Uuid::new_v4() },
            RecordScope::clinical(Uuid::new_v4(), Some(Uuid::new_v4())),
            RecordScope::Account { account_id: Uuid::new_v4() },
            RecordScope::Administrative,
        ] {
            let decision = check_access(&staff, &scope);
            assert!(decision.allowed);
            assert_eq!(decision.reason, AccessReason::Staff);
        }
    }

    #[test]
    fn assigned_doctor_only_for_own_records() {
        let (doc, doctor_id) = doctor();
        let own = RecordScope::clinical(Uuid::new_v4(), Some(doctor_id));
        let other = RecordScope::clinical(Uuid::new_v4(), Some(Uuid::new_v4()));

        assert_eq!(check_access(&doc, &own).reason, AccessReason::AssignedDoctor);
        assert!(!can_access(&doc, &other));
    }

    #[test]
    fn doctor_has_clinical_access_to_patient_records() {
        let (doc, _) = doctor();
        let scope = RecordScope::PatientOwned { owner_id: Uuid::new_v4() };
        assert_eq!(check_access(&doc, &scope).reason, AccessReason::ClinicalAccess);
    }

    #[test]
    fn doctor_without_checkup_doctor_gets_clinical_access() {
        let (doc, _) = doctor();
        let scope = RecordScope::clinical(Uuid::new_v4(), None);
        assert!(can_access(&doc, &scope));
    }

    #[test]
    fn owner_sees_own_patient_records() {
        let patient = actor(Role::Patient);
        let own = RecordScope::PatientOwned { owner_id: patient.account_id };
        let treated = RecordScope::clinical(patient.account_id, Some(Uuid::new_v4()));

        assert_eq!(check_access(&patient, &own).reason, AccessReason::Owner);
        assert_eq!(check_access(&patient, &treated).reason, AccessReason::Owner);
    }

    #[test]
    fn patient_denied_foreign_records() {
        let patient = actor(Role::Patient);
        let foreign = RecordScope::PatientOwned { owner_id: Uuid::new_v4() };
        let decision = check_access(&patient, &foreign);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::Denied);
    }

    #[test]
    fn administrative_is_staff_only() {
        let (doc, _) = doctor();
        assert!(!can_access(&doc, &RecordScope::Administrative));
        assert!(!can_access(&actor(Role::Patient), &RecordScope::Administrative));
    }

    #[test]
    fn account_records_only_for_holder() {
        let holder = actor(Role::Patient);
        let scope = RecordScope::Account { account_id: holder.account_id };
        assert_eq!(check_access(&holder, &scope).reason, AccessReason::AccountHolder);
        let (doc, _) = doctor();
        assert!(!can_access(&doc, &scope));
    }

    #[test]
    fn doctor_cannot_name_another_doctor() {
        let (doc, doctor_id) = doctor();
        assert!(ensure_own_doctor(&doc, Some(doctor_id), "create").is_ok());
        assert!(matches!(
            ensure_own_doctor(&doc, Some(Uuid::new_v4()), "create"),
            Err(ServiceError::PermissionDenied)
        ));
        let staff = actor(Role::Staff);
        assert!(ensure_own_doctor(&staff, Some(Uuid::new_v4()), "create").is_ok());
        assert!(ensure_clinician(&actor(Role::Patient), "list").is_err());
    }
}
