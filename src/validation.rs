//! Field-level validation of form input before anything is persisted.
//!
//! Each `validate_*` function collects every problem it finds instead of
//! stopping at the first, so a client can show all messages at once.
//! Cross-field problems go under [`NON_FIELD`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::models::{
    AppointmentDetails, BillingDetails, CheckupDetails, DoctorDetails, EmployeeDetails,
    LabTestDetails, MedicalRecordDetails, Money, NewAccount, PatientDetails,
    PrescriptionDetails,
};

pub const NON_FIELD: &str = "__all__";

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").unwrap());
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-.]{5,19}$").unwrap());
static USERNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

/// `field → [messages]`; empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single error on one field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "This field is required.");
        }
    }

    fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            if !EMAIL.is_match(v.trim()) {
                self.add(field, "Enter a valid email address.");
            }
        }
    }

    fn phone(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            if !PHONE.is_match(v.trim()) {
                self.add(field, "Enter a valid phone number.");
            }
        }
    }

    fn range_f64(&mut self, field: &str, value: Option<f64>, min: f64, max: f64, message: &str) {
        if let Some(v) = value {
            if !v.is_finite() || v < min || v > max {
                self.add(field, message);
            }
        }
    }

    fn range_u32(&mut self, field: &str, value: Option<u32>, min: u32, max: u32) {
        if let Some(v) = value {
            if v < min || v > max {
                self.add(field, format!("Ensure this value is between {min} and {max}."));
            }
        }
    }

    /// Non-negative and within ten digits, two of them decimals.
    fn amount(&mut self, field: &str, value: Money) {
        if value.is_negative() {
            self.add(field, "Amount cannot be negative.");
        } else if value > Money::MAX {
            self.add(field, "Ensure that there are no more than 10 digits in total.");
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ═══════════════════════════════════════════════════════════
// Shared rules
// ═══════════════════════════════════════════════════════════

fn earliest_birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn height_weight(errors: &mut ValidationErrors, height: Option<f64>, weight: Option<f64>) {
    errors.range_f64("height", height, 30.0, 300.0, "Height must be between 30 and 300 cm.");
    errors.range_f64("weight", weight, 1.0, 500.0, "Weight must be between 1 and 500 kg.");
}

// ═══════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════

pub fn validate_account(account: &NewAccount) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("username", &account.username);
    if !account.username.trim().is_empty() && !USERNAME.is_match(&account.username) {
        errors.add(
            "username",
            "Username can only contain letters, numbers, and underscores.",
        );
    }
    errors.email("email", account.email.as_deref());
    errors.into_result()
}

pub fn validate_patient(details: &PatientDetails, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("first_name", &details.first_name);
    errors.required("last_name", &details.last_name);

    if details.date_of_birth > today {
        errors.add("date_of_birth", "Date of birth cannot be in the future.");
    } else if details.date_of_birth < earliest_birth_date() {
        errors.add("date_of_birth", "Please enter a valid date of birth.");
    }

    height_weight(&mut errors, details.height, details.weight);
    errors.email("email", details.email.as_deref());
    errors.phone("contact_number", details.contact_number.as_deref());
    errors.phone(
        "emergency_contact_phone",
        details.emergency_contact_phone.as_deref(),
    );
    errors.into_result()
}

pub fn validate_doctor(details: &DoctorDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("license_number", &details.license_number);
    errors.required("qualification", &details.qualification);
    errors.required("phone_number", &details.phone_number);
    errors.phone("phone_number", Some(&details.phone_number));
    errors.range_u32("years_of_experience", Some(details.years_of_experience), 0, 80);
    if let Some(fee) = details.consultation_fee {
        errors.amount("consultation_fee", fee);
    }
    errors.into_result()
}

/// `now` is only consulted when `creating`; edits may keep a past date.
pub fn validate_appointment(
    details: &AppointmentDetails,
    now: NaiveDateTime,
    creating: bool,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("reason", &details.reason);
    if creating && details.appointment_date < now {
        errors.add("appointment_date", "Appointment date cannot be in the past.");
    }
    errors.range_u32("duration", Some(details.duration), 5, 480);
    errors.into_result()
}

pub fn validate_checkup(details: &CheckupDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("chief_complaint", &details.chief_complaint);
    errors.range_f64(
        "temperature",
        details.temperature,
        90.0,
        110.0,
        "Temperature must be between 90 and 110 °F.",
    );
    errors.range_u32("blood_pressure_systolic", details.blood_pressure_systolic, 50, 300);
    errors.range_u32("blood_pressure_diastolic", details.blood_pressure_diastolic, 30, 200);
    errors.range_u32("heart_rate", details.heart_rate, 30, 250);
    errors.range_u32("respiratory_rate", details.respiratory_rate, 5, 60);
    errors.range_f64(
        "oxygen_saturation",
        details.oxygen_saturation,
        70.0,
        100.0,
        "Oxygen saturation must be between 70 and 100%.",
    );
    errors.range_u32("pain_scale", details.pain_scale, 0, 10);
    height_weight(&mut errors, details.height, details.weight);
    errors.into_result()
}

pub fn validate_prescription(details: &PrescriptionDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("medication_name", &details.medication_name);
    errors.required("dosage", &details.dosage);
    errors.required("frequency", &details.frequency);
    errors.required("duration", &details.duration);
    errors.required("instructions", &details.instructions);
    if let Some(end) = details.end_date {
        if end <= details.start_date {
            errors.add(NON_FIELD, "End date must be after start date.");
        }
    }
    errors.into_result()
}

pub fn validate_medical_record(details: &MedicalRecordDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("title", &details.title);
    errors.required("description", &details.description);
    if details.requires_followup && details.followup_date.is_none() {
        errors.add(
            "followup_date",
            "Follow-up date is required when follow-up is requested.",
        );
    }
    errors.into_result()
}

pub fn validate_lab_test(details: &LabTestDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("test_name", &details.test_name);
    errors.required("test_description", &details.test_description);
    if let Some(completed) = details.completed_date {
        if completed < details.ordered_date {
            errors.add(
                "completed_date",
                "Completed date cannot be before the ordered date.",
            );
        }
    }
    errors.into_result()
}

pub fn validate_billing(details: &BillingDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("description", &details.description);
    errors.amount("amount", details.amount);
    errors.amount("tax_amount", details.tax_amount);
    errors.amount("discount_amount", details.discount_amount);
    errors.amount("insurance_amount", details.insurance_amount);
    if let Some(total) = details.total_amount {
        errors.amount("total_amount", total);
    }
    if details.discount_amount > details.amount {
        errors.add(
            NON_FIELD,
            "Discount amount cannot be greater than the total amount.",
        );
    }
    errors.into_result()
}

pub fn validate_employee(details: &EmployeeDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.required("employee_number", &details.employee_number);
    errors.required("department", &details.department);
    errors.required("phone_number", &details.phone_number);
    errors.phone("phone_number", Some(&details.phone_number));
    errors.required("emergency_contact_name", &details.emergency_contact_name);
    errors.required("emergency_contact_phone", &details.emergency_contact_phone);
    errors.phone(
        "emergency_contact_phone",
        Some(&details.emergency_contact_phone),
    );
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient(dob: &str) -> PatientDetails {
        serde_json::from_value(json!({
            "first_name": "Asha",
            "last_name": "Rao",
            "date_of_birth": dob,
            "gender": "F"
        }))
        .unwrap()
    }

    #[test]
    fn future_birth_date_rejected() {
        let errors = validate_patient(&patient("2030-01-01"), date(2024, 6, 1)).unwrap_err();
        assert_eq!(
            errors.get("date_of_birth").unwrap(),
            ["Date of birth cannot be in the future."]
        );
    }

    #[test]
    fn ancient_birth_date_rejected() {
        let errors = validate_patient(&patient("1899-12-31"), date(2024, 6, 1)).unwrap_err();
        assert_eq!(
            errors.get("date_of_birth").unwrap(),
            ["Please enter a valid date of birth."]
        );
    }

    #[test]
    fn patient_height_and_contact_checked() {
        let mut details = patient("1990-01-01");
        details.height = Some(10.0);
        details.weight = Some(70.0);
        details.email = Some("not-an-email".into());
        details.contact_number = Some("+91 98765 43210".into());
        let errors = validate_patient(&details, date(2024, 6, 1)).unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, ["email", "height"]);
    }

    #[test]
    fn valid_patient_passes() {
        assert!(validate_patient(&patient("2000-06-15"), date(2024, 6, 1)).is_ok());
    }

    fn prescription(start: &str, end: Option<&str>) -> PrescriptionDetails {
        serde_json::from_value(json!({
            "patient_id": uuid::Uuid::new_v4(),
            "doctor_id": uuid::Uuid::new_v4(),
            "medication_name": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "Twice daily",
            "duration": "7 days",
            "instructions": "After food",
            "start_date": start,
            "end_date": end
        }))
        .unwrap()
    }

    #[test]
    fn prescription_end_equal_to_start_rejected() {
        let errors = validate_prescription(&prescription("2024-01-10", Some("2024-01-10")))
            .unwrap_err();
        assert_eq!(
            errors.get(NON_FIELD).unwrap(),
            ["End date must be after start date."]
        );
        assert!(validate_prescription(&prescription("2024-01-10", Some("2024-01-11"))).is_ok());
        assert!(validate_prescription(&prescription("2024-01-10", None)).is_ok());
    }

    fn billing(amount: f64, discount: f64) -> BillingDetails {
        serde_json::from_value(json!({
            "patient_id": uuid::Uuid::new_v4(),
            "billing_type": "Consultation",
            "description": "Visit",
            "amount": amount,
            "tax_amount": 10.0,
            "discount_amount": discount,
            "due_date": "2024-02-01"
        }))
        .unwrap()
    }

    #[test]
    fn discount_above_amount_rejected() {
        let errors = validate_billing(&billing(100.0, 150.0)).unwrap_err();
        assert_eq!(
            errors.get(NON_FIELD).unwrap(),
            ["Discount amount cannot be greater than the total amount."]
        );
        assert!(validate_billing(&billing(100.0, 5.0)).is_ok());
    }

    #[test]
    fn negative_amount_rejected() {
        let errors = validate_billing(&billing(-1.0, 0.0)).unwrap_err();
        assert!(errors.get("amount").is_some());
    }

    #[test]
    fn amounts_capped_at_ten_digits() {
        let errors = validate_billing(&billing(9.0e16, 0.0)).unwrap_err();
        assert_eq!(
            errors.get("amount").unwrap(),
            ["Ensure that there are no more than 10 digits in total."]
        );
        assert!(validate_billing(&billing(99_999_999.99, 0.0)).is_ok());
        assert!(validate_billing(&billing(100_000_000.0, 0.0)).is_err());
    }

    #[test]
    fn vitals_out_of_range_reported_per_field() {
        let details: CheckupDetails = serde_json::from_value(json!({
            "patient_id": uuid::Uuid::new_v4(),
            "chief_complaint": "Fever",
            "temperature": 120.0,
            "blood_pressure_systolic": 120,
            "blood_pressure_diastolic": 20,
            "heart_rate": 72,
            "oxygen_saturation": 98.0,
            "pain_scale": 11
        }))
        .unwrap();
        let errors = validate_checkup(&details).unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, ["blood_pressure_diastolic", "pain_scale", "temperature"]);
    }

    #[test]
    fn appointment_past_date_only_checked_on_create() {
        let details: AppointmentDetails = serde_json::from_value(json!({
            "patient_id": uuid::Uuid::new_v4(),
            "doctor_id": uuid::Uuid::new_v4(),
            "appointment_date": "2024-01-01T09:00:00",
            "reason": "Checkup"
        }))
        .unwrap();
        let now = date(2024, 6, 1).and_hms_opt(8, 0, 0).unwrap();
        assert!(validate_appointment(&details, now, true).is_err());
        assert!(validate_appointment(&details, now, false).is_ok());
    }

    #[test]
    fn followup_requires_date() {
        let details: MedicalRecordDetails = serde_json::from_value(json!({
            "patient_id": uuid::Uuid::new_v4(),
            "record_type": "Imaging",
            "title": "Chest X-ray",
            "description": "PA view",
            "requires_followup": true
        }))
        .unwrap();
        let errors = validate_medical_record(&details).unwrap_err();
        assert!(errors.get("followup_date").is_some());
    }

    #[test]
    fn username_charset_enforced() {
        let account = NewAccount {
            username: "bad name".into(),
            ..Default::default()
        };
        assert!(validate_account(&account).is_err());
    }

    #[test]
    fn display_joins_messages() {
        let mut errors = ValidationErrors::new();
        errors.add("a", "one");
        errors.add("b", "two");
        assert_eq!(errors.to_string(), "a: one; b: two");
    }
}
