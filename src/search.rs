//! List filters, pagination and the SQL they turn into.
//!
//! Ownership scoping is always pushed first so that no filter combination
//! can widen what an actor sees.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{Actor, Role};
use crate::clinical::years_before;
use crate::db::columns::{fmt_date, fmt_datetime};
use crate::models::enums::*;
use crate::scheduling::DateWindow;

pub const MAX_AGE: u32 = 150;

// ═══════════════════════════════════════════════════════════
// Pagination
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Resolved page window for a result set of `total` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PageWindow {
    /// Missing or invalid pages fall back to 1; pages past the end clamp to
    /// the last one.
    pub fn resolve(requested: Option<&str>, per_page: u32, total: u64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = total.div_ceil(u64::from(per_page)).max(1);
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        let page = requested
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
            .min(total_pages);
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// SQL assembly
// ═══════════════════════════════════════════════════════════

/// WHERE clauses joined with AND, with positional `?` parameters.
#[derive(Debug, Default)]
pub struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause; `params` must match its `?` placeholders in order.
    pub fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    pub fn push_uuid(&mut self, column: &str, id: Uuid) {
        self.push(format!("{column} = ?"), [text(id.to_string())]);
    }

    pub fn push_eq(&mut self, column: &str, value: &str) {
        self.push(format!("{column} = ?"), [text(value)]);
    }

    /// Case-insensitive substring match over several columns.
    pub fn push_search(&mut self, columns: &[&str], needle: &str) {
        let needle = needle.trim();
        if needle.is_empty() || columns.is_empty() {
            return;
        }
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
        let clause = columns
            .iter()
            .map(|c| format!("LOWER({c}) LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            format!("({clause})"),
            columns.iter().map(|_| text(pattern.clone())),
        );
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameters followed by LIMIT and OFFSET values.
    pub fn params_with_window(&self, window: &PageWindow) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(window.limit()));
        params.push(Value::Integer(window.offset()));
        params
    }
}

pub fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Ownership scoping
// ═══════════════════════════════════════════════════════════

/// How a listed table names its doctor, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorLink {
    None,
    Required(&'static str),
    Optional(&'static str),
}

/// Rows an actor may see, as SQL over the joined patients table `p`.
///
/// Mirrors [`crate::authorization::check_access`] for list views.
pub fn visibility(actor: &Actor, link: DoctorLink) -> Conditions {
    let mut conditions = Conditions::new();
    let owner = text(actor.account_id.to_string());
    match (actor.role, link) {
        (Role::Staff, _) => {}
        (Role::Doctor { .. }, DoctorLink::None) => {}
        (Role::Doctor { doctor_id }, DoctorLink::Required(column)) => {
            conditions.push(
                format!("({column} = ? OR p.owner_id = ?)"),
                [text(doctor_id.to_string()), owner],
            );
        }
        (Role::Doctor { doctor_id }, DoctorLink::Optional(column)) => {
            conditions.push(
                format!("({column} IS NULL OR {column} = ? OR p.owner_id = ?)"),
                [text(doctor_id.to_string()), owner],
            );
        }
        (Role::Patient, _) => conditions.push("p.owner_id = ?", [owner]),
    }
    conditions
}

// ═══════════════════════════════════════════════════════════
// Age range
// ═══════════════════════════════════════════════════════════

/// Birth-date bounds `(earliest, latest)` for an inclusive age range.
///
/// `age_min` → born on or before today − age_min years;
/// `age_max` → born on or after today − (age_max + 1) years.
pub fn birth_date_bounds(
    today: NaiveDate,
    age_min: Option<u32>,
    age_max: Option<u32>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let latest = age_min.map(|min| years_before(today, min.min(MAX_AGE) as i32));
    let earliest = age_max.map(|max| years_before(today, max.min(MAX_AGE) as i32 + 1));
    (earliest, latest)
}

fn push_date_range(
    conditions: &mut Conditions,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) {
    if let Some(from) = from {
        conditions.push(format!("{column} >= ?"), [text(fmt_date(&from))]);
    }
    if let Some(to) = to {
        // inclusive of the whole day
        if let Some(next) = to.succ_opt() {
            conditions.push(format!("{column} < ?"), [text(fmt_date(&next))]);
        }
    }
}

pub(crate) fn push_datetime_window(
    conditions: &mut Conditions,
    column: &str,
    (start, end): (NaiveDateTime, NaiveDateTime),
) {
    conditions.push(
        format!("{column} >= ? AND {column} < ?"),
        [text(fmt_datetime(&start)), text(fmt_datetime(&end))],
    );
}

// ═══════════════════════════════════════════════════════════
// Filters (query-string shapes)
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientFilter {
    pub search: Option<String>,
    pub blood_type: Option<BloodType>,
    pub gender: Option<Gender>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub page: Option<String>,
}

impl PatientFilter {
    /// `p` is the patients table alias.
    pub fn apply(&self, conditions: &mut Conditions, today: NaiveDate) {
        if let Some(search) = &self.search {
            conditions.push_search(
                &["p.first_name", "p.last_name", "p.id", "p.contact_number", "p.email"],
                search,
            );
        }
        if let Some(blood_type) = self.blood_type {
            conditions.push_eq("p.blood_type", blood_type.as_str());
        }
        if let Some(gender) = self.gender {
            conditions.push_eq("p.gender", gender.as_str());
        }
        let (earliest, latest) = birth_date_bounds(today, self.age_min, self.age_max);
        if let Some(latest) = latest {
            conditions.push("p.date_of_birth <= ?", [text(fmt_date(&latest))]);
        }
        if let Some(earliest) = earliest {
            conditions.push("p.date_of_birth >= ?", [text(fmt_date(&earliest))]);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub date: Option<DateWindow>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<String>,
}

impl AppointmentFilter {
    /// `a` is the appointments table alias.
    pub fn apply(&self, conditions: &mut Conditions, today: NaiveDate) {
        if let Some(status) = self.status {
            conditions.push_eq("a.status", status.as_str());
        }
        if let Some(window) = self.date {
            push_datetime_window(conditions, "a.appointment_date", window.bounds(today));
        }
        if let Some(doctor_id) = self.doctor_id {
            conditions.push_uuid("a.doctor_id", doctor_id);
        }
        if let Some(patient_id) = self.patient_id {
            conditions.push_uuid("a.patient_id", patient_id);
        }
        push_date_range(conditions, "a.appointment_date", self.date_from, self.date_to);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckupFilter {
    pub checkup_type: Option<CheckupType>,
    pub patient_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<String>,
}

impl CheckupFilter {
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(kind) = self.checkup_type {
            conditions.push_eq("c.checkup_type", kind.as_str());
        }
        if let Some(patient_id) = self.patient_id {
            conditions.push_uuid("c.patient_id", patient_id);
        }
        push_date_range(conditions, "c.checkup_date", self.date_from, self.date_to);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionFilter {
    pub status: Option<PrescriptionStatus>,
    pub patient_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<String>,
}

impl PrescriptionFilter {
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(status) = self.status {
            conditions.push_eq("r.status", status.as_str());
        }
        if let Some(patient_id) = self.patient_id {
            conditions.push_uuid("r.patient_id", patient_id);
        }
        if let Some(search) = &self.search {
            conditions.push_search(&["r.medication_name", "p.first_name", "p.last_name"], search);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalRecordFilter {
    pub record_type: Option<RecordType>,
    pub patient_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<String>,
}

impl MedicalRecordFilter {
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(kind) = self.record_type {
            conditions.push_eq("m.record_type", kind.as_str());
        }
        if let Some(patient_id) = self.patient_id {
            conditions.push_uuid("m.patient_id", patient_id);
        }
        if let Some(search) = &self.search {
            conditions.push_search(&["m.title", "m.description"], search);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabTestFilter {
    pub status: Option<LabTestStatus>,
    pub test_type: Option<LabTestType>,
    pub patient_id: Option<Uuid>,
    pub page: Option<String>,
}

impl LabTestFilter {
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(status) = self.status {
            conditions.push_eq("l.status", status.as_str());
        }
        if let Some(kind) = self.test_type {
            conditions.push_eq("l.test_type", kind.as_str());
        }
        if let Some(patient_id) = self.patient_id {
            conditions.push_uuid("l.patient_id", patient_id);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingFilter {
    pub status: Option<BillingStatus>,
    pub billing_type: Option<BillingType>,
    pub patient_id: Option<Uuid>,
    pub page: Option<String>,
}

impl BillingFilter {
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(status) = self.status {
            conditions.push_eq("b.status", status.as_str());
        }
        if let Some(kind) = self.billing_type {
            conditions.push_eq("b.billing_type", kind.as_str());
        }
        if let Some(patient_id) = self.patient_id {
            conditions.push_uuid("b.patient_id", patient_id);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorFilter {
    pub search: Option<String>,
    pub specialization: Option<Specialization>,
    pub page: Option<String>,
}

impl DoctorFilter {
    /// `d` is doctors, `u` the joined accounts row.
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(search) = &self.search {
            conditions.push_search(
                &["u.first_name", "u.last_name", "d.specialization", "d.license_number"],
                search,
            );
        }
        if let Some(specialization) = self.specialization {
            conditions.push_eq("d.specialization", specialization.as_str());
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeFilter {
    pub search: Option<String>,
    pub role: Option<EmployeeRole>,
    pub department: Option<String>,
    pub page: Option<String>,
}

impl EmployeeFilter {
    pub fn apply(&self, conditions: &mut Conditions) {
        if let Some(search) = &self.search {
            conditions.push_search(
                &["u.first_name", "u.last_name", "e.employee_number", "e.department"],
                search,
            );
        }
        if let Some(role) = self.role {
            conditions.push_eq("e.role", role.as_str());
        }
        if let Some(department) = self.department.as_deref().filter(|d| !d.trim().is_empty()) {
            conditions.push("LOWER(e.department) = LOWER(?)", [text(department.trim())]);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread: bool,
    pub page: Option<String>,
}
