use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EmployeeRole, EmploymentStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDetails {
    pub employee_number: String,
    pub role: EmployeeRole,
    pub department: String,
    #[serde(default)]
    pub employment_status: EmploymentStatus,
    pub hire_date: NaiveDate,
    pub phone_number: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(flatten)]
    pub details: EmployeeDetails,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    pub full_name: String,
}
