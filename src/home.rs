//! Dashboard, statistics and report totals.
//!
//! Every count goes through the same ownership scoping as the list views,
//! so a widget never reveals rows its list would hide.

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::authorization::{ensure_clinician, Actor};
use crate::clinical;
use crate::config::{DASHBOARD_RECENT, PATIENT_DASHBOARD_RECENT};
use crate::db::columns::{fmt_datetime, fmt_timestamp};
use crate::db::repository as repo;
use crate::error::ServiceError;
use crate::models::enums::AppointmentStatus;
use crate::models::{AppointmentView, CheckupView, PatientView};
use crate::scheduling::{DateWindow, OPEN_STATUSES};
use crate::search::{push_datetime_window, text, visibility, Conditions, DoctorLink};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DashboardCounts {
    pub total_patients: u64,
    pub total_checkups: u64,
    pub recent_checkups: u64,
    pub total_appointments: u64,
    pub today_appointments: u64,
    pub pending_appointments: u64,
}

/// One fetch for the landing screen.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub counts: DashboardCounts,
    /// Empty for patients.
    pub recent_patients: Vec<PatientView>,
    pub recent_checkups: Vec<CheckupView>,
    pub upcoming_appointments: Vec<AppointmentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientStats {
    pub total: u64,
    pub new_this_week: u64,
    pub new_this_month: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStats {
    pub total: u64,
    pub today: u64,
    pub this_week: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckupStats {
    pub total: u64,
    pub this_week: u64,
    pub this_month: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub patients: PatientStats,
    pub appointments: AppointmentStats,
    pub checkups: CheckupStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportTotals {
    pub total_patients: u64,
    pub total_checkups: u64,
    pub total_appointments: u64,
    pub total_prescriptions: u64,
}

// ---------------------------------------------------------------------------
// Scoped counters
// ---------------------------------------------------------------------------

const APPOINTMENTS: DoctorLink = DoctorLink::Required("a.doctor_id");
const CHECKUPS: DoctorLink = DoctorLink::Optional("c.doctor_id");
const PRESCRIPTIONS: DoctorLink = DoctorLink::Required("r.doctor_id");

fn push_statuses(conditions: &mut Conditions, statuses: &[AppointmentStatus]) {
    let marks = vec!["?"; statuses.len()].join(", ");
    conditions.push(
        format!("a.status IN ({marks})"),
        statuses.iter().map(|s| text(s.as_str())),
    );
}

fn patients_since(conn: &Connection, actor: &Actor, days: Option<i64>) -> Result<u64, ServiceError> {
    let mut conditions = visibility(actor, DoctorLink::None);
    if let Some(days) = days {
        let since = Utc::now() - Duration::days(days);
        conditions.push("p.created_at >= ?", [text(fmt_timestamp(&since))]);
    }
    Ok(repo::count_patients(conn, &mut conditions)?)
}

fn checkups_since(conn: &Connection, actor: &Actor, since: Option<NaiveDateTime>) -> Result<u64, ServiceError> {
    let mut conditions = visibility(actor, CHECKUPS);
    if let Some(since) = since {
        conditions.push("c.checkup_date >= ?", [text(fmt_datetime(&since))]);
    }
    Ok(repo::count_checkups(conn, &conditions)?)
}

fn appointments_where(
    conn: &Connection,
    actor: &Actor,
    window: Option<DateWindow>,
    statuses: &[AppointmentStatus],
) -> Result<u64, ServiceError> {
    let mut conditions = visibility(actor, APPOINTMENTS);
    if let Some(window) = window {
        push_datetime_window(&mut conditions, "a.appointment_date", window.bounds(clinical::today()));
    }
    if !statuses.is_empty() {
        push_statuses(&mut conditions, statuses);
    }
    Ok(repo::count_appointments(conn, &conditions)?)
}

fn upcoming(conn: &Connection, actor: &Actor, limit: u32) -> Result<Vec<AppointmentView>, ServiceError> {
    let mut conditions = visibility(actor, APPOINTMENTS);
    conditions.push(
        "a.appointment_date >= ?",
        [text(fmt_datetime(&clinical::now()))],
    );
    push_statuses(&mut conditions, &OPEN_STATUSES);
    Ok(repo::next_appointments(conn, &conditions, limit)?)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Clinicians get the clinic-wide view (as far as their lists reach);
/// patient accounts get their own patients only.
pub fn dashboard(conn: &Connection, actor: &Actor) -> Result<Dashboard, ServiceError> {
    let month_ago = clinical::now() - Duration::days(30);
    let counts = DashboardCounts {
        total_patients: patients_since(conn, actor, None)?,
        total_checkups: checkups_since(conn, actor, None)?,
        recent_checkups: checkups_since(conn, actor, Some(month_ago))?,
        total_appointments: appointments_where(conn, actor, None, &[])?,
        today_appointments: appointments_where(conn, actor, Some(DateWindow::Today), &OPEN_STATUSES)?,
        pending_appointments: appointments_where(conn, actor, None, &[AppointmentStatus::Scheduled])?,
    };

    let limit = if actor.is_clinician() {
        DASHBOARD_RECENT
    } else {
        PATIENT_DASHBOARD_RECENT
    };
    let recent_patients = if actor.is_clinician() {
        let today = clinical::today();
        let mut conditions = visibility(actor, DoctorLink::None);
        repo::recent_patients(conn, &mut conditions, limit)?
            .into_iter()
            .map(|p| PatientView::new(p, today))
            .collect()
    } else {
        Vec::new()
    };
    let recent_checkups = repo::recent_checkups(conn, &visibility(actor, CHECKUPS), limit)?;

    tracing::debug!(account_id = %actor.account_id, "Dashboard assembled");
    Ok(Dashboard {
        counts,
        recent_patients,
        recent_checkups,
        upcoming_appointments: upcoming(conn, actor, limit)?,
    })
}

pub fn dashboard_stats(conn: &Connection, actor: &Actor) -> Result<DashboardStats, ServiceError> {
    ensure_clinician(actor, "view statistics")?;
    let now = clinical::now();
    Ok(DashboardStats {
        patients: PatientStats {
            total: patients_since(conn, actor, None)?,
            new_this_week: patients_since(conn, actor, Some(7))?,
            new_this_month: patients_since(conn, actor, Some(30))?,
        },
        appointments: AppointmentStats {
            total: appointments_where(conn, actor, None, &[])?,
            today: appointments_where(conn, actor, Some(DateWindow::Today), &[])?,
            this_week: appointments_where(conn, actor, Some(DateWindow::Week), &[])?,
            pending: appointments_where(conn, actor, None, &[AppointmentStatus::Scheduled])?,
        },
        checkups: CheckupStats {
            total: checkups_since(conn, actor, None)?,
            this_week: checkups_since(conn, actor, Some(now - Duration::days(7)))?,
            this_month: checkups_since(conn, actor, Some(now - Duration::days(30)))?,
        },
    })
}

pub fn report_totals(conn: &Connection, actor: &Actor) -> Result<ReportTotals, ServiceError> {
    ensure_clinician(actor, "view reports")?;
    Ok(ReportTotals {
        total_patients: patients_since(conn, actor, None)?,
        total_checkups: checkups_since(conn, actor, None)?,
        total_appointments: appointments_where(conn, actor, None, &[])?,
        total_prescriptions: repo::count_prescriptions(conn, &visibility(actor, PRESCRIPTIONS))?,
    })
}
