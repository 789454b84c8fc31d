//! Appointment lifecycle and date windows.
//!
//! ```text
//! Scheduled ──► Confirmed ──► In Progress ──► Completed
//!     │             │              │
//!     ├─────────────┴──────────────┴──► Cancelled
//!     └─────────────┴──► No Show
//! ```
//! Scheduled may also go straight to In Progress (walk-ins).

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::models::enums::AppointmentStatus;
use crate::validation::ValidationErrors;

pub fn is_terminal(status: AppointmentStatus) -> bool {
    matches!(
        status,
        AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
    )
}

pub fn allowed_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;
    match from {
        Scheduled => &[Confirmed, InProgress, Cancelled, NoShow],
        Confirmed => &[InProgress, Cancelled, NoShow],
        InProgress => &[Completed, Cancelled],
        Completed | Cancelled | NoShow => &[],
    }
}

/// What applying a requested status would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested status; nothing to write.
    Unchanged,
    Move(AppointmentStatus),
}

pub fn transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<Transition, ValidationErrors> {
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if allowed_transitions(from).contains(&to) {
        return Ok(Transition::Move(to));
    }
    let message = if is_terminal(from) {
        format!("A {from} appointment cannot change status.")
    } else {
        format!("Cannot change status from {from} to {to}.")
    };
    Err(ValidationErrors::single("status", message))
}

/// List filter windows over the appointment datetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateWindow {
    Today,
    Week,
}

impl DateWindow {
    /// Half-open `[start, end)` bounds.
    pub fn bounds(self, today: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = today.and_time(NaiveTime::MIN);
        let days = match self {
            DateWindow::Today => 1,
            // today through today + 7, inclusive
            DateWindow::Week => 8,
        };
        (start, start + Duration::days(days))
    }
}

/// Statuses that count as still upcoming.
pub const OPEN_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed];

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn happy_path_allowed() {
        assert_eq!(transition(Scheduled, Confirmed).unwrap(), Transition::Move(Confirmed));
        assert_eq!(transition(Confirmed, InProgress).unwrap(), Transition::Move(InProgress));
        assert_eq!(transition(InProgress, Completed).unwrap(), Transition::Move(Completed));
    }

    #[test]
    fn same_status_is_noop() {
        for status in AppointmentStatus::ALL {
            assert_eq!(transition(*status, *status).unwrap(), Transition::Unchanged);
        }
    }

    #[test]
    fn terminal_statuses_reject_everything() {
        for from in [Completed, Cancelled, NoShow] {
            for to in AppointmentStatus::ALL.iter().filter(|s| **s != from) {
                let errors = transition(from, *to).unwrap_err();
                assert!(errors.get("status").is_some());
            }
        }
    }

    #[test]
    fn cannot_skip_to_completed() {
        assert!(transition(Scheduled, Completed).is_err());
        assert!(transition(Confirmed, Scheduled).is_err());
    }

    #[test]
    fn week_window_spans_eight_calendar_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (start, end) = DateWindow::Week.bounds(today);
        assert_eq!(start.to_string(), "2024-03-01 00:00:00");
        assert_eq!(end.to_string(), "2024-03-09 00:00:00");
        let (_, end) = DateWindow::Today.bounds(today);
        assert_eq!(end.to_string(), "2024-03-02 00:00:00");
    }
}
