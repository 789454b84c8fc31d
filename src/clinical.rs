//! Derived clinical fields.
//!
//! Pure computations over stored values: age, body-mass index,
//! blood-pressure display and doctor seniority. Nothing here touches the
//! store; every function takes the reference date explicitly so results
//! are reproducible.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

/// Current local date, the "today" used by request handlers.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current local datetime truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Completed years between `dob` and `today`.
///
/// Year difference, minus one when the birthday has not yet occurred in
/// the current year.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

/// Body-mass index from height in centimetres and weight in kilograms,
/// rounded to two decimals.
pub fn bmi(height_cm: Option<f64>, weight_kg: Option<f64>) -> Option<f64> {
    match (height_cm, weight_kg) {
        (Some(h), Some(w)) if h > 0.0 && w > 0.0 => {
            let height_m = h / 100.0;
            Some(round2(w / (height_m * height_m)))
        }
        _ => None,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
    Unknown,
}

pub fn bmi_category(bmi: Option<f64>) -> BmiCategory {
    match bmi {
        None => BmiCategory::Unknown,
        Some(b) if b < 18.5 => BmiCategory::Underweight,
        Some(b) if b < 25.0 => BmiCategory::Normal,
        Some(b) if b < 30.0 => BmiCategory::Overweight,
        Some(_) => BmiCategory::Obese,
    }
}

/// `"<systolic>/<diastolic>"` when both readings are present.
pub fn blood_pressure_display(systolic: Option<u32>, diastolic: Option<u32>) -> Option<String> {
    match (systolic, diastolic) {
        (Some(s), Some(d)) => Some(format!("{s}/{d}")),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExperienceLevel {
    Junior,
    #[serde(rename = "Mid-level")]
    MidLevel,
    Senior,
}

pub fn experience_level(years: u32) -> ExperienceLevel {
    if years < 5 {
        ExperienceLevel::Junior
    } else if years < 15 {
        ExperienceLevel::MidLevel
    } else {
        ExperienceLevel::Senior
    }
}

/// Same calendar day `years` earlier; Feb 29 falls back to Feb 28.
pub fn years_before(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() - years;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}
