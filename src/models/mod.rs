pub mod account;
pub mod appointment;
pub mod billing;
pub mod checkup;
pub mod doctor;
pub mod employee;
pub mod enums;
pub mod history;
pub mod medical_record;
pub mod money;
pub mod notification;
pub mod patient;
pub mod prescription;

pub use account::*;
pub use appointment::*;
pub use billing::*;
pub use checkup::*;
pub use doctor::*;
pub use employee::*;
pub use history::*;
pub use lab_test::*;
pub use medical_record::*;
pub use money::Money;
pub use notification::*;
pub use patient::*;
pub use prescription::*;

use chrono::NaiveDateTime;

// serde `default = "..."` helpers shared by the form types.

pub(crate) fn default_now() -> NaiveDateTime {
    crate::clinical::now()
}

pub(crate) fn default_unknown() -> String {
    "Unknown".into()
}
