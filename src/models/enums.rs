use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The display string is also the wire and storage representation.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

macro_rules! default_variant {
    ($name:ident => $variant:ident) => {
        impl Default for $name {
            fn default() -> Self {
                Self::$variant
            }
        }
    };
}

str_enum!(Gender {
    Male => "M",
    Female => "F",
    Other => "O",
    PreferNotToSay => "P",
});

impl Gender {
    /// Human-readable label, as shown in autocomplete results.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::PreferNotToSay => "Prefer not to say",
        }
    }
}

str_enum!(BloodType {
    APositive => "A+",
    ANegative => "A-",
    BPositive => "B+",
    BNegative => "B-",
    AbPositive => "AB+",
    AbNegative => "AB-",
    OPositive => "O+",
    ONegative => "O-",
    Unknown => "Unknown",
});
default_variant!(BloodType => Unknown);

str_enum!(MaritalStatus {
    Single => "Single",
    Married => "Married",
    Divorced => "Divorced",
    Widowed => "Widowed",
    Other => "Other",
});
default_variant!(MaritalStatus => Single);

str_enum!(SmokingStatus {
    Never => "Never",
    Former => "Former",
    Current => "Current",
    Unknown => "Unknown",
});
default_variant!(SmokingStatus => Unknown);

str_enum!(AlcoholConsumption {
    NoAlcohol => "None",
    Occasional => "Occasional",
    Moderate => "Moderate",
    Heavy => "Heavy",
    Unknown => "Unknown",
});
default_variant!(AlcoholConsumption => Unknown);

str_enum!(Specialization {
    General => "General",
    Cardiology => "Cardiology",
    Dermatology => "Dermatology",
    Endocrinology => "Endocrinology",
    Gastroenterology => "Gastroenterology",
    Neurology => "Neurology",
    Oncology => "Oncology",
    Orthopedics => "Orthopedics",
    Pediatrics => "Pediatrics",
    Psychiatry => "Psychiatry",
    Radiology => "Radiology",
    Surgery => "Surgery",
    Other => "Other",
});

str_enum!(AppointmentStatus {
    Scheduled => "Scheduled",
    Confirmed => "Confirmed",
    InProgress => "In Progress",
    Completed => "Completed",
    Cancelled => "Cancelled",
    NoShow => "No Show",
});
default_variant!(AppointmentStatus => Scheduled);

str_enum!(AppointmentType {
    Consultation => "Consultation",
    FollowUp => "Follow-up",
    Emergency => "Emergency",
    RoutineCheckup => "Routine Checkup",
    Vaccination => "Vaccination",
    LabTest => "Lab Test",
    Other => "Other",
});
default_variant!(AppointmentType => Consultation);

str_enum!(CheckupType {
    Routine => "Routine",
    FollowUp => "Follow-up",
    Emergency => "Emergency",
    Consultation => "Consultation",
    PhysicalExam => "Physical Exam",
    Specialist => "Specialist",
});
default_variant!(CheckupType => Routine);

str_enum!(MentalStatus {
    Alert => "Alert",
    Confused => "Confused",
    Drowsy => "Drowsy",
    Unresponsive => "Unresponsive",
    Other => "Other",
});
default_variant!(MentalStatus => Alert);

str_enum!(SkinColor {
    Normal => "Normal",
    Pale => "Pale",
    Cyanotic => "Cyanotic",
    Jaundiced => "Jaundiced",
    Other => "Other",
});
default_variant!(SkinColor => Normal);

str_enum!(RecordType {
    LabResult => "Lab Result",
    Imaging => "Imaging",
    Prescription => "Prescription",
    Vaccination => "Vaccination",
    Surgery => "Surgery",
    Allergy => "Allergy",
    Insurance => "Insurance",
    Other => "Other",
});

str_enum!(PrescriptionStatus {
    Active => "Active",
    Completed => "Completed",
    Discontinued => "Discontinued",
    OnHold => "On Hold",
});
default_variant!(PrescriptionStatus => Active);

str_enum!(LabTestType {
    Blood => "Blood",
    Urine => "Urine",
    Stool => "Stool",
    Imaging => "Imaging",
    Biopsy => "Biopsy",
    Culture => "Culture",
    Other => "Other",
});

str_enum!(LabTestStatus {
    Ordered => "Ordered",
    InProgress => "In Progress",
    Completed => "Completed",
    Cancelled => "Cancelled",
});
default_variant!(LabTestStatus => Ordered);

str_enum!(BillingType {
    Consultation => "Consultation",
    Procedure => "Procedure",
    LabTest => "Lab Test",
    Medication => "Medication",
    Other => "Other",
});

str_enum!(BillingStatus {
    Pending => "Pending",
    Paid => "Paid",
    Partial => "Partial",
    Cancelled => "Cancelled",
    Refunded => "Refunded",
});
default_variant!(BillingStatus => Pending);

str_enum!(EmployeeRole {
    Doctor => "Doctor",
    Nurse => "Nurse",
    Receptionist => "Receptionist",
    LabTechnician => "Lab Technician",
    Pharmacist => "Pharmacist",
    Administrator => "Administrator",
    Other => "Other",
});

str_enum!(EmploymentStatus {
    FullTime => "Full-time",
    PartTime => "Part-time",
    Contract => "Contract",
    Intern => "Intern",
    Consultant => "Consultant",
});
default_variant!(EmploymentStatus => FullTime);

str_enum!(NotificationType {
    Appointment => "Appointment",
    Checkup => "Checkup",
    LabTest => "Lab Test",
    Billing => "Billing",
    System => "System",
    Security => "Security",
});

str_enum!(NotificationPriority {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Urgent => "Urgent",
});
default_variant!(NotificationPriority => Medium);

str_enum!(ChangeKind {
    Created => "created",
    Updated => "updated",
    Deactivated => "deactivated",
});
