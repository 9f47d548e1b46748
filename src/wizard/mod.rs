pub mod controller;
pub mod dates;
pub mod error;
pub mod model;
pub mod ordered;
pub mod progress;
pub mod steps;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    Registration,
    Roles,
    AcademicYear,
    ClassSection,
    Subject,
    Complete,
}

impl WizardStep {
    pub const TOTAL: u8 = 5;

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registration" => Some(Self::Registration),
            "roles" => Some(Self::Roles),
            "academicYear" => Some(Self::AcademicYear),
            "classSection" => Some(Self::ClassSection),
            "subject" => Some(Self::Subject),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Roles => "roles",
            Self::AcademicYear => "academicYear",
            Self::ClassSection => "classSection",
            Self::Subject => "subject",
            Self::Complete => "complete",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Registration => "Institution Registration",
            Self::Roles => "User Roles and Permissions",
            Self::AcademicYear => "Academic Year Configuration",
            Self::ClassSection => "Class Organization",
            Self::Subject => "Subject Configuration",
            Self::Complete => "Setup Complete",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Registration => Self::Roles,
            Self::Roles => Self::AcademicYear,
            Self::AcademicYear => Self::ClassSection,
            Self::ClassSection => Self::Subject,
            Self::Subject | Self::Complete => Self::Complete,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Registration | Self::Roles => Self::Registration,
            Self::AcademicYear => Self::Roles,
            Self::ClassSection => Self::AcademicYear,
            Self::Subject => Self::ClassSection,
            Self::Complete => Self::Subject,
        }
    }

    /// 1-based "Step n of 5"; complete reports the last position.
    pub fn position(self) -> u8 {
        match self {
            Self::Registration => 1,
            Self::Roles => 2,
            Self::AcademicYear => 3,
            Self::ClassSection => 4,
            Self::Subject | Self::Complete => 5,
        }
    }

    pub fn overall_percent(self) -> u8 {
        self.position() * 20
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
