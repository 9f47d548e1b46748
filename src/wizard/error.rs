use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use super::dates::DateRangeError;
use super::WizardStep;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListError {
    #[error("no entry with id {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    InvalidRange,
    SpanTooLong,
    OutOfBounds,
    OverlappingIntervals,
    OutOfOrder,
    RequiredFieldMissing,
    InvalidFormat,
    Immutable,
    Duplicate,
    CapacityReached,
}

impl From<&DateRangeError> for ValidationKind {
    fn from(e: &DateRangeError) -> Self {
        match e {
            DateRangeError::InvalidRange { .. } => Self::InvalidRange,
            DateRangeError::SpanTooLong { .. } => Self::SpanTooLong,
            DateRangeError::OutOfBounds { .. } => Self::OutOfBounds,
            DateRangeError::OverlappingIntervals { .. } => Self::OverlappingIntervals,
            DateRangeError::OutOfOrder { .. } => Self::OutOfOrder,
        }
    }
}

/// One failed rule, attributed to a dotted/indexed field path such as
/// `academicYear.terms[1].startDate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, ValidationKind::RequiredFieldMissing, message)
    }

    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, ValidationKind::InvalidFormat, message)
    }

    pub fn from_range(field: impl Into<String>, e: &DateRangeError) -> Self {
        Self::new(field, ValidationKind::from(e), e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn push(&mut self, e: FieldError) {
        self.errors.push(e);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_kind(&self, kind: ValidationKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// First message per field, for inline display next to an input.
    pub fn field_messages(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for e in &self.errors {
            out.entry(e.field.clone())
                .or_insert_with(|| e.message.clone());
        }
        out
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("draft encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("step has {} validation error(s)", .0.errors.len())]
    Validation(ValidationReport),
    #[error("cannot submit {got} while the wizard is on {expected}")]
    WrongStep {
        expected: WizardStep,
        got: WizardStep,
    },
    #[error("a submit for {0} is already in progress")]
    SubmitInProgress(WizardStep),
    #[error("setup is already complete")]
    AlreadyComplete,
    #[error("failed to save draft: {0}")]
    Persistence(#[from] PersistenceError),
}

impl SubmitError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::WrongStep { .. } => "wrong_step",
            Self::SubmitInProgress(_) => "submit_in_progress",
            Self::AlreadyComplete => "already_complete",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}
