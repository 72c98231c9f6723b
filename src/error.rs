//! Error types for job validation and volume compilation
//!
//! Two recoverable failure kinds exist: a payload that violates the field
//! contract, and a symbolic name with no catalog entry. Anything else is a
//! programming defect, not a modeled runtime error.

use thiserror::Error;

/// A single field-level violation found while validating a payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Field name as it appears on the wire
    pub field: String,
    /// What was wrong with it
    pub kind: FieldErrorKind,
}

/// The ways a payload field can be invalid
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// Required field absent from the payload
    Missing,
    /// Field present with the wrong JSON type; an explicit `null` counts as a
    /// wrong type, never as absence
    InvalidType {
        /// The type the field contract declares
        expected: &'static str,
    },
}

impl FieldError {
    /// A required field was absent
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Missing,
        }
    }

    /// A field was present with the wrong JSON type
    pub fn invalid_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::InvalidType { expected },
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FieldErrorKind::Missing => write!(f, "missing required field '{}'", self.field),
            FieldErrorKind::InvalidType { expected } => {
                write!(f, "field '{}' must be of type {}", self.field, expected)
            }
        }
    }
}

/// Main error type for job-core operations
#[derive(Debug, Error)]
pub enum Error {
    /// One or more payload fields are missing or mistyped
    #[error("validation failed: {}", join_field_errors(.errors))]
    Validation {
        /// Every violation found, not just the first
        errors: Vec<FieldError>,
    },

    /// A symbolic experiment or repository name has no catalog entry
    #[error("unknown identifier '{identifier}' in {catalog}")]
    UnknownResource {
        /// The identifier that missed
        identifier: String,
        /// The catalog consulted
        catalog: &'static str,
    },
}

impl Error {
    /// Create a validation error from collected field violations
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { errors }
    }

    /// Create an unknown-resource error for a failed catalog lookup
    pub fn unknown_resource(identifier: impl Into<String>, catalog: &'static str) -> Self {
        Self::UnknownResource {
            identifier: identifier.into(),
            catalog,
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
