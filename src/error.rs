//! Error types for the booking service.

use crate::booking::draft::BookingStep;
use crate::booking::model::ServiceCategory;
use crate::booking::schema::FieldName;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while driving a booking session.
///
/// Everything except `Dispatch` is local and shows up as inline field feedback.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Step {step} is incomplete: {}", join_fields(.missing))]
    Validation {
        step: BookingStep,
        missing: Vec<FieldName>,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: FieldName, reason: String },

    #[error("No schema registered for the selected service")]
    SchemaNotFound,

    #[error("Field {field} is not part of the {} schema", category_label(.category))]
    UnknownFieldForCategory {
        field: FieldName,
        category: Option<ServiceCategory>,
    },

    #[error("At most {limit} entries may be selected for {field}")]
    SelectionLimitReached { field: FieldName, limit: usize },

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("Cannot handle {event} while in state {from}")]
    InvalidTransition { from: String, event: String },

    #[error("{0}")]
    Dispatch(#[from] DispatchError),
}

impl BookingError {
    /// Short machine-readable identifier, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InvalidValue { .. } => "invalid_value",
            Self::SchemaNotFound => "schema_not_found",
            Self::UnknownFieldForCategory { .. } => "unknown_field_for_category",
            Self::SelectionLimitReached { .. } => "selection_limit_reached",
            Self::SubmissionInProgress => "submission_in_progress",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Dispatch(_) => "dispatch_error",
        }
    }

    /// Fields the UI should highlight for this error.
    pub fn fields(&self) -> Vec<FieldName> {
        match self {
            Self::Validation { missing, .. } => missing.clone(),
            Self::InvalidValue { field, .. }
            | Self::UnknownFieldForCategory { field, .. }
            | Self::SelectionLimitReached { field, .. } => vec![*field],
            _ => Vec::new(),
        }
    }
}

/// Errors from the external submission dispatcher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("No dispatcher configured: {0}")]
    NotConfigured(String),

    #[error("Dispatcher {dispatcher} rejected the request: {reason}")]
    Rejected { dispatcher: String, reason: String },

    #[error("Dispatcher {dispatcher} transport failure: {reason}")]
    Transport { dispatcher: String, reason: String },

    #[error("Booking request could not be encoded: {0}")]
    InvalidPayload(String),
}

/// Errors from the in-memory session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Too many open booking sessions (limit {limit})")]
    CapacityReached { limit: usize },
}

fn join_fields(fields: &[FieldName]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn category_label(category: &Option<ServiceCategory>) -> String {
    match category {
        Some(c) => c.to_string(),
        None => "unselected".to_string(),
    }
}
