//! crates/personnel_core/src/error.rs
//!
//! The user-facing failure taxonomy. Every network error is converted into one
//! of these at the operation boundary; the `Display` text is what the view shows.

use crate::ports::PortError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,

    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("Failed to load {entity} records: {reason}")]
    LoadFailure { entity: String, reason: String },

    #[error("Failed to save {entity} record: {reason}")]
    SaveFailure { entity: String, reason: String },

    #[error("Failed to delete {entity} record: {reason}")]
    DeleteFailure { entity: String, reason: String },

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Field '{0}' is computed and cannot be edited")]
    ReadOnlyField(String),

    #[error("Deletion of record {0} has not been confirmed")]
    ConfirmationRequired(String),

    #[error("A request from this view is still in flight")]
    Busy,

    #[error("No record dialog is open")]
    NoActiveDraft,

    #[error("Record {0} is not in the current list")]
    NotFound(String),

    #[error("The signed-in account may not {0}")]
    NotPermitted(String),
}

impl ViewError {
    pub fn load(entity: &str, err: &PortError) -> Self {
        Self::classify(err).unwrap_or_else(|| ViewError::LoadFailure {
            entity: entity.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn save(entity: &str, err: &PortError) -> Self {
        Self::classify(err).unwrap_or_else(|| ViewError::SaveFailure {
            entity: entity.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn delete(entity: &str, err: &PortError) -> Self {
        Self::classify(err).unwrap_or_else(|| ViewError::DeleteFailure {
            entity: entity.to_string(),
            reason: err.to_string(),
        })
    }

    /// Unauthorized responses mean the session is gone regardless of the operation.
    fn classify(err: &PortError) -> Option<Self> {
        match err {
            PortError::Unauthorized => Some(ViewError::SessionExpired),
            _ => None,
        }
    }
}
