use std::fmt;

use thiserror::Error;

use crate::records::RecordId;

/// Failure reported by a record store for a whole operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Per-field form errors collected before any store call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|err| err.field == field)
            .map(|err| err.message.as_str())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|err| err.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    /// Text shown to the operator in the status line or a dialog.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::Store(err) => err.to_string(),
            AppError::Unexpected(_) => "An unexpected error occurred".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_join_messages() {
        let mut errors = ValidationErrors::default();
        errors.push("name", "Name is required");
        errors.push("phone", "Phone is required");
        assert_eq!(errors.to_string(), "Name is required; Phone is required");
        assert_eq!(errors.for_field("phone"), Some("Phone is required"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn unexpected_errors_hide_details_from_operator() {
        let err = AppError::from(anyhow::anyhow!("socket closed"));
        assert_eq!(err.user_message(), "An unexpected error occurred");
        let store = AppError::from(StoreError::Unavailable("offline".into()));
        assert_eq!(store.user_message(), "record store unavailable: offline");
    }
}
