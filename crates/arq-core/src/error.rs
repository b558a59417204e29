//! Error types for ARQ.

use thiserror::Error;

/// Top-level result type for ARQ operations.
pub type Result<T> = std::result::Result<T, ArqError>;

/// Top-level error type for ARQ.
#[derive(Debug, Error)]
pub enum ArqError {
    #[error("identifier error: {0}")]
    Id(#[from] IdError),

    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the identifier codec and the sequence allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid suffix '{suffix}': expected {digits} digits followed by one uppercase letter")]
    InvalidSuffix { suffix: String, digits: u32 },

    #[error("capacity exhausted for prefix '{prefix}': all {capacity} identifiers are in use")]
    CapacityExhausted { prefix: String, capacity: u32 },

    #[error("unsupported digit width {0}: expected 1 to 6")]
    UnsupportedWidth(u32),
}

/// Errors raised by the record lifecycle state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: String },

    #[error("record {id} is already retrieved and cannot be retrieved again")]
    AlreadyRetrieved { id: String },

    #[error("record {id} is not retrieved and cannot be returned")]
    NotRetrieved { id: String },

    #[error("record {id} not found")]
    RecordNotFound { id: String },

    #[error("record {id} has no changes to apply")]
    NothingToChange { id: String },

    #[error("field '{field}' cannot be edited")]
    NotEditable { field: String },

    #[error("{field} '{value}' is out of range for location '{location}' (1 to {max})")]
    OutOfRange {
        location: String,
        field: String,
        value: String,
        max: u32,
    },

    #[error("invalid date '{value}' for field '{field}'")]
    InvalidDate { field: String, value: String },

    #[error("invalid status '{0}'")]
    InvalidStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_human_readable_messages() {
        let err = IdError::CapacityExhausted {
            prefix: "RHCT".to_string(),
            capacity: 2600,
        };
        let msg = err.to_string();
        assert!(msg.contains("RHCT"));
        assert!(msg.contains("2600"));

        let err = LifecycleError::MissingRequiredField {
            field: "requester".to_string(),
        };
        assert!(err.to_string().contains("requester"));
    }

    #[test]
    fn lifecycle_errors_convert_into_top_level() {
        let err: ArqError = LifecycleError::AlreadyRetrieved {
            id: "RHCT00A".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            ArqError::Lifecycle(LifecycleError::AlreadyRetrieved { .. })
        ));
        assert!(err.to_string().contains("RHCT00A"));
    }
}
