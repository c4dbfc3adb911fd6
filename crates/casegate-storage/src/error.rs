//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Access rule not found.
    #[error("access rule not found: {rule_id}")]
    RuleNotFound { rule_id: String },

    /// An access rule with the same id already exists.
    #[error("duplicate access rule: {rule_id}")]
    DuplicateRule { rule_id: String },

    /// Database connection error.
    #[error("database connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Transaction error.
    #[error("transaction error: {message}")]
    TransactionError { message: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Serialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
