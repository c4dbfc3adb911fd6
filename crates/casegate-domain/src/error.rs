//! Domain error types for access rule and authorization operations.

use casegate_storage::StorageError;
use thiserror::Error;

/// Failure of a collaborator this crate depends on.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The rule store or case source failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// The rule cache backend failed.
    #[error("cache: {message}")]
    Cache { message: String },
}

/// Domain-specific errors.
///
/// None of these are retried locally; they are surfaced to the caller as-is.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A rule violates the scope/grant invariants.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The caller lacks the privilege required for the mutation.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The targeted entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation conflicts with existing data.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// A store or cache collaborator failed.
    #[error("dependency failure: {0}")]
    Dependency(#[from] DependencyError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        DomainError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn rule_not_found(rule_id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity: "access rule",
            id: rule_id.into(),
        }
    }

    pub fn case_not_found(case_id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity: "case",
            id: case_id.into(),
        }
    }
}

/// Caller-caused storage errors keep their meaning; infrastructure faults
/// become dependency failures.
impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidInput { message } => DomainError::Validation { message },
            StorageError::RuleNotFound { rule_id } => DomainError::rule_not_found(rule_id),
            StorageError::DuplicateRule { rule_id } => DomainError::Conflict {
                message: format!("access rule {rule_id} already exists"),
            },
            other => DomainError::Dependency(DependencyError::Storage(other)),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_become_dependency_errors() {
        let err: DomainError = StorageError::ConnectionError {
            message: "refused".to_string(),
        }
        .into();

        assert!(matches!(
            err,
            DomainError::Dependency(DependencyError::Storage(_))
        ));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_every_infrastructure_fault_is_a_dependency_error() {
        let faults = [
            StorageError::QueryError {
                message: "syntax".to_string(),
            },
            StorageError::TransactionError {
                message: "aborted".to_string(),
            },
            StorageError::SerializationError {
                message: "bad row".to_string(),
            },
        ];
        for fault in faults {
            let err: DomainError = fault.into();
            assert!(matches!(err, DomainError::Dependency(_)));
        }
    }

    #[test]
    fn test_invalid_input_becomes_validation_error() {
        let err: DomainError = StorageError::InvalidInput {
            message: "invalid continuation token: x".to_string(),
        }
        .into();

        match err {
            DomainError::Validation { message } => assert!(message.contains("continuation")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_rule_becomes_not_found() {
        let err: DomainError = StorageError::RuleNotFound {
            rule_id: "r1".to_string(),
        }
        .into();

        assert!(matches!(
            err,
            DomainError::NotFound { entity: "access rule", ref id } if id == "r1"
        ));
    }

    #[test]
    fn test_duplicate_rule_becomes_conflict() {
        let err: DomainError = StorageError::DuplicateRule {
            rule_id: "r1".to_string(),
        }
        .into();

        assert!(matches!(err, DomainError::Conflict { .. }));
        assert!(err.to_string().contains("r1"));
    }

    #[test]
    fn test_not_found_names_entity() {
        assert_eq!(
            DomainError::rule_not_found("r1").to_string(),
            "access rule not found: r1"
        );
        assert_eq!(DomainError::case_not_found("c1").to_string(), "case not found: c1");
    }
}
