//! Collaborators and limits for rule management.

use std::sync::Arc;

use async_trait::async_trait;
use casegate_domain::DomainResult;
use casegate_storage::MemoryCaseSource;
use dashmap::DashMap;

/// Maximum number of rules accepted by one batch create.
pub const MAX_RULE_BATCH_SIZE: usize = 100;

/// Read access to the case and case type catalog.
#[async_trait]
pub trait CaseCatalog: Send + Sync + 'static {
    /// The case type of a case, or `None` if the case does not exist.
    async fn case_type_of(&self, case_id: &str) -> DomainResult<Option<String>>;

    /// The checkpoint types defined by a case type.
    async fn checkpoint_types_of(&self, case_type_id: &str) -> DomainResult<Vec<String>>;

    /// Number of cases that still reference a case type.
    async fn case_count(&self, case_type_id: &str) -> DomainResult<u64>;
}

/// Catalog over an in-memory case source.
///
/// Case types and their checkpoint types are registered explicitly.
#[derive(Debug)]
pub struct MemoryCaseCatalog {
    cases: Arc<MemoryCaseSource>,
    checkpoints: DashMap<String, Vec<String>>,
}

impl MemoryCaseCatalog {
    pub fn new(cases: Arc<MemoryCaseSource>) -> Self {
        Self {
            cases,
            checkpoints: DashMap::new(),
        }
    }

    /// Defines (or redefines) a case type with its checkpoint types.
    pub fn define_case_type<I, T>(&self, case_type_id: impl Into<String>, checkpoint_types: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.checkpoints.insert(
            case_type_id.into(),
            checkpoint_types.into_iter().map(Into::into).collect(),
        );
    }

    /// Forgets a case type. Returns whether it was defined.
    pub fn remove_case_type(&self, case_type_id: &str) -> bool {
        self.checkpoints.remove(case_type_id).is_some()
    }

    /// Removes one checkpoint type from a case type's definition.
    pub fn remove_checkpoint_type(&self, case_type_id: &str, checkpoint_type_id: &str) {
        if let Some(mut checkpoints) = self.checkpoints.get_mut(case_type_id) {
            checkpoints.retain(|c| c != checkpoint_type_id);
        }
    }
}

#[async_trait]
impl CaseCatalog for MemoryCaseCatalog {
    async fn case_type_of(&self, case_id: &str) -> DomainResult<Option<String>> {
        Ok(self.cases.get(case_id).await.map(|case| case.case_type_id))
    }

    async fn checkpoint_types_of(&self, case_type_id: &str) -> DomainResult<Vec<String>> {
        Ok(self
            .checkpoints
            .get(case_type_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn case_count(&self, case_type_id: &str) -> DomainResult<u64> {
        Ok(self.cases.count_of_type(case_type_id).await as u64)
    }
}
