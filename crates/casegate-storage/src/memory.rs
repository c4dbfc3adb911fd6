//! In-memory storage implementation for testing and single-process hosts.
//!
//! Rules live in one `HashMap` behind a `tokio::sync::RwLock`, so every
//! mutation (including the multi-row `bulk_update_user`) is applied under a
//! single write guard and readers never observe a half-applied change.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::cases::{CaseListQuery, CaseProjection, CaseSource, RatedCase};
use crate::error::{StorageError, StorageResult};
use crate::traits::{
    parse_continuation_token, AccessRule, PaginatedResult, PaginationOptions, RuleQuery,
    RuleStore, DEFAULT_PAGE_SIZE,
};

/// In-memory implementation of RuleStore.
///
/// # Performance Characteristics
///
/// - **Insert/update/delete by id**: O(1) average
/// - **Query**: O(N) linear scan plus an O(M log M) sort of the M matches
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: RwLock<HashMap<String, AccessRule>>,
}

impl MemoryRuleStore {
    /// Creates a new in-memory rule store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory rule store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored rules.
    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

/// Sorts rules oldest-first (created_date ASC, id ASC).
fn sort_rules(rules: &mut [AccessRule]) {
    rules.sort_by(|a, b| {
        a.created_date
            .cmp(&b.created_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn validate_rule_id(rule_id: &str) -> StorageResult<()> {
    if rule_id.trim().is_empty() {
        return Err(StorageError::InvalidInput {
            message: "rule id cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    async fn insert(&self, rule: AccessRule) -> StorageResult<AccessRule> {
        validate_rule_id(&rule.id)?;

        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            return Err(StorageError::DuplicateRule { rule_id: rule.id });
        }
        rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    #[instrument(skip(self, batch), fields(count = batch.len()))]
    async fn insert_many(&self, batch: Vec<AccessRule>) -> StorageResult<Vec<AccessRule>> {
        for rule in &batch {
            validate_rule_id(&rule.id)?;
        }

        let mut rules = self.rules.write().await;

        // Check every id before writing so a conflict leaves the store untouched.
        let mut seen = std::collections::HashSet::with_capacity(batch.len());
        for rule in &batch {
            if rules.contains_key(&rule.id) || !seen.insert(rule.id.as_str()) {
                return Err(StorageError::DuplicateRule {
                    rule_id: rule.id.clone(),
                });
            }
        }

        for rule in &batch {
            rules.insert(rule.id.clone(), rule.clone());
        }
        Ok(batch)
    }

    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    async fn update(&self, rule: AccessRule) -> StorageResult<AccessRule> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule.id) {
            Some(existing) => {
                *existing = rule.clone();
                Ok(rule)
            }
            None => Err(StorageError::RuleNotFound { rule_id: rule.id }),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, rule_id: &str) -> StorageResult<()> {
        self.rules
            .write()
            .await
            .remove(rule_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::RuleNotFound {
                rule_id: rule_id.to_string(),
            })
    }

    async fn find_by_id(&self, rule_id: &str) -> StorageResult<Option<AccessRule>> {
        Ok(self.rules.read().await.get(rule_id).cloned())
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &RuleQuery) -> StorageResult<Vec<AccessRule>> {
        // Filter first, then clone only matching rules
        let mut matched: Vec<AccessRule> = self
            .rules
            .read()
            .await
            .values()
            .filter(|rule| query.matches(rule))
            .cloned()
            .collect();
        sort_rules(&mut matched);
        Ok(matched)
    }

    #[instrument(skip(self, pagination))]
    async fn query_paginated(
        &self,
        query: &RuleQuery,
        pagination: &PaginationOptions,
    ) -> StorageResult<PaginatedResult<AccessRule>> {
        let page_size = pagination.page_size.unwrap_or(DEFAULT_PAGE_SIZE) as usize;
        if page_size == 0 {
            return Err(StorageError::InvalidInput {
                message: "page size must be greater than 0".to_string(),
            });
        }
        let offset = parse_continuation_token(&pagination.continuation_token)? as usize;

        let matched = self.query(query).await?;
        let items: Vec<AccessRule> = matched.into_iter().skip(offset).take(page_size).collect();

        let continuation_token = if items.len() == page_size {
            Some((offset + items.len()).to_string())
        } else {
            None
        };

        Ok(PaginatedResult {
            items,
            continuation_token,
        })
    }

    #[instrument(skip(self))]
    async fn delete_where(&self, query: &RuleQuery) -> StorageResult<u64> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|_, rule| !query.matches(rule));
        Ok((before - rules.len()) as u64)
    }

    #[instrument(skip(self))]
    async fn bulk_update_user(
        &self,
        case_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> StorageResult<u64> {
        let mut rules = self.rules.write().await;
        let mut changed = 0;
        for rule in rules.values_mut() {
            if rule.rule_case_id.as_deref() == Some(case_id)
                && rule.member_user_id.as_deref() == Some(old_user_id)
            {
                rule.member_user_id = Some(new_user_id.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// In-memory case source that evaluates list queries against a rule store.
#[derive(Debug)]
pub struct MemoryCaseSource {
    cases: RwLock<Vec<CaseProjection>>,
    rules: Arc<MemoryRuleStore>,
}

impl MemoryCaseSource {
    pub fn new(rules: Arc<MemoryRuleStore>) -> Self {
        Self {
            cases: RwLock::new(Vec::new()),
            rules,
        }
    }

    /// Adds or replaces a case.
    pub async fn upsert(&self, case: CaseProjection) {
        let mut cases = self.cases.write().await;
        match cases.iter_mut().find(|c| c.id == case.id) {
            Some(existing) => *existing = case,
            None => cases.push(case),
        }
    }

    /// Gets a case by id.
    pub async fn get(&self, case_id: &str) -> Option<CaseProjection> {
        self.cases
            .read()
            .await
            .iter()
            .find(|c| c.id == case_id)
            .cloned()
    }

    /// Removes a case, returning whether it existed.
    pub async fn remove(&self, case_id: &str) -> bool {
        let mut cases = self.cases.write().await;
        let before = cases.len();
        cases.retain(|c| c.id != case_id);
        cases.len() != before
    }

    /// Number of cases of one case type.
    pub async fn count_of_type(&self, case_type_id: &str) -> usize {
        self.cases
            .read()
            .await
            .iter()
            .filter(|c| c.case_type_id == case_type_id)
            .count()
    }
}

#[async_trait]
impl CaseSource for MemoryCaseSource {
    #[instrument(skip(self, query), fields(predicates = query.predicates().len()))]
    async fn fetch(&self, query: &CaseListQuery) -> StorageResult<Vec<RatedCase>> {
        let rules = if query.reads_rules() {
            self.rules.query(&RuleQuery::All).await?
        } else {
            Vec::new()
        };

        Ok(self
            .cases
            .read()
            .await
            .iter()
            .filter_map(|case| {
                query.evaluate(case, &rules).map(|access_level| RatedCase {
                    case: case.clone(),
                    access_level,
                })
            })
            .collect())
    }
}
