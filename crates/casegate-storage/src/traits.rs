//! RuleStore trait definition and the stored access rule record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// A stored access rule.
///
/// The scope fields (`rule_case_id`, `rule_case_type_id`,
/// `rule_checkpoint_type_id`) describe what the rule applies to, the member
/// fields describe who it applies to. Scope/grant combinations are validated
/// by the domain layer before a rule reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: String,
    pub rule_case_id: Option<String>,
    pub rule_case_type_id: Option<String>,
    pub rule_checkpoint_type_id: Option<String>,
    pub member_role: Option<String>,
    pub member_group_id: Option<String>,
    pub member_user_id: Option<String>,
    pub access_level: u32,
    pub created_date: DateTime<Utc>,
}

impl AccessRule {
    /// Returns true if the rule is tied to one specific case.
    pub fn is_case_specific(&self) -> bool {
        self.rule_case_id.is_some()
    }

    /// Returns true if the rule applies through a case type or checkpoint type.
    ///
    /// The combined case + checkpoint type scope counts as type scoped.
    pub fn is_type_scoped(&self) -> bool {
        self.rule_case_type_id.is_some() || self.rule_checkpoint_type_id.is_some()
    }

    /// Returns true if any grant field matches.
    ///
    /// `group_id` is the group the grant is compared against; callers pass the
    /// case's group when filtering case lists and the principal's group when
    /// checking membership. Unset values never match.
    pub fn grants<'a, I>(&self, roles: I, user_id: Option<&str>, group_id: Option<&str>) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let role_match = self
            .member_role
            .as_ref()
            .is_some_and(|role| roles.into_iter().any(|r| r == role));

        role_match
            || matches_some(self.member_user_id.as_deref(), user_id)
            || matches_some(self.member_group_id.as_deref(), group_id)
    }
}

/// Equality that treats `None` as matching nothing.
pub(crate) fn matches_some(field: Option<&str>, value: Option<&str>) -> bool {
    matches!((field, value), (Some(f), Some(v)) if f == v)
}

/// Equality or negation clause on a single optional rule field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatch {
    Equals(String),
    /// Also retains rules where the field is unset.
    NotEquals(String),
}

impl FieldMatch {
    pub fn matches(&self, field: Option<&str>) -> bool {
        match self {
            FieldMatch::Equals(value) => field == Some(value.as_str()),
            FieldMatch::NotEquals(value) => field != Some(value.as_str()),
        }
    }
}

/// Administrative filter for listing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFilter {
    pub checkpoint_type_id: Option<FieldMatch>,
    pub case_type_id: Option<FieldMatch>,
    pub group_id: Option<FieldMatch>,
    pub role: Option<FieldMatch>,
}

impl RuleFilter {
    pub fn matches(&self, rule: &AccessRule) -> bool {
        clause_matches(&self.checkpoint_type_id, rule.rule_checkpoint_type_id.as_deref())
            && clause_matches(&self.case_type_id, rule.rule_case_type_id.as_deref())
            && clause_matches(&self.group_id, rule.member_group_id.as_deref())
            && clause_matches(&self.role, rule.member_role.as_deref())
    }
}

fn clause_matches(clause: &Option<FieldMatch>, field: Option<&str>) -> bool {
    clause.as_ref().map_or(true, |c| c.matches(field))
}

/// Declarative rule predicate.
///
/// Stores translate each variant into their native query language;
/// [`RuleQuery::matches`] is the reference semantics used by the in-memory
/// backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleQuery {
    /// Every rule.
    All,
    /// Rules matching an administrative filter.
    Filter(RuleFilter),
    /// Rules with a case type or checkpoint type scope.
    TypeScoped,
    /// Rules with `rule_case_id == case_id`, including case + checkpoint rules.
    ForCase(String),
    /// Rules whose scope could apply to one case.
    ApplicableToCase {
        case_id: String,
        case_type_id: String,
        checkpoint_type_ids: Vec<String>,
    },
    /// Rules referencing a case type directly or through one of its checkpoint types.
    ReferencingCaseType {
        case_type_id: String,
        checkpoint_type_ids: Vec<String>,
    },
    /// Rules referencing one checkpoint type.
    ReferencingCheckpointType(String),
}

impl RuleQuery {
    pub fn matches(&self, rule: &AccessRule) -> bool {
        let case_type = rule.rule_case_type_id.as_deref();
        let checkpoint = rule.rule_checkpoint_type_id.as_deref();

        match self {
            RuleQuery::All => true,
            RuleQuery::Filter(filter) => filter.matches(rule),
            RuleQuery::TypeScoped => rule.is_type_scoped(),
            RuleQuery::ForCase(case_id) => rule.rule_case_id.as_deref() == Some(case_id.as_str()),
            RuleQuery::ApplicableToCase {
                case_id,
                case_type_id,
                checkpoint_type_ids,
            } => {
                rule.rule_case_id.as_deref() == Some(case_id.as_str())
                    || case_type == Some(case_type_id.as_str())
                    || (rule.rule_case_id.is_none()
                        && case_type.is_none()
                        && checkpoint
                            .is_some_and(|cp| checkpoint_type_ids.iter().any(|id| id == cp)))
            }
            RuleQuery::ReferencingCaseType {
                case_type_id,
                checkpoint_type_ids,
            } => {
                case_type == Some(case_type_id.as_str())
                    || checkpoint.is_some_and(|cp| checkpoint_type_ids.iter().any(|id| id == cp))
            }
            RuleQuery::ReferencingCheckpointType(checkpoint_type_id) => {
                checkpoint == Some(checkpoint_type_id.as_str())
            }
        }
    }
}

/// Pagination options for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationOptions {
    /// Maximum number of items to return.
    pub page_size: Option<u32>,
    /// Opaque token from a previous page.
    pub continuation_token: Option<String>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    /// Present when more items may follow.
    pub continuation_token: Option<String>,
}

/// Default page size when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Parses an offset-based continuation token.
pub fn parse_continuation_token(token: &Option<String>) -> StorageResult<u64> {
    match token {
        None => Ok(0),
        Some(t) if t.is_empty() => Ok(0),
        Some(t) => t.parse::<u64>().map_err(|_| StorageError::InvalidInput {
            message: format!("invalid continuation token: {t}"),
        }),
    }
}

/// Abstract storage interface for access rules.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations. Listing order is `created_date` ascending, then `id`.
#[async_trait]
pub trait RuleStore: Send + Sync + 'static {
    /// Inserts one rule. Fails with `DuplicateRule` if the id is taken.
    async fn insert(&self, rule: AccessRule) -> StorageResult<AccessRule>;

    /// Inserts a batch of rules. Either all rules are written or none are.
    async fn insert_many(&self, rules: Vec<AccessRule>) -> StorageResult<Vec<AccessRule>>;

    /// Replaces an existing rule. Fails with `RuleNotFound` if absent.
    async fn update(&self, rule: AccessRule) -> StorageResult<AccessRule>;

    /// Physically removes a rule. Fails with `RuleNotFound` if absent.
    async fn delete(&self, rule_id: &str) -> StorageResult<()>;

    /// Gets a rule by id.
    async fn find_by_id(&self, rule_id: &str) -> StorageResult<Option<AccessRule>>;

    /// Reads every rule matching the query.
    async fn query(&self, query: &RuleQuery) -> StorageResult<Vec<AccessRule>>;

    /// Reads one page of rules matching the query.
    async fn query_paginated(
        &self,
        query: &RuleQuery,
        pagination: &PaginationOptions,
    ) -> StorageResult<PaginatedResult<AccessRule>>;

    /// Removes every rule matching the query, returning the number removed.
    async fn delete_where(&self, query: &RuleQuery) -> StorageResult<u64>;

    /// Rewrites `member_user_id` from `old_user_id` to `new_user_id` on every
    /// rule scoped to `case_id`, atomically. Returns the number of rows changed.
    async fn bulk_update_user(
        &self,
        case_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> StorageResult<u64>;
}
