//! Case projections and the declarative case list query.
//!
//! A [`CaseListQuery`] is never executed by the resolvers that build it.
//! Each resolver appends a [`CasePredicate`]; the [`CaseSource`] that owns the
//! case rows translates the whole query into one native query (see
//! [`crate::postgres`]) so access filtering happens next to the data.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::traits::{matches_some, AccessRule};

/// Access level attached to cases that bypass rule evaluation.
pub const MAX_ACCESS_LEVEL: u32 = u32::MAX;

/// The fields of a case that access resolution looks at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseProjection {
    pub id: String,
    pub case_type_id: String,
    pub checkpoint_type_id: String,
    pub group_id: Option<String>,
    pub created_by_id: Option<String>,
}

/// A case retained by a list query, with its effective access level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedCase {
    pub case: CaseProjection,
    pub access_level: u32,
}

/// Access predicate over cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSpec {
    /// Every case, at [`MAX_ACCESS_LEVEL`].
    Unrestricted,
    /// Cases reachable through access rules granted to these roles or this user.
    ///
    /// A rule's group grant is compared against the case's own group.
    RuleGrants {
        roles: BTreeSet<String>,
        user_id: Option<String>,
    },
}

impl AccessSpec {
    /// Effective access level of `case` under this spec; zero means no access.
    ///
    /// Four scopes are evaluated independently and the maximum wins:
    /// case-only rules, case-type-only rules, checkpoint-type-only rules and
    /// case + checkpoint-type rules.
    pub fn level_for(&self, case: &CaseProjection, rules: &[AccessRule]) -> u32 {
        let (roles, user_id) = match self {
            AccessSpec::Unrestricted => return MAX_ACCESS_LEVEL,
            AccessSpec::RuleGrants { roles, user_id } => (roles, user_id.as_deref()),
        };

        rules
            .iter()
            .filter(|rule| scope_applies(rule, case))
            .filter(|rule| rule.grants(roles, user_id, case.group_id.as_deref()))
            .map(|rule| rule.access_level)
            .max()
            .unwrap_or(0)
    }
}

fn scope_applies(rule: &AccessRule, case: &CaseProjection) -> bool {
    let case_id = rule.rule_case_id.as_deref();
    let case_type = rule.rule_case_type_id.as_deref();
    let checkpoint = rule.rule_checkpoint_type_id.as_deref();

    let case_level = matches_some(case_id, Some(case.id.as_str()))
        && case_type.is_none()
        && checkpoint.is_none();
    let case_type_level = matches_some(case_type, Some(case.case_type_id.as_str()))
        && case_id.is_none()
        && checkpoint.is_none();
    let checkpoint_type_level = matches_some(checkpoint, Some(case.checkpoint_type_id.as_str()))
        && case_id.is_none()
        && case_type.is_none();
    let case_checkpoint_level = matches_some(case_id, Some(case.id.as_str()))
        && matches_some(checkpoint, Some(case.checkpoint_type_id.as_str()));

    case_level || case_type_level || checkpoint_type_level || case_checkpoint_level
}

/// One narrowing step of a case list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasePredicate {
    /// Keep cases with a positive access level under the spec.
    Access(AccessSpec),
    /// Keep cases belonging to one of these groups.
    GroupIn(BTreeSet<String>),
}

/// A not-yet-executed query over cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseListQuery {
    predicates: Vec<CasePredicate>,
}

impl CaseListQuery {
    /// An unfiltered query over every case.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a predicate; every predicate must retain a case.
    pub fn with(mut self, predicate: CasePredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[CasePredicate] {
        &self.predicates
    }

    /// Returns true if any predicate needs the access rule table.
    pub fn reads_rules(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, CasePredicate::Access(AccessSpec::RuleGrants { .. })))
    }

    /// Evaluates the query against one case.
    ///
    /// Returns `None` when the case is filtered out. The reported level is the
    /// minimum across access predicates, or [`MAX_ACCESS_LEVEL`] when the
    /// query carries none.
    pub fn evaluate(&self, case: &CaseProjection, rules: &[AccessRule]) -> Option<u32> {
        let mut level = MAX_ACCESS_LEVEL;
        for predicate in &self.predicates {
            match predicate {
                CasePredicate::Access(spec) => {
                    let spec_level = spec.level_for(case, rules);
                    if spec_level == 0 {
                        return None;
                    }
                    level = level.min(spec_level);
                }
                CasePredicate::GroupIn(groups) => {
                    let in_group = case.group_id.as_ref().is_some_and(|g| groups.contains(g));
                    if !in_group {
                        return None;
                    }
                }
            }
        }
        Some(level)
    }
}

/// Anything that can execute a [`CaseListQuery`] over its case rows.
#[async_trait]
pub trait CaseSource: Send + Sync + 'static {
    /// Executes the query, returning retained cases with their access level.
    async fn fetch(&self, query: &CaseListQuery) -> StorageResult<Vec<RatedCase>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn case() -> CaseProjection {
        CaseProjection {
            id: "c1".to_string(),
            case_type_id: "T".to_string(),
            checkpoint_type_id: "cp1".to_string(),
            group_id: Some("g1".to_string()),
            created_by_id: Some("owner".to_string()),
        }
    }

    fn rule(id: &str, level: u32) -> AccessRule {
        AccessRule {
            id: id.to_string(),
            rule_case_id: None,
            rule_case_type_id: None,
            rule_checkpoint_type_id: None,
            member_role: None,
            member_group_id: None,
            member_user_id: None,
            access_level: level,
            created_date: Utc::now(),
        }
    }

    fn agent() -> AccessSpec {
        AccessSpec::RuleGrants {
            roles: BTreeSet::from(["Agent".to_string()]),
            user_id: Some("alice".to_string()),
        }
    }

    #[test]
    fn test_level_is_max_across_scopes() {
        let rules = vec![
            AccessRule {
                rule_case_type_id: Some("T".to_string()),
                member_role: Some("Agent".to_string()),
                ..rule("type", 2)
            },
            AccessRule {
                rule_checkpoint_type_id: Some("cp1".to_string()),
                member_role: Some("Agent".to_string()),
                ..rule("checkpoint", 5)
            },
        ];

        assert_eq!(agent().level_for(&case(), &rules), 5);
    }

    #[test]
    fn test_no_rules_means_no_access() {
        assert_eq!(agent().level_for(&case(), &[]), 0);
    }

    #[test]
    fn test_group_grant_compares_case_group() {
        let rules = vec![AccessRule {
            rule_case_id: Some("c1".to_string()),
            member_group_id: Some("g1".to_string()),
            ..rule("group", 4)
        }];
        let stranger = AccessSpec::RuleGrants {
            roles: BTreeSet::new(),
            user_id: None,
        };

        assert_eq!(stranger.level_for(&case(), &rules), 4);

        let other_group = CaseProjection {
            group_id: Some("g2".to_string()),
            ..case()
        };
        assert_eq!(stranger.level_for(&other_group, &rules), 0);
    }

    #[test]
    fn test_case_checkpoint_rule_requires_both() {
        let rules = vec![AccessRule {
            rule_case_id: Some("c1".to_string()),
            rule_checkpoint_type_id: Some("cp2".to_string()),
            member_user_id: Some("alice".to_string()),
            ..rule("combined", 3)
        }];

        assert_eq!(agent().level_for(&case(), &rules), 0);

        let moved = CaseProjection {
            checkpoint_type_id: "cp2".to_string(),
            ..case()
        };
        assert_eq!(agent().level_for(&moved, &rules), 3);
    }

    #[test]
    fn test_rules_for_other_scopes_are_ignored() {
        let rules = vec![
            AccessRule {
                rule_case_type_id: Some("OTHER".to_string()),
                member_role: Some("Agent".to_string()),
                ..rule("other-type", 7)
            },
            AccessRule {
                rule_case_id: Some("c2".to_string()),
                member_role: Some("Agent".to_string()),
                ..rule("other-case", 7)
            },
        ];

        assert_eq!(agent().level_for(&case(), &rules), 0);
    }

    #[test]
    fn test_unrestricted_is_max_level() {
        assert_eq!(AccessSpec::Unrestricted.level_for(&case(), &[]), MAX_ACCESS_LEVEL);
    }

    #[test]
    fn test_query_takes_minimum_of_access_predicates() {
        let rules = vec![AccessRule {
            rule_case_type_id: Some("T".to_string()),
            member_role: Some("Agent".to_string()),
            ..rule("type", 3)
        }];
        let query = CaseListQuery::new()
            .with(CasePredicate::Access(AccessSpec::Unrestricted))
            .with(CasePredicate::Access(agent()));

        assert_eq!(query.evaluate(&case(), &rules), Some(3));
        assert!(query.reads_rules());
    }

    #[test]
    fn test_group_predicate_filters_cases() {
        let query = CaseListQuery::new().with(CasePredicate::GroupIn(BTreeSet::from([
            "g2".to_string(),
        ])));

        assert_eq!(query.evaluate(&case(), &[]), None);
        assert!(!query.reads_rules());

        let unrestricted = CaseListQuery::new();
        assert_eq!(unrestricted.evaluate(&case(), &[]), Some(MAX_ACCESS_LEVEL));
    }
}
