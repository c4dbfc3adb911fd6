//! Case authorization resolution.
//!
//! Two algorithms answer "may this principal see this case":
//!
//! - **List filtering** (`filter_case_list`): appends a declarative
//!   [`AccessSpec`] to a not-yet-executed [`CaseListQuery`]. The case source
//!   evaluates it next to the data; the effective level of a case is the
//!   maximum over case, case type, checkpoint type and case + checkpoint type
//!   rules granted to the principal.
//!
//! - **Membership** (`is_member`): admins, scoped system clients and the case
//!   creator are always members. Otherwise the cached type-scoped rules
//!   decide. Case-specific rules are consulted only when the cached set is
//!   entirely empty, so a single type-scoped rule anywhere suppresses the
//!   case-specific fallback for every case.
//!
//! Neither path fails open: missing rules mean no access and any store or
//! cache error aborts the resolution.

mod aggregate;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use casegate_storage::{
    AccessRule, AccessSpec, CaseListQuery, CasePredicate, CaseProjection, RuleQuery, RuleStore,
};
use tracing::{debug, instrument};

use crate::cache::RuleCache;
use crate::error::DomainResult;
use crate::principal::Principal;

pub use aggregate::AuthorizationAggregate;

/// A pluggable authorization dimension over cases.
#[async_trait]
pub trait CaseAuthorizer: Send + Sync {
    /// Narrows a case list query to what the principal may see.
    async fn filter_case_list(
        &self,
        principal: &dyn Principal,
        query: CaseListQuery,
    ) -> DomainResult<CaseListQuery>;

    /// Decides whether the principal may access one fully-loaded case.
    async fn is_member(&self, principal: &dyn Principal, case: &CaseProjection)
        -> DomainResult<bool>;
}

/// Access-rule based authorizer.
pub struct RuleResolver<S> {
    store: Arc<S>,
    cache: Arc<RuleCache<S>>,
}

impl<S> RuleResolver<S>
where
    S: RuleStore,
{
    pub fn new(store: Arc<S>, cache: Arc<RuleCache<S>>) -> Self {
        Self { store, cache }
    }

    /// The access spec describing a principal's grants.
    pub fn access_spec(principal: &dyn Principal) -> AccessSpec {
        if principal.is_privileged() {
            AccessSpec::Unrestricted
        } else {
            AccessSpec::RuleGrants {
                roles: principal.roles().clone(),
                user_id: principal.subject_id().map(str::to_string),
            }
        }
    }

    fn bypasses_rules(principal: &dyn Principal, case: &CaseProjection) -> bool {
        let scoped_system = principal.is_system_client() && principal.has_required_scope();
        let creator = matches!(
            (principal.subject_id(), case.created_by_id.as_deref()),
            (Some(subject), Some(creator)) if subject == creator
        );
        scoped_system || principal.is_admin() || creator
    }
}

/// Membership grant check: role, user id or the principal's own group.
fn grants_principal(rule: &AccessRule, principal: &dyn Principal) -> bool {
    rule.grants(principal.roles(), principal.subject_id(), principal.group_id())
}

#[async_trait]
impl<S> CaseAuthorizer for RuleResolver<S>
where
    S: RuleStore,
{
    #[instrument(skip(self, principal, query), fields(subject = ?principal.subject_id()))]
    async fn filter_case_list(
        &self,
        principal: &dyn Principal,
        query: CaseListQuery,
    ) -> DomainResult<CaseListQuery> {
        let spec = Self::access_spec(principal);
        debug!(unrestricted = matches!(spec, AccessSpec::Unrestricted), "filtering case list");
        Ok(query.with(CasePredicate::Access(spec)))
    }

    #[instrument(
        skip(self, principal, case),
        fields(subject = ?principal.subject_id(), case_id = %case.id)
    )]
    async fn is_member(
        &self,
        principal: &dyn Principal,
        case: &CaseProjection,
    ) -> DomainResult<bool> {
        if Self::bypasses_rules(principal, case) {
            debug!("membership granted by bypass");
            return Ok(true);
        }

        let type_scoped = self.cache.type_scoped_rules().await?;

        if type_scoped.is_empty() {
            let case_rules = self
                .store
                .query(&RuleQuery::ForCase(case.id.clone()))
                .await?;
            let member = case_rules.iter().any(|rule| grants_principal(rule, principal));
            debug!(member, rules = case_rules.len(), "membership from case-specific rules");
            return Ok(member);
        }

        let applied: Vec<&AccessRule> = type_scoped
            .iter()
            .filter(|rule| {
                rule.rule_case_type_id.as_deref() == Some(case.case_type_id.as_str())
                    || rule.rule_checkpoint_type_id.as_deref()
                        == Some(case.checkpoint_type_id.as_str())
            })
            .collect();

        let member = applied.iter().any(|rule| grants_principal(rule, principal));
        debug!(member, rules = applied.len(), "membership from type-scoped rules");
        Ok(member)
    }
}
