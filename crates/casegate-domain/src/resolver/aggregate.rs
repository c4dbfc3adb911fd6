//! Composition of independently registered authorizers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use casegate_storage::{CaseListQuery, CaseProjection};
use tracing::{debug, warn};

use super::CaseAuthorizer;
use crate::error::DomainResult;
use crate::principal::Principal;

/// Runs every registered authorizer in registration order.
///
/// List queries are threaded through each authorizer, so each one narrows
/// what the previous returned. Membership requires every authorizer to agree
/// and stops at the first refusal. An aggregate with nothing registered
/// grants no membership.
#[derive(Clone, Default)]
pub struct AuthorizationAggregate {
    authorizers: Vec<Arc<dyn CaseAuthorizer>>,
}

impl fmt::Debug for AuthorizationAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationAggregate")
            .field("authorizers", &self.authorizers.len())
            .finish()
    }
}

impl AuthorizationAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authorizer after the existing ones.
    pub fn with(mut self, authorizer: Arc<dyn CaseAuthorizer>) -> Self {
        self.authorizers.push(authorizer);
        self
    }

    pub fn register(&mut self, authorizer: Arc<dyn CaseAuthorizer>) {
        self.authorizers.push(authorizer);
    }

    pub fn len(&self) -> usize {
        self.authorizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorizers.is_empty()
    }
}

#[async_trait]
impl CaseAuthorizer for AuthorizationAggregate {
    async fn filter_case_list(
        &self,
        principal: &dyn Principal,
        query: CaseListQuery,
    ) -> DomainResult<CaseListQuery> {
        let mut query = query;
        for authorizer in &self.authorizers {
            query = authorizer.filter_case_list(principal, query).await?;
        }
        Ok(query)
    }

    async fn is_member(
        &self,
        principal: &dyn Principal,
        case: &CaseProjection,
    ) -> DomainResult<bool> {
        if self.authorizers.is_empty() {
            warn!(case_id = %case.id, "no authorizers registered, denying membership");
            return Ok(false);
        }

        for (index, authorizer) in self.authorizers.iter().enumerate() {
            if !authorizer.is_member(principal, case).await? {
                debug!(case_id = %case.id, index, "membership refused");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
