//! Access rule service implementation.

use std::sync::Arc;

use casegate_domain::validation::validate_rule;
use casegate_domain::{Clock, DomainError, DomainResult, Principal, RuleDraft};
use casegate_storage::{
    AccessRule, PaginatedResult, PaginationOptions, RuleFilter, RuleQuery, RuleStore,
};
use tracing::{info, instrument, warn};
use ulid::Ulid;

use super::types::{CaseCatalog, MAX_RULE_BATCH_SIZE};
use crate::config::PaginationSettings;

/// CRUD service for access rules.
pub struct AccessRuleService<S, C> {
    store: Arc<S>,
    catalog: Arc<C>,
    clock: Arc<dyn Clock>,
    pagination: PaginationSettings,
}

impl<S, C> AccessRuleService<S, C>
where
    S: RuleStore,
    C: CaseCatalog,
{
    pub fn new(
        store: Arc<S>,
        catalog: Arc<C>,
        clock: Arc<dyn Clock>,
        pagination: PaginationSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            pagination,
        }
    }

    /// Lists one page of rules matching `filter`.
    ///
    /// A missing page size uses the configured default; larger requests are
    /// clamped to the configured maximum.
    #[instrument(skip(self, principal, filter), fields(subject = ?principal.subject_id()))]
    pub async fn list_rules(
        &self,
        principal: &dyn Principal,
        filter: RuleFilter,
        pagination: PaginationOptions,
    ) -> DomainResult<PaginatedResult<AccessRule>> {
        let page_size = self.page_size(pagination.page_size)?;
        let options = PaginationOptions {
            page_size: Some(page_size),
            continuation_token: pagination.continuation_token,
        };

        let page = self
            .store
            .query_paginated(&RuleQuery::Filter(filter), &options)
            .await?;
        Ok(page)
    }

    /// Gets one rule by id.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn get_rule(
        &self,
        principal: &dyn Principal,
        rule_id: &str,
    ) -> DomainResult<AccessRule> {
        self.find_rule(rule_id).await
    }

    /// Every rule whose scope could apply to `case_id`.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn list_case_rules(
        &self,
        principal: &dyn Principal,
        case_id: &str,
    ) -> DomainResult<Vec<AccessRule>> {
        let case_type_id = self
            .catalog
            .case_type_of(case_id)
            .await?
            .ok_or_else(|| DomainError::case_not_found(case_id))?;
        let checkpoint_type_ids = self.catalog.checkpoint_types_of(&case_type_id).await?;

        let query = RuleQuery::ApplicableToCase {
            case_id: case_id.to_string(),
            case_type_id,
            checkpoint_type_ids,
        };
        Ok(self.store.query(&query).await?)
    }

    /// Creates one rule. Admins and system clients only.
    #[instrument(skip(self, principal, draft), fields(subject = ?principal.subject_id()))]
    pub async fn create_rule(
        &self,
        principal: &dyn Principal,
        draft: RuleDraft,
    ) -> DomainResult<AccessRule> {
        require_privileged(principal, "create access rules")?;
        validate_rule(&draft)?;

        let rule = self.store.insert(self.stamp(draft)).await?;
        info!(rule_id = %rule.id, access_level = rule.access_level, "access rule created");
        Ok(rule)
    }

    /// Creates a batch of rules. Admins and system clients only.
    ///
    /// Every draft is validated before anything is written; the batch is then
    /// inserted in one store call.
    #[instrument(
        skip(self, principal, drafts),
        fields(subject = ?principal.subject_id(), count = drafts.len())
    )]
    pub async fn create_rules(
        &self,
        principal: &dyn Principal,
        drafts: Vec<RuleDraft>,
    ) -> DomainResult<Vec<AccessRule>> {
        require_privileged(principal, "create access rules")?;
        check_batch_size(drafts.len())?;
        for (index, draft) in drafts.iter().enumerate() {
            validate_rule(draft).map_err(|err| at_index(index, err))?;
        }

        let rules = drafts.into_iter().map(|draft| self.stamp(draft)).collect();
        let created = self.store.insert_many(rules).await?;
        info!(count = created.len(), "access rules created");
        Ok(created)
    }

    /// Creates a rule scoped to one case. Open to any authenticated caller.
    ///
    /// The draft's case scope is replaced by `case_id` and any case type scope
    /// is dropped; a checkpoint type scope is kept.
    #[instrument(skip(self, principal, draft), fields(subject = ?principal.subject_id()))]
    pub async fn create_case_rule(
        &self,
        principal: &dyn Principal,
        case_id: &str,
        draft: RuleDraft,
    ) -> DomainResult<AccessRule> {
        let draft = scope_to_case(case_id, draft);
        validate_rule(&draft)?;
        self.ensure_case_exists(case_id).await?;

        let rule = self.store.insert(self.stamp(draft)).await?;
        info!(rule_id = %rule.id, case_id, "case access rule created");
        Ok(rule)
    }

    /// Creates a batch of rules scoped to one case.
    #[instrument(
        skip(self, principal, drafts),
        fields(subject = ?principal.subject_id(), count = drafts.len())
    )]
    pub async fn create_case_rules(
        &self,
        principal: &dyn Principal,
        case_id: &str,
        drafts: Vec<RuleDraft>,
    ) -> DomainResult<Vec<AccessRule>> {
        check_batch_size(drafts.len())?;
        let drafts: Vec<RuleDraft> = drafts
            .into_iter()
            .map(|draft| scope_to_case(case_id, draft))
            .collect();
        for (index, draft) in drafts.iter().enumerate() {
            validate_rule(draft).map_err(|err| at_index(index, err))?;
        }
        self.ensure_case_exists(case_id).await?;

        let rules = drafts.into_iter().map(|draft| self.stamp(draft)).collect();
        let created = self.store.insert_many(rules).await?;
        info!(count = created.len(), case_id, "case access rules created");
        Ok(created)
    }

    /// Changes the access level of a rule and nothing else.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn update_access_level(
        &self,
        principal: &dyn Principal,
        rule_id: &str,
        access_level: u32,
    ) -> DomainResult<AccessRule> {
        let mut rule = self.find_rule(rule_id).await?;
        require_mutation_rights(principal, &rule, "update")?;

        rule.access_level = access_level;
        let rule = self.store.update(rule).await?;
        info!(rule_id, access_level, "access level updated");
        Ok(rule)
    }

    /// Physically deletes a rule.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn delete_rule(&self, principal: &dyn Principal, rule_id: &str) -> DomainResult<()> {
        let rule = self.find_rule(rule_id).await?;
        require_mutation_rights(principal, &rule, "delete")?;

        self.store.delete(rule_id).await?;
        info!(rule_id, "access rule deleted");
        Ok(())
    }

    /// Moves every user grant on a case from `old_user_id` to `new_user_id`.
    ///
    /// Returns whether any rule changed; repeating a completed reassignment
    /// returns `false`.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn reassign_user(
        &self,
        principal: &dyn Principal,
        case_id: &str,
        old_user_id: &str,
        new_user_id: &str,
    ) -> DomainResult<bool> {
        for (field, value) in [
            ("case_id", case_id),
            ("old_user_id", old_user_id),
            ("new_user_id", new_user_id),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} cannot be empty")));
            }
        }

        let changed = self
            .store
            .bulk_update_user(case_id, old_user_id, new_user_id)
            .await?;
        info!(case_id, changed, "user grants reassigned");
        Ok(changed > 0)
    }

    /// Deletes every rule referencing a case type or one of its checkpoint
    /// types. Refused while cases of that type exist.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn purge_case_type_rules(
        &self,
        principal: &dyn Principal,
        case_type_id: &str,
    ) -> DomainResult<u64> {
        require_privileged(principal, "purge case type rules")?;

        let case_count = self.catalog.case_count(case_type_id).await?;
        if case_count > 0 {
            warn!(case_type_id, case_count, "case type still referenced by cases");
            return Err(DomainError::Conflict {
                message: format!("case type {case_type_id} is still used by {case_count} case(s)"),
            });
        }

        let checkpoint_type_ids = self.catalog.checkpoint_types_of(case_type_id).await?;
        let removed = self
            .store
            .delete_where(&RuleQuery::ReferencingCaseType {
                case_type_id: case_type_id.to_string(),
                checkpoint_type_ids,
            })
            .await?;
        info!(case_type_id, removed, "case type rules purged");
        Ok(removed)
    }

    /// Deletes every rule referencing one checkpoint type.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn purge_checkpoint_type_rules(
        &self,
        principal: &dyn Principal,
        checkpoint_type_id: &str,
    ) -> DomainResult<u64> {
        require_privileged(principal, "purge checkpoint type rules")?;

        let removed = self
            .store
            .delete_where(&RuleQuery::ReferencingCheckpointType(
                checkpoint_type_id.to_string(),
            ))
            .await?;
        info!(checkpoint_type_id, removed, "checkpoint type rules purged");
        Ok(removed)
    }

    fn page_size(&self, requested: Option<u32>) -> DomainResult<u32> {
        match requested {
            None => Ok(self.pagination.default_page_size),
            Some(0) => Err(DomainError::validation("page_size must be greater than 0")),
            Some(size) => Ok(size.min(self.pagination.max_page_size)),
        }
    }

    async fn find_rule(&self, rule_id: &str) -> DomainResult<AccessRule> {
        self.store
            .find_by_id(rule_id)
            .await?
            .ok_or_else(|| DomainError::rule_not_found(rule_id))
    }

    async fn ensure_case_exists(&self, case_id: &str) -> DomainResult<()> {
        match self.catalog.case_type_of(case_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::case_not_found(case_id)),
        }
    }

    fn stamp(&self, draft: RuleDraft) -> AccessRule {
        draft.into_rule(Ulid::new().to_string(), self.clock.now())
    }
}

fn scope_to_case(case_id: &str, mut draft: RuleDraft) -> RuleDraft {
    draft.rule_case_id = Some(case_id.to_string());
    draft.rule_case_type_id = None;
    draft
}

fn require_privileged(principal: &dyn Principal, action: &str) -> DomainResult<()> {
    if principal.is_privileged() {
        return Ok(());
    }
    warn!(subject = ?principal.subject_id(), action, "refused: admin or system client required");
    Err(DomainError::unauthorized(format!(
        "only admins and system clients may {action}"
    )))
}

/// Case rules are open to any caller; type-wide rules need privilege.
fn require_mutation_rights(
    principal: &dyn Principal,
    rule: &AccessRule,
    action: &str,
) -> DomainResult<()> {
    if rule.is_case_specific() || principal.is_privileged() {
        return Ok(());
    }
    warn!(subject = ?principal.subject_id(), rule_id = %rule.id, action, "refused: type-wide rule");
    Err(DomainError::unauthorized(format!(
        "only admins and system clients may {action} type-wide rule {}",
        rule.id
    )))
}

fn check_batch_size(len: usize) -> DomainResult<()> {
    if len == 0 {
        return Err(DomainError::validation("rule batch cannot be empty"));
    }
    if len > MAX_RULE_BATCH_SIZE {
        return Err(DomainError::validation(format!(
            "rule batch size {len} exceeds maximum allowed {MAX_RULE_BATCH_SIZE}"
        )));
    }
    Ok(())
}

fn at_index(index: usize, err: DomainError) -> DomainError {
    match err {
        DomainError::Validation { message } => {
            DomainError::validation(format!("invalid rule at index {index}: {message}"))
        }
        other => other,
    }
}
