//! Wiring of the default in-memory authorization stack.

use std::sync::Arc;

use casegate_domain::cache::MokaRuleCacheBackend;
use casegate_domain::{
    AuthorizationAggregate, CaseAuthorizer, Clock, DomainResult, Principal, RuleCache,
    RuleResolver, SystemClock,
};
use casegate_storage::{
    CaseListQuery, CaseProjection, CaseSource, MemoryCaseSource, MemoryRuleStore, RatedCase,
};
use tracing::{debug, info, instrument};

use crate::config::ServerConfig;
use crate::handlers::rules::{AccessRuleService, MemoryCaseCatalog};
use crate::observability::{init_logging, LoggingConfig};

/// Shared services built from a [`ServerConfig`].
pub struct AppState {
    pub rules: Arc<MemoryRuleStore>,
    pub cases: Arc<MemoryCaseSource>,
    pub catalog: Arc<MemoryCaseCatalog>,
    pub rule_cache: Arc<RuleCache<MemoryRuleStore>>,
    pub authorizers: AuthorizationAggregate,
    pub service: AccessRuleService<MemoryRuleStore, MemoryCaseCatalog>,
}

impl AppState {
    /// Installs logging from `config.logging`, then builds the stack.
    pub fn bootstrap(config: &ServerConfig) -> Self {
        let logging = LoggingConfig::from_settings(&config.logging);
        if !init_logging(&logging) {
            debug!("global log subscriber already installed");
        }
        info!(level = %logging.level, json = logging.json, "casegate starting");
        Self::new(config)
    }

    /// Builds the stack with the system clock.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds the stack with an explicit clock for rule stamping and cache
    /// expiry.
    pub fn with_clock(config: &ServerConfig, clock: Arc<dyn Clock>) -> Self {
        let rules = MemoryRuleStore::new_shared();
        let cases = Arc::new(MemoryCaseSource::new(Arc::clone(&rules)));
        let catalog = Arc::new(MemoryCaseCatalog::new(Arc::clone(&cases)));

        let cache_config = config.cache.to_cache_config();
        let backend = Arc::new(MokaRuleCacheBackend::new(cache_config.max_capacity));
        let rule_cache = Arc::new(RuleCache::with_parts(
            Arc::clone(&rules),
            backend,
            Arc::clone(&clock),
            cache_config,
        ));

        let resolver = RuleResolver::new(Arc::clone(&rules), Arc::clone(&rule_cache));
        let authorizers = AuthorizationAggregate::new().with(Arc::new(resolver));

        let service = AccessRuleService::new(
            Arc::clone(&rules),
            Arc::clone(&catalog),
            clock,
            config.pagination,
        );

        Self {
            rules,
            cases,
            catalog,
            rule_cache,
            authorizers,
            service,
        }
    }

    /// Registers an extra authorization dimension after the rule resolver.
    pub fn register_authorizer(&mut self, authorizer: Arc<dyn CaseAuthorizer>) {
        self.authorizers.register(authorizer);
    }

    /// Cases visible to the principal, each with its effective access level.
    #[instrument(skip(self, principal), fields(subject = ?principal.subject_id()))]
    pub async fn list_cases(&self, principal: &dyn Principal) -> DomainResult<Vec<RatedCase>> {
        let query = self
            .authorizers
            .filter_case_list(principal, CaseListQuery::new())
            .await?;
        let visible = self.cases.fetch(&query).await?;
        debug!(visible = visible.len(), "case list filtered");
        Ok(visible)
    }

    /// Whether the principal may open one case.
    pub async fn can_access(
        &self,
        principal: &dyn Principal,
        case: &CaseProjection,
    ) -> DomainResult<bool> {
        self.authorizers.is_member(principal, case).await
    }
}
