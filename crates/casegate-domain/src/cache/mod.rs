//! Cache-aside layer for type-scoped access rules.
//!
//! Every rule with a case type or checkpoint type scope (including the
//! combined case + checkpoint type scope) is held as one collection under a
//! single constant key. On read, an absent or expired entry is recomputed from
//! the [`RuleStore`] and stored with an absolute expiration of `ttl` after the
//! refresh.
//!
//! # Staleness
//!
//! Rule mutations do not invalidate this cache. A new or removed type-scoped
//! rule becomes visible to membership checks within one TTL.
//!
//! # Concurrency
//!
//! Concurrent refreshes during the expiry window may both query the store and
//! both write the same value; no lock guards the refresh.
//!
//! # Example
//!
//! ```rust,ignore
//! use casegate_domain::cache::{RuleCache, RuleCacheConfig};
//! use casegate_storage::MemoryRuleStore;
//!
//! let cache = RuleCache::new(MemoryRuleStore::new_shared(), RuleCacheConfig::default());
//! let rules = cache.type_scoped_rules().await?;
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use casegate_storage::{AccessRule, RuleQuery, RuleStore};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::error::{DependencyError, DomainError, DomainResult};

/// The single key the type-scoped rule set lives under.
pub const TYPE_SCOPED_RULES_KEY: &str = "access-rules:type-scoped";

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cached rule collection and when it stops being served.
#[derive(Debug, Clone)]
pub struct CachedRules {
    pub rules: Arc<Vec<AccessRule>>,
    pub expires_at: DateTime<Utc>,
}

impl CachedRules {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Key-value backend the rule cache stores its entry in.
#[async_trait]
pub trait RuleCacheBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> DomainResult<Option<CachedRules>>;

    async fn insert(&self, key: &str, entry: CachedRules) -> DomainResult<()>;
}

/// In-process backend built on Moka.
///
/// Expiry is decided by the [`RuleCache`] clock, not by Moka.
pub struct MokaRuleCacheBackend {
    cache: Cache<String, CachedRules>,
}

impl MokaRuleCacheBackend {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }
}

impl fmt::Debug for MokaRuleCacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MokaRuleCacheBackend")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl RuleCacheBackend for MokaRuleCacheBackend {
    async fn get(&self, key: &str) -> DomainResult<Option<CachedRules>> {
        Ok(self.cache.get(key).await)
    }

    async fn insert(&self, key: &str, entry: CachedRules) -> DomainResult<()> {
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }
}

/// Configuration for the rule cache.
#[derive(Debug, Clone)]
pub struct RuleCacheConfig {
    /// Absolute lifetime of a refreshed entry.
    pub ttl: Duration,
    /// Capacity of the default Moka backend.
    pub max_capacity: u64,
}

impl Default for RuleCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_capacity: 16,
        }
    }
}

impl RuleCacheConfig {
    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }
}

/// Cache-aside holder of the type-scoped rule set.
pub struct RuleCache<S> {
    store: Arc<S>,
    backend: Arc<dyn RuleCacheBackend>,
    clock: Arc<dyn Clock>,
    config: RuleCacheConfig,
}

impl<S> fmt::Debug for RuleCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCache")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

impl<S> RuleCache<S>
where
    S: RuleStore,
{
    /// Creates a cache with a Moka backend and the system clock.
    pub fn new(store: Arc<S>, config: RuleCacheConfig) -> Self {
        let backend = Arc::new(MokaRuleCacheBackend::new(config.max_capacity));
        Self::with_parts(store, backend, Arc::new(SystemClock), config)
    }

    /// Creates a cache from explicit collaborators.
    pub fn with_parts(
        store: Arc<S>,
        backend: Arc<dyn RuleCacheBackend>,
        clock: Arc<dyn Clock>,
        config: RuleCacheConfig,
    ) -> Self {
        Self {
            store,
            backend,
            clock,
            config,
        }
    }

    /// Returns the configuration for this cache.
    pub fn config(&self) -> &RuleCacheConfig {
        &self.config
    }

    /// Returns every rule with a case type or checkpoint type scope.
    ///
    /// # Metrics
    ///
    /// - `casegate_rule_cache_hits_total` - entry present and fresh
    /// - `casegate_rule_cache_misses_total` - entry absent or expired
    pub async fn type_scoped_rules(&self) -> DomainResult<Arc<Vec<AccessRule>>> {
        let now = self.clock.now();

        if let Some(entry) = self.backend.get(TYPE_SCOPED_RULES_KEY).await? {
            if !entry.is_expired(now) {
                metrics::counter!("casegate_rule_cache_hits_total").increment(1);
                return Ok(entry.rules);
            }
        }

        metrics::counter!("casegate_rule_cache_misses_total").increment(1);
        self.refresh(now).await
    }

    #[instrument(skip(self))]
    async fn refresh(&self, now: DateTime<Utc>) -> DomainResult<Arc<Vec<AccessRule>>> {
        let rules = Arc::new(self.store.query(&RuleQuery::TypeScoped).await?);

        let expires_at = chrono::Duration::from_std(self.config.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                DomainError::Dependency(DependencyError::Cache {
                    message: format!("rule cache ttl out of range: {:?}", self.config.ttl),
                })
            })?;

        self.backend
            .insert(
                TYPE_SCOPED_RULES_KEY,
                CachedRules {
                    rules: Arc::clone(&rules),
                    expires_at,
                },
            )
            .await?;

        metrics::counter!("casegate_rule_cache_refreshes_total").increment(1);
        debug!(count = rules.len(), %expires_at, "refreshed type-scoped rule cache");
        Ok(rules)
    }
}
