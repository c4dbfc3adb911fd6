//! casegate-domain: Core case authorization logic
//!
//! This crate contains the core authorization logic including:
//! - Access rule validation
//! - Type-scoped rule caching
//! - Case list filtering and single-case membership resolution
//! - Composition of pluggable authorizers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               casegate-domain               │
//! ├─────────────────────────────────────────────┤
//! │  principal   - Verified caller claims       │
//! │  model/      - Rule drafts                  │
//! │  validation/ - Scope and grant invariants   │
//! │  cache/      - Type-scoped rule cache       │
//! │  resolver/   - Filtering, membership, AND   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod model;
pub mod principal;
pub mod resolver;
pub mod validation;

// Re-export commonly used types at the crate root
pub use cache::{Clock, ManualClock, RuleCache, RuleCacheConfig, SystemClock};
pub use error::{DependencyError, DomainError, DomainResult};
pub use model::RuleDraft;
pub use principal::{Claims, Principal};
pub use resolver::{AuthorizationAggregate, CaseAuthorizer, RuleResolver};
