//! casegate-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for casegate, including:
//! - RuleStore trait and the stored AccessRule record
//! - CaseSource trait and the declarative case list query
//! - In-memory implementations for tests and single-process hosts
//! - PostgreSQL translation of case list queries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              casegate-storage               │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - RuleStore, AccessRule        │
//! │  cases.rs    - CaseSource, CaseListQuery    │
//! │  memory.rs   - In-memory implementation     │
//! │  postgres.rs - Push-down SQL for case lists │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cases;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

// Re-export commonly used types
pub use cases::{
    AccessSpec, CaseListQuery, CasePredicate, CaseProjection, CaseSource, RatedCase,
    MAX_ACCESS_LEVEL,
};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryCaseSource, MemoryRuleStore};
pub use traits::{
    AccessRule, FieldMatch, PaginatedResult, PaginationOptions, RuleFilter, RuleQuery, RuleStore,
    DEFAULT_PAGE_SIZE,
};
