//! Access rule management.
//!
//! [`AccessRuleService`] is the CRUD surface over stored access rules:
//!
//! 1. **Type-wide rules** (case type, checkpoint type) are created, changed
//!    and deleted by admins and system clients only
//! 2. **Case rules** may be managed by any authenticated caller
//! 3. **Cascades** purge rules that reference a deleted case type or
//!    checkpoint type
//!
//! Mutations write through to the rule store. The type-scoped rule cache is
//! not invalidated; readers see changes once the cached entry expires.

mod service;
mod types;

pub use service::AccessRuleService;
pub use types::{CaseCatalog, MemoryCaseCatalog, MAX_RULE_BATCH_SIZE};
