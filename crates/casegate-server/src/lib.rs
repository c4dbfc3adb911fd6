//! casegate-server: Rule management and service wiring
//!
//! This crate contains the application layer including:
//! - Access rule CRUD service with privilege gating
//! - Configuration management
//! - Logging initialisation
//! - Wiring of the default in-memory authorization stack
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               casegate-server               │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - Configuration           │
//! │  observability.rs - Logging setup           │
//! │  handlers/                                  │
//! │    rules/         - Access rule service     │
//! │  state.rs         - Service wiring          │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod handlers;
pub mod observability;
pub mod state;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::rules::{AccessRuleService, CaseCatalog, MemoryCaseCatalog};
pub use observability::{init_logging, LoggingConfig};
pub use state::AppState;
