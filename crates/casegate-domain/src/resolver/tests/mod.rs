//! Tests for the resolver module.
//!
//! Organized by functionality:
//! - Case list filtering
//! - Single-case membership (bypass, type-scoped rules, case-specific fallback)
//! - Failure propagation
//! - Aggregate composition
