//! Request handlers.

pub mod rules;
