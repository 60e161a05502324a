//! Observability
//!
//! Structured audit events for security-relevant judge decisions.

pub mod audit;
