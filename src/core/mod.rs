//! Language-agnostic judge core.
//!
//! Shared runtime types and the orchestrator that composes screening,
//! harness generation, isolated execution and verdict classification.

pub mod judge;
pub mod types;
