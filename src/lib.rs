//! codexam-judge: screening and sandboxed execution of untrusted submissions
//!
//! A submission flows one way through the crate:
//!
//! 1. [`analysis`] screens the source against per-language deny-lists and
//!    rejects it before anything runs.
//! 2. [`judge`] turns the submission into a sandbox bundle: a fixed harness
//!    program plus side-channel files for the code, the test cases and the
//!    execution policy.
//! 3. [`exec`] runs the harness in its own process group under rlimits,
//!    with a wall-clock watchdog and bounded output capture.
//! 4. [`verdict`] classifies the raw outcome into an
//!    [`ExecutionVerdict`](crate::core::types::ExecutionVerdict).
//!
//! [`Judge`](crate::core::judge::Judge) composes the steps and is the public entry point.
//!
//! The static screen is a fast-reject heuristic. The process boundary,
//! kernel rlimits and process-group termination are what contain a
//! submission that gets past it.

// Screening
pub mod analysis;

// Caller-owned rate limiting
pub mod admission;

// Configuration, errors and validation
pub mod config;

// Orchestrator and shared runtime types
pub mod core;

// Process execution and resource limits
pub mod exec;

// Language adapters and the sandbox wrapper
pub mod judge;

// Audit events
pub mod observability;

// Scratch workspaces
pub mod safety;

// Output collection helpers
pub mod utils;

// Verdict classification and error translation
pub mod verdict;

// Command-line front end
pub mod cli;

pub use crate::config::types::{JudgeError, Language, Result, SecurityConfig};
pub use crate::core::judge::Judge;
pub use crate::core::types::{ExecutionVerdict, TestCase, TestResult, VerdictStatus, Violation};
