//! Utilities
//!
//! Bounded output collection shared by the process executor.

pub mod output;
