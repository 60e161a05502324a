//! Configuration and policy
//!
//! Security configuration, language selection, error taxonomy, loading and validation.

pub mod loader;
pub mod types;
pub mod validator;
