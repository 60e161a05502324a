//! Verdict derivation
//!
//! Pure functions over a finished run: classification of the process
//! outcome and translation of interpreter errors.

pub mod translate;
pub mod verdict;

pub use verdict::VerdictClassifier;
