//! Safety and cleanup
//!
//! Run-scoped scratch directories with guaranteed removal.

pub mod workspace;
