//! Execution control
//!
//! Isolated process execution, pre-exec resource limits and the wall-clock watchdog.

pub mod executor;
pub mod limiter;
pub mod preexec;
