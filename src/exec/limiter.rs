/// Wall-clock watchdog for one execution.
///
/// Advisory only: the process executor's hard deadline and the kernel rlimits
/// are what actually bound the child. Memory figures are best-effort and stay
/// `None` when the platform reports nothing.
use crate::config::types::SecurityConfig;
use crate::core::types::{Violation, ViolationCategory};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Polled by the process executor while the child runs. Returning a
/// violation asks the executor to kill the process group.
pub trait LivenessCheck: Send {
    fn start(&mut self);
    fn check(&self) -> Option<Violation>;
    fn record_peak_memory(&mut self, _bytes: u64) {}
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LimiterStats {
    /// Seconds since `start`
    pub execution_time: f64,
    /// Peak resident set size in bytes, if known
    pub peak_memory: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResourceLimiter {
    max_execution_time: Duration,
    started: Option<Instant>,
    peak_memory: Option<u64>,
}

impl ResourceLimiter {
    pub fn new(config: &SecurityConfig) -> Self {
        Self::with_limit(config.execution_timeout())
    }

    pub fn with_limit(max_execution_time: Duration) -> Self {
        Self {
            max_execution_time,
            started: None,
            peak_memory: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            execution_time: self.elapsed().as_secs_f64(),
            peak_memory: self.peak_memory,
        }
    }
}

impl LivenessCheck for ResourceLimiter {
    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.peak_memory = None;
    }

    fn check(&self) -> Option<Violation> {
        let started = self.started?;
        let elapsed = started.elapsed();
        if elapsed > self.max_execution_time {
            return Some(Violation::new(
                ViolationCategory::Timeout,
                format!(
                    "Execution exceeded {:.2}s (elapsed {:.2}s)",
                    self.max_execution_time.as_secs_f64(),
                    elapsed.as_secs_f64()
                ),
            ));
        }
        None
    }

    fn record_peak_memory(&mut self, bytes: u64) {
        self.peak_memory = Some(self.peak_memory.map_or(bytes, |p| p.max(bytes)));
    }
}
