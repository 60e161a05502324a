//! Admission control.
//!
//! A sliding-window request counter keyed by client identity. The limiter is
//! owned by the caller and passed into the judge, so no process-wide state
//! exists and independent front ends can keep independent windows.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    requests: HashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            requests: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admit or deny one request from `client_id` at `now`. Only admitted
    /// requests count against the window.
    pub fn check(&mut self, client_id: &str, now: Instant) -> bool {
        let window = self.window;
        let history = self.requests.entry(client_id.to_string()).or_default();
        while let Some(&oldest) = history.front() {
            if now.saturating_duration_since(oldest) >= window {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() >= self.max_requests {
            log::debug!(
                "Client {} denied: {} requests within {:?}",
                client_id,
                history.len(),
                window
            );
            return false;
        }
        history.push_back(now);
        true
    }

    /// Requests from `client_id` still inside the window at `now`.
    pub fn in_window(&self, client_id: &str, now: Instant) -> usize {
        self.requests.get(client_id).map_or(0, |history| {
            history
                .iter()
                .filter(|&&t| now.saturating_duration_since(t) < self.window)
                .count()
        })
    }

    /// Drop clients with no request inside the window.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.requests.retain(|_, history| {
            history
                .back()
                .map_or(false, |&last| now.saturating_duration_since(last) < window)
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denies_past_limit() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        assert!(limiter.check("alice", now));
        assert!(limiter.check("alice", now + Duration::from_secs(1)));
        assert!(!limiter.check("alice", now + Duration::from_secs(2)));
        assert_eq!(limiter.in_window("alice", now + Duration::from_secs(2)), 2);
    }

    #[test]
    fn test_clients_are_independent() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.check("alice", now));
        assert!(limiter.check("bob", now));
        assert!(!limiter.check("alice", now));
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(10), 1);
        let now = Instant::now();
        assert!(limiter.check("alice", now));
        assert!(!limiter.check("alice", now + Duration::from_secs(9)));
        assert!(limiter.check("alice", now + Duration::from_secs(10)));
    }

    #[test]
    fn test_prune_forgets_idle_clients() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(5), 3);
        let now = Instant::now();
        limiter.check("alice", now);
        limiter.check("bob", now + Duration::from_secs(4));
        limiter.prune(now + Duration::from_secs(6));
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.in_window("alice", now + Duration::from_secs(6)), 0);
    }

    #[test]
    fn test_zero_budget_denies_everything() {
        let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(1), 0);
        assert!(!limiter.check("alice", Instant::now()));
    }
}
