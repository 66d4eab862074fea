//! Scan rate limiting.
//!
//! Decides what to do with a scan request given the runtime state. The
//! controller acts on the decision; nothing here touches timers or the page.

use crate::config::ScannerConfig;
use crate::state::RuntimeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// Scanning is switched off
    Disabled,
    /// Too soon after the last pass; retry after `delay` ms
    Defer { delay: u64 },
    /// Too soon, and a retry is already scheduled
    Coalesce,
    /// A pass is in progress
    Busy,
    /// Start a pass now
    Run,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    min_interval: u64,
}

impl RateLimiter {
    pub fn new(min_interval: u64) -> Self {
        Self { min_interval }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.min_time_between_runs)
    }

    pub fn min_interval(&self) -> u64 {
        self.min_interval
    }

    pub fn decide(&self, state: &RuntimeState, now: u64) -> ScanDecision {
        if !state.enabled {
            return ScanDecision::Disabled;
        }

        if let Some(last) = state.last_scan_at {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.min_interval {
                if state.scan_pending {
                    return ScanDecision::Coalesce;
                }
                return ScanDecision::Defer {
                    delay: self.min_interval - elapsed,
                };
            }
        }

        if state.is_scanning {
            return ScanDecision::Busy;
        }

        ScanDecision::Run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RuntimeState {
        RuntimeState::new(true)
    }

    #[test]
    fn test_first_request_runs() {
        assert_eq!(RateLimiter::new(2000).decide(&state(), 0), ScanDecision::Run);
    }

    #[test]
    fn test_disabled_gate() {
        let limiter = RateLimiter::new(2000);
        let disabled = RuntimeState::new(false);
        assert_eq!(limiter.decide(&disabled, 10_000), ScanDecision::Disabled);
    }

    #[test]
    fn test_defer_with_remaining_delay() {
        let limiter = RateLimiter::new(2000);
        let mut s = state();
        s.last_scan_at = Some(1000);
        assert_eq!(limiter.decide(&s, 1500), ScanDecision::Defer { delay: 1500 });
        s.scan_pending = true;
        assert_eq!(limiter.decide(&s, 1600), ScanDecision::Coalesce);
        assert_eq!(limiter.decide(&s, 3000), ScanDecision::Run);
    }

    #[test]
    fn test_busy() {
        let limiter = RateLimiter::new(2000);
        let mut s = state();
        s.last_scan_at = Some(0);
        s.is_scanning = true;
        assert_eq!(limiter.decide(&s, 5000), ScanDecision::Busy);
    }
}
