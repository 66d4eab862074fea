//! Deferred tasks
//!
//! Every suspension point in the scanner is one of a fixed set of timer slots.
//! A slot holds at most one pending deadline; scheduling an armed slot replaces
//! its deadline, which is how debounces reset. When a deadline passes the host
//! calls back into the controller with the slot that fired.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerSlot {
    /// Trailing debounce after feed mutations
    ObserverDebounce,
    /// Trailing debounce after scroll events
    ScrollDebounce,
    /// Retry of a request that arrived inside the minimum run interval
    Retry,
    /// Follow-up pass for a remaining backlog
    Cooldown,
}

impl TimerSlot {
    pub const ALL: [TimerSlot; 4] = [
        TimerSlot::ObserverDebounce,
        TimerSlot::ScrollDebounce,
        TimerSlot::Retry,
        TimerSlot::Cooldown,
    ];
}

/// Clock and timer facilities provided by the host.
pub trait TimerHost {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Arm `slot` to fire after `delay_ms`, replacing any pending deadline.
    fn schedule(&mut self, slot: TimerSlot, delay_ms: u64);

    /// Disarm `slot`. No-op if it is not pending.
    fn cancel(&mut self, slot: TimerSlot);

    fn is_pending(&self, slot: TimerSlot) -> bool;
}

/// Deterministic timers on a manually advanced clock.
#[derive(Debug, Clone, Default)]
pub struct VirtualTimers {
    now: u64,
    seq: u64,
    // slot -> (deadline, scheduling order)
    pending: BTreeMap<TimerSlot, (u64, u64)>,
}

impl VirtualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Milliseconds until `slot` fires, if armed.
    pub fn remaining(&self, slot: TimerSlot) -> Option<u64> {
        self.pending
            .get(&slot)
            .map(|&(deadline, _)| deadline.saturating_sub(self.now))
    }

    /// Earliest deadline among armed slots.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.values().map(|&(deadline, _)| deadline).min()
    }

    /// Disarm and return the earliest slot due at or before `until`,
    /// moving the clock to its deadline.
    pub fn pop_due(&mut self, until: u64) -> Option<TimerSlot> {
        let (&slot, &(deadline, _)) = self
            .pending
            .iter()
            .filter(|(_, &(deadline, _))| deadline <= until)
            .min_by_key(|(_, &key)| key)?;
        self.pending.remove(&slot);
        self.now = self.now.max(deadline);
        Some(slot)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl TimerHost for VirtualTimers {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn schedule(&mut self, slot: TimerSlot, delay_ms: u64) {
        self.seq += 1;
        self.pending.insert(slot, (self.now + delay_ms, self.seq));
    }

    fn cancel(&mut self, slot: TimerSlot) {
        self.pending.remove(&slot);
    }

    fn is_pending(&self, slot: TimerSlot) -> bool {
        self.pending.contains_key(&slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_replaces_deadline() {
        let mut timers = VirtualTimers::new();
        timers.schedule(TimerSlot::ObserverDebounce, 500);
        timers.set_now(300);
        timers.schedule(TimerSlot::ObserverDebounce, 500);
        assert_eq!(timers.remaining(TimerSlot::ObserverDebounce), Some(500));
        assert_eq!(timers.pop_due(700), None);
        assert_eq!(timers.pop_due(800), Some(TimerSlot::ObserverDebounce));
        assert_eq!(timers.now_ms(), 800);
    }

    #[test]
    fn test_pop_due_orders_by_deadline_then_schedule_order() {
        let mut timers = VirtualTimers::new();
        timers.schedule(TimerSlot::Cooldown, 1000);
        timers.schedule(TimerSlot::Retry, 200);
        timers.schedule(TimerSlot::ScrollDebounce, 200);
        assert_eq!(timers.pop_due(5000), Some(TimerSlot::Retry));
        assert_eq!(timers.pop_due(5000), Some(TimerSlot::ScrollDebounce));
        assert_eq!(timers.pop_due(5000), Some(TimerSlot::Cooldown));
        assert_eq!(timers.pop_due(5000), None);
        assert_eq!(timers.now_ms(), 1000);
    }

    #[test]
    fn test_cancel() {
        let mut timers = VirtualTimers::starting_at(10);
        timers.schedule(TimerSlot::Retry, 5);
        assert!(timers.is_pending(TimerSlot::Retry));
        timers.cancel(TimerSlot::Retry);
        assert!(!timers.is_pending(TimerSlot::Retry));
        assert_eq!(timers.next_deadline(), None);
    }
}
