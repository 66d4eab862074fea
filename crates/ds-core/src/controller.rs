//! Content script controller
//!
//! Owns the document, the timers and the runtime state, and turns host events
//! (mutations, scrolls, fired timers, popup messages) into scan passes.
//!
//! Everything runs on one thread. A pass is synchronous, so `is_scanning` only
//! guards against re-entrant requests made while a pass is on the stack.

use crate::config::{ConfigError, ScannerConfig, Settings};
use crate::dom::FeedDocument;
use crate::messages::{ContentRequest, ContentResponse, CountUpdate};
use crate::observer::MutationBatch;
use crate::scanner::{PostScanner, ScanReport};
use crate::scheduler::{RateLimiter, ScanDecision};
use crate::state::{RuntimeState, ScanTrigger};
use crate::timer::{TimerHost, TimerSlot, VirtualTimers};

/// Receiver for hidden-count updates (the extension badge).
pub trait CountSink {
    fn publish(&mut self, update: CountUpdate);
}

/// Sink that drops every update.
#[derive(Debug, Default)]
pub struct NullSink;

impl CountSink for NullSink {
    fn publish(&mut self, _update: CountUpdate) {}
}

/// Sink that keeps every update, for tests and simulations.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub updates: Vec<CountUpdate>,
}

impl CountSink for RecordingSink {
    fn publish(&mut self, update: CountUpdate) {
        self.updates.push(update);
    }
}

pub struct Controller<D: FeedDocument, T: TimerHost, S: CountSink> {
    config: ScannerConfig,
    limiter: RateLimiter,
    state: RuntimeState,
    doc: D,
    timers: T,
    sink: S,
    passes: u64,
}

impl<D: FeedDocument, T: TimerHost, S: CountSink> Controller<D, T, S> {
    pub fn new(config: ScannerConfig, settings: Settings, doc: D, timers: T, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            limiter: RateLimiter::from_config(&config),
            config,
            state: RuntimeState::new(settings.enabled),
            doc,
            timers,
            sink,
            passes: 0,
        })
    }

    /// Initial scan once settings are known.
    pub fn start(&mut self) -> Option<ScanReport> {
        log::debug!("Starting, enabled={}", self.state.enabled);
        self.request_scan(ScanTrigger::STARTUP)
    }

    /// Ask for a scan pass, subject to rate limiting.
    ///
    /// Returns the report if a pass ran immediately.
    pub fn request_scan(&mut self, trigger: ScanTrigger) -> Option<ScanReport> {
        let now = self.timers.now_ms();
        match self.limiter.decide(&self.state, now) {
            ScanDecision::Disabled => None,
            ScanDecision::Defer { delay } => {
                self.state.scan_pending = true;
                self.state.pending_triggers |= trigger;
                self.timers.schedule(TimerSlot::Retry, delay);
                log::debug!("Scan deferred {}ms ({:?})", delay, trigger);
                None
            }
            ScanDecision::Coalesce | ScanDecision::Busy => {
                self.state.scan_pending = true;
                self.state.pending_triggers |= trigger;
                None
            }
            ScanDecision::Run => Some(self.run_pass(trigger, now)),
        }
    }

    fn run_pass(&mut self, trigger: ScanTrigger, now: u64) -> ScanReport {
        self.state.is_scanning = true;
        self.state.last_scan_at = Some(now);
        // This pass serves every request queued so far.
        let triggers = std::mem::take(&mut self.state.pending_triggers) | trigger;
        self.state.scan_pending = false;
        self.timers.cancel(TimerSlot::Retry);

        let scanner = PostScanner::new(&self.config);
        let report = scanner.scan(&mut self.doc, &mut self.state.hidden_count);
        self.state.is_scanning = false;
        self.passes += 1;

        log::debug!(
            "Pass {} ({:?}): {} eligible, {} hidden, {} clean, {} remaining",
            self.passes,
            triggers,
            report.eligible,
            report.hidden,
            report.clean,
            report.remaining
        );

        if report.hidden > 0 {
            self.sink.publish(CountUpdate::UpdateCount {
                count: self.state.hidden_count,
            });
        }

        if report.remaining > 0 {
            self.timers.schedule(TimerSlot::Cooldown, self.config.batch_cooldown);
        }

        // A request made while the pass was running still gets its scan.
        if self.state.scan_pending && !self.timers.is_pending(TimerSlot::Retry) {
            self.timers.schedule(TimerSlot::Retry, self.limiter.min_interval());
        }

        report
    }

    /// Deadline callback from the host.
    pub fn on_timer(&mut self, slot: TimerSlot) -> Option<ScanReport> {
        match slot {
            TimerSlot::ObserverDebounce => self.request_scan(ScanTrigger::MUTATION),
            TimerSlot::ScrollDebounce => self.request_scan(ScanTrigger::SCROLL),
            TimerSlot::Cooldown => self.request_scan(ScanTrigger::COOLDOWN),
            TimerSlot::Retry => {
                self.state.scan_pending = false;
                let pending = std::mem::take(&mut self.state.pending_triggers);
                self.request_scan(ScanTrigger::RETRY | pending)
            }
        }
    }

    /// Mutation records observed on the feed container.
    pub fn on_mutations(&mut self, batch: MutationBatch) {
        if !self.state.enabled || !batch.introduces_elements() {
            return;
        }
        self.timers.schedule(TimerSlot::ObserverDebounce, self.config.observer_debounce);
    }

    /// A scroll event on the page.
    pub fn on_scroll(&mut self) {
        if !self.state.enabled {
            return;
        }
        self.timers.schedule(TimerSlot::ScrollDebounce, self.config.scroll_debounce);
    }

    /// Re-hide previously hidden posts and scan for new ones.
    ///
    /// Runs even when already enabled, so a toggle also repairs posts whose
    /// hide class was lost to a re-render.
    pub fn enable(&mut self) {
        let was_enabled = std::mem::replace(&mut self.state.enabled, true);
        let scanner = PostScanner::new(&self.config);
        let rehidden = scanner.rehide(&mut self.doc);
        log::debug!("Enabled (was {}), re-hid {} posts", was_enabled, rehidden);
        self.request_scan(ScanTrigger::TOGGLE);
    }

    /// Show hidden posts again. Classification markers stay in place.
    pub fn disable(&mut self) {
        if !self.state.enabled {
            return;
        }
        self.state.enabled = false;
        let scanner = PostScanner::new(&self.config);
        let revealed = scanner.reveal_hidden(&mut self.doc);
        log::debug!("Disabled, revealed {} posts", revealed);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }

    pub fn handle_message(&mut self, request: ContentRequest) -> ContentResponse {
        match request {
            ContentRequest::Toggle { enabled } => {
                self.set_enabled(enabled);
                ContentResponse::Toggled { success: true }
            }
            ContentRequest::GetCount => ContentResponse::Count {
                count: self.state.hidden_count,
            },
        }
    }

    pub fn hidden_count(&self) -> u32 {
        self.state.hidden_count
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<D: FeedDocument, S: CountSink> Controller<D, VirtualTimers, S> {
    /// Advance virtual time by `ms`, firing due timers in order.
    ///
    /// Returns the reports of every pass that ran.
    pub fn advance(&mut self, ms: u64) -> Vec<ScanReport> {
        let target = self.timers.now_ms() + ms;
        let mut reports = Vec::new();
        while let Some(slot) = self.timers.pop_due(target) {
            if let Some(report) = self.on_timer(slot) {
                reports.push(report);
            }
        }
        self.timers.set_now(target);
        reports
    }

    /// Fire timers until none are left, or `limit` ms have elapsed.
    pub fn run_until_idle(&mut self, limit: u64) -> Vec<ScanReport> {
        let end = self.timers.now_ms() + limit;
        let mut reports = Vec::new();
        while let Some(deadline) = self.timers.next_deadline() {
            if deadline > end {
                break;
            }
            reports.extend(self.advance(deadline - self.timers.now_ms()));
        }
        reports
    }
}
