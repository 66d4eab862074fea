//! Runtime state shared by the scheduler and message handlers.

bitflags::bitflags! {
    /// Why a scan was requested. Coalesced requests accumulate here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScanTrigger: u8 {
        /// Initial scan after settings load
        const STARTUP = 1 << 0;
        /// Feed container gained element nodes
        const MUTATION = 1 << 1;
        /// Scrolling settled
        const SCROLL = 1 << 2;
        /// Deferred by the minimum run interval
        const RETRY = 1 << 3;
        /// Follow-up for a backlog larger than one batch
        const COOLDOWN = 1 << 4;
        /// Feature re-enabled
        const TOGGLE = 1 << 5;
        /// Explicit request from the host
        const MANUAL = 1 << 6;
    }
}

impl Default for ScanTrigger {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-page scanner state. Lives for the page session only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeState {
    pub enabled: bool,
    /// Posts marked hidden since the page loaded
    pub hidden_count: u32,
    /// Start time of the last pass, in host milliseconds
    pub last_scan_at: Option<u64>,
    pub is_scanning: bool,
    pub scan_pending: bool,
    pub pending_triggers: ScanTrigger,
}

impl RuntimeState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }
}
