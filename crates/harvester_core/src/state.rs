use std::collections::HashSet;

use crate::{Fingerprint, HarvestLimits, StopReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Bootstrapping,
    Scanning,
    Processing,
    Scrolling,
    Stalled,
    Done,
}

/// Per-session counters and the dedup set. Owned by one harvest loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarvestState {
    pub(crate) limits: HarvestLimits,
    pub(crate) phase: Phase,
    pub(crate) seen: HashSet<Fingerprint>,
    pub(crate) processed: usize,
    /// New threads in the batch currently being processed.
    pub(crate) batch_new: usize,
    /// Thread handles already handled in the current container.
    pub(crate) watermark: usize,
    pub(crate) bootstrap_done: usize,
    pub(crate) scroll_attempts: usize,
    pub(crate) no_new_cycles: usize,
    pub(crate) stalled_cycles: usize,
    pub(crate) scroll_failures: usize,
    /// Scrolls that completed without moving the viewport. Reported only;
    /// stall escalation is driven by `no_new_cycles`.
    pub(crate) ineffective_scrolls: usize,
    /// Container re-resolutions since the last productive batch.
    pub(crate) relocations: usize,
    pub(crate) stop_reason: Option<StopReason>,
}

impl HarvestState {
    pub fn new(limits: HarvestLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Seeds the dedup set with threads persisted by an earlier session.
    /// Seeded fingerprints do not count as processed.
    pub fn with_seen(mut self, fingerprints: impl IntoIterator<Item = Fingerprint>) -> Self {
        self.seen.extend(fingerprints);
        self
    }

    pub fn limits(&self) -> &HarvestLimits {
        &self.limits
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn has_seen(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn thread_limit_reached(&self) -> bool {
        self.processed >= self.limits.max_threads
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn scroll_attempts(&self) -> usize {
        self.scroll_attempts
    }

    pub fn no_new_cycles(&self) -> usize {
        self.no_new_cycles
    }

    pub fn stalled_cycles(&self) -> usize {
        self.stalled_cycles
    }

    pub fn scroll_failures(&self) -> usize {
        self.scroll_failures
    }

    pub fn ineffective_scrolls(&self) -> usize {
        self.ineffective_scrolls
    }

    pub fn relocations(&self) -> usize {
        self.relocations
    }
}
