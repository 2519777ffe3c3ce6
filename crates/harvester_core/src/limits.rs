use serde::{Deserialize, Serialize};

/// Ceilings and cadences that bound one harvesting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestLimits {
    /// Threads to persist before the session stops.
    pub max_threads: usize,
    /// Replies kept per thread.
    pub max_replies_per_thread: usize,
    /// Reply pages read per thread.
    pub max_reply_pages: usize,
    /// Counted scroll attempts (bootstrap scrolls excluded).
    pub max_scroll_attempts: usize,
    /// Consecutive scans without growth before recovery starts.
    pub max_no_new_content_cycles: usize,
    /// Container re-resolution attempts without progress before giving up.
    pub max_container_retries: usize,
    /// Consecutive failed scroll operations before giving up.
    pub max_scroll_failures: usize,
    pub bootstrap_scrolls: usize,
    /// Every Nth scroll attempt gets an extra wait.
    pub extra_wait_every: usize,
    /// Every Nth scroll attempt runs a top-then-bottom refresh scroll.
    pub refresh_every: usize,
    /// Every Nth stalled cycle re-resolves the container instead of scrolling aggressively.
    pub relocate_every: usize,
}

impl Default for HarvestLimits {
    fn default() -> Self {
        Self {
            max_threads: 50_000,
            max_replies_per_thread: 5_000,
            max_reply_pages: 500,
            max_scroll_attempts: 300,
            max_no_new_content_cycles: 20,
            max_container_retries: 5,
            max_scroll_failures: 5,
            bootstrap_scrolls: 3,
            extra_wait_every: 5,
            refresh_every: 10,
            relocate_every: 5,
        }
    }
}

pub(crate) fn is_every(count: usize, every: usize) -> bool {
    every > 0 && count > 0 && count % every == 0
}
