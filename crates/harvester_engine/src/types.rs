use std::fmt;
use std::path::PathBuf;

use harvester_core::{Fingerprint, StopReason, Thread};
use serde::Serialize;

/// Recoverable fault categories folded into counters during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    StaleElement,
    ExtractionMiss,
    ScrollIneffective,
    ContainerLost,
    PersistenceFault,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::StaleElement => write!(f, "stale element"),
            FaultKind::ExtractionMiss => write!(f, "extraction miss"),
            FaultKind::ScrollIneffective => write!(f, "ineffective scroll"),
            FaultKind::ContainerLost => write!(f, "container lost"),
            FaultKind::PersistenceFault => write!(f, "persistence fault"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultTally {
    pub stale_elements: usize,
    pub extraction_misses: usize,
    pub ineffective_scrolls: usize,
    pub container_losses: usize,
    pub persistence_faults: usize,
}

impl FaultTally {
    pub fn record(&mut self, kind: FaultKind) {
        match kind {
            FaultKind::StaleElement => self.stale_elements += 1,
            FaultKind::ExtractionMiss => self.extraction_misses += 1,
            FaultKind::ScrollIneffective => self.ineffective_scrolls += 1,
            FaultKind::ContainerLost => self.container_losses += 1,
            FaultKind::PersistenceFault => self.persistence_faults += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stale_elements
            + self.extraction_misses
            + self.ineffective_scrolls
            + self.container_losses
            + self.persistence_faults
    }
}

/// Short description of a harvested thread for progress output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    /// 1-based position among threads processed this session.
    pub index: usize,
    pub fingerprint: Fingerprint,
    pub author: String,
    pub author_level: Option<u8>,
    pub preview: String,
    pub like_count: u64,
    pub reply_count: usize,
}

const PREVIEW_CHARS: usize = 50;

impl ThreadSummary {
    pub fn of(index: usize, thread: &Thread) -> Self {
        let text = thread.main.text.trim();
        let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
        if text.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        Self {
            index,
            fingerprint: thread.fingerprint.clone(),
            author: thread.main.author_name.clone(),
            author_level: thread.main.author_level,
            preview,
            like_count: thread.main.like_count,
            reply_count: thread.replies.len(),
        }
    }
}

/// Final outcome of one session. Incomplete harvests are reported here, not
/// raised as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub processed: usize,
    pub scroll_attempts: usize,
    pub stop_reason: Option<StopReason>,
    pub persisted_batches: usize,
    pub failed_batches: usize,
    /// Threads in the cumulative artifact after the last successful batch.
    pub cumulative_total: Option<usize>,
    pub faults: FaultTally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    ThreadHarvested(ThreadSummary),
    BatchPersisted {
        threads: usize,
        processed: usize,
        path: PathBuf,
    },
    Fault {
        kind: FaultKind,
        detail: String,
    },
    Finished(HarvestReport),
}
