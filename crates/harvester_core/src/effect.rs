use std::fmt;

use serde::{Deserialize, Serialize};

/// Page operations requested by `update`; the engine executes them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Four-step scroll; answered with `Msg::ScrollCompleted`.
    CompositeScroll,
    ExtraWait,
    /// Top, bottom, then back to the comments container.
    RefreshScroll,
    /// Intermediate viewport fractions plus a direct container scroll.
    AggressiveScroll,
    /// Re-resolve the comments container; answered with `Msg::ContainerRelocated`.
    RelocateContainer,
    /// Enumerate rendered thread handles; answered with `Msg::Scanned`.
    Scan,
    /// Extract, expand and persist handles `from..to` of the last scan;
    /// answered with `Msg::ThreadHarvested` per new thread, then `Msg::BatchProcessed`.
    Process { from: usize, to: usize },
    Finish { reason: StopReason },
}

impl Effect {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Effect::Finish { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxThreads,
    MaxScrollAttempts,
    ScrollFailures,
    StallExhausted,
    ContainerLost,
    ContainerNotFound,
    NavigationFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxThreads => write!(f, "thread limit reached"),
            StopReason::MaxScrollAttempts => write!(f, "scroll attempt limit reached"),
            StopReason::ScrollFailures => write!(f, "too many consecutive scroll failures"),
            StopReason::StallExhausted => write!(f, "no new content after recovery attempts"),
            StopReason::ContainerLost => write!(f, "comments container could not be re-resolved"),
            StopReason::ContainerNotFound => write!(f, "comments container never rendered"),
            StopReason::NavigationFailed => write!(f, "navigation failed"),
        }
    }
}
