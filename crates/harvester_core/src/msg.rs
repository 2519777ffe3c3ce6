use crate::{Fingerprint, StopReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Comments container located; begin bootstrapping.
    Start,
    /// A scroll operation finished. `moved` is false when the viewport offset did not advance.
    ScrollCompleted { ok: bool, moved: bool },
    /// Number of thread handles currently rendered in the container.
    Scanned { rendered: usize },
    /// The container handle went stale while scanning.
    ContainerStale,
    /// A thread was fully built (main + replies) and handed to the sink.
    ThreadHarvested { fingerprint: Fingerprint },
    /// Handles up to `scanned_to` were handled.
    BatchProcessed { scanned_to: usize },
    /// Outcome of a container re-resolution.
    ContainerRelocated { found: bool },
    /// The page could not be prepared (navigation or container wait failed).
    Aborted { reason: StopReason },
}
