//! Harvester engine: page access, extraction, persistence and effect execution.
mod dom;
mod expand;
mod extract;
mod harvester;
mod pacing;
mod persist;
mod progress;
mod scroll;
mod selectors;
mod sink;
mod types;
mod webdriver;

pub use dom::{Align, Dom, DomError, DomResult, ScrollTarget, Viewport};
pub use expand::{PagerStop, ReplyHarvest, ThreadExpander};
pub use extract::RecordExtractor;
pub use harvester::{Harvester, SessionOptions, DEFAULT_BATCH_SIZE};
pub use pacing::Pacing;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, NullProgressSink, ProgressSink};
pub use selectors::{parse_level, FieldProbes, Probe, Selectors};
pub use sink::{BatchWrite, JsonFileSink, ThreadSink};
pub use types::{FaultKind, FaultTally, HarvestEvent, HarvestReport, ThreadSummary};
pub use webdriver::WebDriverDom;
