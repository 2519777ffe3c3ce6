//! Harvester core: comment records and the pure harvest-loop state machine.
mod effect;
mod limits;
mod msg;
mod record;
mod state;
mod update;

pub use effect::{Effect, StopReason};
pub use limits::HarvestLimits;
pub use msg::Msg;
pub use record::{
    parse_like_count, CommentKind, CommentRecord, Fingerprint, PartialRecord, Thread, UNKNOWN,
};
pub use state::{HarvestState, Phase};
pub use update::update;
