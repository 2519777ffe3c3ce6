use std::sync::mpsc::Sender;

use crate::HarvestEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Forwards events over a channel; a dropped receiver is ignored.
pub struct ChannelProgressSink {
    tx: Sender<HarvestEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: Sender<HarvestEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }
}

pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: HarvestEvent) {}
}
