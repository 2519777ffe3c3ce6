use std::collections::VecDeque;
use std::mem;

use engine_logging::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use harvester_core::{update, Effect, HarvestLimits, HarvestState, Msg, StopReason, Thread};
use tokio::time::Instant;

use crate::dom::{Dom, DomError, DomResult};
use crate::expand::{PagerStop, ThreadExpander};
use crate::extract::RecordExtractor;
use crate::pacing::{settle, Pacing};
use crate::progress::ProgressSink;
use crate::scroll::Scroller;
use crate::selectors::Selectors;
use crate::sink::ThreadSink;
use crate::types::{FaultKind, FaultTally, HarvestEvent, HarvestReport, ThreadSummary};

pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Threads per flushed batch.
    pub batch_size: usize,
    /// Seed dedup from threads already in the cumulative artifact.
    pub resume: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            resume: false,
        }
    }
}

/// Runs harvesting sessions against one page.
pub struct Harvester<D: Dom> {
    dom: D,
    selectors: Selectors,
    limits: HarvestLimits,
    pacing: Pacing,
    options: SessionOptions,
}

impl<D: Dom> Harvester<D> {
    pub fn new(dom: D, selectors: Selectors, limits: HarvestLimits, pacing: Pacing) -> Self {
        Self {
            dom,
            selectors,
            limits,
            pacing,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    /// Harvests one page. With `target` the page is loaded first; without it
    /// the session works on whatever the browser currently shows.
    ///
    /// Never fails: an incomplete harvest is described by the report, and
    /// every thread handed to the sink before the stop is already persisted.
    pub async fn run<S: ThreadSink + ?Sized>(
        &self,
        target: Option<&str>,
        sink: &mut S,
        progress: &dyn ProgressSink,
    ) -> HarvestReport {
        let mut session = Session {
            dom: &self.dom,
            selectors: &self.selectors,
            pacing: &self.pacing,
            options: &self.options,
            extractor: RecordExtractor::new(&self.dom, &self.selectors).with_base_url(target),
            sink,
            progress,
            state: HarvestState::new(self.limits.clone()),
            queue: VecDeque::new(),
            container: None,
            threads: Vec::new(),
            pending: Vec::new(),
            faults: FaultTally::default(),
            persisted_batches: 0,
            failed_batches: 0,
            cumulative_total: None,
        };
        session.run(target).await
    }
}

/// What became of one thread handle.
enum Harvested {
    Fresh {
        thread: Thread,
        reply_misses: usize,
        interrupted: bool,
    },
    AlreadySeen,
    NoRecord,
}

struct Session<'r, D: Dom, S: ThreadSink + ?Sized> {
    dom: &'r D,
    selectors: &'r Selectors,
    pacing: &'r Pacing,
    options: &'r SessionOptions,
    extractor: RecordExtractor<'r, D>,
    sink: &'r mut S,
    progress: &'r dyn ProgressSink,
    state: HarvestState,
    queue: VecDeque<Effect>,
    container: Option<D::Handle>,
    /// Thread handles from the latest scan.
    threads: Vec<D::Handle>,
    pending: Vec<Thread>,
    faults: FaultTally,
    persisted_batches: usize,
    failed_batches: usize,
    cumulative_total: Option<usize>,
}

impl<D: Dom, S: ThreadSink + ?Sized> Session<'_, D, S> {
    async fn run(&mut self, target: Option<&str>) -> HarvestReport {
        engine_logging::set_scroll_cycle(0);

        // The cumulative artifact must exist even if the page never renders.
        if let Err(err) = self.sink.open() {
            engine_error!("output unavailable: {}", err);
            self.fault(FaultKind::PersistenceFault, err.to_string());
        }
        if self.options.resume {
            match self.sink.known_fingerprints() {
                Ok(known) => {
                    engine_info!("resuming with {} threads already stored", known.len());
                    self.state = mem::take(&mut self.state).with_seen(known);
                }
                Err(err) => {
                    engine_warn!("cannot resume from existing output: {}", err);
                    self.fault(FaultKind::PersistenceFault, err.to_string());
                }
            }
        }

        match self.prepare_page(target).await {
            Ok(container) => {
                self.container = Some(container);
                self.dispatch(Msg::Start);
            }
            Err(reason) => self.dispatch(Msg::Aborted { reason }),
        }

        while let Some(effect) = self.queue.pop_front() {
            if let Effect::Finish { reason } = effect {
                engine_info!("stopping: {}", reason);
                break;
            }
            self.execute(effect).await;
        }

        self.flush();
        self.report()
    }

    async fn prepare_page(&mut self, target: Option<&str>) -> Result<D::Handle, StopReason> {
        if let Some(url) = target {
            engine_info!("opening {}", url);
            if let Err(err) = self.dom.navigate_to(url).await {
                engine_error!("navigation to {} failed: {}", url, err);
                return Err(StopReason::NavigationFailed);
            }
            settle(self.pacing.page_load).await;
        }

        let deadline = Instant::now() + self.pacing.container_timeout;
        loop {
            match self.dom.find_in_document(&self.selectors.container).await {
                Ok(Some(container)) => {
                    engine_debug!("comments container found");
                    return Ok(container);
                }
                Ok(None) => {}
                Err(err) => engine_debug!("container lookup failed: {}", err),
            }
            if Instant::now() >= deadline {
                engine_error!(
                    "comments container {:?} did not render within {:?}",
                    self.selectors.container,
                    self.pacing.container_timeout
                );
                return Err(StopReason::ContainerNotFound);
            }
            settle(self.pacing.poll_interval).await;
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        engine_trace!("msg {:?}", msg);
        let (next, effects) = update(mem::take(&mut self.state), msg);
        self.state = next;
        engine_logging::set_scroll_cycle(self.state.scroll_attempts() as u64);
        for effect in effects {
            if effect.is_terminal() {
                self.queue.clear();
            }
            self.queue.push_back(effect);
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::CompositeScroll => {
                let result = self.scroller().composite(self.container.as_ref()).await;
                let msg = match result {
                    Ok(moved) => {
                        if !moved {
                            self.fault(FaultKind::ScrollIneffective, "viewport did not move");
                        }
                        Msg::ScrollCompleted { ok: true, moved }
                    }
                    Err(err) => {
                        engine_warn!("scroll failed: {}", err);
                        self.dom_fault(&err);
                        Msg::ScrollCompleted {
                            ok: false,
                            moved: false,
                        }
                    }
                };
                self.dispatch(msg);
            }
            Effect::ExtraWait => {
                engine_debug!("extra wait");
                settle(self.pacing.extra_wait).await;
            }
            Effect::RefreshScroll => {
                if let Err(err) = self.scroller().refresh(self.container.as_ref()).await {
                    engine_warn!("refresh scroll failed: {}", err);
                    self.dom_fault(&err);
                }
            }
            Effect::AggressiveScroll => {
                engine_info!(
                    "no new threads for {} cycles, scrolling aggressively",
                    self.state.no_new_cycles()
                );
                if let Err(err) = self.scroller().aggressive(self.container.as_ref()).await {
                    engine_warn!("aggressive scroll failed: {}", err);
                    self.dom_fault(&err);
                }
            }
            Effect::RelocateContainer => self.relocate_container().await,
            Effect::Scan => self.scan().await,
            Effect::Process { from, to } => self.process(from, to).await,
            // Handled by the run loop.
            Effect::Finish { .. } => {}
        }
    }

    async fn relocate_container(&mut self) {
        engine_info!("re-resolving comments container");
        let found = match self.dom.find_in_document(&self.selectors.container).await {
            Ok(Some(container)) => {
                self.container = Some(container);
                self.threads.clear();
                true
            }
            Ok(None) => false,
            Err(err) => {
                engine_debug!("container lookup failed: {}", err);
                false
            }
        };
        if !found {
            self.fault(FaultKind::ContainerLost, "comments container not in document");
        }
        self.dispatch(Msg::ContainerRelocated { found });
    }

    async fn scan(&mut self) {
        let Some(container) = self.container.clone() else {
            self.dispatch(Msg::ContainerStale);
            return;
        };
        match self.dom.query_all(&container, &self.selectors.thread).await {
            Ok(threads) => {
                engine_debug!("{} threads rendered", threads.len());
                let rendered = threads.len();
                self.threads = threads;
                self.dispatch(Msg::Scanned { rendered });
            }
            Err(err) if err.is_stale() => {
                engine_warn!("comments container went stale");
                self.dom_fault(&err);
                self.dispatch(Msg::ContainerStale);
            }
            Err(err) => {
                engine_warn!("scan failed: {}", err);
                self.dom_fault(&err);
                let rendered = self.state.watermark();
                self.dispatch(Msg::Scanned { rendered });
            }
        }
    }

    async fn process(&mut self, from: usize, to: usize) {
        engine_debug!("processing threads {}..{}", from, to);
        for index in from..to {
            if self.state.thread_limit_reached() {
                break;
            }
            let Some(thread) = self.harvest_at(index).await else {
                continue;
            };
            let fingerprint = thread.fingerprint.clone();
            let summary = ThreadSummary::of(self.state.processed() + 1, &thread);
            engine_debug!(
                "#{} {}: {} ({} replies)",
                summary.index,
                summary.author,
                summary.preview,
                summary.reply_count
            );
            self.pending.push(thread);
            self.dispatch(Msg::ThreadHarvested { fingerprint });
            self.progress.emit(HarvestEvent::ThreadHarvested(summary));
            if self.pending.len() >= self.options.batch_size.max(1) {
                self.flush();
            }
        }
        self.flush();
        self.dispatch(Msg::BatchProcessed { scanned_to: to });
    }

    /// Harvests the thread at `index` of the latest scan. A stale handle is
    /// re-resolved once by rescanning the container.
    async fn harvest_at(&mut self, index: usize) -> Option<Thread> {
        let mut handle = self.threads.get(index)?.clone();
        let mut retried = false;
        loop {
            match self.harvest(&handle).await {
                Ok(Harvested::Fresh {
                    thread,
                    reply_misses,
                    interrupted,
                }) => {
                    for _ in 0..reply_misses {
                        self.fault(FaultKind::ExtractionMiss, "reply without text");
                    }
                    if interrupted {
                        self.fault(FaultKind::StaleElement, "reply pagination interrupted");
                    }
                    return Some(thread);
                }
                Ok(Harvested::AlreadySeen) => return None,
                Ok(Harvested::NoRecord) => {
                    self.fault(FaultKind::ExtractionMiss, format!("thread {index} has no text"));
                    return None;
                }
                Err(err) if err.is_stale() && !retried => {
                    self.dom_fault(&err);
                    retried = true;
                    handle = self.rescan_at(index).await?;
                }
                Err(err) => {
                    engine_warn!("thread {} skipped: {}", index, err);
                    self.dom_fault(&err);
                    return None;
                }
            }
        }
    }

    async fn rescan_at(&mut self, index: usize) -> Option<D::Handle> {
        let container = self.container.clone()?;
        match self.dom.query_all(&container, &self.selectors.thread).await {
            Ok(threads) => {
                let handle = threads.get(index).cloned();
                self.threads = threads;
                handle
            }
            Err(err) => {
                engine_debug!("rescan failed: {}", err);
                None
            }
        }
    }

    /// Seen threads are skipped before any scrolling so a rescan after
    /// relocation leaves the viewport at the bottom.
    async fn harvest(&self, handle: &D::Handle) -> DomResult<Harvested> {
        let Some(main) = self.extractor.extract_main(handle).await? else {
            return Ok(Harvested::NoRecord);
        };
        if self.state.has_seen(&main.fingerprint()) {
            engine_trace!("thread {} already harvested", main.fingerprint());
            return Ok(Harvested::AlreadySeen);
        }

        if let Err(err) = self.scroller().ensure_visible(handle).await {
            if err.is_stale() {
                return Err(err);
            }
            engine_debug!("could not bring thread into view: {}", err);
        }

        let limits = self.state.limits();
        let expander = ThreadExpander::new(self.dom, self.selectors, &self.extractor, self.pacing);
        let replies = expander
            .expand_replies(
                handle,
                limits.max_replies_per_thread,
                limits.max_reply_pages,
            )
            .await?;
        if replies.stop == PagerStop::ReplyLimit {
            engine_warn!(
                "reply cap {} reached for one thread",
                limits.max_replies_per_thread
            );
        }

        Ok(Harvested::Fresh {
            thread: Thread::new(main, replies.replies),
            reply_misses: replies.misses,
            interrupted: replies.stop == PagerStop::Interrupted,
        })
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = mem::take(&mut self.pending);
        let processed = self.state.processed();
        match self.sink.append_batch(&batch, processed) {
            Ok(written) => {
                self.persisted_batches += 1;
                self.cumulative_total = Some(written.cumulative_total);
                engine_info!(
                    "saved {} threads to {} ({} total)",
                    batch.len(),
                    written.batch_path.display(),
                    written.cumulative_total
                );
                self.progress.emit(HarvestEvent::BatchPersisted {
                    threads: batch.len(),
                    processed,
                    path: written.batch_path,
                });
            }
            Err(err) => {
                self.failed_batches += 1;
                engine_error!("batch of {} threads not saved: {}", batch.len(), err);
                self.fault(FaultKind::PersistenceFault, err.to_string());
            }
        }
    }

    fn report(&self) -> HarvestReport {
        let report = HarvestReport {
            processed: self.state.processed(),
            scroll_attempts: self.state.scroll_attempts(),
            stop_reason: self.state.stop_reason(),
            persisted_batches: self.persisted_batches,
            failed_batches: self.failed_batches,
            cumulative_total: self.cumulative_total,
            faults: self.faults,
        };
        engine_info!(
            "session finished: {} threads, {} scroll attempts, {} faults",
            report.processed,
            report.scroll_attempts,
            report.faults.total()
        );
        self.progress.emit(HarvestEvent::Finished(report.clone()));
        report
    }

    fn scroller(&self) -> Scroller<'_, D> {
        Scroller::new(self.dom, self.pacing)
    }

    fn dom_fault(&mut self, err: &DomError) {
        let kind = if err.is_stale() {
            FaultKind::StaleElement
        } else {
            FaultKind::ExtractionMiss
        };
        self.fault(kind, err.to_string());
    }

    fn fault(&mut self, kind: FaultKind, detail: impl Into<String>) {
        let detail = detail.into();
        engine_trace!("{}: {}", kind, detail);
        self.faults.record(kind);
        self.progress.emit(HarvestEvent::Fault { kind, detail });
    }
}
