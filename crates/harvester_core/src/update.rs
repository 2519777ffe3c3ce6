use crate::limits::is_every;
use crate::{Effect, HarvestState, Msg, Phase, StopReason};

/// Pure update function: applies a message to state and returns any effects.
///
/// Once `Phase::Done` is reached every further message is ignored.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    if state.phase == Phase::Done {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Start => {
            if state.phase != Phase::Idle {
                Vec::new()
            } else if state.thread_limit_reached() {
                finish(&mut state, StopReason::MaxThreads)
            } else if state.limits.bootstrap_scrolls == 0 {
                state.phase = Phase::Scanning;
                vec![Effect::Scan]
            } else {
                state.phase = Phase::Bootstrapping;
                vec![Effect::CompositeScroll]
            }
        }
        Msg::ScrollCompleted { ok, moved } => {
            if state.phase == Phase::Bootstrapping {
                state.bootstrap_done += 1;
                if state.bootstrap_done < state.limits.bootstrap_scrolls {
                    vec![Effect::CompositeScroll]
                } else {
                    state.phase = Phase::Scanning;
                    vec![Effect::Scan]
                }
            } else {
                if ok {
                    state.scroll_failures = 0;
                } else {
                    state.scroll_failures += 1;
                }
                if ok && !moved {
                    state.ineffective_scrolls += 1;
                }
                if state.limits.max_scroll_failures > 0
                    && state.scroll_failures >= state.limits.max_scroll_failures
                {
                    finish(&mut state, StopReason::ScrollFailures)
                } else {
                    if state.phase == Phase::Scrolling {
                        state.phase = Phase::Scanning;
                    }
                    Vec::new()
                }
            }
        }
        Msg::Scanned { rendered } => {
            if state.phase == Phase::Idle {
                Vec::new()
            } else if rendered > state.watermark {
                state.phase = Phase::Processing;
                state.batch_new = 0;
                vec![Effect::Process {
                    from: state.watermark,
                    to: rendered,
                }]
            } else {
                // Virtualized lists can drop handles; lower the watermark so
                // regrowth is rescanned and dedup filters what was seen.
                state.watermark = rendered;
                state.no_new_cycles += 1;
                after_unproductive_scan(&mut state)
            }
        }
        Msg::ContainerStale => vec![Effect::RelocateContainer],
        Msg::ThreadHarvested { fingerprint } => {
            if state.seen.insert(fingerprint) {
                state.processed += 1;
                state.batch_new += 1;
            }
            Vec::new()
        }
        Msg::BatchProcessed { scanned_to } => {
            state.watermark = scanned_to;
            if state.thread_limit_reached() {
                finish(&mut state, StopReason::MaxThreads)
            } else {
                if state.batch_new > 0 {
                    state.no_new_cycles = 0;
                    state.stalled_cycles = 0;
                    state.relocations = 0;
                }
                state.batch_new = 0;
                state.phase = if is_stalled(&state) {
                    Phase::Stalled
                } else {
                    Phase::Scrolling
                };
                schedule_scroll(&mut state)
            }
        }
        Msg::ContainerRelocated { found } => {
            state.relocations += 1;
            if state.relocations >= state.limits.max_container_retries {
                let reason = if found {
                    StopReason::StallExhausted
                } else {
                    StopReason::ContainerLost
                };
                finish(&mut state, reason)
            } else if found {
                // Fresh container: everything rendered in it is rescanned.
                state.watermark = 0;
                if state.phase != Phase::Stalled {
                    state.phase = Phase::Scanning;
                }
                vec![Effect::Scan]
            } else {
                schedule_scroll(&mut state)
            }
        }
        Msg::Aborted { reason } => finish(&mut state, reason),
    };

    (state, effects)
}

fn is_stalled(state: &HarvestState) -> bool {
    state.limits.max_no_new_content_cycles > 0
        && state.no_new_cycles >= state.limits.max_no_new_content_cycles
}

fn after_unproductive_scan(state: &mut HarvestState) -> Vec<Effect> {
    if !is_stalled(state) {
        state.phase = Phase::Scrolling;
        return schedule_scroll(state);
    }

    state.phase = Phase::Stalled;
    state.stalled_cycles += 1;
    if is_every(state.stalled_cycles, state.limits.relocate_every) {
        return vec![Effect::RelocateContainer];
    }
    let scroll = schedule_scroll(state);
    if scroll.iter().any(Effect::is_terminal) {
        return scroll;
    }
    let mut effects = Vec::with_capacity(scroll.len() + 1);
    effects.push(Effect::AggressiveScroll);
    effects.extend(scroll);
    effects
}

fn schedule_scroll(state: &mut HarvestState) -> Vec<Effect> {
    if state.scroll_attempts >= state.limits.max_scroll_attempts {
        return finish(state, StopReason::MaxScrollAttempts);
    }
    state.scroll_attempts += 1;

    let mut effects = vec![Effect::CompositeScroll];
    if is_every(state.scroll_attempts, state.limits.extra_wait_every) {
        effects.push(Effect::ExtraWait);
    }
    if is_every(state.scroll_attempts, state.limits.refresh_every) {
        effects.push(Effect::RefreshScroll);
    }
    effects.push(Effect::Scan);
    effects
}

fn finish(state: &mut HarvestState, reason: StopReason) -> Vec<Effect> {
    state.phase = Phase::Done;
    state.stop_reason = Some(reason);
    vec![Effect::Finish { reason }]
}
