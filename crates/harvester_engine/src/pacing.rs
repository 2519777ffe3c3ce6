use std::time::Duration;

/// Settle delays between page operations. The accessor never waits on its
/// own; every pause in a session comes from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Between the short steps of a composite scroll.
    pub scroll_step: Duration,
    /// After jumping to the bottom of the document.
    pub scroll_bottom: Duration,
    /// After activating a "show more" control.
    pub after_click: Duration,
    pub page_turn: Duration,
    /// Inserted every few scroll attempts.
    pub extra_wait: Duration,
    /// After centring a thread in the viewport.
    pub visibility: Duration,
    pub poll_interval: Duration,
    pub container_timeout: Duration,
    /// After navigation, before looking for the container.
    pub page_load: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            scroll_step: Duration::from_secs(1),
            scroll_bottom: Duration::from_secs(3),
            after_click: Duration::from_secs(3),
            page_turn: Duration::from_secs(2),
            extra_wait: Duration::from_secs(5),
            visibility: Duration::from_secs(1),
            poll_interval: Duration::from_millis(500),
            container_timeout: Duration::from_secs(15),
            page_load: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    /// No delays at all; for fake pages in tests.
    pub fn immediate() -> Self {
        Self {
            scroll_step: Duration::ZERO,
            scroll_bottom: Duration::ZERO,
            after_click: Duration::ZERO,
            page_turn: Duration::ZERO,
            extra_wait: Duration::ZERO,
            visibility: Duration::ZERO,
            poll_interval: Duration::ZERO,
            container_timeout: Duration::ZERO,
            page_load: Duration::ZERO,
        }
    }
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
