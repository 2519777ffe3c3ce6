use engine_logging::{engine_debug, engine_trace};

use crate::dom::{Align, Dom, DomResult, ScrollTarget};
use crate::pacing::{settle, Pacing};

const NUDGE_UP_PX: f64 = 300.0;
const VISIBILITY_NUDGE_PX: f64 = 100.0;
const STEP_FRACTION: f64 = 0.7;
const AGGRESSIVE_FRACTIONS: [f64; 3] = [0.3, 0.6, 0.9];

/// Scroll routines used to coax the lazy loader into rendering more threads.
/// Every step is followed by a settle delay.
pub(crate) struct Scroller<'a, D: Dom> {
    dom: &'a D,
    pacing: &'a Pacing,
}

impl<'a, D: Dom> Scroller<'a, D> {
    pub(crate) fn new(dom: &'a D, pacing: &'a Pacing) -> Self {
        Self { dom, pacing }
    }

    /// Nudge up, jump to the bottom, align the container's end, then step
    /// 70% of a viewport past the current offset. Returns whether the window
    /// ended lower than it started.
    pub(crate) async fn composite(&self, container: Option<&D::Handle>) -> DomResult<bool> {
        let start = self.dom.viewport().await?;

        self.dom
            .scroll_to(ScrollTarget::Offset(start.offset - NUDGE_UP_PX))
            .await?;
        settle(self.pacing.scroll_step).await;

        self.dom.scroll_to(ScrollTarget::Bottom).await?;
        settle(self.pacing.scroll_bottom).await;

        if let Some(container) = container {
            self.dom
                .scroll_to(ScrollTarget::Element(container, Align::End))
                .await?;
            settle(self.pacing.scroll_step).await;
        }

        let current = self.dom.viewport().await?;
        self.dom
            .scroll_to(ScrollTarget::Offset(
                current.offset + current.height * STEP_FRACTION,
            ))
            .await?;
        settle(self.pacing.scroll_step).await;

        let end = self.dom.viewport().await?;
        engine_trace!("composite scroll {} -> {}", start.offset, end.offset);
        Ok(end.offset > start.offset)
    }

    /// Top, bottom, then the container centred.
    pub(crate) async fn refresh(&self, container: Option<&D::Handle>) -> DomResult<()> {
        engine_debug!("refreshing scroll position");
        self.dom.scroll_to(ScrollTarget::Top).await?;
        settle(self.pacing.scroll_step).await;
        self.dom.scroll_to(ScrollTarget::Bottom).await?;
        settle(self.pacing.scroll_bottom).await;
        if let Some(container) = container {
            self.dom
                .scroll_to(ScrollTarget::Element(container, Align::Center))
                .await?;
            settle(self.pacing.scroll_step).await;
        }
        Ok(())
    }

    pub(crate) async fn aggressive(&self, container: Option<&D::Handle>) -> DomResult<()> {
        let start = self.dom.viewport().await?;
        for fraction in AGGRESSIVE_FRACTIONS {
            self.dom
                .scroll_to(ScrollTarget::Offset(start.offset + start.height * fraction))
                .await?;
            settle(self.pacing.scroll_step).await;
        }

        self.dom.scroll_to(ScrollTarget::Bottom).await?;
        settle(self.pacing.scroll_step).await;
        let page = self.dom.viewport().await?;
        self.dom
            .scroll_to(ScrollTarget::Offset(page.document_height / 2.0))
            .await?;
        settle(self.pacing.scroll_step).await;

        if let Some(container) = container {
            self.dom.scroll_container_to(container, 1.0).await?;
            settle(self.pacing.scroll_step).await;
        }
        Ok(())
    }

    /// Centres `element`; when it still is not fully visible, nudges the
    /// window up and centres again.
    pub(crate) async fn ensure_visible(&self, element: &D::Handle) -> DomResult<()> {
        self.dom
            .scroll_to(ScrollTarget::Element(element, Align::Center))
            .await?;
        settle(self.pacing.visibility).await;

        if !self.dom.is_fully_visible(element).await? {
            let viewport = self.dom.viewport().await?;
            self.dom
                .scroll_to(ScrollTarget::Offset(viewport.offset - VISIBILITY_NUDGE_PX))
                .await?;
            settle(self.pacing.scroll_step).await;
            self.dom
                .scroll_to(ScrollTarget::Element(element, Align::Center))
                .await?;
            settle(self.pacing.visibility).await;
        }
        Ok(())
    }
}
