use engine_logging::{engine_debug, engine_warn};
use harvester_core::{CommentRecord, Fingerprint};

use crate::dom::{Dom, DomResult};
use crate::extract::RecordExtractor;
use crate::pacing::{settle, Pacing};
use crate::selectors::Selectors;

/// Why reply pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerStop {
    NoNextPage,
    PageLimit,
    ReplyLimit,
    /// The reply sub-tree went stale mid-pagination.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHarvest {
    /// Replies in page order, then in-page order.
    pub replies: Vec<CommentRecord>,
    pub pages_read: usize,
    pub stop: PagerStop,
    /// Reply elements that yielded no record at all.
    pub misses: usize,
}

impl ReplyHarvest {
    fn empty(stop: PagerStop) -> Self {
        Self {
            replies: Vec::new(),
            pages_read: 0,
            stop,
            misses: 0,
        }
    }
}

/// Collects every reply of one thread by expanding it and walking its pager
/// forward. Pages are never revisited.
pub struct ThreadExpander<'a, D: Dom> {
    dom: &'a D,
    selectors: &'a Selectors,
    extractor: &'a RecordExtractor<'a, D>,
    pacing: &'a Pacing,
}

impl<'a, D: Dom> ThreadExpander<'a, D> {
    pub fn new(
        dom: &'a D,
        selectors: &'a Selectors,
        extractor: &'a RecordExtractor<'a, D>,
        pacing: &'a Pacing,
    ) -> Self {
        Self {
            dom,
            selectors,
            extractor,
            pacing,
        }
    }

    /// Errors only when the thread handle itself is unusable. Once pagination
    /// has started, a stale reply sub-tree ends it with what was collected.
    pub async fn expand_replies(
        &self,
        thread: &D::Handle,
        max_replies: usize,
        max_pages: usize,
    ) -> DomResult<ReplyHarvest> {
        let Some(root) = self
            .dom
            .query_one(thread, &self.selectors.replies_root)
            .await?
        else {
            return Ok(ReplyHarvest::empty(PagerStop::NoNextPage));
        };
        if max_pages == 0 {
            return Ok(ReplyHarvest::empty(PagerStop::PageLimit));
        }
        if max_replies == 0 {
            return Ok(ReplyHarvest::empty(PagerStop::ReplyLimit));
        }

        match self.show_more(&root).await {
            Ok(true) => settle(self.pacing.after_click).await,
            Ok(false) => {}
            Err(err) if err.is_stale() => {
                engine_warn!("reply section went stale before expansion: {}", err);
                return Ok(ReplyHarvest::empty(PagerStop::Interrupted));
            }
            Err(err) => engine_debug!("show-more control unusable: {}", err),
        }

        let mut harvest = ReplyHarvest::empty(PagerStop::NoNextPage);
        let mut previous_page: Vec<Fingerprint> = Vec::new();
        loop {
            let page = match self.read_page(&root, &mut harvest.misses).await {
                Ok(page) => page,
                Err(err) => {
                    engine_warn!(
                        "reply page {} unreadable, keeping {} replies: {}",
                        harvest.pages_read + 1,
                        harvest.replies.len(),
                        err
                    );
                    harvest.stop = PagerStop::Interrupted;
                    break;
                }
            };
            harvest.pages_read += 1;

            let fingerprints: Vec<Fingerprint> =
                page.iter().map(CommentRecord::fingerprint).collect();
            // Some pagers append instead of replacing; skip the repeated prefix.
            let skip = if !previous_page.is_empty() && fingerprints.starts_with(&previous_page) {
                previous_page.len()
            } else {
                0
            };
            let room = max_replies.saturating_sub(harvest.replies.len());
            let fresh = page.len() - skip;
            harvest.replies.extend(page.into_iter().skip(skip).take(room));
            previous_page = fingerprints;

            if fresh >= room {
                harvest.stop = PagerStop::ReplyLimit;
                break;
            }
            if harvest.pages_read >= max_pages {
                harvest.stop = PagerStop::PageLimit;
                break;
            }

            let next = match self.next_page(&root).await {
                Ok(next) => next,
                Err(err) => {
                    engine_debug!("pager unreadable: {}", err);
                    harvest.stop = if err.is_stale() {
                        PagerStop::Interrupted
                    } else {
                        PagerStop::NoNextPage
                    };
                    break;
                }
            };
            let Some(next) = next else {
                harvest.stop = PagerStop::NoNextPage;
                break;
            };
            if let Err(err) = self.dom.click(&next).await {
                engine_warn!("next-page control did not respond: {}", err);
                harvest.stop = if err.is_stale() {
                    PagerStop::Interrupted
                } else {
                    PagerStop::NoNextPage
                };
                break;
            }
            engine_debug!("turned to reply page {}", harvest.pages_read + 1);
            settle(self.pacing.page_turn).await;
        }

        engine_debug!(
            "{} replies over {} pages ({:?})",
            harvest.replies.len(),
            harvest.pages_read,
            harvest.stop
        );
        Ok(harvest)
    }

    async fn read_page(
        &self,
        root: &D::Handle,
        misses: &mut usize,
    ) -> DomResult<Vec<CommentRecord>> {
        let elements = self.dom.query_all(root, &self.selectors.reply).await?;
        let mut page = Vec::with_capacity(elements.len());
        for element in &elements {
            match self.extractor.extract_reply(element).await? {
                Some(record) => page.push(record),
                None => *misses += 1,
            }
        }
        Ok(page)
    }

    async fn show_more(&self, root: &D::Handle) -> DomResult<bool> {
        let buttons = self.dom.query_all(root, &self.selectors.button).await?;
        for button in &buttons {
            let label = self.label(button).await;
            if self
                .selectors
                .show_more_labels
                .iter()
                .any(|wanted| label.contains(wanted.as_str()))
            {
                self.dom.click(button).await?;
                engine_debug!("expanded replies via {:?}", label);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn next_page(&self, root: &D::Handle) -> DomResult<Option<D::Handle>> {
        let buttons = self
            .dom
            .query_all(root, &self.selectors.pager_button)
            .await?;
        for button in buttons {
            if self
                .label(&button)
                .await
                .contains(self.selectors.next_page_label.as_str())
            {
                return Ok(Some(button));
            }
        }
        Ok(None)
    }

    /// Label text of a button; unreadable buttons have an empty label.
    async fn label(&self, button: &D::Handle) -> String {
        let label = match self
            .dom
            .query_one(button, &self.selectors.button_label)
            .await
        {
            Ok(Some(label)) => self.dom.text(&label).await,
            Ok(None) => self.dom.text(button).await,
            Err(err) => Err(err),
        };
        label.unwrap_or_default()
    }
}
