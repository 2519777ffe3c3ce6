use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DomError {
    /// Handle no longer attached to the document; re-query to recover.
    #[error("stale element: {0}")]
    Stale(String),
    #[error("script failed: {0}")]
    Script(String),
    #[error("driver error: {0}")]
    Driver(String),
}

impl DomError {
    pub fn is_stale(&self) -> bool {
        matches!(self, DomError::Stale(_))
    }
}

pub type DomResult<T> = Result<T, DomError>;

/// Where `scrollIntoView` places an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

impl Align {
    pub fn as_block(self) -> &'static str {
        match self {
            Align::Start => "start",
            Align::Center => "center",
            Align::End => "end",
        }
    }
}

pub enum ScrollTarget<'a, H> {
    /// Absolute window offset in pixels.
    Offset(f64),
    Top,
    /// Bottom of the document.
    Bottom,
    Element(&'a H, Align),
}

impl<H> fmt::Debug for ScrollTarget<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollTarget::Offset(y) => write!(f, "Offset({y})"),
            ScrollTarget::Top => write!(f, "Top"),
            ScrollTarget::Bottom => write!(f, "Bottom"),
            ScrollTarget::Element(_, align) => write!(f, "Element({align:?})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Current vertical scroll offset of the window.
    pub offset: f64,
    /// Height of the visible viewport.
    pub height: f64,
    pub document_height: f64,
}

/// Access to a page whose content lives in nested shadow roots.
///
/// Queries resolve inside the host's shadow root; a host without one yields
/// `None` or an empty list. Implementations never sleep: callers wait for
/// rendering to catch up.
#[async_trait::async_trait]
pub trait Dom: Send + Sync {
    type Handle: Clone + Send + Sync + fmt::Debug;

    async fn navigate_to(&self, url: &str) -> DomResult<()>;

    /// First element in the light DOM matching `selector`.
    async fn find_in_document(&self, selector: &str) -> DomResult<Option<Self::Handle>>;

    async fn query_one(
        &self,
        host: &Self::Handle,
        selector: &str,
    ) -> DomResult<Option<Self::Handle>>;

    async fn query_all(&self, host: &Self::Handle, selector: &str)
        -> DomResult<Vec<Self::Handle>>;

    /// Visible text of the element.
    async fn text(&self, element: &Self::Handle) -> DomResult<String>;

    async fn attribute(&self, element: &Self::Handle, name: &str) -> DomResult<Option<String>>;

    async fn click(&self, element: &Self::Handle) -> DomResult<()>;

    async fn scroll_to(&self, target: ScrollTarget<'_, Self::Handle>) -> DomResult<()>;

    /// Sets the container's own scroll position to `fraction` of its scroll height.
    async fn scroll_container_to(&self, container: &Self::Handle, fraction: f64)
        -> DomResult<()>;

    async fn is_fully_visible(&self, element: &Self::Handle) -> DomResult<bool>;

    async fn viewport(&self) -> DomResult<Viewport>;
}
