use engine_logging::engine_debug;
use harvester_core::{CommentKind, CommentRecord, PartialRecord};
use regex::Regex;
use url::Url;

use crate::dom::{Dom, DomResult};
use crate::selectors::{parse_level, Probe, Selectors};

/// Turns comment and reply elements into records.
///
/// Each field is probed with its primary selector path, then its fallbacks.
/// When no field resolves, the element's raw visible text becomes the content
/// with author and time labelled unknown. Only an element without any text
/// yields `None`. Stale handles are reported to the caller; any other driver
/// failure counts as a miss for that probe.
pub struct RecordExtractor<'a, D: Dom> {
    dom: &'a D,
    selectors: &'a Selectors,
    level_regex: Option<Regex>,
    base_url: Option<Url>,
}

impl<'a, D: Dom> RecordExtractor<'a, D> {
    pub fn new(dom: &'a D, selectors: &'a Selectors) -> Self {
        Self {
            dom,
            selectors,
            level_regex: selectors.level_regex(),
            base_url: None,
        }
    }

    /// Page URL used to absolutize profile links.
    pub fn with_base_url(mut self, base: Option<&str>) -> Self {
        self.base_url = base.and_then(|b| Url::parse(b).ok());
        self
    }

    pub async fn extract_main(&self, thread: &D::Handle) -> DomResult<Option<CommentRecord>> {
        let comment = self
            .dom
            .query_one(thread, &self.selectors.main_comment)
            .await?;
        let element = comment.as_ref().unwrap_or(thread);
        self.extract(element, CommentKind::Main).await
    }

    pub async fn extract_reply(&self, reply: &D::Handle) -> DomResult<Option<CommentRecord>> {
        self.extract(reply, CommentKind::Reply).await
    }

    async fn extract(
        &self,
        element: &D::Handle,
        kind: CommentKind,
    ) -> DomResult<Option<CommentRecord>> {
        let fields = self.probe_fields(element).await?;
        if !fields.is_empty() {
            return Ok(Some(fields.into_record(kind)));
        }

        let raw = self.dom.text(element).await?;
        let raw = raw.trim();
        if raw.is_empty() {
            engine_debug!("{:?} element has no extractable text; skipped", kind);
            return Ok(None);
        }
        engine_debug!("{:?} element fell back to raw text", kind);
        Ok(Some(CommentRecord::from_raw_text(raw, kind)))
    }

    pub async fn probe_fields(&self, element: &D::Handle) -> DomResult<PartialRecord> {
        let probes = &self.selectors.fields;
        let mut fields = PartialRecord::default();

        if let Some((name_element, name)) = self.first_text(element, &probes.author_name).await? {
            fields.author_name = Some(name);
            fields.author_profile_url = tolerate(self.dom.attribute(&name_element, "href").await)?
                .and_then(|href| resolve_link(&href, self.base_url.as_ref()));
        }
        fields.author_level = self.level(element, &probes.author_level).await?;
        fields.text = self.first_text(element, &probes.text).await?.map(|(_, t)| t);
        fields.like_count = self
            .first_text(element, &probes.like_count)
            .await?
            .map(|(_, t)| t);
        fields.published_at = self
            .first_text(element, &probes.published_at)
            .await?
            .map(|(_, t)| t);

        Ok(fields)
    }

    async fn first_text(
        &self,
        element: &D::Handle,
        probes: &[Probe],
    ) -> DomResult<Option<(D::Handle, String)>> {
        for probe in probes {
            let Some(found) = tolerate(self.walk(element, &probe.path).await)? else {
                continue;
            };
            let text = tolerate(self.dom.text(&found).await.map(Some))?.unwrap_or_default();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if let Some(fragment) = probe.contains.as_deref() {
                if !text.contains(fragment) {
                    continue;
                }
            }
            return Ok(Some((found, text.to_string())));
        }
        Ok(None)
    }

    async fn level(&self, element: &D::Handle, probes: &[Probe]) -> DomResult<Option<u8>> {
        let Some(regex) = self.level_regex.as_ref() else {
            return Ok(None);
        };
        for probe in probes {
            let Some(icon) = tolerate(self.walk(element, &probe.path).await)? else {
                continue;
            };
            let src = tolerate(self.dom.attribute(&icon, "src").await)?;
            if let Some(level) = src.as_deref().and_then(|s| parse_level(s, regex)) {
                return Ok(Some(level));
            }
        }
        Ok(None)
    }

    async fn walk(&self, element: &D::Handle, path: &[String]) -> DomResult<Option<D::Handle>> {
        if path.is_empty() {
            return Ok(None);
        }
        let mut current = element.clone();
        for selector in path {
            match self.dom.query_one(&current, selector).await? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// Non-stale failures become a miss; stale handles propagate.
fn tolerate<T>(result: DomResult<Option<T>>) -> DomResult<Option<T>> {
    match result {
        Err(err) if !err.is_stale() => {
            engine_debug!("probe failed, treated as miss: {}", err);
            Ok(None)
        }
        other => other,
    }
}

fn resolve_link(raw: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.into());
    }
    if let Some(joined) = base.and_then(|b| b.join(trimmed).ok()) {
        return Some(joined.into());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    Some(trimmed.to_string())
}
