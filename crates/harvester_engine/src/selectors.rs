use regex::Regex;
use serde::{Deserialize, Serialize};

/// One way of reaching a field: each selector is resolved inside the shadow
/// root of the element found by the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub path: Vec<String>,
    /// Only accept the element when its text contains this fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

impl Probe {
    pub fn path(path: &[&str]) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
            contains: None,
        }
    }

    pub fn containing(mut self, fragment: &str) -> Self {
        self.contains = Some(fragment.to_string());
        self
    }
}

/// Probes for every comment field, primary first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldProbes {
    /// Also yields the profile link (`href`) when the element carries one.
    pub author_name: Vec<Probe>,
    /// Icon whose `src` encodes the level.
    pub author_level: Vec<Probe>,
    pub text: Vec<Probe>,
    pub like_count: Vec<Probe>,
    pub published_at: Vec<Probe>,
}

impl Default for FieldProbes {
    fn default() -> Self {
        const USER: &str = "bili-comment-user-info";
        const RICH: &str = "bili-rich-text";
        const ACTIONS: &str = "bili-comment-action-buttons-renderer";
        Self {
            author_name: vec![
                Probe::path(&[USER, "#user-name a"]),
                Probe::path(&[USER, "#user-name span"]),
            ],
            author_level: vec![Probe::path(&[USER, "#user-level img"])],
            text: vec![Probe::path(&[RICH, "#contents"]), Probe::path(&[RICH, "span"])],
            like_count: vec![
                Probe::path(&[ACTIONS, "#like #count"]),
                Probe::path(&[ACTIONS, "span.bili-comment__action--count"]),
            ],
            published_at: vec![
                Probe::path(&[ACTIONS, "#pubdate"]),
                Probe::path(&[ACTIONS, "span"]).containing("前"),
            ],
        }
    }
}

/// Component names and control labels of the comment section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Light-DOM anchor hosting the whole comment section.
    pub container: String,
    pub thread: String,
    /// Main comment inside a thread's shadow root.
    pub main_comment: String,
    pub replies_root: String,
    pub reply: String,
    pub button: String,
    /// Buttons of the reply pager.
    pub pager_button: String,
    pub button_label: String,
    pub show_more_labels: Vec<String>,
    pub next_page_label: String,
    /// Regex with one capture group applied to the level icon `src`.
    pub level_pattern: String,
    pub fields: FieldProbes,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            container: "bili-comments".to_string(),
            thread: "bili-comment-thread-renderer".to_string(),
            main_comment: "bili-comment-renderer".to_string(),
            replies_root: "bili-comment-replies-renderer".to_string(),
            reply: "bili-comment-reply-renderer".to_string(),
            button: "bili-text-button".to_string(),
            pager_button: "bili-text-button[data-idx]".to_string(),
            button_label: ".button__label".to_string(),
            show_more_labels: vec!["点击查看".to_string(), "查看".to_string()],
            next_page_label: "下一页".to_string(),
            level_pattern: r"level_(\d+)".to_string(),
            fields: FieldProbes::default(),
        }
    }
}

impl Selectors {
    /// Compiles the level pattern; an invalid pattern disables level parsing.
    pub fn level_regex(&self) -> Option<Regex> {
        Regex::new(&self.level_pattern).ok()
    }
}

pub fn parse_level(src: &str, pattern: &Regex) -> Option<u8> {
    pattern
        .captures(src)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
