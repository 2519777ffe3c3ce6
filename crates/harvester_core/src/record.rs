use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder used for author and time when only raw text could be read.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    #[serde(rename = "main_comment")]
    Main,
    #[serde(rename = "reply")]
    Reply,
}

/// One comment or reply as read from the page.
///
/// Field names on the wire match what the downstream flattening scripts read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(rename = "user_name")]
    pub author_name: String,
    #[serde(rename = "user_link", default)]
    pub author_profile_url: String,
    #[serde(rename = "user_level", default, skip_serializing_if = "Option::is_none")]
    pub author_level: Option<u8>,
    #[serde(rename = "content")]
    pub text: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(rename = "publish_time")]
    pub published_at: String,
    #[serde(rename = "type")]
    pub kind: CommentKind,
}

impl CommentRecord {
    /// Record built from the visible text of an element whose sub-fields could not be read.
    pub fn from_raw_text(text: impl Into<String>, kind: CommentKind) -> Self {
        Self {
            author_name: UNKNOWN.to_string(),
            author_profile_url: String::new(),
            author_level: None,
            text: text.into(),
            like_count: 0,
            published_at: UNKNOWN.to_string(),
            kind,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.author_name, &self.text, &self.published_at)
    }
}

/// Fields probed from a comment element, each resolved independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub author_name: Option<String>,
    pub author_profile_url: Option<String>,
    pub author_level: Option<u8>,
    pub text: Option<String>,
    pub like_count: Option<String>,
    pub published_at: Option<String>,
}

impl PartialRecord {
    /// True when no probe produced anything.
    pub fn is_empty(&self) -> bool {
        self.author_name.is_none()
            && self.author_profile_url.is_none()
            && self.author_level.is_none()
            && self.text.is_none()
            && self.like_count.is_none()
            && self.published_at.is_none()
    }

    pub fn into_record(self, kind: CommentKind) -> CommentRecord {
        CommentRecord {
            author_name: self.author_name.unwrap_or_default(),
            author_profile_url: self.author_profile_url.unwrap_or_default(),
            author_level: self.author_level,
            text: self.text.unwrap_or_default(),
            like_count: self
                .like_count
                .as_deref()
                .map(parse_like_count)
                .unwrap_or(0),
            published_at: self.published_at.unwrap_or_default(),
            kind,
        }
    }
}

/// Content-derived identity of a thread.
///
/// Two distinct users showing the same visible name who post identical text at
/// the same displayed time produce the same fingerprint and are collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(author_name: &str, text: &str, published_at: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(author_name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(published_at.as_bytes());
        let hex = hasher
            .finalize()
            .iter()
            .take(16)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wraps an id read back from a stored artifact.
impl From<String> for Fingerprint {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A main comment with every reply discovered for it, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(flatten)]
    pub main: CommentRecord,
    #[serde(rename = "comment_id")]
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub replies: Vec<CommentRecord>,
}

impl Thread {
    pub fn new(main: CommentRecord, replies: Vec<CommentRecord>) -> Self {
        let fingerprint = main.fingerprint();
        Self {
            main,
            fingerprint,
            replies,
        }
    }
}

/// Best-effort like count: `1,234`, `1.2万`, `3亿`, `4.5k`. Anything else is 0.
pub fn parse_like_count(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}'))
        .collect();
    let (number, multiplier) = match cleaned.chars().last() {
        Some('万') | Some('w') | Some('W') => (&cleaned[..cleaned.len() - last_len(&cleaned)], 10_000.0),
        Some('亿') => (&cleaned[..cleaned.len() - last_len(&cleaned)], 100_000_000.0),
        Some('k') | Some('K') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return 0;
    }
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value * multiplier).round() as u64,
        _ => 0,
    }
}

fn last_len(s: &str) -> usize {
    s.chars().last().map(char::len_utf8).unwrap_or(0)
}
