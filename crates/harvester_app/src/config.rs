//! Session configuration read from a RON file.
//!
//! Every section and field is optional; missing values take the defaults
//! below, so an empty file `()` is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harvester_core::HarvestLimits;
use harvester_engine::{Pacing, Selectors, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "bilibili_comments";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Page to harvest; the command line argument takes precedence.
    pub url: Option<String>,
    pub limits: HarvestLimits,
    pub pacing: PacingConfig,
    pub selectors: Selectors,
    pub output: OutputConfig,
    pub browser: BrowserConfig,
}

impl HarvestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|err| err.to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.batch_size == 0 {
            return Err(ConfigError::Invalid("output.batch_size must be at least 1".into()));
        }
        if self.output.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("output.prefix must not be empty".into()));
        }
        if self.browser.webdriver_url.trim().is_empty() {
            return Err(ConfigError::Invalid("browser.webdriver_url must not be empty".into()));
        }
        if self.pacing.poll_interval_ms == 0 && self.pacing.container_timeout_ms > 0 {
            return Err(ConfigError::Invalid(
                "pacing.poll_interval_ms must be at least 1 while waiting for the container".into(),
            ));
        }
        if self.selectors.level_regex().is_none() {
            return Err(ConfigError::Invalid(format!(
                "selectors.level_pattern {:?} is not a valid regex",
                self.selectors.level_pattern
            )));
        }
        Ok(())
    }
}

/// Settle delays in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub scroll_step_ms: u64,
    pub scroll_bottom_ms: u64,
    pub after_click_ms: u64,
    pub page_turn_ms: u64,
    pub extra_wait_ms: u64,
    pub visibility_ms: u64,
    pub poll_interval_ms: u64,
    pub container_timeout_ms: u64,
    pub page_load_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        let pacing = Pacing::default();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            scroll_step_ms: ms(pacing.scroll_step),
            scroll_bottom_ms: ms(pacing.scroll_bottom),
            after_click_ms: ms(pacing.after_click),
            page_turn_ms: ms(pacing.page_turn),
            extra_wait_ms: ms(pacing.extra_wait),
            visibility_ms: ms(pacing.visibility),
            poll_interval_ms: ms(pacing.poll_interval),
            container_timeout_ms: ms(pacing.container_timeout),
            page_load_ms: ms(pacing.page_load),
        }
    }
}

impl PacingConfig {
    pub fn to_pacing(&self) -> Pacing {
        Pacing {
            scroll_step: Duration::from_millis(self.scroll_step_ms),
            scroll_bottom: Duration::from_millis(self.scroll_bottom_ms),
            after_click: Duration::from_millis(self.after_click_ms),
            page_turn: Duration::from_millis(self.page_turn_ms),
            extra_wait: Duration::from_millis(self.extra_wait_ms),
            visibility: Duration::from_millis(self.visibility_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            container_timeout: Duration::from_millis(self.container_timeout_ms),
            page_load: Duration::from_millis(self.page_load_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// File name prefix of the `_all`, `_batch_N` and `_summary` artifacts.
    pub prefix: String,
    /// Skip threads already present in the cumulative artifact.
    pub resume: bool,
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: DEFAULT_PREFIX.to_string(),
            resume: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: Option<String>,
    /// Hide the usual automation markers from the page.
    pub stealth: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
            window_width: 1920,
            window_height: 1080,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            stealth: true,
        }
    }
}
