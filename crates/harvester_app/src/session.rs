use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use engine_logging::{engine_info, engine_warn};
use harvester_engine::{
    AtomicFileWriter, FaultKind, HarvestEvent, HarvestReport, Harvester, JsonFileSink,
    ProgressSink, SessionOptions, WebDriverDom,
};
use serde::Serialize;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;

use crate::config::{BrowserConfig, HarvestConfig};

const HIDE_WEBDRIVER_FLAG: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => false});";

/// Written next to the comment files once a session ends.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cumulative_file: PathBuf,
    #[serde(flatten)]
    pub report: HarvestReport,
}

/// Opens a browser, harvests `url` and closes the browser again.
pub async fn run(config: &HarvestConfig, url: &str) -> anyhow::Result<SessionSummary> {
    let driver = connect(&config.browser).await?;
    if config.browser.stealth {
        if let Err(err) = driver.execute(HIDE_WEBDRIVER_FLAG, Vec::new()).await {
            engine_warn!("could not hide webdriver flag: {}", err);
        }
    }

    let harvester = Harvester::new(
        WebDriverDom::new(driver),
        config.selectors.clone(),
        config.limits.clone(),
        config.pacing.to_pacing(),
    )
    .with_options(SessionOptions {
        batch_size: config.output.batch_size,
        resume: config.output.resume,
    });
    let mut sink = JsonFileSink::new(config.output.dir.clone(), config.output.prefix.clone());

    let started_at = Utc::now();
    let report = harvester.run(Some(url), &mut sink, &ConsoleProgress).await;
    let summary = SessionSummary {
        url: url.to_string(),
        started_at,
        finished_at: Utc::now(),
        cumulative_file: sink.cumulative_path(),
        report,
    };
    write_summary(config, &summary);

    if let Err(err) = harvester.into_dom().into_inner().quit().await {
        engine_warn!("browser did not shut down cleanly: {}", err);
    }
    Ok(summary)
}

async fn connect(browser: &BrowserConfig) -> anyhow::Result<WebDriver> {
    let mut caps = DesiredCapabilities::chrome();
    if let Some(agent) = &browser.user_agent {
        caps.add_arg(&format!("--user-agent={agent}"))?;
    }
    if browser.stealth {
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_exclude_switch("enable-automation")?;
        caps.add_experimental_option("useAutomationExtension", false)?;
    }
    caps.add_arg("--no-sandbox")?;
    caps.add_arg("--disable-dev-shm-usage")?;
    caps.add_arg("--disable-gpu")?;
    caps.add_arg(&format!(
        "--window-size={},{}",
        browser.window_width, browser.window_height
    ))?;
    if browser.headless {
        caps.add_arg("--headless=new")?;
    }

    engine_info!("connecting to WebDriver at {}", browser.webdriver_url);
    WebDriver::new(browser.webdriver_url.as_str(), caps)
        .await
        .with_context(|| format!("cannot start a browser session via {}", browser.webdriver_url))
}

fn write_summary(config: &HarvestConfig, summary: &SessionSummary) {
    let content = match serde_json::to_string_pretty(summary) {
        Ok(content) => content,
        Err(err) => {
            engine_warn!("cannot serialize session summary: {}", err);
            return;
        }
    };
    let writer = AtomicFileWriter::new(config.output.dir.clone());
    match writer.write(&format!("{}_summary.json", config.output.prefix), &content) {
        Ok(path) => engine_info!("summary written to {}", path.display()),
        Err(err) => engine_warn!("cannot write session summary: {}", err),
    }
}

/// Prints harvested threads and notable faults as the session goes.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::ThreadHarvested(thread) => {
                let level = thread
                    .author_level
                    .map(|l| format!(" [Lv{l}]"))
                    .unwrap_or_default();
                engine_info!(
                    "[{}] {}{}: {} (likes {}, replies {})",
                    thread.index,
                    thread.author,
                    level,
                    thread.preview,
                    thread.like_count,
                    thread.reply_count
                );
            }
            HarvestEvent::BatchPersisted {
                threads,
                processed,
                path,
            } => {
                engine_info!(
                    "saved {} threads to {} ({} so far)",
                    threads,
                    path.display(),
                    processed
                );
            }
            HarvestEvent::Fault { kind, detail } => match kind {
                FaultKind::PersistenceFault | FaultKind::ContainerLost => {
                    engine_warn!("{}: {}", kind, detail)
                }
                _ => {}
            },
            HarvestEvent::Finished(_) => {}
        }
    }
}
