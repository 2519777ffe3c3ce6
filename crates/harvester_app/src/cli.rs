use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use crate::config::HarvestConfig;

/// Harvest the comment threads of one page into JSON files.
#[derive(Debug, Parser)]
#[command(name = "comment_harvester", author, version, about)]
pub struct Cli {
    /// Page to harvest. Overrides `url` from the config file.
    pub url: Option<String>,
    /// RON configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(long)]
    pub webdriver_url: Option<String>,
    #[arg(long, default_value_t = false)]
    pub headless: bool,
    /// Skip threads already stored in the cumulative file.
    #[arg(long, default_value_t = false)]
    pub resume: bool,
    #[arg(long)]
    pub max_threads: Option<usize>,
    #[arg(long)]
    pub max_replies_per_thread: Option<usize>,
    #[arg(long)]
    pub max_scroll_attempts: Option<usize>,
    #[arg(long)]
    pub max_no_new_content_cycles: Option<usize>,
    #[arg(long)]
    pub max_container_retries: Option<usize>,
    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// More output; repeat for trace.
    #[arg(long, short, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Command line values win over the config file.
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.output.prefix = prefix.clone();
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            config.browser.webdriver_url = webdriver_url.clone();
        }
        config.browser.headless |= self.headless;
        config.output.resume |= self.resume;

        let limits = &mut config.limits;
        for (flag, target) in [
            (self.max_threads, &mut limits.max_threads),
            (self.max_replies_per_thread, &mut limits.max_replies_per_thread),
            (self.max_scroll_attempts, &mut limits.max_scroll_attempts),
            (self.max_no_new_content_cycles, &mut limits.max_no_new_content_cycles),
            (self.max_container_retries, &mut limits.max_container_retries),
        ] {
            if let Some(value) = flag {
                *target = value;
            }
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
