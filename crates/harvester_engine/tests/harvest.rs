mod support;

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::mpsc;

use harvester_core::{HarvestLimits, StopReason};
use harvester_engine::{
    ChannelProgressSink, HarvestEvent, Harvester, JsonFileSink, NullProgressSink, Pacing,
    Selectors, SessionOptions,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use support::{comment, init_logging, replies, FakePage, NodeId};
use tempfile::TempDir;

const URL: &str = "https://www.bilibili.com/video/BV1Dey8B2EPV";

/// Six rendered threads, the fifth repeating the first: five distinct threads.
fn comment_page() -> (FakePage, Vec<NodeId>) {
    let page = FakePage::new().with_rendering(2, 2);
    let threads = vec![
        page.add_thread(&comment("alice", "first"), &[replies(0, 10), replies(10, 3)]),
        page.add_thread(&comment("bob", "second"), &[]),
        page.add_thread(&comment("carol", "third"), &[replies(100, 2)]),
        page.add_raw_thread("raw text only"),
        page.add_thread(&comment("alice", "first"), &[replies(0, 10), replies(10, 3)]),
        page.add_thread(&comment("erin", "last"), &[]),
    ];
    (page, threads)
}

fn quick_limits() -> HarvestLimits {
    HarvestLimits {
        bootstrap_scrolls: 1,
        max_no_new_content_cycles: 3,
        relocate_every: 2,
        max_container_retries: 2,
        ..HarvestLimits::default()
    }
}

fn harvester(page: FakePage, limits: HarvestLimits, resume: bool) -> Harvester<FakePage> {
    Harvester::new(page, Selectors::default(), limits, Pacing::immediate()).with_options(
        SessionOptions {
            batch_size: 2,
            resume,
        },
    )
}

fn stored(dir: &Path) -> Vec<Value> {
    let raw = fs::read_to_string(dir.join("BV1_all.json")).unwrap();
    match serde_json::from_str(&raw).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected array, got {other}"),
    }
}

fn distinct_ids(threads: &[Value]) -> HashSet<String> {
    threads
        .iter()
        .map(|t| t["comment_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn harvests_every_distinct_thread_once() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, _) = comment_page();
    let harvester = harvester(page, quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(Some(URL), &mut sink, &NullProgressSink).await;

    assert_eq!(report.processed, 5);
    assert_eq!(report.stop_reason, Some(StopReason::StallExhausted));
    assert_eq!(report.failed_batches, 0);
    assert_eq!(report.cumulative_total, Some(5));
    assert_eq!(harvester.dom().navigations(), vec![URL.to_string()]);

    let threads = stored(temp.path());
    assert_eq!(threads.len(), 5);
    assert_eq!(distinct_ids(&threads).len(), 5);

    let first = &threads[0];
    assert_eq!(first["user_name"], "alice");
    assert_eq!(first["type"], "main_comment");
    let reply_texts: Vec<&str> = first["replies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["content"].as_str().unwrap())
        .collect();
    let expected: Vec<String> = (0..13).map(|n| format!("reply {n}")).collect();
    assert_eq!(reply_texts, expected);
    assert_eq!(threads[1]["replies"], Value::Array(Vec::new()));
    assert_eq!(threads[3]["user_name"], "unknown");
    assert_eq!(threads[3]["content"], "raw text only");

    let batch_files = fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("_batch_"))
        .count();
    assert_eq!(batch_files, report.persisted_batches);
}

#[tokio::test]
async fn rescan_after_relocation_does_not_recentre_seen_threads() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, _) = comment_page();
    let harvester = harvester(page, quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(Some(URL), &mut sink, &NullProgressSink).await;

    // The found container is rescanned from the top; only the five distinct
    // threads were ever brought into view.
    assert_eq!(report.stop_reason, Some(StopReason::StallExhausted));
    assert_eq!(report.processed, 5);
    assert_eq!(harvester.dom().centred_threads(), 5);
}

#[tokio::test]
async fn missing_container_leaves_valid_empty_output() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, _) = comment_page();
    let harvester = harvester(page.without_container(), quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(Some(URL), &mut sink, &NullProgressSink).await;

    assert_eq!(report.processed, 0);
    assert_eq!(report.stop_reason, Some(StopReason::ContainerNotFound));
    assert!(stored(temp.path()).is_empty());
}

#[tokio::test]
async fn failed_navigation_ends_session() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, _) = comment_page();
    let harvester = harvester(page.failing_navigation(), quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(Some(URL), &mut sink, &NullProgressSink).await;

    assert_eq!(report.processed, 0);
    assert_eq!(report.stop_reason, Some(StopReason::NavigationFailed));
    assert!(stored(temp.path()).is_empty());
}

#[tokio::test]
async fn thread_limit_stops_mid_batch() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, _) = comment_page();
    let limits = HarvestLimits {
        max_threads: 3,
        ..quick_limits()
    };
    let harvester = harvester(page, limits, false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(None, &mut sink, &NullProgressSink).await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.stop_reason, Some(StopReason::MaxThreads));
    assert_eq!(stored(temp.path()).len(), 3);
}

#[tokio::test]
async fn resumed_session_skips_stored_threads() {
    init_logging();
    let temp = TempDir::new().unwrap();

    let (page, _) = comment_page();
    let limits = HarvestLimits {
        max_threads: 2,
        ..quick_limits()
    };
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");
    let first = harvester(page, limits, false)
        .run(Some(URL), &mut sink, &NullProgressSink)
        .await;
    assert_eq!(first.processed, 2);

    let (page, _) = comment_page();
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");
    let second = harvester(page, quick_limits(), true)
        .run(Some(URL), &mut sink, &NullProgressSink)
        .await;

    assert_eq!(second.processed, 3);
    let threads = stored(temp.path());
    assert_eq!(threads.len(), 5);
    assert_eq!(distinct_ids(&threads).len(), 5);
}

#[tokio::test]
async fn stale_thread_handle_is_resolved_again() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, threads) = comment_page();
    page.go_stale_once(threads[1]);
    let harvester = harvester(page.partially_visible(), quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(None, &mut sink, &NullProgressSink).await;

    assert_eq!(report.processed, 5);
    assert!(report.faults.stale_elements >= 1);
    let threads = stored(temp.path());
    assert_eq!(threads[1]["user_name"], "bob");
}

#[tokio::test]
async fn corrupt_output_is_preserved_and_harvest_continues() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let cumulative = temp.path().join("BV1_all.json");
    fs::write(&cumulative, "{ not json").unwrap();
    let (page, _) = comment_page();
    let harvester = harvester(page, quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");

    let report = harvester.run(Some(URL), &mut sink, &NullProgressSink).await;

    assert_eq!(report.processed, 5);
    assert_eq!(report.persisted_batches, 0);
    assert!(report.failed_batches > 0);
    assert!(report.faults.persistence_faults > report.failed_batches);
    assert_eq!(fs::read_to_string(&cumulative).unwrap(), "{ not json");
}

#[tokio::test]
async fn progress_events_describe_the_session() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let (page, _) = comment_page();
    let harvester = harvester(page, quick_limits(), false);
    let mut sink = JsonFileSink::new(temp.path().to_path_buf(), "BV1");
    let (tx, rx) = mpsc::channel();

    let report = harvester
        .run(Some(URL), &mut sink, &ChannelProgressSink::new(tx))
        .await;

    let events: Vec<HarvestEvent> = rx.try_iter().collect();
    let harvested: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            HarvestEvent::ThreadHarvested(summary) => Some(summary.index),
            _ => None,
        })
        .collect();
    assert_eq!(harvested, vec![1, 2, 3, 4, 5]);
    let persisted = events
        .iter()
        .filter(|e| matches!(e, HarvestEvent::BatchPersisted { .. }))
        .count();
    assert_eq!(persisted, report.persisted_batches);
    assert_eq!(events.last(), Some(&HarvestEvent::Finished(report)));
}
