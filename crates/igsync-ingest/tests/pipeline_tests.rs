//! End-to-end ingestion runs against a scripted source and the in-memory store

use anyhow::anyhow;
use async_trait::async_trait;
use igsync_ingest::client::SourceClient;
use igsync_ingest::extractor::ExtractorKind;
use igsync_ingest::limiter::{Clock, ManualClock, PacingConfig, RateLimiter};
use igsync_ingest::pipeline::{IngestionPipeline, RunStats};
use igsync_ingest::records::{ColumnValue, Table};
use igsync_ingest::store::{MemoryStore, Row};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const START: i64 = 1_700_000_000;

/// Source answering from fixed payloads; listed identifiers fail outright
#[derive(Default)]
struct ScriptedSource {
    payloads: HashMap<String, Value>,
    failing: HashSet<String>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn with(mut self, key: &str, payload: Value) -> Self {
        self.payloads.insert(key.to_string(), payload);
        self
    }

    fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn answer(&self, key: String) -> anyhow::Result<Option<Value>> {
        self.requested.lock().unwrap().push(key.clone());
        if self.failing.contains(&key) {
            return Err(anyhow!("connection reset by peer"));
        }
        Ok(self.payloads.get(&key).cloned())
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn top_medias_by_tag(&self, tag: &str) -> anyhow::Result<Option<Value>> {
        self.answer(format!("tag:{}", tag))
    }

    async fn media_by_code(&self, short_code: &str) -> anyhow::Result<Option<Value>> {
        self.answer(format!("media:{}", short_code))
    }

    async fn comments_by_code(&self, short_code: &str) -> anyhow::Result<Option<Value>> {
        self.answer(format!("comments:{}", short_code))
    }

    async fn location_by_id(&self, location_id: &str) -> anyhow::Result<Option<Value>> {
        self.answer(format!("location:{}", location_id))
    }
}

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    pipeline: IngestionPipeline,
}

fn pacing(dir: &TempDir) -> PacingConfig {
    PacingConfig {
        lock_path: dir.path().join(".interval.lock"),
        lock_timeout_ms: 200,
        min_short_interval_secs: 30,
        max_short_interval_secs: 31,
        ..PacingConfig::default()
    }
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(START));
    let limiter = RateLimiter::with_clock(pacing(&dir), clock.clone());
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestionPipeline::new(limiter, store.clone());
    Harness {
        dir,
        clock,
        store,
        pipeline,
    }
}

fn media_row(code: &str, location_id: &str, likes: i64) -> Row {
    let mut row = Row::new();
    row.insert("short_code".into(), ColumnValue::Text(code.into()));
    row.insert("location_id".into(), ColumnValue::Text(location_id.into()));
    row.insert("likes_count".into(), ColumnValue::Integer(likes));
    row
}

fn keywords() -> Vec<String> {
    vec!["food".into(), "drink".into(), "dessert".into()]
}

#[tokio::test]
async fn test_failed_fetch_leaves_no_row_and_run_continues() {
    let h = harness();
    let source = Arc::new(
        ScriptedSource::default()
            .failing("media:abc123")
            .with("media:B2", json!({"short_code": "B2", "likes_count": 3})),
    );
    let extractor = ExtractorKind::Media.build(source.clone(), &[], &keywords()).unwrap();

    let stats = h
        .pipeline
        .run(&["abc123".to_string(), "B2".to_string()], extractor.as_ref())
        .await;

    assert_eq!(
        stats,
        RunStats {
            total: 2,
            succeeded: 1,
            failed: 1,
            records_written: 1,
            ..RunStats::default()
        }
    );
    assert_eq!(source.requested(), vec!["media:abc123", "media:B2"]);
    assert!(h.store.get(Table::Media, "abc123").is_none());

    let stored = h.store.get(Table::Media, "B2").unwrap();
    assert!(matches!(stored["media_checked_time"], ColumnValue::Integer(t) if t >= START));
}

#[tokio::test]
async fn test_location_marks_every_referencing_media_in_one_commit() {
    let h = harness();
    h.store.seed(Table::Media, media_row("B1", "L1", 40)).unwrap();
    h.store.seed(Table::Media, media_row("B2", "L1", 10)).unwrap();
    h.store.seed(Table::Media, media_row("B3", "L2", 20)).unwrap();

    let source = Arc::new(
        ScriptedSource::default().with("location:L1", json!({"identifier": "L1", "name": "Cafe"})),
    );
    let extractor = ExtractorKind::Location.build(source.clone(), &[], &keywords()).unwrap();

    let stats = h.pipeline.run_extractor(extractor.as_ref()).await.unwrap();

    // L1 has the most liked media, and is requested once despite two rows.
    assert_eq!(source.requested(), vec!["location:L1", "location:L2"]);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.no_data, 1);
    assert_eq!(stats.references_marked, 2);

    assert_eq!(
        h.store.get(Table::Location, "L1").unwrap()["name"],
        ColumnValue::Text("Cafe".into())
    );
    let b1 = h.store.get(Table::Media, "B1").unwrap();
    let b2 = h.store.get(Table::Media, "B2").unwrap();
    assert_eq!(b1["location_checked_time"], b2["location_checked_time"]);
    assert!(!h
        .store
        .get(Table::Media, "B3")
        .unwrap()
        .contains_key("location_checked_time"));

    // Only the location without data is selected again.
    let rerun = ExtractorKind::Location.build(source.clone(), &[], &keywords()).unwrap();
    let items = rerun.work_source().list(h.store.as_ref()).await.unwrap();
    assert_eq!(items, Some(vec!["L2".to_string()]));
}

#[tokio::test]
async fn test_tag_to_comments_flow() {
    let h = harness();
    let tag = "台北美食";
    let source = Arc::new(
        ScriptedSource::default()
            .with(
                &format!("tag:{}", tag),
                json!([
                    {"short_code": "B1", "likes_count": 5,
                     "accessibility_caption": "May be an image of food"},
                    {"short_code": "B2", "likes_count": 50,
                     "accessibility_caption": "May be an image of dessert and drink"},
                    {"short_code": "B3", "likes_count": 500,
                     "accessibility_caption": "May be an image of a dog"},
                ]),
            )
            .with("comments:B2", json!([
                {"identifier": 901, "owner": {"identifier": 7}, "text": "yum"},
            ]))
            .with("comments:B1", json!([])),
    );

    let top = ExtractorKind::TopMedias
        .build(source.clone(), &[tag.to_string()], &keywords())
        .unwrap();
    let stats = h.pipeline.run_extractor(top.as_ref()).await.unwrap();
    assert_eq!(stats.records_written, 2);
    assert!(h.store.get(Table::Media, "B3").is_none());
    assert_eq!(
        h.store.get(Table::Media, "B1").unwrap()["tag"],
        ColumnValue::Text(tag.into())
    );

    let comments = ExtractorKind::Comments.build(source.clone(), &[], &keywords()).unwrap();
    let stats = h.pipeline.run_extractor(comments.as_ref()).await.unwrap();

    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.references_marked, 2);
    assert_eq!(
        source.requested(),
        vec![format!("tag:{}", tag), "comments:B2".into(), "comments:B1".into()]
    );
    let comment = h.store.get(Table::Comment, "901").unwrap();
    assert_eq!(comment["media_short_code"], ColumnValue::Text("B2".into()));
    for code in ["B1", "B2"] {
        assert!(h
            .store
            .get(Table::Media, code)
            .unwrap()
            .contains_key("comments_checked_time"));
    }
}

#[tokio::test]
async fn test_requests_are_paced_across_items() {
    let h = harness();
    let source = Arc::new(
        ScriptedSource::default()
            .with("media:B1", json!({"likes_count": 1}))
            .with("media:B2", json!({"likes_count": 2}))
            .with("media:B3", json!({"likes_count": 3})),
    );
    let extractor = ExtractorKind::Media.build(source, &[], &keywords()).unwrap();

    let items: Vec<String> = ["B1", "B2", "B3"].iter().map(|s| s.to_string()).collect();
    let stats = h.pipeline.run(&items, extractor.as_ref()).await;

    assert_eq!(stats.succeeded, 3);
    // No wait before the first request, one short interval before each other.
    assert_eq!(h.clock.sleeps().len(), 2);
    assert_eq!(h.clock.now_epoch_seconds(), START + 60);
}

#[tokio::test]
async fn test_rejected_write_does_not_stop_later_items() {
    let h = harness();
    h.store.reject_key(Table::Media, "B1");
    let source = Arc::new(
        ScriptedSource::default()
            .with("media:B1", json!({"likes_count": 1}))
            .with("media:B2", json!({"likes_count": 2})),
    );
    let extractor = ExtractorKind::Media.build(source.clone(), &[], &keywords()).unwrap();

    let stats = h
        .pipeline
        .run(&["B1".to_string(), "B2".to_string()], extractor.as_ref())
        .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(source.requested(), vec!["media:B1", "media:B2"]);
    assert!(h.store.get(Table::Media, "B1").is_none());
    assert!(h
        .store
        .get(Table::Media, "B2")
        .unwrap()
        .contains_key("media_checked_time"));
}

#[tokio::test]
async fn test_held_lock_skips_item_without_fetching() {
    let h = harness();
    let other_process = RateLimiter::with_clock(pacing(&h.dir), h.clock.clone());
    let held = other_process.acquire().await.unwrap();

    let source = Arc::new(ScriptedSource::default().with("media:B3", json!({"likes_count": 3})));
    let extractor = ExtractorKind::Media.build(source.clone(), &[], &keywords()).unwrap();

    let stats = h.pipeline.run(&["B3".to_string()], extractor.as_ref()).await;
    held.release().unwrap();

    assert_eq!(
        stats,
        RunStats {
            total: 1,
            skipped: 1,
            ..RunStats::default()
        }
    );
    assert!(source.requested().is_empty());
    assert!(h.store.get(Table::Media, "B3").is_none());
}
