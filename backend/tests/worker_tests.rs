//! Integration tests for the worker pipeline
//!
//! These run the real orchestrator against an in-memory SQLite pool with
//! fixture site adapters (canned candidate lists) and a stub magnet
//! resolver, verifying the filter funnel, dedup, the per-item cap, run
//! logging and event fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use torrentwatch_backend::config::Config;
use torrentwatch_backend::db::migrations;
use torrentwatch_backend::engine::Engine;
use torrentwatch_backend::jobs::worker::{process_items, PreparedSite, PER_ITEM_MATCH_CAP};
use torrentwatch_backend::scraper::{
    Candidate, MagnetResolver, ScrapeError, SiteAdapter, SiteConfig,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        check_interval_hours: 6,
        run_worker_on_start: false,
        fuzzy_threshold: 0.78,
        disable_browser: true,
        use_entity_matching: false,
        ollama_url: "http://localhost:11434".into(),
        ollama_model: "llama2".into(),
        twilio_account_sid: None,
        twilio_auth_token: None,
        twilio_from_number: None,
        alert_to_number: None,
        scraper_debug_dir: None,
    }
}

async fn test_engine() -> Arc<Engine> {
    let opts: SqliteConnectOptions = "sqlite::memory:".parse().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts.foreign_keys(true))
        .await
        .unwrap();
    migrations::run(&pool).await.unwrap();

    Arc::new(Engine::new(Arc::new(test_config()), pool))
}

fn candidate(title: &str, url: &str) -> Candidate {
    Candidate {
        title: title.to_string(),
        url: url.to_string(),
    }
}

/// Adapter returning a canned candidate list and counting its invocations
struct FixtureAdapter {
    name: String,
    candidates: Vec<Candidate>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SiteAdapter for FixtureAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<Vec<Candidate>, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

/// Adapter whose search always fails at the site level
struct FailingAdapter {
    name: String,
}

#[async_trait]
impl SiteAdapter for FailingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<Vec<Candidate>, ScrapeError> {
        Err(ScrapeError::SearchInputNotFound)
    }
}

fn fixture_site(
    name: &str,
    candidates: Vec<Candidate>,
    calls: Arc<AtomicUsize>,
) -> PreparedSite {
    PreparedSite {
        name: name.to_string(),
        config: SiteConfig::default(),
        adapter: Box::new(FixtureAdapter {
            name: name.to_string(),
            candidates,
            calls,
        }),
    }
}

fn failing_site(name: &str) -> PreparedSite {
    PreparedSite {
        name: name.to_string(),
        config: SiteConfig::default(),
        adapter: Box::new(FailingAdapter {
            name: name.to_string(),
        }),
    }
}

/// Resolver returning one fixed magnet for every detail page
struct FixedMagnet;

#[async_trait]
impl MagnetResolver for FixedMagnet {
    async fn resolve(
        &self,
        _detail_url: &str,
        _config: Option<&SiteConfig>,
    ) -> Result<Option<String>, ScrapeError> {
        Ok(Some("magnet:?xt=urn:btih:fixture".to_string()))
    }
}

/// Resolver that never finds a magnet
struct NoMagnet;

#[async_trait]
impl MagnetResolver for NoMagnet {
    async fn resolve(
        &self,
        _detail_url: &str,
        _config: Option<&SiteConfig>,
    ) -> Result<Option<String>, ScrapeError> {
        Ok(None)
    }
}

fn event_types(frames: &[Message]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|m| match m {
            Message::Text(t) => {
                let v: serde_json::Value = serde_json::from_str(t.as_str()).unwrap();
                Some(v["type"].as_str().unwrap().to_string())
            }
            _ => None,
        })
        .collect()
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fuzzy_match_persists_row_with_magnet_and_fans_out() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();

    let items = engine.items().list_for_worker().await.unwrap();
    let sites = vec![fixture_site(
        "t.example",
        vec![
            candidate("Arrival 2016 720p WEB rip", "https://t.example/no"),
            candidate("dune 2021 1080p bluray", "https://t.example/1"),
        ],
        Arc::new(AtomicUsize::new(0)),
    )];

    let (_sub, mut rx) = engine.subscribers.add();
    process_items(&engine, &items, &sites, &FixedMagnet).await;

    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 1);

    let rows = engine.matches().list_recent().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].item, "Dune 2021");
    assert_eq!(rows[0].site, "t.example");
    assert_eq!(rows[0].url, "https://t.example/1");
    assert_eq!(rows[0].magnet_link, "magnet:?xt=urn:btih:fixture");

    let logs = engine.logs().page(1).await.unwrap();
    assert_eq!(logs.total, 1);
    assert!(logs.logs[0].success);
    assert_eq!(
        logs.logs[0].description,
        "Item 'Dune 2021' completed with 1 match(es)"
    );

    let types = event_types(&drain(&mut rx));
    assert_eq!(types, vec!["new_match", "new_log"]);
}

#[tokio::test]
async fn disqualified_candidate_is_never_persisted() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();

    let items = engine.items().list_for_worker().await.unwrap();
    let sites = vec![fixture_site(
        "t.example",
        vec![candidate("Dune.2021.TS.XviD", "https://t.example/cam")],
        Arc::new(AtomicUsize::new(0)),
    )];

    process_items(&engine, &items, &sites, &FixedMagnet).await;

    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 0);

    let logs = engine.logs().page(1).await.unwrap();
    assert_eq!(logs.total, 1);
    assert!(!logs.logs[0].success);
}

#[tokio::test]
async fn per_item_cap_stops_candidates_and_remaining_sites() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();
    let items = engine.items().list_for_worker().await.unwrap();

    let qualifying = |n: usize| -> Vec<Candidate> {
        (0..n)
            .map(|i| {
                candidate(
                    "dune 2021 1080p bluray x264",
                    &format!("https://s{}.example/t/{}", n, i),
                )
            })
            .collect()
    };

    let calls_a = Arc::new(AtomicUsize::new(0));
    let calls_b = Arc::new(AtomicUsize::new(0));
    let calls_c = Arc::new(AtomicUsize::new(0));

    let sites = vec![
        fixture_site("site-a", qualifying(3), calls_a.clone()),
        fixture_site("site-b", qualifying(3), calls_b.clone()),
        fixture_site("site-c", qualifying(1), calls_c.clone()),
    ];

    process_items(&engine, &items, &sites, &FixedMagnet).await;

    assert_eq!(
        engine.matches().count_for_item(id).await.unwrap(),
        PER_ITEM_MATCH_CAP as i64
    );
    assert_eq!(calls_a.load(Ordering::SeqCst), 1);
    assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    // Cap reached after the second site; the third is never searched.
    assert_eq!(calls_c.load(Ordering::SeqCst), 0);

    let logs = engine.logs().page(1).await.unwrap();
    assert_eq!(logs.total, 1);
    assert!(logs.logs[0].success);
}

#[tokio::test]
async fn second_run_with_same_scrape_output_is_a_noop() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();
    let items = engine.items().list_for_worker().await.unwrap();

    let build_sites = || {
        vec![fixture_site(
            "t.example",
            vec![candidate("dune 2021 1080p bluray", "https://t.example/1")],
            Arc::new(AtomicUsize::new(0)),
        )]
    };

    process_items(&engine, &items, &build_sites(), &FixedMagnet).await;
    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 1);

    // Second run scrapes the identical candidate: no new rows, no
    // new_match event, run recorded as unsuccessful.
    let (_sub, mut rx) = engine.subscribers.add();
    process_items(&engine, &items, &build_sites(), &FixedMagnet).await;

    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 1);
    assert_eq!(engine.matches().list_recent().await.unwrap().len(), 1);

    let types = event_types(&drain(&mut rx));
    assert_eq!(types, vec!["new_log"]);

    let logs = engine.logs().page(1).await.unwrap();
    assert_eq!(logs.total, 2);
    // Newest first: the second run found nothing new.
    assert!(!logs.logs[0].success);
}

#[tokio::test]
async fn one_log_entry_per_item_per_run() {
    let engine = test_engine().await;
    engine.items().create("Dune 2021").await.unwrap().unwrap();
    engine.items().create("Arrival 2016").await.unwrap().unwrap();

    let items = engine.items().list_for_worker().await.unwrap();
    process_items(&engine, &items, &[], &NoMagnet).await;

    let logs = engine.logs().page(1).await.unwrap();
    assert_eq!(logs.total, 2);
    assert!(logs.logs.iter().all(|l| !l.success));
}

#[tokio::test]
async fn site_error_is_absorbed_and_later_sites_proceed() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();
    let items = engine.items().list_for_worker().await.unwrap();

    let sites = vec![
        failing_site("broken.example"),
        fixture_site(
            "working.example",
            vec![candidate("dune 2021 2160p remux", "https://w.example/1")],
            Arc::new(AtomicUsize::new(0)),
        ),
    ];

    process_items(&engine, &items, &sites, &FixedMagnet).await;

    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 1);
    let logs = engine.logs().page(1).await.unwrap();
    assert!(logs.logs[0].success);
}

#[tokio::test]
async fn missing_magnet_still_persists_match_with_empty_field() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();
    let items = engine.items().list_for_worker().await.unwrap();

    let sites = vec![fixture_site(
        "t.example",
        vec![candidate("dune 2021 1080p bluray", "https://t.example/1")],
        Arc::new(AtomicUsize::new(0)),
    )];

    process_items(&engine, &items, &sites, &NoMagnet).await;

    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 1);
    let rows = engine.matches().list_recent().await.unwrap();
    assert_eq!(rows[0].magnet_link, "");
}

#[tokio::test]
async fn worker_gate_is_single_flight() {
    let engine = test_engine().await;

    assert!(engine.try_begin_run());
    assert!(!engine.try_begin_run());
    assert!(engine.worker_running());

    let (_sub, mut rx) = engine.subscribers.add();
    engine.finish_run();

    assert!(!engine.worker_running());
    assert!(engine.try_begin_run());

    // Releasing the gate announces completion to live subscribers.
    let types = event_types(&drain(&mut rx));
    assert_eq!(types, vec!["worker_status"]);
}

#[tokio::test]
async fn deleting_an_item_cascades_to_its_matches() {
    let engine = test_engine().await;
    let id = engine.items().create("Dune 2021").await.unwrap().unwrap();
    let items = engine.items().list_for_worker().await.unwrap();

    let sites = vec![fixture_site(
        "t.example",
        vec![candidate("dune 2021 1080p bluray", "https://t.example/1")],
        Arc::new(AtomicUsize::new(0)),
    )];
    process_items(&engine, &items, &sites, &FixedMagnet).await;
    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 1);

    engine.items().delete(id).await.unwrap();
    assert_eq!(engine.matches().count_for_item(id).await.unwrap(), 0);
    assert!(engine.matches().list_recent().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_item_text_is_rejected() {
    let engine = test_engine().await;
    assert!(engine.items().create("Dune 2021").await.unwrap().is_some());
    assert!(engine.items().create("Dune 2021").await.unwrap().is_none());
}
