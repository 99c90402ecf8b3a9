//! REST API tests
//!
//! Drive the full router in-process against an in-memory SQLite pool,
//! verifying wire formats, status codes and validation behavior.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower::ServiceExt;

use torrentwatch_backend::config::Config;
use torrentwatch_backend::db::{migrations, NewMatch};
use torrentwatch_backend::engine::Engine;
use torrentwatch_backend::{api, AppState};

struct TestApp {
    router: Router,
    engine: Arc<Engine>,
}

impl TestApp {
    async fn new() -> Self {
        let config = Config {
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
        };

        let opts: SqliteConnectOptions = "sqlite::memory:".parse().unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts.foreign_keys(true))
            .await
            .unwrap();
        migrations::run(&pool).await.unwrap();

        let engine = Arc::new(Engine::new(Arc::new(config), pool));
        let router = api::router().with_state(AppState {
            engine: engine.clone(),
        });

        Self { router, engine }
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        form: Option<&str>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(path);
        let request = match form {
            Some(body) => builder
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request("GET", path, None).await
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn items_create_list_update_delete() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request("POST", "/api/items", Some("text=Dune%202021"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    app.request("POST", "/api/items", Some("text=Arrival%202016"))
        .await;

    let (status, body) = app.get("/api/items").await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    // Newest first
    assert_eq!(items[0]["text"], "Arrival 2016");
    assert_eq!(items[1]["text"], "Dune 2021");

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/items/{}", id),
            Some("text=Dune%20Part%20Two%202024"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = app
        .request("DELETE", &format!("/api/items/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = app.get("/api/items").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_item_returns_conflict() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request("POST", "/api/items", Some("text=Dune%202021"))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request("POST", "/api/items", Some("text=Dune%202021"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Item already exists");
}

#[tokio::test]
async fn create_item_requires_text() {
    let app = TestApp::new().await;
    let (status, _) = app.request("POST", "/api/items", Some("text=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sites_crud_with_partial_update() {
    let app = TestApp::new().await;

    let form = "url=https%3A%2F%2Ft.example&display_name=T&config=%7B%22linkSelector%22%3A%22td%20a%22%7D";
    let (status, body) = app.request("POST", "/api/urls", Some(form)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (_, body) = app.get("/api/urls").await;
    let sites = body.as_array().unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0]["url"], "https://t.example");
    assert_eq!(sites[0]["display_name"], "T");
    assert_eq!(sites[0]["config"], r#"{"linkSelector":"td a"}"#);

    // Partial update touches only the provided field
    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/urls/{}", id),
            Some("display_name=Torrents"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = app.get("/api/urls").await;
    assert_eq!(body[0]["display_name"], "Torrents");
    assert_eq!(body[0]["url"], "https://t.example");

    // An update with no fields is rejected
    let (status, _) = app
        .request("PUT", &format!("/api/urls/{}", id), Some("url="))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request("DELETE", &format!("/api/urls/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/urls").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn logs_pagination_shape() {
    let app = TestApp::new().await;

    for i in 0..30 {
        app.engine
            .logs()
            .insert(&format!("Item 'x{}' completed with 0 match(es)", i), false)
            .await
            .unwrap();
    }

    let (status, body) = app.get("/api/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 25);
    assert_eq!(body["total"], 30);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["logs"].as_array().unwrap().len(), 25);

    let (_, body) = app.get("/api/logs?page=2").await;
    assert_eq!(body["page"], 2);
    assert_eq!(body["logs"].as_array().unwrap().len(), 5);

    let (status, body) = app.request("DELETE", "/api/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["deleted"], 30);
}

#[tokio::test]
async fn matches_list_and_delete() {
    let app = TestApp::new().await;
    let item_id = app
        .engine
        .items()
        .create("Dune 2021")
        .await
        .unwrap()
        .unwrap();

    assert!(app
        .engine
        .matches()
        .insert_dedup(NewMatch {
            item_id,
            matched_text: "Dune.2021.1080p",
            matched_url: "https://t.example/1",
            source_site: "t.example",
            torrent_text: "Dune.2021.1080p",
            magnet_link: "magnet:?xt=urn:btih:abc",
            entities_json: "[]",
            file_size: "2.1 GB",
        })
        .await
        .unwrap());

    let (status, body) = app.get("/api/matches").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["item"], "Dune 2021");
    assert_eq!(rows[0]["site"], "t.example");
    assert_eq!(rows[0]["magnet_link"], "magnet:?xt=urn:btih:abc");
    assert_eq!(rows[0]["file_size"], "2.1 GB");
    let id = rows[0]["id"].as_i64().unwrap();

    let (status, body) = app
        .request("DELETE", &format!("/api/matches/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = app.get("/api/matches").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn trigger_worker_reports_already_running() {
    let app = TestApp::new().await;

    let (_, body) = app.get("/api/worker-status").await;
    assert_eq!(body["running"], false);

    // Hold the single-flight gate and observe the typed rejection
    assert!(app.engine.try_begin_run());
    let (status, body) = app.request("POST", "/api/trigger-worker", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_running");
    assert_eq!(body["message"], "Worker is already running");

    let (_, body) = app.get("/api/worker-status").await;
    assert_eq!(body["running"], true);

    app.engine.finish_run();
    let (_, body) = app.get("/api/worker-status").await;
    assert_eq!(body["running"], false);
}

#[tokio::test]
async fn trigger_worker_fires_a_run() {
    let app = TestApp::new().await;

    let (status, body) = app.request("POST", "/api/trigger-worker", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "triggered");

    // The run has no items and finishes quickly, releasing the gate.
    for _ in 0..100 {
        let (_, body) = app.get("/api/worker-status").await;
        if body["running"] == false {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker did not release the single-flight gate");
}
