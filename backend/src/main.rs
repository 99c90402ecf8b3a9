//! Service entry point: configuration, database, engine wiring, the API
//! server and orderly shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use torrentwatch_backend::config::Config;
use torrentwatch_backend::services::llm_supervisor;
use torrentwatch_backend::{api, db, jobs, AppState, Engine};

/// Budget for in-flight requests and the running worker after a signal
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

const DB_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "torrentwatch_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting torrentwatch backend");

    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);
    tracing::info!("Configuration loaded");

    let pool = db::connect_with_retry(&config.database_url, DB_CONNECT_TIMEOUT).await?;
    db::migrations::run(&pool).await?;
    tracing::info!("Database connected");

    let engine = Arc::new(Engine::new(config.clone(), pool));

    // Bring up the LLM when entity matching is requested. A disabled browser
    // means no candidates can ever reach the extractor, so skip the
    // supervisor entirely in that combination. Failures degrade the process
    // to fuzzy-only matching.
    if config.use_entity_matching && !config.disable_browser {
        tracing::info!("Entity matching enabled, starting Ollama if needed...");
        match llm_supervisor::start(&engine.extractor).await {
            llm_supervisor::LlmReadiness::Ready { child } => {
                if let Some(child) = child {
                    engine.adopt_llm_child(child);
                }
                engine.set_entity_matching(true);
            }
            llm_supervisor::LlmReadiness::Unavailable => {}
        }
    } else if config.use_entity_matching {
        tracing::info!("Browser disabled; skipping LLM startup");
    }

    let scheduler = jobs::start_scheduler(engine.clone());

    let state = AppState {
        engine: engine.clone(),
    };

    let app = api::router()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    tracing::info!("Shutting down...");

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_DRAIN, server).await.is_err() {
        tracing::warn!("Drain budget exceeded, forcing shutdown");
    }

    scheduler.abort();
    engine.subscribers.close_all();
    engine.shutdown_llm();

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM so the server shuts down cleanly whether
/// stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
