//! Lifecycle management for the local LLM server
//!
//! At startup, when entity matching is enabled, the supervisor probes the
//! model-listing route. If the server is unreachable it spawns `ollama serve`
//! as a child process and polls until ready (30s budget). A failure here is
//! a configuration warning, not a fatal error: the worker degrades to fuzzy
//! matching for the lifetime of the process.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{info, warn};

use super::ollama::EntityExtractor;

/// How long to wait for a freshly spawned server to come up
const STARTUP_BUDGET_SECS: u64 = 30;

/// Outcome of bringing the LLM server up
pub struct LlmStartup {
    /// The spawned child, when this process started the server itself.
    /// Must be signalled and reaped on shutdown.
    pub child: Option<Child>,
}

/// Ensure an Ollama server is reachable, spawning one if needed.
pub async fn ensure_server(extractor: &EntityExtractor) -> Result<LlmStartup> {
    if extractor.list_models().await.is_ok() {
        info!("Ollama is already running");
        return Ok(LlmStartup { child: None });
    }

    info!("Starting Ollama server...");
    let child = Command::new("ollama")
        .arg("serve")
        .kill_on_drop(true)
        .spawn()
        .context("Failed to start Ollama")?;

    if let Some(pid) = child.id() {
        info!(pid, "Ollama server started");
    }

    for _ in 0..STARTUP_BUDGET_SECS {
        sleep(Duration::from_secs(1)).await;
        if extractor.list_models().await.is_ok() {
            info!("Ollama server is ready");
            return Ok(LlmStartup { child: Some(child) });
        }
    }

    // The child is dropped here and killed via kill_on_drop.
    anyhow::bail!(
        "Ollama server did not become ready within {} seconds",
        STARTUP_BUDGET_SECS
    )
}

/// Verify the configured model is served (prefix match) and warm it up with
/// one synchronous generation.
pub async fn verify_model(extractor: &EntityExtractor) -> Result<()> {
    let model = &extractor.config().model;
    let models = extractor.list_models().await?;

    if !models.iter().any(|m| m.starts_with(model.as_str())) {
        anyhow::bail!("Model {:?} not found in Ollama. Run: ollama pull {}", model, model);
    }

    info!(model = %model, "Initializing model...");
    extractor.warm_up().await?;
    Ok(())
}

/// Outcome of the full startup sequence
pub enum LlmReadiness {
    /// Server reachable and the model warmed up. `child` is present when
    /// this process spawned the server itself.
    Ready { child: Option<Child> },
    /// Entity matching must stay disabled for the process lifetime
    Unavailable,
}

/// Full startup sequence: reach (or spawn) the server, verify the model,
/// warm it up. Failures are configuration warnings, never fatal.
pub async fn start(extractor: &EntityExtractor) -> LlmReadiness {
    let startup = match ensure_server(extractor).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to start Ollama; entity extraction will be skipped");
            warn!("To fix: start Ollama manually (ollama serve), pull the model, or set USE_ENTITY_MATCHING=false");
            return LlmReadiness::Unavailable;
        }
    };

    if let Err(e) = verify_model(extractor).await {
        warn!(error = %e, "Ollama health check failed; entity extraction will be skipped");
        return LlmReadiness::Unavailable;
    }

    info!(model = %extractor.config().model, "Entity extraction is enabled and operational");
    LlmReadiness::Ready {
        child: startup.child,
    }
}
