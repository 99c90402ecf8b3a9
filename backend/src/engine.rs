//! Shared engine state
//!
//! Owns the process-wide mutable state the worker and handlers share: the
//! single-flight worker flag, the live-subscriber registry, the entity
//! extractor and the supervised LLM child. Passed by `Arc` everywhere;
//! there are no module globals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::process::Child;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{
    Database, ItemsRepository, LogsRepository, MatchesRepository, SitesRepository,
};
use crate::events::{SubscriberRegistry, WorkerStatus, WsEvent};
use crate::services::{EntityExtractor, OllamaConfig, SmsNotifier};

pub struct Engine {
    pub config: Arc<Config>,
    pub db: Database,
    pub subscribers: SubscriberRegistry,
    pub extractor: EntityExtractor,
    pub sms: Option<SmsNotifier>,
    worker_running: AtomicBool,
    entity_matching: AtomicBool,
    llm_child: Mutex<Option<Child>>,
}

impl Engine {
    pub fn new(config: Arc<Config>, db: Database) -> Self {
        let extractor = EntityExtractor::new(OllamaConfig {
            url: config.ollama_url.clone(),
            model: config.ollama_model.clone(),
        });

        let sms = SmsNotifier::from_config(&config);
        if sms.is_some() {
            info!("SMS dispatch configured");
        }

        Self {
            config,
            db,
            subscribers: SubscriberRegistry::new(),
            extractor,
            sms,
            worker_running: AtomicBool::new(false),
            entity_matching: AtomicBool::new(false),
            llm_child: Mutex::new(None),
        }
    }

    pub fn items(&self) -> ItemsRepository {
        ItemsRepository::new(self.db.clone())
    }

    pub fn sites(&self) -> SitesRepository {
        SitesRepository::new(self.db.clone())
    }

    pub fn matches(&self) -> MatchesRepository {
        MatchesRepository::new(self.db.clone())
    }

    pub fn logs(&self) -> LogsRepository {
        LogsRepository::new(self.db.clone())
    }

    /// Whether a worker run is currently in progress
    pub fn worker_running(&self) -> bool {
        self.worker_running.load(Ordering::SeqCst)
    }

    /// Single-flight gate: claim the worker slot. Returns false when a run
    /// is already in progress.
    pub fn try_begin_run(&self) -> bool {
        self.worker_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the worker slot and announce completion. Called from the run
    /// guard on every exit path, including panics.
    pub fn finish_run(&self) {
        self.worker_running.store(false, Ordering::SeqCst);
        self.subscribers.broadcast(&WsEvent::worker_status(
            WorkerStatus::Completed,
            "Worker finished",
        ));
    }

    /// Whether the entity extraction path is operational for this process
    pub fn entity_matching_active(&self) -> bool {
        self.entity_matching.load(Ordering::Relaxed)
    }

    pub fn set_entity_matching(&self, active: bool) {
        self.entity_matching.store(active, Ordering::Relaxed);
    }

    /// Take ownership of a spawned LLM server for shutdown handling
    pub fn adopt_llm_child(&self, child: Child) {
        *self.llm_child.lock() = Some(child);
    }

    /// Signal any spawned LLM server. The child is reaped by kill-on-drop.
    pub fn shutdown_llm(&self) {
        if let Some(mut child) = self.llm_child.lock().take() {
            info!("Stopping Ollama server...");
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to stop Ollama");
            } else {
                info!("Ollama server stopped");
            }
        }
    }
}
