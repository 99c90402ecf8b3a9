//! Application configuration management

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the API server
    pub host: String,

    /// API server port
    pub port: u16,

    /// Database URL (SQLite), e.g. `sqlite://./data/torrentwatch.db`
    pub database_url: String,

    /// Hours between scheduled worker runs
    pub check_interval_hours: u64,

    /// Fire one worker run immediately at boot
    pub run_worker_on_start: bool,

    /// Score cutoff for the fuzzy fallback matcher, clamped to [0, 1]
    pub fuzzy_threshold: f64,

    /// When true the browser-backed site adapters produce no candidates
    /// and the worker only records per-item completions
    pub disable_browser: bool,

    /// Enable LLM entity extraction for match decisions
    pub use_entity_matching: bool,

    /// Base URL of the local LLM server
    pub ollama_url: String,

    /// Model tag expected to be served by the LLM server
    pub ollama_model: String,

    /// SMS credentials; all four must be set for dispatch to fire
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub alert_to_number: Option<String>,

    /// When set, rendered search/detail pages are captured here for
    /// per-site selector debugging
    pub scraper_debug_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL not set (e.g. sqlite://./data/torrentwatch.db)")?;

        let check_interval_hours = match env_u64("CHECK_INTERVAL_HOURS", 6) {
            0 => 6,
            n => n,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8004".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,

            check_interval_hours,

            run_worker_on_start: env_bool("RUN_WORKER_ON_START", false),

            fuzzy_threshold: env_unit_interval("FUZZY_THRESHOLD", 0.78),

            disable_browser: env_bool("DISABLE_PLAYWRIGHT", false),

            use_entity_matching: env_bool("USE_ENTITY_MATCHING", false),

            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),

            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama2".to_string()),

            twilio_account_sid: env_nonempty("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: env_nonempty("TWILIO_AUTH_TOKEN"),
            twilio_from_number: env_nonempty("TWILIO_FROM_NUMBER"),
            alert_to_number: env_nonempty("ALERT_TO_NUMBER"),

            scraper_debug_dir: env_nonempty("SCRAPER_DEBUG_DIR").map(PathBuf::from),
        })
    }

    /// True when every SMS credential is present
    pub fn sms_configured(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_from_number.is_some()
            && self.alert_to_number.is_some()
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| {
            let v = v.trim().to_lowercase();
            v == "true" || v == "1"
        })
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a float from the environment and clamp it to [0, 1].
/// Missing or unparseable values fall back to the default.
fn env_unit_interval(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|f| f.clamp(0.0, 1.0))
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
