//! torrentwatch backend
//!
//! Periodically searches configured torrent index sites for each watchlist
//! item, filters and deduplicates the findings, and notifies subscribers
//! when genuinely new matches appear. The REST/WebSocket API drives the
//! browser SPA and the mobile client.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod events;
pub mod jobs;
pub mod scraper;
pub mod services;

use std::sync::Arc;

pub use engine::Engine;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}
