//! The search-and-match worker
//!
//! One run walks every watchlist item across every configured site,
//! funnels candidates through the quality gate, pre-filter, optional
//! entity extraction and the fuzzy fallback, then extracts a magnet and
//! persists confirmed matches with dedup. Strictly serial: one candidate
//! at a time, one site at a time, one item at a time, so scraping stays
//! polite and the LLM queue depth stays at 1. No error in a candidate,
//! site or item aborts the rest of the run.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use crate::db::{ItemRecord, NewMatch};
use crate::engine::Engine;
use crate::events::{LogEvent, MatchEvent, WorkerStatus, WsEvent};
use crate::scraper::{
    BrowserMagnetExtractor, Candidate, GenericAdapter, MagnetResolver, SiteAdapter, SiteConfig,
};
use crate::services::ollama::{find_entity, Entity};
use crate::services::{fuzzy, text};

/// Hard cap on matches persisted per item per run
pub const PER_ITEM_MATCH_CAP: usize = 5;

/// One site prepared for a run: the adapter plus the parsed config the
/// magnet extractor consults for extraction steps.
pub struct PreparedSite {
    pub name: String,
    pub config: SiteConfig,
    pub adapter: Box<dyn SiteAdapter>,
}

/// Releases the single-flight flag and announces completion on every exit
/// path, including panics.
struct RunGuard {
    engine: Arc<Engine>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.engine.finish_run();
    }
}

/// Execute one worker run. The single-flight flag must already be held
/// (see [`crate::jobs::trigger`]); it is released when this returns.
pub async fn run(engine: Arc<Engine>) {
    let _guard = RunGuard {
        engine: engine.clone(),
    };

    info!(
        threshold = engine.config.fuzzy_threshold,
        browser_disabled = engine.config.disable_browser,
        "Worker started"
    );
    engine.subscribers.broadcast(&WsEvent::worker_status(
        WorkerStatus::Running,
        "Worker started",
    ));

    let items = match engine.items().list_for_worker().await {
        Ok(items) => items,
        Err(e) => {
            error!(error = %e, "Worker failed to load items");
            return;
        }
    };
    if items.is_empty() {
        info!("No watchlist items; done");
        return;
    }

    let sites = match engine.sites().list_for_worker().await {
        Ok(sites) => sites,
        Err(e) => {
            error!(error = %e, "Worker failed to load sites");
            return;
        }
    };
    if sites.is_empty() {
        info!("No sites configured; done");
        return;
    }

    let prepared: Vec<PreparedSite> = if engine.config.disable_browser {
        info!("Browser disabled; site searches will yield no candidates");
        Vec::new()
    } else {
        sites
            .iter()
            .map(|site| {
                let config = SiteConfig::parse_or_default(site.config.as_deref());
                PreparedSite {
                    name: site.name().to_string(),
                    adapter: Box::new(GenericAdapter::new(
                        site.url.clone(),
                        site.name().to_string(),
                        config.clone(),
                        engine.config.scraper_debug_dir.clone(),
                    )),
                    config,
                }
            })
            .collect()
    };

    let magnets = BrowserMagnetExtractor::new(engine.config.scraper_debug_dir.clone());
    process_items(&engine, &items, &prepared, &magnets).await;

    info!("Worker finished");
}

/// Walk all items, recording one log entry and one `new_log` event per item
pub async fn process_items(
    engine: &Engine,
    items: &[ItemRecord],
    sites: &[PreparedSite],
    magnets: &dyn MagnetResolver,
) {
    for item in items {
        let matches_found = process_item(engine, item, sites, magnets).await;

        let success = matches_found > 0;
        let description = format!(
            "Item '{}' completed with {} match(es)",
            item.text, matches_found
        );

        if let Err(e) = engine.logs().insert(&description, success).await {
            error!(item = %item.text, error = %e, "Failed to insert run log");
        } else {
            info!(item = %item.text, matches = matches_found, success, "Item completed");
        }

        engine.subscribers.broadcast(&WsEvent::new_log(LogEvent {
            description,
            success,
            timestamp: now_rfc3339(),
        }));
    }
}

async fn process_item(
    engine: &Engine,
    item: &ItemRecord,
    sites: &[PreparedSite],
    magnets: &dyn MagnetResolver,
) -> usize {
    let mut found = 0usize;

    let item_year = text::extract_year(&item.text);
    let item_without_year = text::remove_year(&item.text);
    match &item_year {
        Some(year) => debug!(item = %item.text, year = %year, "Item year extracted"),
        None => debug!(item = %item.text, "Item has no year"),
    }

    for site in sites {
        if found >= PER_ITEM_MATCH_CAP {
            info!(item = %item.text, found, "Per-item cap reached, skipping remaining sites");
            break;
        }

        let candidates = match site.adapter.search(&item.text).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(site = %site.name, error = %e, "Site search failed");
                continue;
            }
        };
        info!(
            site = %site.name,
            item = %item.text,
            results = candidates.len(),
            "Search returned candidates"
        );

        for candidate in &candidates {
            if found >= PER_ITEM_MATCH_CAP {
                break;
            }

            let inserted = process_candidate(
                engine,
                item,
                &item_without_year,
                item_year.as_deref(),
                site,
                candidate,
                magnets,
            )
            .await;

            if inserted {
                found += 1;
            }
        }
    }

    found
}

/// Run one candidate through the filter funnel. Returns true when a new
/// match row was persisted.
#[allow(clippy::too_many_arguments)]
async fn process_candidate(
    engine: &Engine,
    item: &ItemRecord,
    item_without_year: &str,
    item_year: Option<&str>,
    site: &PreparedSite,
    candidate: &Candidate,
    magnets: &dyn MagnetResolver,
) -> bool {
    // (1) quality gate, before anything expensive
    if text::is_disqualified(&candidate.title) {
        info!(
            site = %site.name,
            url = %candidate.url,
            title = %candidate.title,
            "Disqualified by quality gate"
        );
        return false;
    }

    // (2) contiguous-phrase pre-filter, skips the LLM on obvious non-matches
    if !text::contains_as_phrase(&candidate.title, &item.text) {
        debug!(
            item = %item.text,
            title = %candidate.title,
            "Pre-filter rejected candidate"
        );
        return false;
    }

    // (3) entity extraction; failure degrades to the fuzzy fallback
    let mut entities: Vec<Entity> = Vec::new();
    if engine.entity_matching_active() {
        match engine.extractor.extract(&candidate.title).await {
            Ok(extracted) => {
                info!(title = %candidate.title, count = extracted.len(), "Extracted entities");
                entities = extracted;
            }
            Err(e) => {
                warn!(
                    title = %candidate.title,
                    error = %e,
                    "Entity extraction failed, falling back to fuzzy"
                );
            }
        }
    }

    // The entity path is authoritative when it produced a film title:
    // accept or reject is final and the fuzzy fallback is skipped.
    let mut matched = false;
    if !entities.is_empty() {
        match decide_by_entities(item_without_year, item_year, &entities) {
            EntityDecision::Accept => {
                info!(item = %item.text, title = %candidate.title, "Entity match accepted");
                matched = true;
            }
            EntityDecision::Reject => {
                info!(item = %item.text, title = %candidate.title, "Entity match rejected");
                return false;
            }
            EntityDecision::Undecided => {
                debug!(title = %candidate.title, "No film title entity, falling back to fuzzy");
            }
        }
    }

    // (4) fuzzy fallback, only when the entity path did not decide
    if !matched {
        let score = fuzzy::score(&item.text, &candidate.title);
        info!(
            score,
            threshold = engine.config.fuzzy_threshold,
            item = %item.text,
            title = %candidate.title,
            "Fuzzy score"
        );
        if score >= engine.config.fuzzy_threshold {
            matched = true;
        }
    }
    if !matched {
        return false;
    }

    // (5) magnet extraction for the confirmed match; failure is non-fatal
    info!(title = %candidate.title, url = %candidate.url, "Match confirmed, extracting magnet");
    let magnet = match magnets.resolve(&candidate.url, Some(&site.config)).await {
        Ok(Some(magnet)) => magnet,
        Ok(None) => {
            info!(url = %candidate.url, "No magnet found on detail page");
            String::new()
        }
        Err(e) => {
            warn!(url = %candidate.url, error = %e, "Magnet extraction failed");
            String::new()
        }
    };

    // (6) dedup insert plus fan-out on first observation
    let entities_json = if entities.is_empty() {
        "[]".to_string()
    } else {
        serde_json::to_string(&entities).unwrap_or_else(|_| "[]".to_string())
    };
    let file_size = find_entity(&entities, "FILE SIZE")
        .or_else(|| find_entity(&entities, "FILESIZE"))
        .map(|e| e.text.clone())
        .unwrap_or_default();

    let inserted = match engine
        .matches()
        .insert_dedup(NewMatch {
            item_id: item.id,
            matched_text: &candidate.title,
            matched_url: &candidate.url,
            source_site: &site.name,
            torrent_text: &candidate.title,
            magnet_link: &magnet,
            entities_json: &entities_json,
            file_size: &file_size,
        })
        .await
    {
        Ok(inserted) => inserted,
        Err(e) => {
            error!(url = %candidate.url, error = %e, "Failed to insert match");
            return false;
        }
    };

    if !inserted {
        debug!(url = %candidate.url, "Duplicate match, no fan-out");
        return false;
    }

    info!(
        site = %site.name,
        item = %item.text,
        title = %candidate.title,
        url = %candidate.url,
        "New match persisted"
    );

    engine.subscribers.broadcast(&WsEvent::new_match(MatchEvent {
        item: item.text.clone(),
        url: candidate.url.clone(),
        site: site.name.clone(),
        torrent_text: candidate.title.clone(),
        created: now_rfc3339(),
    }));

    if let Some(sms) = &engine.sms {
        if let Err(e) = sms
            .send_match_alert(&item.text, &candidate.title, &candidate.url, &site.name)
            .await
        {
            warn!(error = %e, "SMS dispatch failed");
        }
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityDecision {
    Accept,
    Reject,
    Undecided,
}

/// Decide a candidate from extracted entities.
///
/// Requires an exact (case-insensitive, trimmed) match between the item
/// label with its year removed and the FILM TITLE entity. When the item
/// carries a year, the YEAR entity must exist and agree. Without a FILM
/// TITLE entity the decision falls to the fuzzy scorer.
fn decide_by_entities(
    item_without_year: &str,
    item_year: Option<&str>,
    entities: &[Entity],
) -> EntityDecision {
    let Some(film_title) = find_entity(entities, "FILM TITLE") else {
        return EntityDecision::Undecided;
    };

    let item_title = item_without_year.trim().to_lowercase();
    let film = film_title.text.trim().to_lowercase();
    if item_title != film {
        return EntityDecision::Reject;
    }

    match item_year {
        None => EntityDecision::Accept,
        Some(year) => match find_entity(entities, "YEAR") {
            Some(entity) if entity.text == year => EntityDecision::Accept,
            _ => EntityDecision::Reject,
        },
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
