//! Ollama API client for LLM-based entity extraction
//!
//! Extracts structured entities (film title, year, resolution, format) from
//! torrent titles via a local Ollama server. Extraction failures are
//! recoverable: the worker falls back to fuzzy matching.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for the Ollama service
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
        }
    }
}

/// Request body for the Ollama generate API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

/// Response from the Ollama generate API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// A named entity extracted from a torrent title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct EntityExtractionResponse {
    entities: Vec<Entity>,
}

/// Client for the local Ollama server
pub struct EntityExtractor {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl EntityExtractor {
    /// Create a new extractor. The generate call deliberately carries no
    /// client-side timeout beyond the HTTP default; model loads can be slow.
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// List the model tags the server currently serves
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.config.url);

        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }

        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Ollama server")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama server returned status: {}", response.status());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama model listing")?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Issue one synchronous generation to force the model into memory
    pub async fn warm_up(&self) -> Result<()> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: "Hello".to_string(),
            stream: false,
            format: None,
        };

        let url = format!("{}/api/generate", self.config.url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to initialize model")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Model initialization failed with status {}: {}",
                status,
                body
            );
        }

        info!(model = %self.config.model, "Model initialized");
        Ok(())
    }

    /// Extract entities from a torrent title.
    ///
    /// One attempt per candidate; empty replies and unparseable JSON surface
    /// as errors so the caller can fall back.
    pub async fn extract(&self, title: &str) -> Result<Vec<Entity>> {
        let prompt = build_prompt(title);

        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            format: Some("json"),
        };

        let url = format!("{}/api/generate", self.config.url);

        debug!(title = %title, "Requesting entity extraction");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to call Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned status {}: {}", status, body);
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to decode Ollama response")?;

        parse_entities(&ollama_response.response)
    }
}

/// Find the first entity whose uppercased type contains `wanted`
pub fn find_entity<'a>(entities: &'a [Entity], wanted: &str) -> Option<&'a Entity> {
    entities
        .iter()
        .find(|e| e.entity_type.to_uppercase().contains(wanted))
}

fn build_prompt(title: &str) -> String {
    format!(
        r#"Extract named entities from this torrent title and return ONLY a JSON object with an "entities" array. No explanations, no text, ONLY JSON.

Schema:
{{
  "entities": [
    {{
      "text": "string",
      "type": "FILM TITLE|YEAR|RESOLUTION|VIDEO FORMAT",
      "confidence": 0.95
    }}
  ]
}}

Torrent title: {title}

JSON output:"#
    )
}

/// Parse the model's reply tolerantly: either an object with an "entities"
/// array or a bare array is accepted. Empty replies are extraction failures.
fn parse_entities(body: &str) -> Result<Vec<Entity>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        warn!("LLM returned empty response, treating as extraction failure");
        anyhow::bail!("LLM returned empty response");
    }

    if let Ok(entities) = serde_json::from_str::<Vec<Entity>>(trimmed) {
        return Ok(entities);
    }

    match serde_json::from_str::<EntityExtractionResponse>(trimmed) {
        Ok(resp) => Ok(resp.entities),
        Err(e) => {
            warn!(error = %e, response = %trimmed, "LLM returned invalid JSON");
            Err(anyhow::anyhow!("LLM returned invalid JSON: {}", e))
        }
    }
}
