//! Matching logic and external service integrations

pub mod fuzzy;
pub mod llm_supervisor;
pub mod ollama;
pub mod sms;
pub mod text;

pub use ollama::{Entity, EntityExtractor, OllamaConfig};
pub use sms::SmsNotifier;
