//! Lenient decoding of the model's text reply into domain events.

use std::sync::Arc;

use evgen_core::{
    BuiltinTags, CandidateRecord, DomainEvent, GenerationOutcome, TagResolver, ValidationFailure,
};
use serde_json::Value as JsonValue;

use crate::validate::validate;
use crate::GenerationError;

/// Removes a surrounding Markdown code fence (with or without a language tag).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

#[derive(Clone)]
pub struct ResponseParser {
    tags: Arc<dyn TagResolver>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinTags))
    }
}

impl ResponseParser {
    pub fn new(tags: Arc<dyn TagResolver>) -> Self {
        Self { tags }
    }

    /// Decodes `{"events": [...]}` and partitions the records into valid
    /// events and per-record failures. Only a missing or undecodable
    /// `events` field (or non-JSON text) fails the whole reply.
    pub fn parse_events(&self, raw: &str) -> Result<GenerationOutcome, GenerationError> {
        let text = strip_code_fences(raw);
        let mut payload: JsonValue =
            serde_json::from_str(text).map_err(GenerationError::MalformedPayload)?;
        let events = payload
            .as_object_mut()
            .and_then(|fields| fields.remove("events"))
            .ok_or(GenerationError::MissingEventsField)?;
        let candidates: Vec<CandidateRecord> =
            serde_json::from_value(events).map_err(GenerationError::UndecodableEvents)?;

        let mut outcome = GenerationOutcome::default();
        for candidate in candidates {
            match validate(&candidate) {
                Ok(valid) => {
                    let tags = candidate
                        .tags
                        .iter()
                        .filter_map(|name| self.tags.resolve(name))
                        .collect();
                    outcome.events.push(DomainEvent::generated(
                        candidate.title,
                        candidate.description,
                        valid.date,
                        tags,
                        valid.location,
                    ));
                }
                Err(reason) => outcome.failures.push(ValidationFailure { candidate, reason }),
            }
        }
        Ok(outcome)
    }
}

pub fn parse_events(raw: &str) -> Result<GenerationOutcome, GenerationError> {
    ResponseParser::default().parse_events(raw)
}
