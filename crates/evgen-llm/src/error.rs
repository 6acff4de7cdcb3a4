use thiserror::Error;

use crate::transport::TransportError;
use crate::wire::{FinishReason, Usage};

/// Failures that abort a whole generation attempt.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion request failed ({}): {detail}", status_label(.status))]
    Transport { status: Option<u16>, detail: String },
    #[error("completion service returned an empty body")]
    EmptyResponse,
    #[error("completion returned no choices")]
    NoChoices,
    #[error(
        "completion content was blank (finish_reason: {}, usage: {})",
        finish_label(.finish_reason),
        usage_label(.usage)
    )]
    BlankContent {
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
    #[error("model reply is not valid JSON: {0}")]
    MalformedPayload(#[source] serde_json::Error),
    #[error("model reply has no \"events\" field")]
    MissingEventsField,
    #[error("\"events\" could not be decoded: {0}")]
    UndecodableEvents(#[source] serde_json::Error),
}

impl From<TransportError> for GenerationError {
    fn from(err: TransportError) -> Self {
        let status = match &err {
            TransportError::Decode { status, .. } => Some(*status),
            _ => None,
        };
        GenerationError::Transport {
            status,
            detail: err.to_string(),
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no response".to_string(),
    }
}

fn finish_label(reason: &Option<FinishReason>) -> &'static str {
    reason.map(FinishReason::as_str).unwrap_or("none")
}

fn usage_label(usage: &Option<Usage>) -> String {
    match usage {
        Some(u) => format!(
            "prompt={} completion={} total={}",
            u.prompt_tokens, u.completion_tokens, u.total_tokens
        ),
        None => "unknown".to_string(),
    }
}
