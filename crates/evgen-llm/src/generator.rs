//! One request/response cycle against the completion service.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use evgen_core::{DomainEvent, GenerationOutcome, GenerationQuery};
use tracing::{debug, info, warn};

use crate::parser::ResponseParser;
use crate::prompt::build_messages;
use crate::schema::response_format;
use crate::transport::CompletionTransport;
use crate::wire::CompletionRequest;
use crate::GenerationError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub model: String,
    pub max_completion_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            temperature: None,
        }
    }
}

#[derive(Clone)]
pub struct EventGenerator {
    transport: Arc<dyn CompletionTransport>,
    parser: ResponseParser,
    settings: GeneratorSettings,
}

impl EventGenerator {
    pub fn new(transport: Arc<dyn CompletionTransport>, settings: GeneratorSettings) -> Self {
        Self {
            transport,
            parser: ResponseParser::default(),
            settings,
        }
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn build_request(&self, query: &GenerationQuery, today: NaiveDate) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: build_messages(query, today),
            temperature: self.settings.temperature,
            max_completion_tokens: Some(self.settings.max_completion_tokens),
            response_format: Some(response_format()),
        }
    }

    /// Single shot: exactly one transport call, no retries.
    pub async fn generate(&self, query: &GenerationQuery) -> Result<GenerationOutcome, GenerationError> {
        let request = self.build_request(query, Local::now().date_naive());
        let reply = self.transport.complete(&request).await?;

        if !reply.is_success() {
            return Err(GenerationError::Transport {
                status: Some(reply.status),
                detail: reply.error_text.unwrap_or_default(),
            });
        }
        let body = reply.body.ok_or(GenerationError::EmptyResponse)?;
        let usage = body.usage;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(GenerationError::NoChoices)?;
        if choice.message.content.trim().is_empty() {
            return Err(GenerationError::BlankContent {
                finish_reason: choice.finish_reason,
                usage,
            });
        }
        debug!(
            finish_reason = choice.finish_reason.map(|r| r.as_str()),
            total_tokens = usage.map(|u| u.total_tokens),
            "completion content received"
        );

        let outcome = self.parser.parse_events(&choice.message.content)?;
        info!(
            user = %query.profile.id,
            events = outcome.events.len(),
            rejected = outcome.failures.len(),
            "generation finished"
        );
        Ok(outcome)
    }

    /// Like [`generate`](Self::generate), logging and dropping rejected records.
    pub async fn generate_events(&self, query: &GenerationQuery) -> Result<Vec<DomainEvent>, GenerationError> {
        let outcome = self.generate(query).await?;
        for failure in &outcome.failures {
            warn!(title = %failure.candidate.title, reason = %failure.reason, "dropping generated record");
        }
        Ok(outcome.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CompletionReply, TransportError};
    use crate::wire::{ChatMessage, ChatRole, Choice, CompletionResponse, FinishReason, ResponseFormat, Usage};
    use async_trait::async_trait;
    use evgen_core::{Profile, Tag};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a canned reply and records the requests it saw.
    struct ScriptedTransport {
        reply: Mutex<Option<Result<CompletionReply, TransportError>>>,
        calls: AtomicUsize,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedTransport {
        fn replying(reply: CompletionReply) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(reply))),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn failing(err: TransportError) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Err(err))),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(TransportError::Closed))
        }
    }

    fn response_with(content: &str, finish: Option<FinishReason>, usage: Option<Usage>) -> CompletionResponse {
        CompletionResponse {
            id: "cmpl-test".into(),
            created: 1_742_586_000,
            model: DEFAULT_MODEL.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: content.into(),
                },
                finish_reason: finish,
            }],
            usage,
        }
    }

    fn query() -> GenerationQuery {
        GenerationQuery::new(Profile {
            id: "u-1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            country: "Switzerland".into(),
            description: "Enjoys rock concerts".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            interests: BTreeSet::from([Tag::Rock]),
        })
    }

    const PAYLOAD: &str = r#"{"events":[{"title":"Fake Rock Concert","description":"A generated test event","date":"2025-03-21T20:00","tags":["Rock","Music"],"location":{"latitude":46.52,"longitude":6.63}}]}"#;

    #[tokio::test]
    async fn request_carries_model_budget_and_schema() {
        let transport = ScriptedTransport::replying(CompletionReply::ok(response_with(PAYLOAD, Some(FinishReason::Stop), None)));
        let generator = EventGenerator::new(transport.clone(), GeneratorSettings::default());

        let events = generator.generate_events(&query()).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        let request = transport.last_request.lock().unwrap().clone().expect("request");
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.max_completion_tokens, Some(DEFAULT_MAX_COMPLETION_TOKENS));
        assert_eq!(request.temperature, None);
        assert_eq!(request.messages.len(), 2);
        assert!(matches!(request.response_format, Some(ResponseFormat::JsonSchema { .. })));
    }

    #[tokio::test]
    async fn error_status_becomes_transport_error() {
        let transport = ScriptedTransport::replying(CompletionReply::failed(500, "server exploded"));
        let generator = EventGenerator::new(transport, GeneratorSettings::default());

        let err = generator.generate(&query()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport { status: Some(500), .. }));
        let msg = err.to_string();
        assert!(msg.contains("500") && msg.contains("server exploded"), "{msg}");
    }

    #[tokio::test]
    async fn network_failure_is_normalized_to_transport_error() {
        let transport = ScriptedTransport::failing(TransportError::Closed);
        let generator = EventGenerator::new(transport, GeneratorSettings::default());

        let err = generator.generate(&query()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport { status: None, .. }));
    }

    #[tokio::test]
    async fn missing_body_is_an_empty_response() {
        let reply = CompletionReply {
            status: 200,
            body: None,
            error_text: None,
        };
        let generator = EventGenerator::new(ScriptedTransport::replying(reply), GeneratorSettings::default());
        let err = generator.generate(&query()).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn zero_choices_is_rejected() {
        let mut body = response_with(PAYLOAD, None, None);
        body.choices.clear();
        let generator = EventGenerator::new(ScriptedTransport::replying(CompletionReply::ok(body)), GeneratorSettings::default());
        let err = generator.generate(&query()).await.unwrap_err();
        assert!(matches!(err, GenerationError::NoChoices));
    }

    #[tokio::test]
    async fn blank_content_reports_finish_reason_and_usage() {
        let usage = Usage {
            prompt_tokens: 812,
            completion_tokens: 4096,
            total_tokens: 4908,
        };
        let body = response_with("  \n ", Some(FinishReason::Length), Some(usage));
        let generator = EventGenerator::new(ScriptedTransport::replying(CompletionReply::ok(body)), GeneratorSettings::default());

        let err = generator.generate(&query()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("length"), "{msg}");
        assert!(msg.contains("total=4908"), "{msg}");
    }

    #[tokio::test]
    async fn parser_fatal_errors_propagate() {
        let body = response_with(r#"{"foo":"bar"}"#, Some(FinishReason::Stop), None);
        let generator = EventGenerator::new(ScriptedTransport::replying(CompletionReply::ok(body)), GeneratorSettings::default());
        let err = generator.generate(&query()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingEventsField));
    }

    #[tokio::test]
    async fn generate_keeps_failures_while_generate_events_drops_them() {
        let payload = r#"{"events":[
            {"title":"Good","description":"d","date":"2025-03-21T20:00","tags":["Rock"],"location":{"latitude":46.5,"longitude":6.6}},
            {"title":"","description":"d","date":"2025-03-21T20:00","tags":[],"location":{"latitude":46.5,"longitude":6.6}}
        ]}"#;
        let generator = EventGenerator::new(
            ScriptedTransport::replying(CompletionReply::ok(response_with(payload, Some(FinishReason::Stop), None))),
            GeneratorSettings::default(),
        );
        let outcome = generator.generate(&query()).await.expect("outcome");
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.failures.len(), 1);

        let generator = EventGenerator::new(
            ScriptedTransport::replying(CompletionReply::ok(response_with(payload, Some(FinishReason::Stop), None))),
            GeneratorSettings::default(),
        );
        let events = generator.generate_events(&query()).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Good");
    }
}
