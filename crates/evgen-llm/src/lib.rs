//! Schema-constrained event generation against a chat-completion service.
//!
//! Flow: [`prompt`] builds the messages, [`generator`] sends them with the
//! [`schema`] constraint through a [`transport`], and [`parser`] turns the
//! reply into validated events, collecting per-record rejections from
//! [`validate`] instead of failing the batch.

pub mod error;
pub mod generator;
pub mod parser;
pub mod prompt;
pub mod schema;
pub mod transport;
pub mod validate;
pub mod wire;

pub use error::GenerationError;
pub use generator::{EventGenerator, GeneratorSettings, DEFAULT_MAX_COMPLETION_TOKENS, DEFAULT_MODEL};
pub use parser::{parse_events, strip_code_fences, ResponseParser};
pub use prompt::{build_messages, build_system_message, build_user_message, build_user_message_at};
pub use schema::{event_response_schema, response_format};
pub use transport::{
    CompletionClientConfig, CompletionReply, CompletionTransport, HttpCompletionClient, TransportError,
};
pub use validate::{parse_local_date_time, validate, ValidRecord};
pub use wire::{
    ChatMessage, ChatRole, Choice, CompletionRequest, CompletionResponse, FinishReason, ResponseFormat, Usage,
};

pub const CRATE_NAME: &str = "evgen-llm";
