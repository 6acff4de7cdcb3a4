use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use evgen_llm::{CompletionClientConfig, EventGenerator, GeneratorSettings, HttpCompletionClient};
use evgen_store::{FileEventStore, ProfileDirectory};

use crate::gate::GatePolicy;
use crate::orchestrator::GenerationOrchestrator;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub client: CompletionClientConfig,
    pub generator: GeneratorSettings,
    pub events_file: PathBuf,
    pub gate: GatePolicy,
}

impl PipelineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = CompletionClientConfig::default();
        let client = CompletionClientConfig {
            base_url: lookup("EVGEN_API_BASE_URL").unwrap_or(defaults.base_url),
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            timeout: lookup("EVGEN_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: lookup("EVGEN_USER_AGENT").or(defaults.user_agent),
            max_concurrency: defaults.max_concurrency,
        };

        let mut generator = GeneratorSettings::default();
        if let Some(model) = lookup("EVGEN_MODEL") {
            generator.model = model;
        }
        if let Some(budget) = lookup("EVGEN_MAX_COMPLETION_TOKENS").and_then(|v| v.trim().parse().ok()) {
            generator.max_completion_tokens = budget;
        }

        let gate = match lookup("EVGEN_GATE_CONFIG") {
            Some(path) => GatePolicy::from_yaml_file(&path)
                .with_context(|| format!("EVGEN_GATE_CONFIG={path}"))?,
            None => GatePolicy::default(),
        }
        .with_overrides(&lookup);

        Ok(Self {
            client,
            generator,
            events_file: lookup("EVGEN_EVENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/events.json")),
            gate,
        })
    }

    pub fn build_generator(&self) -> anyhow::Result<EventGenerator> {
        let client = HttpCompletionClient::new(self.client.clone())?;
        Ok(EventGenerator::new(Arc::new(client), self.generator.clone()))
    }

    /// HTTP-backed generator with events stored in `events_file`.
    pub fn build_orchestrator(
        &self,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> anyhow::Result<GenerationOrchestrator> {
        Ok(GenerationOrchestrator::new(
            self.gate,
            self.build_generator()?,
            profiles,
            Arc::new(FileEventStore::new(self.events_file.clone())),
        ))
    }
}

pub fn build_orchestrator_from_env(
    profiles: Arc<dyn ProfileDirectory>,
) -> anyhow::Result<GenerationOrchestrator> {
    PipelineConfig::from_env()?.build_orchestrator(profiles)
}
