use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use evgen_core::{ContextConfig, DomainEvent, GenerationQuery, TaskConfig, ViewportSnapshot};
use evgen_llm::{EventGenerator, GenerationError};
use evgen_store::{EventRepository, ProfileDirectory, StoreError};
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

use crate::gate::{GatePolicy, GateVerdict};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("profile lookup failed: {0}")]
    Profile(#[source] StoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("persisting generated event failed: {0}")]
    Store(#[source] StoreError),
}

/// Gate, generate, persist.
pub struct GenerationOrchestrator {
    gate: GatePolicy,
    generator: EventGenerator,
    profiles: Arc<dyn ProfileDirectory>,
    events: Arc<dyn EventRepository>,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the user from the in-flight set when dropped, including when the
/// surrounding future is cancelled.
struct InFlightGuard<'a> {
    users: &'a Mutex<HashSet<String>>,
    user_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

impl GenerationOrchestrator {
    pub fn new(
        gate: GatePolicy,
        generator: EventGenerator,
        profiles: Arc<dyn ProfileDirectory>,
        events: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            gate,
            generator,
            profiles,
            events,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn gate(&self) -> &GatePolicy {
        &self.gate
    }

    fn try_begin(&self, user_id: &str) -> Option<InFlightGuard<'_>> {
        let mut users = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !users.insert(user_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            users: &self.in_flight,
            user_id: user_id.to_string(),
        })
    }

    /// Runs one gated generation for `user_id` and stores the results.
    /// Returns an empty list whenever generation is skipped.
    pub async fn maybe_generate(
        &self,
        user_id: &str,
        viewport: Option<&ViewportSnapshot>,
        existing_count: usize,
        last_generation: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, PipelineError> {
        let Some(viewport) = viewport else {
            return Ok(Vec::new());
        };

        let verdict = self.gate.evaluate(
            viewport.user_location,
            viewport.camera_center,
            viewport.zoom,
            existing_count,
            last_generation,
            now,
        );
        if let GateVerdict::Reject(reason) = verdict {
            debug!(user = user_id, %reason, "generation gated");
            return Ok(Vec::new());
        }

        let Some(_guard) = self.try_begin(user_id) else {
            debug!(user = user_id, "generation already in flight");
            return Ok(Vec::new());
        };

        let span = info_span!("maybe_generate", user = user_id);
        self.generate_and_store(user_id, viewport).instrument(span).await
    }

    async fn generate_and_store(
        &self,
        user_id: &str,
        viewport: &ViewportSnapshot,
    ) -> Result<Vec<DomainEvent>, PipelineError> {
        let profile = self
            .profiles
            .get_user(user_id)
            .await
            .map_err(PipelineError::Profile)?;
        let query = GenerationQuery::new(profile)
            .with_task(TaskConfig::default())
            .with_context(ContextConfig::from_viewport(viewport));

        let events = self.generator.generate_events(&query).await?;
        for event in &events {
            self.events
                .add_event(event.clone())
                .await
                .map_err(PipelineError::Store)?;
        }
        info!(count = events.len(), "stored generated events");
        Ok(events)
    }
}
