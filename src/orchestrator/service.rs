//! Top-level generation service tying the core components together

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::backend::{GeneratorRegistry, GeneratorStatus};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::orchestrator::batch::BatchController;
use crate::orchestrator::codec::ImageCodec;
use crate::orchestrator::events::GenerationObserver;
use crate::orchestrator::provenance::{HistoryItem, InMemoryHistory, ProvenanceRecord, ProvenanceSink};
use crate::orchestrator::retry::{RetryMachine, RetryPolicy};
use crate::orchestrator::safety::{InMemorySafetyTracker, SafetyTracker};
use crate::orchestrator::types::GenerationRequest;

/// Orchestrates one request end to end: validation, retries, provenance
pub struct Orchestrator {
    registry: Arc<GeneratorRegistry>,
    codec: ImageCodec,
    safety: Arc<dyn SafetyTracker>,
    provenance: Arc<dyn ProvenanceSink>,
    retry: RetryMachine,
    max_batch_size: u32,
    default_aspect_ratio: String,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<GeneratorRegistry>,
        codec: ImageCodec,
        safety: Arc<dyn SafetyTracker>,
        provenance: Arc<dyn ProvenanceSink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            codec,
            safety,
            provenance,
            retry: RetryMachine::new(retry),
            max_batch_size: 4,
            default_aspect_ratio: "3:4".to_string(),
        }
    }

    pub fn with_limits(mut self, max_batch_size: u32, default_aspect_ratio: impl Into<String>) -> Self {
        self.max_batch_size = max_batch_size;
        self.default_aspect_ratio = default_aspect_ratio.into();
        self
    }

    /// Build the service and its in-memory collaborators from settings
    pub fn from_settings(settings: &Settings, registry: Arc<GeneratorRegistry>) -> Result<Self> {
        let codec = ImageCodec::new(Duration::from_millis(settings.generation.fetch_timeout_ms))?;
        let safety = Arc::new(InMemorySafetyTracker::new(settings.safety.max_warnings));
        let provenance = Arc::new(InMemoryHistory::new(settings.history.capacity));

        Ok(Self::new(
            registry,
            codec,
            safety,
            provenance,
            RetryPolicy::from_config(&settings.retry),
        )
        .with_limits(
            settings.generation.max_batch_size,
            settings.generation.default_aspect_ratio.clone(),
        ))
    }

    /// Run a request to completion and hand the batch to the provenance sink
    #[instrument(skip_all, fields(owner = %owner, mode = %request.mode, batch_size = request.batch_size))]
    pub async fn generate(
        &self,
        owner: &str,
        mut request: GenerationRequest,
        observer: &mut dyn GenerationObserver,
    ) -> Result<HistoryItem> {
        request.validate(self.max_batch_size)?;

        if self.safety.is_suspended(owner).await? {
            return Err(AppError::AccountSuspended(format!(
                "account '{}' is suspended",
                owner
            )));
        }

        if request.aspect_ratio.is_none() {
            request.aspect_ratio = Some(self.default_aspect_ratio.clone());
        }

        let generator = self.registry.resolve(request.model_variant.as_deref())?;
        let controller = BatchController::new(
            generator.as_ref(),
            &self.codec,
            self.safety.as_ref(),
            owner,
        );

        let batch = self.retry.run(&controller, &request, observer).await?;
        info!(images = batch.len(), variant = %generator.name(), "Generation complete");

        let record = ProvenanceRecord::new(
            owner,
            request.mode,
            batch,
            request.batch_size,
            request.primary_image.clone(),
            &request.user_prompt,
            generator.name(),
        );
        self.provenance.record(record).await
    }

    pub async fn history(&self, owner: &str) -> Result<Vec<HistoryItem>> {
        self.provenance.history(owner).await
    }

    pub fn models(&self) -> Vec<GeneratorStatus> {
        self.registry.list()
    }

    pub fn default_model(&self) -> &str {
        self.registry.default_variant()
    }
}
