//! Batch iteration controller and per-request attempt state

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::{GenerationCall, ImageConfig, ImageGenerator, InlineData, Part, ResponseOutcome};
use crate::error::{AppError, Result};
use crate::orchestrator::codec::ImageCodec;
use crate::orchestrator::events::GenerationObserver;
use crate::orchestrator::prompt;
use crate::orchestrator::safety::{SafetyDirective, SafetyTracker, ViolationEvent};
use crate::orchestrator::types::{
    BatchResult, GeneratedImage, GenerationMode, GenerationRequest, IdentityReference,
};

/// Transient state of one top-level call; never shared between calls
#[derive(Debug, Default)]
pub struct AttemptState {
    attempt_index: u32,
    accumulated: Vec<GeneratedImage>,
    identity: Option<IdentityReference>,
}

impl AttemptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    /// Images produced by the current attempt so far
    pub fn accumulated(&self) -> &[GeneratedImage] {
        &self.accumulated
    }

    pub fn identity(&self) -> Option<&IdentityReference> {
        self.identity.as_ref()
    }

    /// Append a produced image to the current attempt
    pub fn push(&mut self, image: GeneratedImage) {
        self.accumulated.push(image);
    }

    pub fn set_identity(&mut self, identity: IdentityReference) {
        self.identity = Some(identity);
    }

    /// Move to the next attempt, dropping everything the previous one produced
    pub fn advance(&mut self) {
        self.attempt_index += 1;
        self.accumulated.clear();
        self.identity = None;
    }
}

/// Runs one full attempt over a batch
#[async_trait]
pub trait BatchRunner: Send + Sync {
    async fn run_batch(
        &self,
        request: &GenerationRequest,
        state: &mut AttemptState,
        observer: &mut dyn GenerationObserver,
    ) -> Result<BatchResult>;
}

/// Drives sequential calls to the remote capability for one attempt
pub struct BatchController<'a> {
    generator: &'a dyn ImageGenerator,
    codec: &'a ImageCodec,
    safety: &'a dyn SafetyTracker,
    owner: &'a str,
}

impl<'a> BatchController<'a> {
    pub fn new(
        generator: &'a dyn ImageGenerator,
        codec: &'a ImageCodec,
        safety: &'a dyn SafetyTracker,
        owner: &'a str,
    ) -> Self {
        Self {
            generator,
            codec,
            safety,
            owner,
        }
    }

    /// Compile, encode and send one item
    async fn run_item(
        &self,
        request: &GenerationRequest,
        index: u32,
        identity: Option<&IdentityReference>,
    ) -> Result<InlineData> {
        let compiled = prompt::compile(request, index, identity)?;

        let mut parts = Vec::with_capacity(compiled.images.len() + 1);
        for slot in &compiled.images {
            parts.push(Part::image(self.codec.encode(slot.source).await?));
        }
        parts.push(Part::text(compiled.instruction));

        let call = GenerationCall {
            model: self.generator.model().to_string(),
            parts,
            image_config: ImageConfig {
                aspect_ratio: request.aspect_ratio.clone(),
                image_size: request.resolution_hint.clone(),
            },
        };

        let response = self.generator.generate(&call).await?;
        match response.outcome() {
            ResponseOutcome::Image(image) => Ok(image),
            ResponseOutcome::Empty(reason) => Err(AppError::BackendError(reason)),
            ResponseOutcome::Moderated(reason) => {
                let event = ViolationEvent {
                    owner: self.owner.to_string(),
                    mode: request.mode,
                    reason: reason.clone(),
                    variation_index: index,
                    occurred_at: Utc::now(),
                };
                match self.safety.report_violation(event).await? {
                    SafetyDirective::Continue { .. } => Err(AppError::ModerationRejected(reason)),
                    SafetyDirective::Suspend { reason } => Err(AppError::AccountSuspended(reason)),
                }
            }
        }
    }
}

fn captures_identity(request: &GenerationRequest, state: &AttemptState) -> bool {
    request.mode == GenerationMode::CreateModel && !request.random_face && state.identity.is_none()
}

#[async_trait]
impl BatchRunner for BatchController<'_> {
    async fn run_batch(
        &self,
        request: &GenerationRequest,
        state: &mut AttemptState,
        observer: &mut dyn GenerationObserver,
    ) -> Result<BatchResult> {
        let attempt = state.attempt_index;
        let mut last_error: Option<String> = None;
        let mut only_moderated = true;

        for index in 0..request.batch_size {
            let outcome = self.run_item(request, index, state.identity.as_ref()).await;

            match outcome {
                Ok(image) => {
                    let generated = GeneratedImage { index, image };
                    observer.on_item(attempt, &generated);

                    if captures_identity(request, state) {
                        debug!(attempt, index, "Captured identity reference");
                        state.set_identity(IdentityReference::new(generated.image.clone()));
                    }
                    state.push(generated);
                }
                Err(AppError::ModerationRejected(reason)) => {
                    warn!(attempt, index, mode = %request.mode, reason = %reason, "Batch item moderated");
                    last_error = Some(reason);
                }
                Err(e) if e.is_hard_stop() => return Err(e),
                Err(e) => {
                    // Per-item failures never abort the batch
                    warn!(
                        attempt,
                        index,
                        mode = %request.mode,
                        error = %e,
                        "Batch item failed"
                    );
                    last_error = Some(e.to_string());
                    only_moderated = false;
                }
            }
        }

        let produced = state.accumulated.len();
        match BatchResult::new(state.accumulated.clone()) {
            Some(batch) => {
                info!(
                    attempt,
                    produced,
                    requested = request.batch_size,
                    "Batch attempt finished"
                );
                Ok(batch)
            }
            None => Err(match last_error {
                // Moderated-only attempts are not retried
                Some(reason) if only_moderated => AppError::ModerationRejected(reason),
                Some(cause) => AppError::EmptyBatch(format!("No images were generated ({})", cause)),
                None => AppError::EmptyBatch("No images were generated".to_string()),
            }),
        }
    }
}
