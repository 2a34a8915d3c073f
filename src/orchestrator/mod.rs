//! Generation orchestration core
//!
//! Control flow for one request: [`Orchestrator`] validates and resolves the
//! model variant, [`RetryMachine`] runs up to three attempts, each attempt is a
//! [`BatchController`] pass that compiles prompts, encodes images and calls the
//! remote capability. Successful batches go to the [`ProvenanceSink`].

pub mod batch;
pub mod codec;
pub mod events;
pub mod prompt;
pub mod provenance;
pub mod retry;
pub mod safety;
pub mod service;
pub mod types;

pub use batch::{AttemptState, BatchController, BatchRunner};
pub use codec::ImageCodec;
pub use events::{ChannelObserver, GenerationEvent, GenerationObserver, RecordingObserver, RetryStatus};
pub use provenance::{HistoryItem, InMemoryHistory, ProvenanceRecord, ProvenanceSink};
pub use retry::{RetryMachine, RetryPolicy, RetryState, MAX_ATTEMPTS};
pub use safety::{InMemorySafetyTracker, SafetyDirective, SafetyTracker, ViolationEvent};
pub use service::Orchestrator;
pub use types::{
    BatchResult, GeneratedImage, GenerationMode, GenerationRequest, IdentityReference, ImageRef,
};
