//! Fashion Generation Orchestrator
//!
//! Turns a high-level fashion request (re-pose, try-on, model creation,
//! concept copy) into a batch of calls to a multimodal image model, with
//! whole-batch retries, moderation reporting and provenance recording.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use error::{AppError, Result};

use std::sync::Arc;
use tokio::sync::RwLock;

use backend::GeneratorRegistry;
use orchestrator::Orchestrator;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<RwLock<config::Settings>>,
    pub registry: Arc<GeneratorRegistry>,
    pub orchestrator: Arc<Orchestrator>,
}
