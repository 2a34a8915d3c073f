//! Provenance hand-off and an in-memory history assembler

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::orchestrator::types::{BatchResult, GeneratedImage, GenerationMode, ImageRef};

/// Everything the core hands to the assembler after a successful batch
#[derive(Debug, Clone)]
pub struct ProvenanceRecord {
    pub owner: String,
    pub mode: GenerationMode,
    pub images: Vec<GeneratedImage>,
    pub requested: u32,
    pub primary_image: Option<ImageRef>,
    /// User prompt, or a placeholder when it was blank
    pub prompt: String,
    pub model_variant: String,
    pub created_at: DateTime<Utc>,
}

impl ProvenanceRecord {
    pub fn new(
        owner: impl Into<String>,
        mode: GenerationMode,
        batch: BatchResult,
        requested: u32,
        primary_image: Option<ImageRef>,
        user_prompt: &str,
        model_variant: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            mode,
            images: batch.into_images(),
            requested,
            primary_image,
            prompt: prompt_or_placeholder(mode, user_prompt),
            model_variant: model_variant.into(),
            created_at: Utc::now(),
        }
    }
}

/// Text recorded when the user gave no prompt
pub fn prompt_or_placeholder(mode: GenerationMode, user_prompt: &str) -> String {
    let trimmed = user_prompt.trim();
    if trimmed.is_empty() {
        format!("{} (no prompt)", mode.label())
    } else {
        trimmed.to_string()
    }
}

/// Only URL sources become thumbnails
fn thumbnail_for(image: &ImageRef) -> Option<String> {
    match image {
        ImageRef::Url(url) => Some(url.clone()),
        _ => None,
    }
}

/// A persisted history entry
#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub id: Uuid,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub mode: GenerationMode,
    pub images: Vec<GeneratedImage>,
    pub requested: u32,
    pub thumbnail: Option<String>,
    pub prompt: String,
    pub model_variant: String,
}

/// Receives successful batches; owns persistence, thumbnails and accounting
#[async_trait]
pub trait ProvenanceSink: Send + Sync {
    async fn record(&self, record: ProvenanceRecord) -> Result<HistoryItem>;

    async fn history(&self, owner: &str) -> Result<Vec<HistoryItem>>;
}

/// Bounded history kept in process memory, newest first
pub struct InMemoryHistory {
    items: RwLock<VecDeque<HistoryItem>>,
    capacity: usize,
}

impl InMemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ProvenanceSink for InMemoryHistory {
    async fn record(&self, record: ProvenanceRecord) -> Result<HistoryItem> {
        let item = HistoryItem {
            id: Uuid::new_v4(),
            owner: record.owner,
            created_at: record.created_at,
            mode: record.mode,
            images: record.images,
            requested: record.requested,
            thumbnail: record.primary_image.as_ref().and_then(thumbnail_for),
            prompt: record.prompt,
            model_variant: record.model_variant,
        };

        {
            let mut items = self.items.write();
            items.push_front(item.clone());
            items.truncate(self.capacity);
        }

        info!(
            id = %item.id,
            owner = %item.owner,
            mode = %item.mode,
            images = item.images.len(),
            "History item recorded"
        );
        Ok(item)
    }

    async fn history(&self, owner: &str) -> Result<Vec<HistoryItem>> {
        Ok(self
            .items
            .read()
            .iter()
            .filter(|item| item.owner == owner)
            .cloned()
            .collect())
    }
}
