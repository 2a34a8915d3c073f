//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::backend::GeneratorStatus;
use crate::orchestrator::{GeneratedImage, GenerationMode, GenerationRequest, HistoryItem, ImageRef};

/// Generation request body
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct GenerateRequest {
    /// Transformation mode
    pub mode: GenerationMode,

    /// Primary image: URL, data URL or bare base64 payload
    #[serde(default)]
    pub primary_image: Option<String>,

    /// Secondary image (outfit for TRY_ON, concept for COPY_CONCEPT)
    #[serde(default)]
    pub secondary_image: Option<String>,

    /// Free-text override instruction
    #[serde(default)]
    pub prompt: String,

    /// Relax pose fidelity (TRY_ON only)
    #[serde(default)]
    pub flexible_mode: bool,

    /// Give every image a different face (CREATE_MODEL only)
    #[serde(default)]
    pub random_face: bool,

    /// Number of images to generate
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Aspect ratio such as "3:4", passed through verbatim
    #[serde(default)]
    pub aspect_ratio: Option<String>,

    /// Resolution hint such as "2K", passed through verbatim
    #[serde(default)]
    pub resolution: Option<String>,

    /// Model variant label (uses the default if not specified)
    #[serde(default)]
    pub model: Option<String>,
}

fn default_batch_size() -> u32 {
    1
}

impl GenerateRequest {
    /// Convert into the core request type
    pub fn into_generation_request(self) -> GenerationRequest {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());

        GenerationRequest {
            mode: self.mode,
            primary_image: non_empty(self.primary_image).map(ImageRef::from_source),
            secondary_image: non_empty(self.secondary_image).map(ImageRef::from_source),
            user_prompt: self.prompt,
            flexible_mode: self.flexible_mode,
            random_face: self.random_face,
            batch_size: self.batch_size,
            aspect_ratio: non_empty(self.aspect_ratio),
            resolution_hint: non_empty(self.resolution),
            model_variant: non_empty(self.model),
        }
    }
}

/// One generated image
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ImageData {
    /// Variation index the image was compiled for
    pub index: u32,
    pub mime_type: String,
    pub b64_json: String,
}

impl From<&GeneratedImage> for ImageData {
    fn from(image: &GeneratedImage) -> Self {
        Self {
            index: image.index,
            mime_type: image.image.mime_type.clone(),
            b64_json: image.image.data.clone(),
        }
    }
}

/// History record of a successful batch
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HistoryItemResponse {
    pub id: String,
    /// Unix timestamp of creation
    pub created: i64,
    pub mode: GenerationMode,
    pub requested: u32,
    pub images: Vec<ImageData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub prompt: String,
    pub model: String,
}

impl From<&HistoryItem> for HistoryItemResponse {
    fn from(item: &HistoryItem) -> Self {
        Self {
            id: item.id.to_string(),
            created: item.created_at.timestamp(),
            mode: item.mode,
            requested: item.requested,
            images: item.images.iter().map(ImageData::from).collect(),
            thumbnail: item.thumbnail.clone(),
            prompt: item.prompt.clone(),
            model: item.model_variant.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HistoryListResponse {
    pub items: Vec<HistoryItemResponse>,
}

/// Model variant information
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelInfo {
    pub name: String,
    pub model: String,
    pub enabled: bool,
    pub default: bool,
    pub has_credentials: bool,
}

impl ModelInfo {
    pub fn from_status(status: GeneratorStatus, default_variant: &str) -> Self {
        Self {
            default: status.name == default_variant,
            name: status.name,
            model: status.model,
            enabled: status.enabled,
            has_credentials: status.has_credentials,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ModelListResponse {
    pub models: Vec<ModelInfo>,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models: usize,
    /// Largest accepted `batch_size`
    pub max_batch_size: u32,
}

/// Payload of `status` stream events
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct StatusEventData {
    pub message: String,
}

/// Payload of `item` stream events
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ItemEventData {
    pub attempt: u32,
    pub image: ImageData,
}

/// Payload of `cleared` stream events
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ClearedEventData {
    pub attempt: u32,
}

/// Payload of `error` stream events
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErrorEventData {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}
