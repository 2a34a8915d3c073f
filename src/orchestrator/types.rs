//! Request, image reference and result types

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::backend::InlineData;
use crate::error::{AppError, Result};

/// Transformation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationMode {
    RePose,
    TryOn,
    CreateModel,
    CopyConcept,
}

impl GenerationMode {
    pub const ALL: [GenerationMode; 4] = [
        GenerationMode::RePose,
        GenerationMode::TryOn,
        GenerationMode::CreateModel,
        GenerationMode::CopyConcept,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::RePose => "Re-pose",
            GenerationMode::TryOn => "Virtual try-on",
            GenerationMode::CreateModel => "Create model",
            GenerationMode::CopyConcept => "Copy concept",
        }
    }

    pub fn requires_secondary(&self) -> bool {
        matches!(self, GenerationMode::TryOn | GenerationMode::CopyConcept)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            GenerationMode::RePose => "RE_POSE",
            GenerationMode::TryOn => "TRY_ON",
            GenerationMode::CreateModel => "CREATE_MODEL",
            GenerationMode::CopyConcept => "COPY_CONCEPT",
        };
        f.write_str(tag)
    }
}

/// A user-supplied image in any of its accepted forms
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    /// HTTP(S) URL fetched at encode time
    Url(String),
    /// Self-describing `data:<media-type>;base64,<payload>` string
    Encoded(String),
    /// Already in wire form, e.g. a previously generated image
    Inline(InlineData),
    /// Raw image bytes of unknown type
    Raw(Vec<u8>),
}

impl ImageRef {
    /// Classify a textual image source.
    ///
    /// Anything that is neither a URL nor a data URL is kept as an encoded
    /// payload and resolved to the default media type by the codec.
    pub fn from_source(source: impl Into<String>) -> Self {
        let source = source.into();
        let trimmed = source.trim();
        let lower = trimmed.get(..8).unwrap_or(trimmed).to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageRef::Url(trimmed.to_string())
        } else {
            ImageRef::Encoded(trimmed.to_string())
        }
    }
}

impl From<InlineData> for ImageRef {
    fn from(inline: InlineData) -> Self {
        ImageRef::Inline(inline)
    }
}

/// One top-level generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    pub primary_image: Option<ImageRef>,
    pub secondary_image: Option<ImageRef>,
    pub user_prompt: String,
    /// Relaxes pose fidelity (TRY_ON only)
    pub flexible_mode: bool,
    /// Disables identity propagation (CREATE_MODEL only)
    pub random_face: bool,
    pub batch_size: u32,
    pub aspect_ratio: Option<String>,
    pub resolution_hint: Option<String>,
    pub model_variant: Option<String>,
}

impl GenerationRequest {
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            mode,
            primary_image: None,
            secondary_image: None,
            user_prompt: String::new(),
            flexible_mode: false,
            random_face: false,
            batch_size: 1,
            aspect_ratio: None,
            resolution_hint: None,
            model_variant: None,
        }
    }

    pub fn with_primary(mut self, image: ImageRef) -> Self {
        self.primary_image = Some(image);
        self
    }

    pub fn with_secondary(mut self, image: ImageRef) -> Self {
        self.secondary_image = Some(image);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = prompt.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flexible_mode(mut self, flexible: bool) -> Self {
        self.flexible_mode = flexible;
        self
    }

    pub fn with_random_face(mut self, random_face: bool) -> Self {
        self.random_face = random_face;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn with_model_variant(mut self, variant: impl Into<String>) -> Self {
        self.model_variant = Some(variant.into());
        self
    }

    /// Trimmed user prompt, `None` when blank
    pub fn override_text(&self) -> Option<&str> {
        Some(self.user_prompt.trim()).filter(|p| !p.is_empty())
    }

    /// Check image roles and batch bounds for this mode
    pub fn validate(&self, max_batch_size: u32) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::InvalidRequest(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.batch_size > max_batch_size {
            return Err(AppError::InvalidRequest(format!(
                "batch size {} exceeds the maximum of {}",
                self.batch_size, max_batch_size
            )));
        }
        if self.primary_image.is_none() {
            return Err(AppError::InvalidRequest(format!(
                "{} requires a primary image",
                self.mode
            )));
        }
        if self.mode.requires_secondary() && self.secondary_image.is_none() {
            return Err(AppError::InvalidRequest(format!(
                "{} requires a secondary image",
                self.mode
            )));
        }
        Ok(())
    }
}

/// First generated image of a CREATE_MODEL batch, steering later items
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityReference {
    image: ImageRef,
}

impl IdentityReference {
    pub fn new(image: InlineData) -> Self {
        Self {
            image: ImageRef::Inline(image),
        }
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }
}

/// One produced image with the variation index it was compiled for
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub index: u32,
    pub image: InlineData,
}

/// Non-empty, generation-ordered output of one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    images: Vec<GeneratedImage>,
}

impl BatchResult {
    /// Build a result; `None` for an empty list
    pub fn new(images: Vec<GeneratedImage>) -> Option<Self> {
        if images.is_empty() {
            None
        } else {
            Some(Self { images })
        }
    }

    pub fn images(&self) -> &[GeneratedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn into_images(self) -> Vec<GeneratedImage> {
        self.images
    }
}
