//! Remote generation capability contract and its wire types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Base64 image payload with its media type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Render as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One segment of a generation request or response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Image {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    /// Parts this crate does not interpret (thought signatures and the like)
    Other(serde_json::Value),
}

impl Part {
    pub fn image(inline_data: InlineData) -> Self {
        Part::Image { inline_data }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_image(&self) -> Option<&InlineData> {
        match self {
            Part::Image { inline_data } => Some(inline_data),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Output image configuration, passed through verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

/// A single call to the remote capability
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    pub model: String,
    pub parts: Vec<Part>,
    pub image_config: ImageConfig,
}

impl GenerationCall {
    /// Image parts in request order
    pub fn images(&self) -> Vec<&InlineData> {
        self.parts.iter().filter_map(Part::as_image).collect()
    }

    /// Concatenated instruction text
    pub fn instruction(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Content block of a candidate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One candidate output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Prompt-level feedback, present when the whole request was blocked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Response of the remote capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

const MODERATION_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
];

/// What a response amounts to for one batch item
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Image(InlineData),
    /// No image and a safety/prohibited reason
    Moderated(String),
    /// No image for any other reason
    Empty(String),
}

impl GenerationResponse {
    /// A response carrying exactly one image
    pub fn with_image(image: InlineData) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part::image(image)],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            prompt_feedback: None,
        }
    }

    /// A response with no image and the given finish reason
    pub fn finished(reason: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: None,
                finish_reason: Some(reason.into()),
            }],
            prompt_feedback: None,
        }
    }

    /// First inline image across all candidates
    pub fn first_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(Part::as_image)
            .filter(|image| !image.data.is_empty())
    }

    /// Classify this response
    pub fn outcome(&self) -> ResponseOutcome {
        if let Some(image) = self.first_image() {
            return ResponseOutcome::Image(image.clone());
        }

        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return ResponseOutcome::Moderated(reason.to_string());
        }

        let reason = self
            .candidates
            .iter()
            .find_map(|c| c.finish_reason.as_deref());

        match reason {
            Some(reason) if is_moderation_reason(reason) => {
                ResponseOutcome::Moderated(reason.to_string())
            }
            Some(reason) => ResponseOutcome::Empty(format!("no image returned (finish reason {})", reason)),
            None => ResponseOutcome::Empty("no image returned".to_string()),
        }
    }
}

pub fn is_moderation_reason(reason: &str) -> bool {
    let reason = reason.trim().to_ascii_uppercase();
    MODERATION_REASONS.contains(&reason.as_str())
}

/// Model variant status for listings
#[derive(Debug, Clone)]
pub struct GeneratorStatus {
    pub name: String,
    pub model: String,
    pub endpoint: String,
    pub enabled: bool,
    pub has_credentials: bool,
}

/// Trait for remote image generation capabilities
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Variant label recorded in history
    fn name(&self) -> &str;

    /// Model identifier sent upstream
    fn model(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Perform one generation call
    async fn generate(&self, call: &GenerationCall) -> Result<GenerationResponse>;

    fn status(&self) -> GeneratorStatus {
        GeneratorStatus {
            name: self.name().to_string(),
            model: self.model().to_string(),
            endpoint: String::new(),
            enabled: self.is_enabled(),
            has_credentials: true,
        }
    }
}
