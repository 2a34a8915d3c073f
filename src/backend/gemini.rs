//! Gemini `generateContent` image backend

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::backend::traits::{
    Content, GenerationCall, GenerationResponse, GeneratorStatus, ImageConfig, ImageGenerator,
};
use crate::config::ModelConfig;
use crate::error::{AppError, Result};

const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    generation_config: WireGenerationConfig<'a>,
    safety_settings: Vec<SafetySetting<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig<'a> {
    response_modalities: [&'static str; 2],
    image_config: &'a ImageConfig,
}

#[derive(Debug, Clone, Serialize)]
struct SafetySetting<'a> {
    category: &'static str,
    threshold: &'a str,
}

/// Image generator speaking the Gemini REST contract
pub struct GeminiGenerator {
    name: String,
    model: String,
    endpoint: String,
    client: Client,
    api_key: Option<String>,
    harm_block_threshold: String,
    enabled: bool,
}

impl GeminiGenerator {
    /// Create a new generator from a model variant configuration
    pub fn new(config: &ModelConfig, harm_block_threshold: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
            api_key: config.resolve_api_key(),
            harm_block_threshold: harm_block_threshold.to_string(),
            enabled: config.enabled,
        })
    }

    fn url_for(&self, model: &str) -> String {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        format!("{}/{}:generateContent", self.endpoint, model_path)
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert(HeaderName::from_static("x-goog-api-key"), value);
            }
        }

        headers
    }

    fn build_payload<'a>(&'a self, call: &'a GenerationCall) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: call.parts.clone(),
            }],
            generation_config: WireGenerationConfig {
                response_modalities: ["TEXT", "IMAGE"],
                image_config: &call.image_config,
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: *category,
                    threshold: &self.harm_block_threshold,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn generate(&self, call: &GenerationCall) -> Result<GenerationResponse> {
        let url = self.url_for(&call.model);
        debug!(
            variant = %self.name,
            model = %call.model,
            parts = call.parts.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&self.build_payload(call))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BackendError(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        response.json::<GenerationResponse>().await.map_err(|e| {
            error!(variant = %self.name, error = %e, "Failed to parse generateContent response");
            AppError::BackendError(format!("Failed to parse response: {}", e))
        })
    }

    fn status(&self) -> GeneratorStatus {
        GeneratorStatus {
            name: self.name.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            enabled: self.enabled,
            has_credentials: self.api_key.is_some(),
        }
    }
}
