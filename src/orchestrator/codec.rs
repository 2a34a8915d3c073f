//! Image reference codec: turns any accepted image form into inline wire data

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::InlineData;
use crate::error::{AppError, Result};
use crate::orchestrator::types::ImageRef;

/// Media type assumed when nothing better is known
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Stateless encoder; the only side effect is fetching URL sources
#[derive(Clone)]
pub struct ImageCodec {
    client: Client,
}

impl ImageCodec {
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Encode a reference. Only unreachable URLs fail.
    pub async fn encode(&self, image: &ImageRef) -> Result<InlineData> {
        match image {
            ImageRef::Url(url) => self.fetch(url).await,
            ImageRef::Encoded(encoded) => Ok(decode_data_url(encoded)),
            ImageRef::Inline(inline) => Ok(inline.clone()),
            ImageRef::Raw(bytes) => Ok(InlineData::new(sniff_mime_type(bytes), STANDARD.encode(bytes))),
        }
    }

    async fn fetch(&self, url: &str) -> Result<InlineData> {
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Image fetch failed");
            AppError::UnreachableSource(format!("{}: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Image fetch returned non-success status");
            return Err(AppError::UnreachableSource(format!(
                "{} returned {}",
                url, status
            )));
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());

        let body = response.bytes().await.map_err(|e| {
            AppError::UnreachableSource(format!("{}: failed to read body: {}", url, e))
        })?;

        let mime_type = match header_type {
            Some(t) if t.starts_with("image/") => t,
            _ => sniff_mime_type(&body).to_string(),
        };

        debug!(url = %url, mime_type = %mime_type, bytes = body.len(), "Fetched image source");
        Ok(InlineData::new(mime_type, STANDARD.encode(&body)))
    }
}

/// Split a data URL, falling back to the default media type on any malformed prefix
pub fn decode_data_url(encoded: &str) -> InlineData {
    let encoded = encoded.trim();

    if let Some(rest) = encoded.strip_prefix("data:") {
        if let Some((header, payload)) = rest.split_once(',') {
            let mut params = header.split(';');
            let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
            let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

            if media_type.starts_with("image/") && is_base64 {
                return InlineData::new(media_type, payload.trim());
            }
            debug!(
                media_type = %media_type,
                base64 = is_base64,
                "Unsupported data URL prefix, using default media type"
            );
            return InlineData::new(DEFAULT_MIME_TYPE, payload.trim());
        }
        debug!("Data URL without payload separator, using default media type");
    }

    InlineData::new(DEFAULT_MIME_TYPE, encoded)
}

/// Guess the media type from magic numbers
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        DEFAULT_MIME_TYPE
    }
}
