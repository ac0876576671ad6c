//! Remote image cleanup: send one photograph, get one cleaned image back.
//!
//! [`ImageCleaner`] is the seam the assembly driver calls through; the
//! production implementation is [`GeminiCleaner`], which posts the image with
//! the cleanup prompt to the Gemini `generateContent` endpoint and expects an
//! inline image part in the answer. Tests substitute a scripted cleaner.
//!
//! Response handling is deliberately strict. A usable answer is exactly one
//! candidate whose parts contain inline image data; every other shape maps to
//! one of the enumerated [`CleanupError`] variants, with the model's own
//! words (finish reason, safety annotations, refusal text) preserved in the
//! message shown to the user. There are no retries: the first failure aborts
//! the whole assembly run.

use crate::config::AssemblyConfig;
use crate::error::{CleanupError, Scan2PdfError};
use crate::pipeline::datauri::DataUri;
use crate::prompts::DEFAULT_CLEANUP_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable holding the Gemini API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Cleans one photographed document page.
///
/// Input is the original bytes and their mime type; output is a data URI of
/// the cleaned image or a descriptive failure.
#[async_trait]
pub trait ImageCleaner: Send + Sync {
    async fn clean(&self, image: &[u8], mime_type: &str) -> Result<DataUri, CleanupError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: RequestInlineData },
}

#[derive(Debug, Serialize)]
struct RequestInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
    #[serde(rename = "safetyRatings")]
    safety_ratings: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ── Response interpretation ──────────────────────────────────────────────

/// The finish reason a completed generation reports.
const NORMAL_STOP: &str = "STOP";

/// Map one service response to a cleaned image or an enumerated failure.
///
/// Checked in order: service-level error, missing candidate, abnormal finish
/// reason (reason and safety annotations quoted verbatim), image part,
/// text-only answer (quoted), then the generic malformed case.
fn extract_cleaned_image(response: GenerateResponse) -> Result<DataUri, CleanupError> {
    if let Some(error) = response.error {
        return Err(CleanupError::Api(error.message));
    }

    let candidate = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or(CleanupError::NoCandidate)?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != NORMAL_STOP {
            let safety = candidate
                .safety_ratings
                .as_ref()
                .map(|v| format!("; safety ratings: {v}"))
                .unwrap_or_default();
            return Err(CleanupError::Stopped {
                reason: reason.to_string(),
                safety,
            });
        }
    }

    let parts = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default();

    if let Some(inline) = parts.iter().find_map(|p| p.inline_data.as_ref()) {
        return Ok(DataUri::new(inline.mime_type.clone(), inline.data.clone()));
    }

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    if !text.trim().is_empty() {
        return Err(CleanupError::TextOnly { text });
    }

    Err(CleanupError::Malformed)
}

// ── Production client ────────────────────────────────────────────────────

/// Image cleanup via Google's Generative AI image model.
pub struct GeminiCleaner {
    client: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiCleaner {
    /// Build a cleaner with an explicit key, taking model, prompt and
    /// timeout from the config.
    pub fn new(api_key: impl Into<String>, config: &AssemblyConfig) -> Result<Self, Scan2PdfError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| Scan2PdfError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            prompt: config
                .cleanup_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_CLEANUP_PROMPT.to_string()),
        })
    }

    /// Build a cleaner from `GEMINI_API_KEY`.
    ///
    /// Absence of the key is a fatal startup error, not a runtime cleanup
    /// failure; callers surface it before any session exists.
    pub fn from_env(config: &AssemblyConfig) -> Result<Self, Scan2PdfError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(Scan2PdfError::MissingApiKey { var: API_KEY_VAR })?;
        Self::new(api_key, config)
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }
}

#[async_trait]
impl ImageCleaner for GeminiCleaner {
    async fn clean(&self, image: &[u8], mime_type: &str) -> Result<DataUri, CleanupError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: self.prompt.clone(),
                    },
                    RequestPart::InlineData {
                        inline_data: RequestInlineData {
                            mime_type: mime_type.to_string(),
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        };

        debug!(
            "Cleaning {} bytes ({}) with model {}",
            image.len(),
            mime_type,
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| CleanupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Cleanup call rejected: HTTP {}", status);
            return Err(CleanupError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CleanupError::Decode(e.to_string()))?;

        extract_cleaned_image(parsed)
    }
}
