//! Gemini `generateContent` client for vision and text prompts

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{TextModel, VisionModel};
use crate::{Error, Result};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Blocking Gemini client
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn generate(&self, parts: Vec<Part<'_>>, config: GenerationConfig) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: config,
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_MEDIUM_AND_ABOVE",
                })
                .collect(),
        };

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .map_err(|e| Error::Vision(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Gemini API error");
            return Err(Error::Vision(format!("API error {status}: {body}")));
        }

        let result: GenerateResponse = response
            .json()
            .map_err(|e| Error::Vision(format!("parse error: {e}")))?;
        extract_text(result)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        tracing::warn!("unexpected Gemini response structure");
        return Err(Error::Vision("no coherent response from model".to_string()));
    }
    Ok(text)
}

impl VisionModel for GeminiClient {
    fn analyze(&self, prompt: &str, jpeg: &[u8]) -> Result<String> {
        tracing::debug!(model = %self.model, image_bytes = jpeg.len(), "vision request");
        let parts = vec![
            Part::Text { text: prompt },
            Part::Image {
                inline_data: InlineData {
                    mime_type: "image/jpeg",
                    data: base64::engine::general_purpose::STANDARD.encode(jpeg),
                },
            },
        ];
        self.generate(
            parts,
            GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 200,
                top_k: Some(32),
                top_p: Some(1.0),
            },
        )
    }
}

impl TextModel for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, "text request");
        self.generate(
            vec![Part::Text { text: prompt }],
            GenerationConfig {
                temperature: 0.5,
                max_output_tokens: 125,
                top_k: None,
                top_p: None,
            },
        )
    }
}
