//! Gemini `generateContent` over REST.
//!
//! One request per caption:
//!
//! ```text
//! POST {base}/v1beta/models/{model}:generateContent
//! x-goog-api-key: <key>
//! { "contents": [{ "role": "user", "parts": [ {text}, {inline_data}, {text}? ] }],
//!   "generationConfig": { "temperature": …, "maxOutputTokens": … } }
//! ```
//!
//! The part order mirrors what the model is asked: instruction first, then
//! the image, then the optional secondary prompt.

use super::{CaptionError, CaptionOptions, CaptionRequest, CaptionService};
use crate::credential::ApiKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public Gemini endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when neither the service nor the options name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Error bodies longer than this are cut in [`CaptionError::Http`].
const MAX_ERROR_BODY: usize = 500;

/// Caption service backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiCaptionService {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
}

impl GeminiCaptionService {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    /// Point at a different host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default model for requests whose options carry none.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl CaptionService for GeminiCaptionService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn caption(
        &self,
        request: &CaptionRequest,
        options: &CaptionOptions,
    ) -> Result<String, CaptionError> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let body = build_body(request, options);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.api_key.expose())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CaptionError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CaptionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), text));
        }

        debug!("gemini {}: {} byte response", model, text.len());
        parse_response(&text)
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_body<'a>(request: &'a CaptionRequest, options: &CaptionOptions) -> GenerateRequest<'a> {
    let mut parts = vec![
        Part::Text {
            text: &request.instruction,
        },
        Part::Image {
            inline_data: InlineData {
                mime_type: &request.image.mime_type,
                data: &request.image.data,
            },
        },
    ];
    if let Some(secondary) = request.secondary.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(Part::Text { text: secondary });
    }

    GenerateRequest {
        contents: vec![Content { role: "user", parts }],
        generation_config: GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        },
    }
}

fn classify_status(status: u16, body: String) -> CaptionError {
    match status {
        401 | 403 => CaptionError::Auth(truncate(body)),
        429 => CaptionError::RateLimited,
        _ => CaptionError::Http {
            status,
            body: truncate(body),
        },
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

/// Concatenate the text parts of the first candidate.
fn parse_response(body: &str) -> Result<String, CaptionError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| CaptionError::MalformedResponse(e.to_string()))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(CaptionError::MalformedResponse(format!(
                "prompt blocked: {reason}"
            ))),
            None => Err(CaptionError::EmptyResponse),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        debug!("gemini: empty candidate (finish reason {:?})", candidate.finish_reason);
        return Err(CaptionError::EmptyResponse);
    }
    Ok(text)
}
