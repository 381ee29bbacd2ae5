//! Caption service boundary.
//!
//! A [`CaptionService`] receives one [`CaptionRequest`] (instruction, image,
//! optional secondary prompt) and returns the model's raw text. Two
//! implementations ship:
//!
//! - [`GeminiCaptionService`] — Google's `generateContent` REST endpoint,
//!   authenticated with an explicit [`crate::credential::ApiKey`].
//! - [`ProviderCaptionService`] — any vision-capable `edgequake-llm` provider
//!   (OpenAI, Anthropic, Ollama…).
//!
//! Timeouts, retries and cleanup live in [`crate::pipeline::caption`]; a
//! service makes exactly one attempt per call.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiCaptionService;
pub use provider::ProviderCaptionService;

use async_trait::async_trait;
use edgequake_llm::ImageData;
use thiserror::Error;

/// Everything the model sees for one caption.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// Instruction text, already filled with the subject label.
    pub instruction: String,
    /// Base64 image payload with its MIME type.
    pub image: ImageData,
    /// Extra text sent after the image, if any.
    pub secondary: Option<String>,
}

/// Generation settings passed alongside each request.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionOptions {
    /// Model override; `None` uses the service default.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.4,
            max_tokens: 1024,
        }
    }
}

/// A recoverable caption failure.
///
/// Never reaches the console: the caption builder turns the last one into
/// [`crate::output::CaptionStatus::Unavailable`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptionError {
    /// The attempt exceeded the configured bound.
    #[error("caption request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection, DNS or TLS failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status other than auth and rate limiting.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The credential was rejected.
    #[error("credential rejected: {0}")]
    Auth(String),

    /// The service asked us to slow down.
    #[error("rate limited by caption service")]
    RateLimited,

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The model answered with no usable text.
    #[error("caption service returned no text")]
    EmptyResponse,

    /// Error surfaced by an `edgequake-llm` provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// The request could not be built.
    #[error("could not encode request: {0}")]
    Encode(String),
}

impl CaptionError {
    /// Whether another attempt could succeed.
    ///
    /// Client errors (4xx) are final except 408 Request Timeout; 429 is
    /// already [`CaptionError::RateLimited`].
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptionError::Auth(_) | CaptionError::Encode(_) => false,
            CaptionError::Http { status, .. } => !(400..500).contains(status) || *status == 408,
            _ => true,
        }
    }
}

/// A multimodal model that turns an image plus instructions into text.
#[async_trait]
pub trait CaptionService: Send + Sync {
    /// Short name for logs, e.g. `gemini` or `openai`.
    fn name(&self) -> &str;

    /// Make one caption attempt.
    async fn caption(
        &self,
        request: &CaptionRequest,
        options: &CaptionOptions,
    ) -> Result<String, CaptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_encode_are_final() {
        assert!(!CaptionError::Auth("bad key".into()).is_retryable());
        assert!(!CaptionError::Encode("nope".into()).is_retryable());
        assert!(CaptionError::Timeout { secs: 5 }.is_retryable());
        assert!(CaptionError::RateLimited.is_retryable());
        assert!(CaptionError::EmptyResponse.is_retryable());
        assert!(CaptionError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn client_errors_are_final_except_request_timeout() {
        let http = |status| CaptionError::Http {
            status,
            body: String::new(),
        };
        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(http(408).is_retryable());
        assert!(http(500).is_retryable());
    }

    #[test]
    fn messages_are_readable() {
        assert_eq!(
            CaptionError::Timeout { secs: 60 }.to_string(),
            "caption request timed out after 60s"
        );
        assert_eq!(
            CaptionError::Http {
                status: 500,
                body: "oops".into()
            }
            .to_string(),
            "HTTP 500: oops"
        );
    }
}
