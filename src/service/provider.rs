//! Caption service over any `edgequake-llm` vision provider.
//!
//! The provider reads its own API key (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
//! …) when it is constructed, so a missing key surfaces as
//! [`PoseError::ProviderNotConfigured`] at startup rather than on the first
//! caption.

use super::{CaptionError, CaptionOptions, CaptionRequest, CaptionService};
use crate::error::PoseError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Model used with a named provider when none is given.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Adapts an `Arc<dyn LLMProvider>` to [`CaptionService`].
#[derive(Clone)]
pub struct ProviderCaptionService {
    name: String,
    provider: Arc<dyn LLMProvider>,
}

impl ProviderCaptionService {
    /// Wrap a provider the caller already built.
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    /// Build a named provider (`openai`, `anthropic`, `ollama`…).
    pub fn from_name(provider_name: &str, model: Option<&str>) -> Result<Self, PoseError> {
        let model = model.unwrap_or(DEFAULT_PROVIDER_MODEL);
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            PoseError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider_name, provider))
    }

    /// Pick whichever provider the environment has credentials for.
    pub fn from_env() -> Result<Self, PoseError> {
        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| PoseError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        Ok(Self::new("auto", provider))
    }
}

impl fmt::Debug for ProviderCaptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCaptionService")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Instruction and image in one user turn, then the secondary prompt.
pub(crate) fn build_messages(request: &CaptionRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::user_with_images(
        &request.instruction,
        vec![request.image.clone()],
    )];
    if let Some(secondary) = request.secondary.as_deref().filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::user(secondary));
    }
    messages
}

fn build_options(options: &CaptionOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl CaptionService for ProviderCaptionService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn caption(
        &self,
        request: &CaptionRequest,
        options: &CaptionOptions,
    ) -> Result<String, CaptionError> {
        if let Some(model) = &options.model {
            debug!("{}: model is fixed at construction, ignoring '{}'", self.name, model);
        }
        let messages = build_messages(request);
        let response = self
            .provider
            .chat(&messages, Some(&build_options(options)))
            .await
            .map_err(|e| CaptionError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        if response.content.trim().is_empty() {
            return Err(CaptionError::EmptyResponse);
        }
        Ok(response.content)
    }
}
