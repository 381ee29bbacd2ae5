//! Configuration types for extraction, matching and captioning.
//!
//! Every knob lives in [`PoseConfig`], built via its [`PoseConfigBuilder`].
//! The caption service itself is *not* part of the config: it is passed
//! explicitly to the operations that need it, together with its credential.

use crate::error::PoseError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Fallback template used by the pose lookup screens: `"Yoga Pose {page}"`.
pub const YOGA_POSE_TEMPLATE: &str = "Yoga Pose {page}";

/// Generic fallback template for non-pose documents: `"Image {page}"`.
pub const IMAGE_TEMPLATE: &str = "Image {page}";

/// Placeholder replaced with the 1-based page number.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Placeholder replaced with the 1-based image position on its page.
pub const ORDINAL_PLACEHOLDER: &str = "{ordinal}";

/// Configuration for a pose lookup.
///
/// # Example
/// ```rust
/// use pdf_pose_finder::{PoseConfig, IMAGE_TEMPLATE};
///
/// let config = PoseConfig::builder()
///     .fallback_template(IMAGE_TEMPLATE)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.fallback_template, "Image {page}");
/// ```
#[derive(Clone)]
pub struct PoseConfig {
    /// Name given to images that carry no `/Name` of their own. Must contain
    /// `{page}` and/or `{ordinal}`. Default: [`YOGA_POSE_TEMPLATE`].
    pub fallback_template: String,

    /// Instruction sent with the image; `{label}` is replaced with the subject
    /// label. If None, uses [`crate::prompts::DEFAULT_INSTRUCTION`].
    pub instruction_template: Option<String>,

    /// Extra text sent after the image. Empty or None sends nothing.
    pub secondary_prompt: Option<String>,

    /// Model identifier for the caption service. If None, the service default.
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.4.
    pub temperature: f32,

    /// Maximum tokens the model may generate per caption. Default: 1024.
    pub max_tokens: usize,

    /// Retries after the first failed caption attempt. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Upper bound on a single caption call, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Concurrent caption calls in [`crate::lookup::describe_all`]. Default: 4.
    pub concurrency: usize,

    /// Per-image progress events for [`crate::lookup::describe_all`].
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            fallback_template: YOGA_POSE_TEMPLATE.to_string(),
            instruction_template: None,
            secondary_prompt: None,
            model: None,
            temperature: 0.4,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PoseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoseConfig")
            .field("fallback_template", &self.fallback_template)
            .field("instruction_template", &self.instruction_template)
            .field("secondary_prompt", &self.secondary_prompt)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CaptionProgressCallback>"),
            )
            .finish()
    }
}

impl PoseConfig {
    /// Create a new builder for `PoseConfig`.
    pub fn builder() -> PoseConfigBuilder {
        PoseConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PoseConfig`].
#[derive(Debug)]
pub struct PoseConfigBuilder {
    config: PoseConfig,
}

impl PoseConfigBuilder {
    pub fn fallback_template(mut self, template: impl Into<String>) -> Self {
        self.config.fallback_template = template.into();
        self
    }

    pub fn instruction_template(mut self, template: impl Into<String>) -> Self {
        self.config.instruction_template = Some(template.into());
        self
    }

    pub fn secondary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.secondary_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PoseConfig, PoseError> {
        let c = &self.config;
        validate_template(&c.fallback_template)?;
        if c.api_timeout_secs == 0 {
            return Err(PoseError::InvalidConfig(
                "Caption timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PoseError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

/// Reject templates that could produce an empty or constant fallback name.
pub fn validate_template(template: &str) -> Result<(), PoseError> {
    if template.trim().is_empty() {
        return Err(PoseError::InvalidConfig(
            "Fallback template must not be blank".into(),
        ));
    }
    if !template.contains(PAGE_PLACEHOLDER) && !template.contains(ORDINAL_PLACEHOLDER) {
        return Err(PoseError::InvalidConfig(format!(
            "Fallback template '{template}' must contain {PAGE_PLACEHOLDER} or {ORDINAL_PLACEHOLDER}"
        )));
    }
    Ok(())
}
