//! Caption requests: package a record for the caption service and call it.
//!
//! [`describe`] never fails. Every attempt is bounded by
//! `api_timeout_secs`; retryable failures are retried with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`), so with 500 ms base and two
//! retries the waits are 500 ms then 1 s. Whatever is left after the last
//! attempt becomes [`CaptionStatus::Unavailable`].

use super::clean::clean_caption;
use super::encode::encode_record;
use crate::config::PoseConfig;
use crate::output::{CaptionStatus, EmbeddedImageRecord};
use crate::prompts::{instruction_for, DEFAULT_INSTRUCTION};
use crate::service::{CaptionError, CaptionOptions, CaptionRequest, CaptionService};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Build the request for `record`, labelled `subject_label`.
///
/// The label fills `{label}` in the instruction template. For a pose lookup
/// it is the user's query; when captioning a whole document it is the
/// record's resolved name.
pub fn build_request(
    record: &EmbeddedImageRecord,
    subject_label: &str,
    config: &PoseConfig,
) -> Result<CaptionRequest, CaptionError> {
    if record.pixel_data().encoded_bytes().is_empty() {
        return Err(CaptionError::Encode(format!(
            "'{}' has no encoded image bytes",
            record.resolved_name()
        )));
    }

    let template = config
        .instruction_template
        .as_deref()
        .unwrap_or(DEFAULT_INSTRUCTION);

    Ok(CaptionRequest {
        instruction: instruction_for(template, subject_label),
        image: encode_record(record),
        secondary: config
            .secondary_prompt
            .clone()
            .filter(|s| !s.trim().is_empty()),
    })
}

/// Generation settings taken from the config.
pub fn caption_options(config: &PoseConfig) -> CaptionOptions {
    CaptionOptions {
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Caption one record, retrying within the configured bounds.
pub async fn describe(
    service: &dyn CaptionService,
    record: &EmbeddedImageRecord,
    subject_label: &str,
    config: &PoseConfig,
) -> CaptionStatus {
    let start = Instant::now();

    let request = match build_request(record, subject_label, config) {
        Ok(request) => request,
        Err(e) => {
            warn!("'{}': {}", record.resolved_name(), e);
            return CaptionStatus::Unavailable {
                reason: e.to_string(),
                attempts: 0,
            };
        }
    };
    let options = caption_options(config);
    let bound = Duration::from_secs(config.api_timeout_secs);

    let mut last_err = CaptionError::EmptyResponse;
    let mut attempts = 0u32;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(config.retry_backoff_ms, attempt);
            warn!(
                "'{}': retry {}/{} after {:?}",
                record.resolved_name(),
                attempt,
                config.max_retries,
                backoff
            );
            sleep(backoff).await;
        }
        attempts += 1;

        let result = match timeout(bound, service.caption(&request, &options)).await {
            Ok(result) => result,
            Err(_) => Err(CaptionError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match result.map(|raw| clean_caption(&raw)) {
            Ok(text) if !text.is_empty() => {
                let duration = start.elapsed();
                debug!(
                    "'{}': {} chars from {} in {:?}",
                    record.resolved_name(),
                    text.len(),
                    service.name(),
                    duration
                );
                return CaptionStatus::Described {
                    text,
                    attempts,
                    duration_ms: duration.as_millis() as u64,
                };
            }
            Ok(_) => last_err = CaptionError::EmptyResponse,
            Err(e) => last_err = e,
        }

        warn!(
            "'{}': attempt {} failed: {}",
            record.resolved_name(),
            attempt + 1,
            last_err
        );
        if !last_err.is_retryable() {
            break;
        }
    }

    CaptionStatus::Unavailable {
        reason: last_err.to_string(),
        attempts,
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating instead
/// of overflowing for large retry counts.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}
