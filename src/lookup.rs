//! Top-level operations: extract, list, find, show, describe, save.
//!
//! Every operation takes the PDF location as a string (file path, directory
//! or HTTP(S) URL) and re-opens the document per call. Only
//! [`show_pose`] and [`describe_all`] talk to a caption service; the rest
//! work offline.

use crate::config::PoseConfig;
use crate::error::PoseError;
use crate::output::{
    not_found_message, CaptionStatus, DescribedImage, EmbeddedImageRecord, Extraction,
    LookupOutcome, PoseLookup, RecordSummary,
};
use crate::pipeline::{caption, extract as extractor, input, matcher};
use crate::service::CaptionService;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Extract every embedded image from a PDF file, directory or URL.
///
/// # Errors
/// Returns `Err(PoseError)` only when the document itself is unusable
/// (missing, unreadable, not a PDF, unparseable). Images that fail to decode
/// are listed in [`Extraction::skipped`].
///
/// # Example
/// ```rust,no_run
/// use pdf_pose_finder::{extract, PoseConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extraction = extract("yoga.pdf", &PoseConfig::default()).await?;
/// for record in &extraction.records {
///     println!("page {}: {}", record.page_number(), record.resolved_name());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &PoseConfig,
) -> Result<Extraction, PoseError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Extracting images: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let extraction =
        extractor::extract_images_from_path(resolved.path(), &config.fallback_template).await?;

    debug!(
        "{} record(s) from {} page(s) in {:?}",
        extraction.records.len(),
        extraction.page_count,
        start.elapsed()
    );
    Ok(extraction)
}

/// Extract from PDF bytes already in memory.
pub async fn extract_from_bytes(
    bytes: Vec<u8>,
    config: &PoseConfig,
) -> Result<Extraction, PoseError> {
    let template = config.fallback_template.clone();
    tokio::task::spawn_blocking(move || extractor::extract_images(&bytes, &template))
        .await
        .map_err(|e| PoseError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &PoseConfig,
) -> Result<Extraction, PoseError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PoseError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Name, page and size of every image, in extraction order.
pub async fn list_images(
    input_str: impl AsRef<str>,
    config: &PoseConfig,
) -> Result<Vec<RecordSummary>, PoseError> {
    Ok(extract(input_str, config).await?.summaries())
}

/// Every image whose resolved name contains `query`, ignoring case.
///
/// No match is an empty vector, not an error.
pub async fn find_poses(
    input_str: impl AsRef<str>,
    query: &str,
    config: &PoseConfig,
) -> Result<Vec<EmbeddedImageRecord>, PoseError> {
    let found = extract(input_str, config).await?.into_matching(query);
    info!("'{}': {} match(es)", query, found.len());
    Ok(found)
}

/// Find the first image matching `query` and ask `service` to describe it.
///
/// The query doubles as the subject label in the instruction. A caption
/// failure still returns the image, with
/// [`crate::output::CaptionStatus::Unavailable`].
pub async fn show_pose(
    input_str: impl AsRef<str>,
    query: &str,
    service: &dyn CaptionService,
    config: &PoseConfig,
) -> Result<PoseLookup, PoseError> {
    let extraction = extract(input_str, config).await?;
    Ok(lookup_in(extraction.records, query, service, config).await)
}

/// [`show_pose`] over records that were already extracted.
pub async fn lookup_in(
    records: Vec<EmbeddedImageRecord>,
    query: &str,
    service: &dyn CaptionService,
    config: &PoseConfig,
) -> PoseLookup {
    let mut records = records;
    let Some(index) = records
        .iter()
        .position(|r| matcher::is_match(query, r.resolved_name()))
    else {
        info!("{}", not_found_message(query));
        return PoseLookup {
            query: query.to_string(),
            outcome: LookupOutcome::NotFound,
        };
    };

    let record = records.swap_remove(index);
    info!(
        "'{}' → '{}' (page {})",
        query,
        record.resolved_name(),
        record.page_number()
    );

    let label = if query.trim().is_empty() {
        record.resolved_name().to_string()
    } else {
        query.to_string()
    };
    let caption = caption::describe(service, &record, &label, config).await;

    PoseLookup {
        query: query.to_string(),
        outcome: LookupOutcome::Found { record, caption },
    }
}

/// Caption every image in the document.
///
/// Each image is labelled with its resolved name. Up to `config.concurrency`
/// requests are in flight; results keep extraction order.
pub async fn describe_all(
    input_str: impl AsRef<str>,
    service: &dyn CaptionService,
    config: &PoseConfig,
) -> Result<Vec<DescribedImage>, PoseError> {
    let extraction = extract(input_str, config).await?;
    Ok(describe_records(extraction.records, service, config).await)
}

/// [`describe_all`] over records that were already extracted.
pub async fn describe_records(
    records: Vec<EmbeddedImageRecord>,
    service: &dyn CaptionService,
    config: &PoseConfig,
) -> Vec<DescribedImage> {
    let total = records.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let described: Vec<DescribedImage> = stream::iter(records.into_iter().enumerate().map(
        move |(i, record)| async move {
            let index = i + 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_start(index, total);
            }
            let label = record.resolved_name().to_string();
            let caption = caption::describe(service, &record, &label, config).await;
            if let Some(ref cb) = config.progress_callback {
                match &caption {
                    CaptionStatus::Described { text, .. } => {
                        cb.on_image_complete(index, total, text.len())
                    }
                    CaptionStatus::Unavailable { reason, .. } => {
                        cb.on_image_error(index, total, reason.clone())
                    }
                }
            }
            DescribedImage { record, caption }
        },
    ))
    .buffered(config.concurrency.max(1))
    .collect()
    .await;

    let ok = described.iter().filter(|d| d.caption.is_available()).count();
    info!("Described {}/{} image(s)", ok, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, ok);
    }
    described
}

/// File name for an extracted image: `page_{NNN}_image_{NN}.{png|jpg}`.
///
/// Page and ordinal are 1-based.
pub fn image_file_name(record: &EmbeddedImageRecord) -> String {
    format!(
        "page_{:03}_image_{:02}.{}",
        record.page_number(),
        record.ordinal() + 1,
        record.pixel_data().encoding().extension()
    )
}

/// Write every record's encoded bytes into `out_dir`.
///
/// Uses atomic write (temp file + rename) so an interrupted run never
/// leaves a truncated image behind. Returns the written paths in order.
pub async fn save_images(
    records: &[EmbeddedImageRecord],
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, PoseError> {
    let out_dir = out_dir.as_ref();
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| PoseError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(records.len());
    for record in records {
        let path = out_dir.join(image_file_name(record));
        let tmp_path = path.with_extension("tmp");

        tokio::fs::write(&tmp_path, record.pixel_data().encoded_bytes())
            .await
            .map_err(|e| PoseError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| PoseError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        debug!("Wrote {}", path.display());
        written.push(path);
    }

    info!("Saved {} image(s) to {}", written.len(), out_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::record;
    use crate::service::{CaptionError, CaptionOptions, CaptionRequest};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the instruction back; fails for instructions containing "fail".
    struct Echo {
        instructions: Mutex<Vec<String>>,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                instructions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CaptionService for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn caption(
            &self,
            request: &CaptionRequest,
            _options: &CaptionOptions,
        ) -> Result<String, CaptionError> {
            self.instructions.lock().unwrap().push(request.instruction.clone());
            if request.instruction.contains("fail") {
                Err(CaptionError::Http {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(format!("desc: {}", request.instruction))
            }
        }
    }

    fn config() -> PoseConfig {
        PoseConfig::builder()
            .instruction_template("{label}")
            .max_retries(0)
            .build()
            .unwrap()
    }

    #[test]
    fn file_names_are_one_based_and_padded() {
        assert_eq!(image_file_name(&record(0, 0, None)), "page_001_image_01.png");
        assert_eq!(image_file_name(&record(11, 4, None)), "page_012_image_05.png");
    }

    #[tokio::test]
    async fn lookup_uses_query_as_label() {
        let echo = Echo::new();
        let records = vec![record(0, 0, Some("Warrior Pose")), record(1, 0, None)];
        let lookup = lookup_in(records, "warrior", &echo, &config()).await;

        assert_eq!(lookup.record().map(|r| r.page_index()), Some(0));
        assert_eq!(lookup.caption().and_then(|c| c.text()), Some("desc: warrior"));
    }

    #[tokio::test]
    async fn lookup_miss_calls_nothing() {
        let echo = Echo::new();
        let lookup = lookup_in(vec![record(0, 0, Some("Tree"))], "crow", &echo, &config()).await;
        assert!(matches!(lookup.outcome, LookupOutcome::NotFound));
        assert!(echo.instructions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn caption_failure_keeps_the_image() {
        let echo = Echo::new();
        let records = vec![record(0, 0, Some("Fail Pose"))];
        let lookup = lookup_in(records, "fail", &echo, &config()).await;
        assert!(lookup.record().is_some());
        let caption = lookup.caption().unwrap();
        assert!(!caption.is_available());
        assert_eq!(caption.display_text(), "description unavailable");
    }

    #[tokio::test]
    async fn describe_records_keeps_order_and_labels() {
        let echo = Echo::new();
        let records = vec![
            record(0, 0, Some("Mountain")),
            record(1, 0, Some("fail here")),
            record(2, 0, None),
        ];
        let cfg = PoseConfig::builder()
            .instruction_template("{label}")
            .max_retries(0)
            .concurrency(3)
            .build()
            .unwrap();
        let described = describe_records(records, &echo, &cfg).await;

        let pages: Vec<usize> = described.iter().map(|d| d.record.page_index()).collect();
        assert_eq!(pages, vec![0, 1, 2]);
        assert_eq!(described[0].caption.text(), Some("desc: Mountain"));
        assert!(matches!(described[1].caption, CaptionStatus::Unavailable { .. }));
        assert_eq!(described[2].caption.text(), Some("desc: Yoga Pose 3"));
    }

    #[tokio::test]
    async fn save_images_writes_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(0, 0, None), record(0, 1, None)];
        let paths = save_images(&records, dir.path().join("out")).await.unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("page_001_image_02.png"));
        let bytes = std::fs::read(&paths[0]).unwrap();
        assert_eq!(bytes, records[0].pixel_data().encoded_bytes());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
