//! Input resolution: normalise a path, directory or URL to one local PDF.
//!
//! * **File** — must exist, be readable, and start with `%PDF`.
//! * **Directory** — the first `*.pdf` entry by file name (extension compared
//!   case-insensitively). Sub-directories are not searched.
//! * **URL** — downloaded into a `TempDir` that lives as long as the
//!   [`ResolvedInput`], so the file is removed when it is dropped.

use crate::error::PoseError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file (or found in a local directory).
    Local(PathBuf),
    /// Input was a URL; the PDF lives in a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PoseError> {
    if is_url(input) {
        return download_url(input, timeout_secs).await;
    }
    if input.trim().is_empty() {
        return Err(PoseError::InvalidInput {
            input: input.to_string(),
        });
    }

    let path = PathBuf::from(input);
    if path.is_dir() {
        let found = first_pdf_in(&path)?;
        resolve_local(found)
    } else {
        resolve_local(path)
    }
}

/// The lexicographically first `*.pdf` file directly inside `dir`.
pub fn first_pdf_in(dir: &Path) -> Result<PathBuf, PoseError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PoseError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => PoseError::NoPdfFound {
            dir: dir.to_path_buf(),
        },
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && has_pdf_extension(p))
        .collect();
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    match pdfs.into_iter().next() {
        Some(first) => {
            debug!("Using {} from directory {}", first.display(), dir.display());
            Ok(first)
        }
        None => Err(PoseError::NoPdfFound {
            dir: dir.to_path_buf(),
        }),
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Validate existence, readability and PDF magic bytes.
fn resolve_local(path: PathBuf) -> Result<ResolvedInput, PoseError> {
    if !path.exists() {
        return Err(PoseError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PoseError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PoseError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PoseError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PoseError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PoseError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PoseError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PoseError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PoseError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| PoseError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| PoseError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PoseError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PoseError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment if it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
