use std::path::{Component, Path, PathBuf};

use reqwest::Url;
use tracing::debug;

use crate::error::{TransformError, TransformResult};

/// Where the bytes of one `src` value come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Remote(Url),
    Local(PathBuf),
}

impl SourceRef {
    /// Absolute URLs are remote; everything else is a path relative to
    /// `base_dir` (absolute paths stay as they are).
    pub fn classify(reference: &str, base_dir: &Path) -> Self {
        match Url::parse(reference) {
            Ok(url) => Self::Remote(url),
            Err(_) => Self::Local(normalize(&base_dir.join(reference))),
        }
    }

    /// Deduplication key: two references with the same key are the same image.
    pub fn key(&self) -> String {
        match self {
            Self::Remote(url) => url.as_str().to_string(),
            Self::Local(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// File extension for the cache entry, including the leading dot.
    pub fn extension(&self, reference: &str) -> String {
        match self {
            Self::Remote(url) => extension(url.path()),
            Self::Local(_) => extension(reference),
        }
    }
}

/// `"photo.tar.gz?x=1"` -> `".gz"`, `"photo"` -> `""`, `".hidden"` -> `""`.
pub fn extension(reference: &str) -> String {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    let trimmed = &reference[..end];
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_string(),
        _ => String::new(),
    }
}

/// Lexically resolves `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

pub async fn read_local(path: &Path) -> TransformResult<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| TransformError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), size = bytes.len(), "Read local image");
    Ok(bytes)
}
