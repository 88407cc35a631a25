use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{ConfigError, TransformError, TransformResult};
use crate::hash::{content_hash, HashEncoding};
use crate::source::normalize;

/// Flat, content-addressed directory of image files: `<hash><ext>`.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
    encoding: HashEncoding,
    skip_existing: bool,
}

impl ImageCache {
    /// Resolves `dir` against the working directory and makes sure it exists.
    pub fn open(
        dir: &Path,
        encoding: HashEncoding,
        skip_existing: bool,
    ) -> Result<Self, ConfigError> {
        if outside_public(dir) {
            warn!(
                dir = %dir.display(),
                "cacheDirectory is not under public/; bundlers may not serve the cached images"
            );
        }
        let dir = if dir.is_absolute() {
            normalize(dir)
        } else {
            let cwd = std::env::current_dir().map_err(|source| ConfigError::CacheDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
            normalize(&cwd.join(dir))
        };

        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CacheDirectory {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "Opened image cache");

        Ok(Self {
            dir,
            encoding,
            skip_existing,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination of `bytes`; a pure function of content and extension.
    pub fn path_for(&self, bytes: &[u8], extension: &str) -> PathBuf {
        let hash = content_hash(bytes, self.encoding);
        self.dir.join(format!("{hash}{extension}"))
    }

    /// Persists `bytes` at `path`. Returns `false` when an existing entry was kept.
    ///
    /// Bytes land in a unique temp file first and are renamed into place, so
    /// concurrent stores of the same content never expose a partial file.
    pub async fn store(&self, path: &Path, bytes: &[u8]) -> TransformResult<bool> {
        if self.skip_existing {
            if let Ok(meta) = fs::metadata(path).await {
                if meta.is_file() && meta.len() == bytes.len() as u64 {
                    trace!(path = %path.display(), "Cache hit, write skipped");
                    return Ok(false);
                }
            }
        }

        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let write_failed = |source| TransformError::WriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            drop(file);
            fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_failed(e));
        }

        debug!(path = %path.display(), size = bytes.len(), "Stored image in cache");
        Ok(true)
    }
}

/// Relative directories are expected to live under `public/`.
fn outside_public(dir: &Path) -> bool {
    if dir.is_absolute() {
        return false;
    }
    let first = dir.components().find(|c| !matches!(c, Component::CurDir));
    !matches!(first, Some(Component::Normal(name)) if name == "public")
}
