use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use regex::Regex;
use swc_core::ecma::ast::Program;
use tracing::{debug, info};

use crate::cache::ImageCache;
use crate::document::SourceDocument;
use crate::error::{ConfigError, TransformError, TransformResult};
use crate::fetch::{Fetch, HttpFetch, RetryFetch, RetryPolicy};
use crate::inject::inject_imports;
use crate::matcher::find_factory_identifiers;
use crate::options::{IdentifierStyle, Options};
use crate::rewrite::{apply_rewrites, plan_images, ImageRecord, NameGenerator, PendingImage};
use crate::source::{normalize, read_local, SourceRef};

/// A configured transform, reusable across documents.
///
/// Construction validates the options and prepares the cache directory;
/// [`StaticImages::transform`] then rewrites one program at a time.
pub struct StaticImages {
    cache: ImageCache,
    fetch: Arc<dyn Fetch>,
    factory_pattern: Regex,
    identifiers: IdentifierStyle,
    timeout: Option<Duration>,
}

impl StaticImages {
    /// Uses the default HTTP transport, wrapped in the configured retry policy.
    pub fn new(options: Options) -> Result<Self, ConfigError> {
        let timeout = options.timeout_ms.map(Duration::from_millis);
        let transport = Arc::new(HttpFetch::new(timeout)?);
        Self::with_fetch(options, transport)
    }

    /// Replaces the network transport; retries still apply on top of it.
    pub fn with_fetch(options: Options, fetch: Arc<dyn Fetch>) -> Result<Self, ConfigError> {
        let policy = RetryPolicy::from(options.retry.clone());
        Self::with_retry_policy(options, fetch, policy)
    }

    /// Like [`StaticImages::with_fetch`] with a programmatic retry policy
    /// (custom backoff or retry predicate). `options.retry` is ignored.
    pub fn with_retry_policy(
        options: Options,
        fetch: Arc<dyn Fetch>,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let dir = options
            .cache_directory
            .as_deref()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or(ConfigError::MissingCacheDirectory)?;
        let cache = ImageCache::open(dir, options.hash_encoding, options.skip_existing)?;
        let factory_pattern = Regex::new(&options.factory_pattern)?;

        Ok(Self {
            cache,
            fetch: Arc::new(RetryFetch::new(fetch, policy)),
            factory_pattern,
            identifiers: options.identifiers,
            timeout: options.timeout_ms.map(Duration::from_millis),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        self.cache.dir()
    }

    /// Rewrites every image call site in `program`.
    ///
    /// All-or-nothing: images are resolved first, then cached, and only then
    /// is the (staged) program rewritten. On error `program` is unchanged.
    pub async fn transform(
        &self,
        program: &mut Program,
        document: &mut SourceDocument,
    ) -> TransformResult<()> {
        let path = document.path()?.to_path_buf();
        let base_dir = absolute_dir(document.dirname()?, std::env::current_dir)?;
        let history = document
            .history
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        document.info(format!(
            "Processing {} with history: {history}",
            path.display()
        ));

        let names = find_factory_identifiers(program, &self.factory_pattern);
        if names.is_empty() {
            debug!(path = %path.display(), "No JSX factory imported");
            return Ok(());
        }

        let plan = plan_images(program, &names, &base_dir);
        if plan.is_empty() {
            debug!(path = %path.display(), "No image sources");
            return Ok(());
        }

        let resolved = join_all(plan.images.iter().map(|image| self.resolve(image)))
            .await
            .into_iter()
            .collect::<TransformResult<Vec<_>>>()?;

        let mut generator = NameGenerator::for_program(program, self.identifiers);
        let records: Vec<ImageRecord> = plan
            .images
            .iter()
            .zip(resolved)
            .map(|(image, bytes)| ImageRecord {
                reference: image.reference.clone(),
                local: generator.next_name(),
                path: self.cache.path_for(&bytes, &image.extension),
                bytes,
            })
            .collect();

        let stores = records.iter().map(|r| self.cache.store(&r.path, &r.bytes));
        for (record, stored) in records.iter().zip(join_all(stores).await) {
            let written = stored?;
            debug!(
                reference = %record.reference,
                local = %record.local,
                path = %record.path.display(),
                written,
                "Cached image"
            );
        }

        let mut staged = program.clone();
        let rewritten = apply_rewrites(&mut staged, &names, &plan, &records)?;
        inject_imports(&mut staged, records.iter().map(ImageRecord::import_decl).collect());
        *program = staged;

        info!(
            path = %path.display(),
            images = records.len(),
            properties = rewritten,
            "Rewrote image sources to static imports"
        );
        Ok(())
    }

    /// Bytes for one image, bounded by the configured deadline.
    async fn resolve(&self, image: &PendingImage) -> TransformResult<Vec<u8>> {
        let work = self.load(&image.source);
        match self.timeout {
            Some(after) => tokio::time::timeout(after, work).await.map_err(|_| {
                TransformError::Timeout {
                    reference: image.reference.clone(),
                    after,
                }
            })?,
            None => work.await,
        }
    }

    async fn load(&self, source: &SourceRef) -> TransformResult<Vec<u8>> {
        match source {
            SourceRef::Local(path) => read_local(path).await,
            SourceRef::Remote(url) => {
                let response = self.fetch.fetch(url).await?;
                if !response.is_success() {
                    return Err(TransformError::FetchFailed {
                        url: url.to_string(),
                        reason: format!("status {}", response.status),
                    });
                }
                match response.body {
                    Some(body) if !body.is_empty() => {
                        debug!(url = %url, size = body.len(), "Fetched remote image");
                        Ok(body)
                    }
                    _ => Err(TransformError::FetchFailed {
                        url: url.to_string(),
                        reason: "empty response body".to_string(),
                    }),
                }
            }
        }
    }
}

fn absolute_dir(
    dir: &Path,
    cwd: impl FnOnce() -> std::io::Result<PathBuf>,
) -> TransformResult<PathBuf> {
    if dir.is_absolute() {
        return Ok(normalize(dir));
    }
    let cwd = cwd().map_err(TransformError::WorkingDirectory)?;
    Ok(normalize(&cwd.join(dir)))
}
