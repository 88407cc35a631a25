use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type TransformResult<T> = Result<T, TransformError>;

/// Raised while building a [`crate::StaticImages`]; no transform is produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cacheDirectory is required")]
    MissingCacheDirectory,

    #[error("cache directory {path} is not usable: {source}")]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("invalid factory pattern: {0}")]
    InvalidFactoryPattern(#[from] regex::Error),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure of one logical fetch, after the retry policy has run its course.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The transport can never serve this URL; retrying cannot help.
    #[error("cannot fetch {url}: {reason}")]
    Unsupported { url: String, reason: String },

    #[error("gave up on {url} after {attempts} attempts (last status: {last_status:?})")]
    Exhausted {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
    },

    #[error("invalid Retry-After value {value:?} from {url}")]
    InvalidRetryAfter { url: String, value: String },
}

impl FetchError {
    #[must_use]
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Per-document failure. Any of these leaves the program untouched.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("file history is empty for the source document")]
    DocumentState,

    #[error("cannot resolve the working directory: {0}")]
    WorkingDirectory(#[source] io::Error),

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("failed to fetch {url}: retries exhausted after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    #[error("invalid Retry-After value {value:?} from {url}")]
    InvalidRetryAfter { url: String, value: String },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resolving {reference} timed out after {after:?}")]
    Timeout { reference: String, after: Duration },

    #[error("internal invariant violated: {0}")]
    MalformedMatch(String),
}

impl From<FetchError> for TransformError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport { url, message } => Self::FetchFailed {
                url,
                reason: message,
            },
            FetchError::Unsupported { url, reason } => Self::FetchFailed { url, reason },
            FetchError::Exhausted { url, attempts, .. } => Self::FetchExhausted { url, attempts },
            FetchError::InvalidRetryAfter { url, value } => Self::InvalidRetryAfter { url, value },
        }
    }
}
