use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fetch::RetryOptions;
use crate::hash::HashEncoding;

pub const DEFAULT_FACTORY_PATTERN: &str = "^jsxs?$";

/// How generated import bindings are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierStyle {
    /// `static_image_1`, `static_image_2`, ... per document.
    #[default]
    Counter,
    /// `__static_image_<32 hex digits>`.
    Uuid,
}

/// Host-supplied configuration, usually JSON:
///
/// ```json
/// { "cacheDirectory": "public/static-images", "retry": { "retries": 3 } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Required. Relative paths resolve against the working directory.
    pub cache_directory: Option<PathBuf>,
    /// Matched against imported names to find the JSX factory.
    pub factory_pattern: String,
    pub hash_encoding: HashEncoding,
    pub identifiers: IdentifierStyle,
    /// Skip a cache write when a file of the same name and size exists.
    pub skip_existing: bool,
    /// Deadline for resolving (reading or fetching) a single image.
    pub timeout_ms: Option<u64>,
    pub retry: RetryOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cache_directory: None,
            factory_pattern: DEFAULT_FACTORY_PATTERN.to_string(),
            hash_encoding: HashEncoding::default(),
            identifiers: IdentifierStyle::default(),
            skip_existing: true,
            timeout_ms: None,
            retry: RetryOptions::default(),
        }
    }
}

impl Options {
    pub fn new(cache_directory: impl Into<PathBuf>) -> Self {
        Self {
            cache_directory: Some(cache_directory.into()),
            ..Default::default()
        }
    }

    pub fn from_json(config: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(config)?)
    }
}
