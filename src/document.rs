use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{TransformError, TransformResult};

/// The host pipeline's view of the file being transformed.
///
/// `history` holds every path the document has been known by; the first
/// entry is the file it was read from and anchors relative `src` values.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    pub history: Vec<PathBuf>,
    /// Best-effort diagnostics for the host; never affects control flow.
    pub messages: Vec<String>,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            history: vec![path.into()],
            messages: Vec::new(),
        }
    }

    pub fn path(&self) -> TransformResult<&Path> {
        self.history
            .first()
            .map(PathBuf::as_path)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(TransformError::DocumentState)
    }

    /// Directory of the originating file. A bare file name yields `""`.
    pub fn dirname(&self) -> TransformResult<&Path> {
        let path = self.path()?;
        Ok(path.parent().unwrap_or_else(|| Path::new("")))
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "static_images", "{message}");
        self.messages.push(message);
    }
}
