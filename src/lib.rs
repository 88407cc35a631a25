//! Rewrites `factory(components.img, { src: "..." })` call sites in compiled
//! JSX (MDX output and the like) into static imports of content-addressed
//! files:
//!
//! ```js
//! // before
//! import { jsx as _jsx } from "react/jsx-runtime";
//! _jsx(_components.img, { src: "./logo.png", alt: "Logo" });
//! // after
//! import static_image_1 from "/abs/cache/<sha256>.png";
//! import { jsx as _jsx } from "react/jsx-runtime";
//! _jsx(_components.img, { src: static_image_1, alt: "Logo" });
//! ```
//!
//! Local `src` values are read relative to the document; absolute URLs are
//! fetched (with retries). Each distinct image is written once to the cache
//! directory as `<hash><ext>`.

mod cache;
mod document;
mod error;
mod fetch;
mod hash;
mod inject;
mod matcher;
mod options;
mod rewrite;
mod source;
mod transform;

#[cfg(test)]
mod testing;

pub use cache::ImageCache;
pub use document::SourceDocument;
pub use error::{ConfigError, FetchError, TransformError, TransformResult};
pub use fetch::{
    parse_retry_after, Delay, Fetch, FetchResponse, HttpFetch, RetryFetch, RetryOptions,
    RetryPolicy, DEFAULT_RETRY_STATUSES, MAX_RETRY_AFTER_SECS,
};
pub use hash::{content_hash, HashEncoding};
pub use inject::inject_imports;
pub use matcher::{find_factory_identifiers, is_image_call, FactoryNames};
pub use options::{IdentifierStyle, Options, DEFAULT_FACTORY_PATTERN};
pub use source::{extension, SourceRef};
pub use transform::StaticImages;

pub use swc_core::ecma::ast::Program;
pub use reqwest::Url;
