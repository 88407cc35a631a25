use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// How the sha256 digest is spelled in cache file names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashEncoding {
    #[default]
    Hex,
    /// URL-safe alphabet without padding, so the name never contains `/`.
    Base64url,
}

/// Content address of `bytes`.
pub fn content_hash(bytes: &[u8], encoding: HashEncoding) -> String {
    let digest = Sha256::digest(bytes);
    match encoding {
        HashEncoding::Hex => hex::encode(digest),
        HashEncoding::Base64url => URL_SAFE_NO_PAD.encode(digest),
    }
}
