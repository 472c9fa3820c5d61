//! Opaque, path-safe tokens for proxied URLs.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::proxy::errors::ProxyError;

/// URL-safe alphabet; emits no padding, accepts tokens with or without it.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode an absolute URL into a token that can be carried in a path segment.
pub fn encode(url: &str) -> String {
    TOKEN_ENGINE.encode(url.as_bytes())
}

/// Decode a token produced by [`encode`].
///
/// Only invalid base64 is rejected. Bytes that are not UTF-8 are replaced
/// lossily, so the result must still be treated as an untrusted URL.
pub fn decode(token: &str) -> Result<String, ProxyError> {
    let bytes = TOKEN_ENGINE
        .decode(token.trim())
        .map_err(|e| ProxyError::MalformedToken(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
