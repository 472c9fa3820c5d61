//! Error types for the rewriting proxy.

/// Failures that abort a single proxied request.
///
/// None of these are fatal to the process; each maps to an error response for
/// the one request that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("too many redirects (followed {max} without reaching a final response)")]
    TooManyRedirects { max: u32 },
    #[error("malformed url token: {0}")]
    MalformedToken(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's Display omits the underlying cause, which is usually the useful part
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ProxyError::Transport(message)
    }
}
