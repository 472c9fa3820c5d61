//! Manual redirect walking for transports that do not follow redirects.

use tracing::debug;
use url::Url;

use crate::proxy::ProxyConfig;
use crate::proxy::errors::ProxyError;
use crate::proxy::headers;
use crate::proxy::transport::{Transport, TransportRequest};

/// Maximum redirects followed when none is configured.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

#[derive(Debug)]
pub enum RedirectState {
    /// `url` is about to be probed; `remaining` more redirects may be followed.
    Following { url: String, remaining: u32 },
    Done { url: String },
    Failed(ProxyError),
}

/// Probes a URL with HEAD requests until it stops redirecting.
pub struct RedirectFollower<'a> {
    transport: &'a dyn Transport,
    config: &'a ProxyConfig,
    max_redirects: u32,
    headers: Vec<(String, String)>,
}

impl<'a> RedirectFollower<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a ProxyConfig, max_redirects: u32) -> Self {
        Self {
            transport,
            config,
            max_redirects,
            headers: Vec::new(),
        }
    }

    /// Headers sent with every probe (cookies, mostly).
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Walk the chain starting at `url` and return the first non-redirecting URL.
    pub async fn resolve(&self, url: &str) -> Result<String, ProxyError> {
        let mut state = RedirectState::Following {
            url: url.to_owned(),
            remaining: self.max_redirects,
        };
        loop {
            state = match state {
                RedirectState::Following { url, remaining } => self.step(url, remaining).await,
                RedirectState::Done { url } => return Ok(url),
                RedirectState::Failed(err) => return Err(err),
            };
        }
    }

    async fn step(&self, url: String, remaining: u32) -> RedirectState {
        let probe = TransportRequest::head(url.as_str(), self.headers.clone());
        let response = match self.transport.fetch(&probe).await {
            Ok(response) => response,
            Err(err) => return RedirectState::Failed(err),
        };

        if !matches!(response.status, 301 | 302) {
            return RedirectState::Done { url };
        }

        let parsed = headers::parse(headers::last_section(&response.header_block));
        let Some(location) = parsed.get("Location").map(|entry| entry.first().trim()) else {
            debug!(url = url.as_str(), "redirect without location, treating as final");
            return RedirectState::Done { url };
        };

        if remaining == 0 {
            return RedirectState::Failed(ProxyError::TooManyRedirects {
                max: self.max_redirects,
            });
        }

        let next = resolve_location(&url, &location.replace(' ', "%20"), self.config);
        debug!(
            status = response.status,
            from = url.as_str(),
            to = next.as_str(),
            remaining = remaining - 1,
            "following redirect"
        );
        RedirectState::Following {
            url: next,
            remaining: remaining - 1,
        }
    }
}

/// Root-relative locations are rebased on the origin; other relative ones on `current`.
fn resolve_location(current: &str, location: &str, config: &ProxyConfig) -> String {
    if location.starts_with('/') && !location.starts_with("//") {
        return format!("{}{location}", config.origin_prefix.trim_end_matches('/'));
    }
    if Url::parse(location).is_ok() {
        return location.to_owned();
    }
    Url::parse(current)
        .and_then(|base| base.join(location))
        .map(String::from)
        .unwrap_or_else(|_| location.to_owned())
}
