//! Upstream HTTP transport.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use reqwest::redirect::Policy;
use serde::Deserialize;
use tracing::trace;

use crate::proxy::errors::ProxyError;

/// Default user agent presented to the upstream site.
pub const DEFAULT_USER_AGENT: &str = "Opera/9.23 (Windows NT 5.1; U; en)";

/// A single upstream request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    /// Headers-only probe, used while walking redirect chains.
    pub fn head(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            method: Method::HEAD,
            url: url.into(),
            headers,
            body: None,
        }
    }
}

/// An upstream response before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// One or more `HTTP/x` header sections, separated by blank lines.
    pub header_block: String,
    pub body: Bytes,
}

/// Whether redirects are followed by the transport itself or walked manually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    #[default]
    Auto,
    Manual,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &TransportRequest) -> Result<RawResponse, ProxyError>;

    /// `false` when 3xx responses are returned as-is and the caller must follow them.
    fn follows_redirects(&self) -> bool {
        true
    }
}

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// Connections are checked out per request and returned to the pool when the
/// response is consumed or dropped, so one instance serves concurrent requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    mode: RedirectMode,
    max_redirects: u32,
}

impl HttpTransport {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        mode: RedirectMode,
        max_redirects: u32,
    ) -> Result<Self, ProxyError> {
        let policy = match mode {
            RedirectMode::Auto => Policy::limited(max_redirects as usize),
            RedirectMode::Manual => Policy::none(),
        };
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(policy)
            .build()?;
        Ok(Self {
            client,
            mode,
            max_redirects,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &TransportRequest) -> Result<RawResponse, ProxyError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_redirect() {
                ProxyError::TooManyRedirects {
                    max: self.max_redirects,
                }
            } else {
                ProxyError::from(e)
            }
        })?;

        let status = response.status();
        let mut header_block = format!(
            "{:?} {} {}\r\n",
            response.version(),
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        for (name, value) in response.headers() {
            let _ = write!(
                header_block,
                "{}: {}\r\n",
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes())
            );
        }

        let body = response.bytes().await?;
        trace!(
            status = status.as_u16(),
            bytes = body.len(),
            url = request.url.as_str(),
            "upstream response received"
        );

        Ok(RawResponse {
            status: status.as_u16(),
            header_block,
            body,
        })
    }

    fn follows_redirects(&self) -> bool {
        self.mode == RedirectMode::Auto
    }
}
