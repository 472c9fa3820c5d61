//! Request orchestration: resolve the target, fetch it, rewrite the body.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::Method;
use tracing::debug;
use url::form_urlencoded;

use crate::proxy::errors::ProxyError;
use crate::proxy::headers::{self, HeaderEntry, ParsedHeaders};
use crate::proxy::inject::DocumentHook;
use crate::proxy::redirect::{DEFAULT_MAX_REDIRECTS, RedirectFollower};
use crate::proxy::transport::{RawResponse, Transport, TransportRequest};
use crate::proxy::{ProxyConfig, charset, css, encoder, html};
use crate::utils::{fmt_duration, log_if_slow};

/// Upstream fetches slower than this are logged at warn.
const SLOW_FETCH_THRESHOLD: Duration = Duration::from_secs(5);

/// Everything needed to issue the upstream request.
#[derive(Debug, Clone, Default)]
pub struct UpstreamRequest {
    pub target_url: String,
    pub query_params: Vec<(String, String)>,
    /// Present for POST requests.
    pub post_body: Option<Bytes>,
    /// Client request headers forwarded upstream (content type, cookies).
    pub headers: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn method(&self) -> Method {
        if self.post_body.is_some() {
            Method::POST
        } else {
            Method::GET
        }
    }

    /// Target URL with the query parameters appended.
    pub fn url(&self) -> String {
        if self.query_params.is_empty() {
            return self.target_url.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query_params)
            .finish();
        let separator = if self.target_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.target_url)
    }
}

/// Per-request rewrite state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteContext {
    /// MIME type from the response's Content-Type; `None` means passthrough.
    pub page_type: Option<String>,
}

impl RewriteContext {
    pub fn from_headers(headers: &ParsedHeaders) -> Self {
        Self {
            page_type: headers::classify_content_type(headers),
        }
    }
}

/// The transformed response handed back to the client.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    /// Whitelisted headers; repeated names appear as repeated entries.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

pub struct ProxyEngine {
    config: Arc<ProxyConfig>,
    transport: Arc<dyn Transport>,
    max_redirects: u32,
    hook: Option<Arc<dyn DocumentHook>>,
    deadline: Option<Duration>,
}

impl ProxyEngine {
    pub fn new(config: ProxyConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            hook: None,
            deadline: None,
        }
    }

    /// Redirect budget for manual following; unused when the transport follows redirects.
    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn DocumentHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Upper bound on one proxied request, redirect probes included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the upstream request for an inbound `token`.
    ///
    /// An empty token targets the configured origin.
    pub fn upstream_request(
        &self,
        token: &str,
        query_params: Vec<(String, String)>,
        post_body: Option<Bytes>,
        headers: Vec<(String, String)>,
    ) -> Result<UpstreamRequest, ProxyError> {
        let target_url = if token.trim().is_empty() {
            self.config.origin_prefix.clone()
        } else {
            encoder::decode(token)?
        };
        Ok(UpstreamRequest {
            target_url,
            query_params,
            post_body,
            headers,
        })
    }

    /// Resolve, fetch, and rewrite.
    pub async fn run(
        &self,
        token: &str,
        query_params: Vec<(String, String)>,
        post_body: Option<Bytes>,
        headers: Vec<(String, String)>,
    ) -> Result<ProxyResponse, ProxyError> {
        let request = self.upstream_request(token, query_params, post_body, headers)?;
        let Some(deadline) = self.deadline else {
            return self.execute(request).await;
        };
        tokio::time::timeout(deadline, self.execute(request))
            .await
            .map_err(|_| {
                ProxyError::Transport(format!("no response within {}", fmt_duration(deadline)))
            })?
    }

    pub async fn execute(&self, request: UpstreamRequest) -> Result<ProxyResponse, ProxyError> {
        let mut url = request.url();

        if !self.transport.follows_redirects() {
            url = RedirectFollower::new(self.transport.as_ref(), &self.config, self.max_redirects)
                .with_headers(request.headers.clone())
                .resolve(&url)
                .await?;
        }

        let method = request.method();
        debug!(method = %method, url = url.as_str(), "fetching upstream");

        let start = Instant::now();
        let response = self
            .transport
            .fetch(&TransportRequest {
                method,
                url,
                headers: request.headers,
                body: request.post_body,
            })
            .await?;
        log_if_slow(start, SLOW_FETCH_THRESHOLD, "upstream fetch");

        Ok(self.transform(response))
    }

    /// Filter headers and rewrite the body according to its content type.
    pub fn transform(&self, response: RawResponse) -> ProxyResponse {
        let parsed = headers::parse(headers::last_section(&response.header_block));
        let mut forwarded =
            headers::select_forwardable(&parsed, &self.config.forwarded_header_names);
        let context = RewriteContext::from_headers(&parsed);

        let body = match context.page_type.as_deref() {
            Some("text/html") => self.rewrite_text(&response.body, &parsed, &mut forwarded, |text| {
                html::rewrite(text, &self.config, self.hook.as_deref())
            }),
            Some("text/css") => self.rewrite_text(&response.body, &parsed, &mut forwarded, |text| {
                css::rewrite(text, &self.config)
            }),
            _ => response.body,
        };

        // Location is never forwarded, so a relayed 3xx would strand the browser
        let status = if (300..400).contains(&response.status) {
            debug!(status = response.status, "answering upstream redirect with 200");
            200
        } else {
            response.status
        };

        debug!(
            status,
            page_type = context.page_type.as_deref().unwrap_or("-"),
            headers = forwarded.len(),
            bytes = body.len(),
            "response transformed"
        );

        ProxyResponse {
            status,
            headers: forwarded.lines(),
            body,
        }
    }

    /// Decode by the declared charset, rewrite, and encode back into it.
    ///
    /// The forwarded Content-Type is corrected when the output encoding differs
    /// from the declared one (a BOM override, or UTF-16 written as UTF-8).
    fn rewrite_text(
        &self,
        body: &[u8],
        parsed: &ParsedHeaders,
        forwarded: &mut ParsedHeaders,
        rewrite: impl FnOnce(&str) -> String,
    ) -> Bytes {
        let content_type = parsed
            .get("Content-Type")
            .map(HeaderEntry::first)
            .unwrap_or_default();
        let declared = charset::from_content_type(content_type);

        let (text, decoded_as) = charset::decode(body, declared);
        let (bytes, encoded_as) = charset::encode(&rewrite(&text), decoded_as);

        if declared.is_some_and(|declared| declared != encoded_as) {
            forwarded.replace("Content-Type", charset::with_charset(content_type, encoded_as));
        }
        Bytes::from(bytes)
    }
}
