//! The rewrite engine: link encoding, header handling, HTML/CSS rewriting, and
//! the orchestration that ties them to an upstream transport.

pub mod charset;
pub mod css;
pub mod encoder;
pub mod engine;
pub mod errors;
pub mod headers;
pub mod html;
pub mod inject;
pub mod link;
pub mod redirect;
pub mod transport;

pub use engine::{ProxyEngine, ProxyResponse, RewriteContext, UpstreamRequest};
pub use errors::ProxyError;
pub use inject::{BannerInjector, DocumentHook};
pub use transport::{HttpTransport, RawResponse, RedirectMode, Transport, TransportRequest};

use indexmap::IndexMap;

/// Element → attribute pairs whose values carry a link.
pub const DEFAULT_TAG_ATTRIBUTES: &[(&str, &str)] = &[
    ("form", "action"),
    ("a", "href"),
    ("img", "src"),
    ("script", "src"),
    ("link", "href"),
];

/// Read-only rewrite settings shared by every request.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Default target, and the base for root-relative links.
    pub origin_prefix: String,
    /// Host substrings whose links are routed back through the proxy.
    pub blocked_origins: Vec<String>,
    /// Upstream response headers passed through to the client.
    pub forwarded_header_names: Vec<String>,
    pub tag_attribute_map: IndexMap<String, String>,
    /// Prepended to encoded tokens when building proxy links.
    pub proxy_path_prefix: String,
}

impl ProxyConfig {
    pub fn new(origin_prefix: impl Into<String>, blocked_origins: Vec<String>) -> Self {
        Self {
            origin_prefix: origin_prefix.into(),
            blocked_origins: blocked_origins
                .into_iter()
                .map(|origin| origin.trim().to_ascii_lowercase())
                .filter(|origin| !origin.is_empty())
                .collect(),
            forwarded_header_names: headers::FORWARDED_HEADERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            tag_attribute_map: DEFAULT_TAG_ATTRIBUTES
                .iter()
                .map(|(tag, attr)| (tag.to_string(), attr.to_string()))
                .collect(),
            proxy_path_prefix: "/".to_string(),
        }
    }

    /// Configuration that proxies only the origin's own host.
    pub fn for_origin(origin_prefix: &str) -> Self {
        let host = url::Url::parse(origin_prefix)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_owned))
            .into_iter()
            .collect();
        Self::new(origin_prefix, host)
    }
}
