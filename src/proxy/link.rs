//! Decides whether a link must be routed back through the proxy.

use url::Url;

use crate::proxy::ProxyConfig;
use crate::proxy::encoder;

/// Normalize `url` and, if it points at a blocked origin, replace it with a proxy path.
///
/// The result is entity-escaped for direct insertion into markup or CSS.
pub fn rewrite(url: &str, config: &ProxyConfig) -> String {
    html_escape::encode_quoted_attribute(&resolve(url, config)).into_owned()
}

/// Same as [`rewrite`] without the final escaping.
///
/// Used where the consumer escapes on its own, such as DOM serialization.
pub fn resolve(url: &str, config: &ProxyConfig) -> String {
    let absolute = absolutize(url, config);

    // Hostless links (mailto:, javascript:, fragments, page-relative) never match
    match host_of(&absolute) {
        Some(host) if is_blocked(&host, config) => {
            format!("{}{}", config.proxy_path_prefix, encoder::encode(&absolute))
        }
        _ => absolute,
    }
}

/// Resolve root-relative (`/x`) and protocol-relative (`//host/x`) links.
pub fn absolutize(url: &str, config: &ProxyConfig) -> String {
    if url.starts_with("//") {
        format!("http:{url}")
    } else if url.starts_with('/') {
        format!("{}{url}", config.origin_prefix.trim_end_matches('/'))
    } else {
        url.to_owned()
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_owned))
}

/// Substring containment, so `cdn.example.com` and `notexample.com` both match `example.com`.
fn is_blocked(host: &str, config: &ProxyConfig) -> bool {
    config
        .blocked_origins
        .iter()
        .any(|blocked| !blocked.is_empty() && host.contains(blocked.as_str()))
}
