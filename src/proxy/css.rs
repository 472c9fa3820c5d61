//! Rewrites `url(...)` references inside stylesheets and `<style>` blocks.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::proxy::ProxyConfig;
use crate::proxy::link;

/// `url(` + optional whitespace + a single-quoted, double-quoted, or bare body + `)`.
///
/// Unterminated or otherwise malformed references simply do not match.
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"url\((?P<lead>\s*)(?:'(?P<single>[^']*)'|"(?P<double>[^"]*)"|(?P<bare>[^'"\s)][^)]*?))(?P<trail>\s*)\)"#,
    )
    .unwrap()
});

/// Rewrite every `url(...)` in `css` through [`link::rewrite`], keeping its quote style.
pub fn rewrite(css: &str, config: &ProxyConfig) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures| {
            let (quote, body) = if let Some(body) = caps.name("single") {
                ("'", body.as_str())
            } else if let Some(body) = caps.name("double") {
                ("\"", body.as_str())
            } else {
                ("", caps.name("bare").map_or("", |m| m.as_str()))
            };
            format!(
                "url({lead}{quote}{rewritten}{quote}{trail})",
                lead = &caps["lead"],
                rewritten = link::rewrite(body, config),
                trail = &caps["trail"],
            )
        })
        .into_owned()
}
