//! HTML rewriting over a tolerant DOM.
//!
//! Documents are parsed with html5ever (via kuchikiki), which implements the
//! WHATWG error-recovery rules: unterminated tags, stray end tags and
//! misnested markup are repaired rather than rejected, so every page yields a
//! tree. Rewriting then works on that tree, and the tree is serialized back.

use kuchikiki::NodeRef;
use kuchikiki::traits::*;
use tracing::{debug, warn};

use crate::proxy::ProxyConfig;
use crate::proxy::inject::DocumentHook;
use crate::proxy::{css, link};

/// Compatibility patch for one upstream page that builds an AJAX URL in an inline script.
const AJAX_DETAILS_CALL: &str = "new Ajax.Updater('artistDetails', '/ajax_details_artinfo.php', {";
const AJAX_DETAILS_PATH: &str = "/ajax_details_artinfo.php";

/// Rewrite all link-bearing attributes and inline styles in `html`.
///
/// `hook`, when given, receives the rewritten document before serialization.
pub fn rewrite(html: &str, config: &ProxyConfig, hook: Option<&dyn DocumentHook>) -> String {
    let document = kuchikiki::parse_html().one(html);

    let rewritten = rewrite_link_attributes(&document, config);
    let styles = rewrite_style_blocks(&document, config);
    debug!(attributes = rewritten, styles, "rewrote html document");

    let document = match hook {
        Some(hook) => hook.inject(document),
        None => document,
    };

    let mut buf = Vec::with_capacity(html.len());
    if let Err(e) = document.serialize(&mut buf) {
        warn!(error = %e, "failed to serialize rewritten document, returning original");
        return html.to_owned();
    }
    let serialized = String::from_utf8_lossy(&buf).into_owned();

    let ajax_call = format!(
        "new Ajax.Updater('artistDetails', '{}', {{",
        link::rewrite(AJAX_DETAILS_PATH, config)
    );
    serialized.replace(AJAX_DETAILS_CALL, &ajax_call)
}

/// Returns the number of attributes rewritten.
fn rewrite_link_attributes(document: &NodeRef, config: &ProxyConfig) -> usize {
    let mut count = 0;
    for (tag, attribute) in &config.tag_attribute_map {
        let Ok(elements) = document.select(tag) else {
            warn!(tag = tag.as_str(), "invalid tag name in attribute map");
            continue;
        };
        for element in elements {
            let mut attributes = element.attributes.borrow_mut();
            let Some(value) = attributes.get(attribute.as_str()).map(str::to_owned) else {
                continue;
            };
            // Unescaped here; the serializer escapes attribute values itself
            attributes.insert(attribute.as_str(), link::resolve(&value, config));
            count += 1;
        }
    }
    count
}

/// Returns the number of `<style>` elements rewritten.
fn rewrite_style_blocks(document: &NodeRef, config: &ProxyConfig) -> usize {
    let Ok(styles) = document.select("style") else {
        return 0;
    };
    let mut count = 0;
    for style in styles {
        let node = style.as_node();
        let text = node.text_contents();
        if text.is_empty() {
            continue;
        }
        let children: Vec<NodeRef> = node.children().collect();
        for child in children {
            child.detach();
        }
        node.append(NodeRef::new_text(css::rewrite(&text, config)));
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::encoder;
    use crate::proxy::inject::BannerInjector;
    use html_scraper::{Html, Selector};

    fn config() -> ProxyConfig {
        ProxyConfig::new("http://example.com", vec!["example.com".to_string()])
    }

    fn token(url: &str) -> String {
        format!("/{}", encoder::encode(url))
    }

    fn attrs(html: &str, selector: &str, attr: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel)
            .filter_map(|el| el.attr(attr).map(str::to_owned))
            .collect()
    }

    #[test]
    fn test_rewrites_mapped_attributes() {
        let page = r#"<html><head>
            <link rel="stylesheet" href="/static/main.css">
            <script src="//static.example.com/app.js"></script>
            </head><body>
            <a href="/browse/200">Browse</a>
            <a href="https://other.org/">Elsewhere</a>
            <img src="/logo.png">
            <form action="/search"><input name="q"></form>
            </body></html>"#;
        let out = rewrite(page, &config(), None);

        assert_eq!(
            attrs(&out, "link", "href"),
            vec![token("http://example.com/static/main.css")]
        );
        assert_eq!(
            attrs(&out, "script", "src"),
            vec![token("http://static.example.com/app.js")]
        );
        assert_eq!(
            attrs(&out, "a", "href"),
            vec![
                token("http://example.com/browse/200"),
                "https://other.org/".to_string()
            ]
        );
        assert_eq!(attrs(&out, "img", "src"), vec![token("http://example.com/logo.png")]);
        assert_eq!(
            attrs(&out, "form", "action"),
            vec![token("http://example.com/search")]
        );
    }

    #[test]
    fn test_only_mapped_attribute_is_touched() {
        let out = rewrite(
            r#"<a name="/anchor">x</a><img alt="/alt" src="/i.png"><div data-href="/d"></div>"#,
            &config(),
            None,
        );
        assert_eq!(attrs(&out, "a", "name"), vec!["/anchor".to_string()]);
        assert_eq!(attrs(&out, "img", "alt"), vec!["/alt".to_string()]);
        assert_eq!(attrs(&out, "div", "data-href"), vec!["/d".to_string()]);
    }

    #[test]
    fn test_attribute_escaped_once() {
        let out = rewrite(r#"<a href="https://other.org/?a=1&amp;b=2">x</a>"#, &config(), None);
        assert!(out.contains(r#"href="https://other.org/?a=1&amp;b=2""#), "{out}");
        assert!(!out.contains("&amp;amp;"));
    }

    #[test]
    fn test_rewrites_style_blocks() {
        let out = rewrite(
            "<style>body { background: url('/bg.png') }</style><p>hi</p>",
            &config(),
            None,
        );
        assert!(
            out.contains(&format!(
                "body {{ background: url('{}') }}",
                token("http://example.com/bg.png")
            )),
            "{out}"
        );
    }

    #[test]
    fn test_malformed_markup_is_recovered() {
        let page = r#"<div><a href="/one">one<p><img src="/two.png"><table><tr><td><a href="//example.com/three">three"#;
        let out = rewrite(page, &config(), None);
        let hrefs = attrs(&out, "a", "href");
        assert!(hrefs.contains(&token("http://example.com/one")), "{out}");
        assert!(hrefs.contains(&token("http://example.com/three")), "{out}");
        assert_eq!(attrs(&out, "img", "src"), vec![token("http://example.com/two.png")]);
    }

    #[test]
    fn test_garbage_input_does_not_fail() {
        let out = rewrite("<<<>>><a href=\"/x\"", &config(), None);
        assert!(out.contains("<html>"));
        assert!(rewrite("", &config(), None).contains("<body>"));
    }

    #[test]
    fn test_hook_runs_after_rewriting() {
        let banner = BannerInjector::new(r#"<a id="banner" href="/about">proxy</a>"#);
        let out = rewrite("<body><a href=\"/x\">x</a></body>", &config(), Some(&banner));
        // The banner's own link was inserted after rewriting, so it is left as written
        assert_eq!(attrs(&out, "a#banner", "href"), vec!["/about".to_string()]);
        assert_eq!(
            attrs(&out, "a:not(#banner)", "href"),
            vec![token("http://example.com/x")]
        );
    }

    #[test]
    fn test_ajax_details_patch() {
        let page = "<script>new Ajax.Updater('artistDetails', '/ajax_details_artinfo.php', {method: 'get'});</script>";
        let out = rewrite(page, &config(), None);
        assert!(
            out.contains(&format!(
                "new Ajax.Updater('artistDetails', '{}', {{method: 'get'}}",
                token("http://example.com/ajax_details_artinfo.php")
            )),
            "{out}"
        );
        assert!(!out.contains("'/ajax_details_artinfo.php'"));
    }
}
