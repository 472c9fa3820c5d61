//! Document hooks run after link rewriting and before serialization.

use kuchikiki::NodeRef;
use kuchikiki::traits::*;
use tracing::debug;

/// Caller-supplied mutation of a parsed page, e.g. inserting a banner.
///
/// Invoked once per HTML response; the returned document is the one serialized.
pub trait DocumentHook: Send + Sync {
    fn inject(&self, document: NodeRef) -> NodeRef;
}

impl<F> DocumentHook for F
where
    F: Fn(NodeRef) -> NodeRef + Send + Sync,
{
    fn inject(&self, document: NodeRef) -> NodeRef {
        self(document)
    }
}

/// Prepends a fixed HTML fragment to the page body.
#[derive(Debug, Clone)]
pub struct BannerInjector {
    fragment: String,
}

impl BannerInjector {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
        }
    }
}

impl DocumentHook for BannerInjector {
    fn inject(&self, document: NodeRef) -> NodeRef {
        let Ok(body) = document.select_first("body") else {
            debug!("document has no body, skipping banner");
            return document;
        };

        // The fragment is parsed as its own document; its body children are the banner
        let parsed = kuchikiki::parse_html().one(self.fragment.as_str());
        let Ok(fragment_body) = parsed.select_first("body") else {
            return document;
        };
        let nodes: Vec<NodeRef> = fragment_body.as_node().children().collect();

        for node in nodes.into_iter().rev() {
            node.detach();
            body.as_node().prepend(node);
        }

        document
    }
}
