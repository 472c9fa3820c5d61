//! Shared fixtures: a scripted in-memory transport.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use relink::proxy::{ProxyConfig, ProxyError, RawResponse, Transport, TransportRequest};

pub const ORIGIN: &str = "http://example.com";

pub fn config() -> ProxyConfig {
    ProxyConfig::new(ORIGIN, vec!["example.com".to_string()])
}

/// A token path as emitted by the link rewriter with the default prefix.
pub fn token_path(url: &str) -> String {
    format!("/{}", relink::proxy::encoder::encode(url))
}

/// Build a response whose header block lists `headers` in order.
pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> RawResponse {
    let mut header_block = format!("HTTP/1.1 {status} X\r\n");
    for (name, value) in headers {
        header_block.push_str(&format!("{name}: {value}\r\n"));
    }
    RawResponse {
        status,
        header_block,
        body: Bytes::from(body.to_owned()),
    }
}

pub fn redirect(location: &str) -> RawResponse {
    response(302, &[("Location", location)], "")
}

enum Scripted {
    Respond(RawResponse),
    Fail(String),
    Stall,
}

/// Answers by exact URL; unknown URLs fail as transport errors.
pub struct MockTransport {
    routes: HashMap<String, Scripted>,
    follows_redirects: bool,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            follows_redirects: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Behave like a transport with automatic redirects disabled.
    pub fn manual_redirects(mut self) -> Self {
        self.follows_redirects = false;
        self
    }

    pub fn route(mut self, url: &str, response: RawResponse) -> Self {
        self.routes.insert(url.to_owned(), Scripted::Respond(response));
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.routes
            .insert(url.to_owned(), Scripted::Fail(message.to_owned()));
        self
    }

    /// Never answer requests for `url`.
    pub fn stall(mut self, url: &str) -> Self {
        self.routes.insert(url.to_owned(), Scripted::Stall);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &TransportRequest) -> Result<RawResponse, ProxyError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.routes.get(&request.url) {
            Some(Scripted::Respond(response)) => Ok(response.clone()),
            Some(Scripted::Fail(message)) => Err(ProxyError::Transport(message.clone())),
            Some(Scripted::Stall) => std::future::pending().await,
            None => Err(ProxyError::Transport(format!(
                "connection refused: {}",
                request.url
            ))),
        }
    }

    fn follows_redirects(&self) -> bool {
        self.follows_redirects
    }
}
