//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::proxy::ProxyEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: ProxyEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            started_at: Instant::now(),
        }
    }
}
