//! Router construction.

use std::time::Duration;

use axum::Router;
use axum::routing::{any, get};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::{proxy, status};

/// Reserved path for the proxy's own endpoints; never forwarded upstream.
pub const INTERNAL_PREFIX: &str = "/_relink";

/// Creates the web server router.
///
/// `/` serves the origin, `{proxy_path_prefix}{token}` serves an encoded target.
/// `handler_timeout` is a backstop above the engine's deadline; it answers 408.
pub fn create_router(app_state: AppState, handler_timeout: Duration) -> Router {
    let token_route = format!(
        "{}{{token}}",
        app_state.engine.config().proxy_path_prefix
    );

    Router::new()
        .route(&format!("{INTERNAL_PREFIX}/health"), get(status::health))
        .route("/", any(proxy::proxy_root))
        .route(&token_route, any(proxy::proxy_token))
        .with_state(app_state)
        .layer((
            TraceLayer::new_for_http(),
            TimeoutLayer::new(handler_timeout),
        ))
}
