//! The proxy endpoint: decode the target, run the engine, relay the result.

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::proxy::ProxyResponse;
use crate::state::AppState;

/// Query parameter that may carry the token instead of the path.
const TOKEN_PARAM: &str = "url";

/// Client request headers forwarded to the upstream site.
const FORWARDED_REQUEST_HEADERS: &[HeaderName] = &[header::COOKIE, header::ACCEPT_LANGUAGE];

/// `/` - the configured origin, or the target named by `?url=<token>`.
pub async fn proxy_root(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    proxy_request(&state, None, params, &headers, body).await
}

/// `/{token}` - the target encoded in the path.
pub async fn proxy_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    proxy_request(&state, Some(token), params, &headers, body).await
}

async fn proxy_request(
    state: &AppState,
    path_token: Option<String>,
    mut params: Vec<(String, String)>,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    // The token parameter is consumed here, never forwarded
    let query_token = params
        .iter()
        .position(|(name, _)| name == TOKEN_PARAM)
        .map(|index| params.remove(index).1);
    params.retain(|(name, _)| name != TOKEN_PARAM);
    let token = path_token.or(query_token).unwrap_or_default();

    let mut upstream_headers = Vec::new();
    for name in FORWARDED_REQUEST_HEADERS {
        for value in headers.get_all(name) {
            if let Ok(value) = value.to_str() {
                upstream_headers.push((name.as_str().to_owned(), value.to_owned()));
            }
        }
    }

    let post_body = if body.is_empty() {
        None
    } else {
        if let Some(content_type) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            upstream_headers.push((header::CONTENT_TYPE.as_str().to_owned(), content_type.to_owned()));
        }
        Some(body)
    };

    match state
        .engine
        .run(&token, params, post_body, upstream_headers)
        .await
    {
        Ok(response) => into_client_response(response),
        Err(e) => e.into_response(),
    }
}

fn into_client_response(response: ProxyResponse) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            debug!(name = name.as_str(), "dropping header not representable in a response");
            continue;
        };
        // append, so repeated Set-Cookie lines survive
        headers.append(name, value);
    }

    // Built by hand so no default Content-Type is added when upstream sent none
    let mut client_response = Response::new(Body::from(response.body));
    *client_response.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    *client_response.headers_mut() = headers;
    client_response
}
