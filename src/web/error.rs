//! Mapping of proxy failures onto client responses.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::proxy::ProxyError;

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Transport(_) | ProxyError::TooManyRedirects { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::MalformedToken(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Failures are reported as a short plain-text message; no partial body is ever sent.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!(status = status.as_u16(), error = %self, "proxy request failed");

        let mut response = (status, format!("Error: {self}")).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::Transport("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::TooManyRedirects { max: 5 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::MalformedToken("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
