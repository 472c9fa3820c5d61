mod helpers;

use std::sync::Arc;

use helpers::{MockTransport, ORIGIN, config, redirect, response};
use relink::proxy::redirect::RedirectFollower;
use relink::proxy::{ProxyEngine, ProxyError};

/// `/0` redirects to `/1`, and so on up to `/{hops}`, which answers 200.
fn chain(hops: usize) -> MockTransport {
    let mut transport = MockTransport::new().manual_redirects();
    for i in 0..hops {
        transport = transport.route(
            &format!("{ORIGIN}/{i}"),
            redirect(&format!("{ORIGIN}/{}", i + 1)),
        );
    }
    transport.route(
        &format!("{ORIGIN}/{hops}"),
        response(200, &[("Content-Type", "text/plain")], "final"),
    )
}

#[tokio::test]
async fn follows_up_to_the_limit() {
    let transport = chain(5);
    let config = config();
    let resolved = RedirectFollower::new(&transport, &config, 5)
        .resolve(&format!("{ORIGIN}/0"))
        .await
        .unwrap();
    assert_eq!(resolved, format!("{ORIGIN}/5"));
    assert_eq!(transport.requests().len(), 6);
    assert!(
        transport
            .requests()
            .iter()
            .all(|r| r.method == http::Method::HEAD)
    );
}

#[tokio::test]
async fn one_past_the_limit_fails() {
    let transport = chain(6);
    let config = config();
    let err = RedirectFollower::new(&transport, &config, 5)
        .resolve(&format!("{ORIGIN}/0"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::TooManyRedirects { max: 5 }));
}

#[tokio::test]
async fn zero_budget_accepts_a_final_response() {
    let transport = chain(0);
    let config = config();
    let resolved = RedirectFollower::new(&transport, &config, 0)
        .resolve(&format!("{ORIGIN}/0"))
        .await
        .unwrap();
    assert_eq!(resolved, format!("{ORIGIN}/0"));
}

#[tokio::test]
async fn root_relative_location_uses_origin() {
    let transport = MockTransport::new()
        .manual_redirects()
        .route("http://cdn.other.org/file", redirect("/mirror/file"))
        .route(&format!("{ORIGIN}/mirror/file"), response(200, &[], ""));
    let config = config();
    let resolved = RedirectFollower::new(&transport, &config, 5)
        .resolve("http://cdn.other.org/file")
        .await
        .unwrap();
    assert_eq!(resolved, format!("{ORIGIN}/mirror/file"));
}

#[tokio::test]
async fn spaces_in_location_are_encoded() {
    let transport = MockTransport::new()
        .manual_redirects()
        .route(ORIGIN, redirect("/my file.txt"))
        .route(&format!("{ORIGIN}/my%20file.txt"), response(200, &[], ""));
    let config = config();
    let resolved = RedirectFollower::new(&transport, &config, 5)
        .resolve(ORIGIN)
        .await
        .unwrap();
    assert_eq!(resolved, format!("{ORIGIN}/my%20file.txt"));
}

#[tokio::test]
async fn only_301_and_302_are_followed() {
    let transport = MockTransport::new().manual_redirects().route(
        ORIGIN,
        response(307, &[("Location", "/elsewhere")], ""),
    );
    let config = config();
    let resolved = RedirectFollower::new(&transport, &config, 5)
        .resolve(ORIGIN)
        .await
        .unwrap();
    assert_eq!(resolved, ORIGIN);
}

#[tokio::test]
async fn redirect_without_location_is_final() {
    let transport = MockTransport::new()
        .manual_redirects()
        .route(ORIGIN, response(302, &[], ""));
    let config = config();
    let resolved = RedirectFollower::new(&transport, &config, 5)
        .resolve(ORIGIN)
        .await
        .unwrap();
    assert_eq!(resolved, ORIGIN);
}

#[tokio::test]
async fn transport_error_mid_chain() {
    let transport = MockTransport::new()
        .manual_redirects()
        .route(ORIGIN, redirect("/next"))
        .fail(&format!("{ORIGIN}/next"), "dns failure");
    let config = config();
    let err = RedirectFollower::new(&transport, &config, 5)
        .resolve(ORIGIN)
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Transport(msg) if msg == "dns failure"));
}

#[tokio::test]
async fn engine_fetches_the_final_url() {
    let transport = Arc::new(chain(2));
    let engine = ProxyEngine::new(config(), transport.clone()).with_max_redirects(5);

    let result = engine
        .run(
            &relink::proxy::encoder::encode(&format!("{ORIGIN}/0")),
            Vec::new(),
            None,
            vec![("cookie".to_string(), "sid=1".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(result.body, bytes::Bytes::from("final"));

    let requests = transport.requests();
    let methods: Vec<_> = requests.iter().map(|r| r.method.clone()).collect();
    assert_eq!(
        methods,
        vec![
            http::Method::HEAD,
            http::Method::HEAD,
            http::Method::HEAD,
            http::Method::GET
        ]
    );
    assert_eq!(requests[3].url, format!("{ORIGIN}/2"));
    assert!(requests.iter().all(|r| r.headers
        == vec![("cookie".to_string(), "sid=1".to_string())]));
}

#[tokio::test]
async fn engine_reports_too_many_redirects() {
    let engine = ProxyEngine::new(config(), Arc::new(chain(3))).with_max_redirects(2);
    let err = engine
        .run(
            &relink::proxy::encoder::encode(&format!("{ORIGIN}/0")),
            Vec::new(),
            None,
            Vec::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::TooManyRedirects { max: 2 }));
}
