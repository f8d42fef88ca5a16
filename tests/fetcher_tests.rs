// tests/fetcher_tests.rs

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use webposture::core::errors::ErrorKind;
use webposture::core::fetcher::{Fetcher, HttpFetcher};
use webposture::core::validator::{HostResolver, UrlValidator};
use webposture::AnalyzerConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Every name resolves to a public address, except `*.internal`.
struct FixedResolver;

#[async_trait]
impl HostResolver for FixedResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, String> {
        let ip = if host.ends_with(".internal") { "10.0.0.7" } else { "93.184.216.34" };
        Ok(vec![ip.parse().unwrap()])
    }
}

fn guard() -> Arc<UrlValidator> {
    Arc::new(UrlValidator::new(Arc::new(FixedResolver), Duration::from_secs(1)))
}

fn build(config: &AnalyzerConfig) -> HttpFetcher {
    HttpFetcher::new(config, guard()).expect("client should build")
}

fn fetcher() -> HttpFetcher {
    let mut config = AnalyzerConfig::default();
    config.fetch.retry_delay_ms = 10;
    config.timeouts.request_secs = 5;
    build(&config)
}

#[tokio::test]
async fn test_retries_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher().fetch(&format!("{}/", server.uri())).await.unwrap();
    assert_eq!(result.status, 200);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.body, "<html></html>");
}

#[tokio::test]
async fn test_client_error_is_returned_as_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher().fetch(&format!("{}/nope", server.uri())).await.unwrap();
    assert_eq!(result.status, 404);
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn test_follows_redirects_and_keeps_every_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/end")
                .insert_header("Set-Cookie", "first=1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "second=2; Secure; HttpOnly")
                .set_body_string("done"),
        )
        .mount(&server)
        .await;

    let result = fetcher().fetch(&format!("{}/start", server.uri())).await.unwrap();
    assert_eq!(result.status, 200);
    assert_eq!(result.redirect_count, 1);
    assert!(result.final_url.ends_with("/end"));
    assert_eq!(result.cookies.len(), 2);
    assert!(result.cookies[0].starts_with("first=1"));
    assert!(result.cookies[1].starts_with("second=2"));
    assert!(!result.headers.contains_key("set-cookie"));
}

#[tokio::test]
async fn test_redirect_limit_returns_last_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let mut config = AnalyzerConfig::default();
    config.fetch.max_redirects = 2;
    let result = build(&config)
        .fetch(&format!("{}/loop", server.uri()))
        .await
        .unwrap();
    assert_eq!(result.status, 301);
    assert_eq!(result.redirect_count, 2);
}

#[tokio::test]
async fn test_header_names_are_lowercased() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Frame-Options", "DENY")
                .insert_header("Strict-Transport-Security", "max-age=31536000"),
        )
        .mount(&server)
        .await;

    let result = fetcher().fetch(&server.uri()).await.unwrap();
    assert_eq!(result.headers.get("x-frame-options").map(String::as_str), Some("DENY"));
    assert_eq!(
        result.headers.get("strict-transport-security").map(String::as_str),
        Some("max-age=31536000")
    );
    assert!(result.tls.is_none());
}

#[tokio::test]
async fn test_connection_refused_is_classified() {
    let mut config = AnalyzerConfig::default();
    config.fetch.retry_delay_ms = 10;
    let err = build(&config)
        .fetch("http://127.0.0.1:1/")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConnectionRefused);
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_redirect_to_private_address_is_blocked() {
    let server = MockServer::start().await;
    let port = server.address().port();
    for (route, location) in [
        ("/to-ip", "http://10.0.0.1/admin".to_string()),
        ("/to-localhost", format!("http://localhost:{port}/end")),
        ("/to-intranet", "https://wiki.corp.internal/".to_string()),
        ("/to-file", "file:///etc/passwd".to_string()),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", location.as_str()))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher();
    for route in ["/to-ip", "/to-localhost", "/to-intranet", "/to-file"] {
        let err = fetcher.fetch(&format!("{}{}", server.uri(), route)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError, "{route}: {err}");
        assert!(err.technical_message.contains("blocked"), "{route}: {err}");
        assert!(!err.retryable);
    }
}

#[tokio::test]
async fn test_whole_fetch_is_bounded_by_total_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut config = AnalyzerConfig::default();
    config.timeouts.request_secs = 30;
    config.timeouts.total_secs = 1;
    let started = Instant::now();
    let err = build(&config).fetch(&server.uri()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}
