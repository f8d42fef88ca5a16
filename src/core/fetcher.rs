// src/core/fetcher.rs

use crate::config::{AnalyzerConfig, FetchMethod, FetchPolicy};
use crate::core::certificate::parse_certificate;
use crate::core::errors::{classify_reqwest, ClassifiedError, ErrorKind};
use crate::core::models::{FetchResult, TlsSession};
use crate::core::validator::UrlValidator;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, LOCATION, SET_COOKIE, USER_AGENT};
use reqwest::{redirect, Client, Method, Response, Url};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const FALLBACK_USER_AGENT: &str = concat!("webposture/", env!("CARGO_PKG_VERSION"));

/// Performs the single outbound HTTP request of an analysis.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResult, ClassifiedError>;
}

/// reqwest-backed fetcher with manual redirect handling and bounded retries.
///
/// Redirects to a host other than the one being fetched are re-checked by
/// `guard` before they are followed.
pub struct HttpFetcher {
    client: Client,
    policy: FetchPolicy,
    guard: Arc<UrlValidator>,
    total_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &AnalyzerConfig, guard: Arc<UrlValidator>) -> Result<Self, ClassifiedError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            // Redirects are followed by hand so cookies from every hop are kept.
            .redirect(redirect::Policy::none())
            // Certificate problems are graded by the TLS analyzer, not fatal here.
            .danger_accept_invalid_certs(true)
            .tls_info(true)
            .build()
            .map_err(|e| ClassifiedError::new(ErrorKind::Unknown, format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client, policy: config.fetch.clone(), guard, total_timeout: config.timeouts.total() })
    }

    async fn fetch_once(&self, start: &Url) -> Result<FetchResult, ClassifiedError> {
        let user_agent = pick_user_agent(&self.policy.user_agents);
        let method = match self.policy.method {
            FetchMethod::Get => Method::GET,
            FetchMethod::Head => Method::HEAD,
        };

        let mut current = start.clone();
        let mut cookies = Vec::new();
        let mut redirect_count = 0;

        loop {
            debug!(url = %current, "Sending request.");
            let response = self
                .client
                .request(method.clone(), current.clone())
                .header(USER_AGENT, user_agent.as_str())
                .send()
                .await
                .map_err(|e| classify_reqwest(&e))?;

            cookies.extend(
                response
                    .headers()
                    .get_all(SET_COOKIE)
                    .iter()
                    .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned()),
            );

            if response.status().is_redirection() && redirect_count < self.policy.max_redirects {
                if let Some(next) = redirect_target(&current, response.headers()) {
                    self.check_redirect(&current, &next).await?;
                    redirect_count += 1;
                    debug!(from = %current, to = %next, hop = redirect_count, "Following redirect.");
                    current = next;
                    continue;
                }
            }

            return self.collect(response, current, redirect_count, cookies).await;
        }
    }

    /// Same-host hops only need an HTTP(S) scheme; a new host must pass the
    /// validator's address rules.
    async fn check_redirect(&self, current: &Url, next: &Url) -> Result<(), ClassifiedError> {
        let blocked = |reason: String| {
            warn!(from = %current, to = %next, reason = reason.as_str(), "Redirect blocked.");
            ClassifiedError::new(ErrorKind::ValidationError, format!("Redirect to {next} blocked: {reason}"))
        };
        if next.scheme() != "http" && next.scheme() != "https" {
            return Err(blocked(format!("unsupported scheme {}", next.scheme())));
        }
        if next.host_str() == current.host_str() {
            return Ok(());
        }
        self.guard.check_url(next).await.map(|_| ()).map_err(|reason| blocked(reason.to_string()))
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<FetchResult, ClassifiedError> {
        let start = Url::parse(url)
            .map_err(|e| ClassifiedError::new(ErrorKind::ValidationError, format!("Invalid URL {url}: {e}")))?;
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(&start).await {
                Ok(mut result) => {
                    let retry_status = ClassifiedError::from_status(result.status).is_some_and(|e| e.retryable);
                    if retry_status && attempt < max_attempts {
                        warn!(status = result.status, attempt, "Retryable status, backing off.");
                        tokio::time::sleep(self.policy.retry_delay(attempt)).await;
                        continue;
                    }
                    result.attempts = attempt;
                    info!(
                        status = result.status,
                        redirects = result.redirect_count,
                        attempts = attempt,
                        "Fetch finished."
                    );
                    return Ok(result);
                }
                Err(err) if err.retryable && attempt < max_attempts => {
                    warn!(error = %err, attempt, "Retryable fetch error, backing off.");
                    tokio::time::sleep(self.policy.retry_delay(attempt)).await;
                }
                Err(err) => {
                    warn!(error = %err, attempt, "Fetch failed.");
                    return Err(err);
                }
            }
        }
    }

    async fn collect(
        &self,
        mut response: Response,
        final_url: Url,
        redirect_count: u32,
        cookies: Vec<String>,
    ) -> Result<FetchResult, ClassifiedError> {
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let tls = tls_session(&response);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify_reqwest(&e))? {
            let room = self.policy.max_body_bytes.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.policy.max_body_bytes {
                debug!(limit = self.policy.max_body_bytes, "Response body truncated.");
                break;
            }
        }

        Ok(FetchResult {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
            final_url: final_url.to_string(),
            redirect_count,
            cookies,
            tls,
            attempts: 1,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Retries connection resets, timeouts, 408/429 and 502..504 with linear
    /// backoff. Any other status is returned as data. The whole call, retries
    /// included, is bounded by the total timeout.
    async fn fetch(&self, url: &str) -> Result<FetchResult, ClassifiedError> {
        info!(url, "Fetching target.");
        tokio::time::timeout(self.total_timeout, self.fetch_with_retries(url))
            .await
            .unwrap_or_else(|_| {
                warn!(url, budget_secs = self.total_timeout.as_secs(), "Fetch exceeded its time budget.");
                Err(ClassifiedError::new(
                    ErrorKind::Timeout,
                    format!("Fetching {url} took longer than {}s", self.total_timeout.as_secs()),
                ))
            })
    }
}

fn pick_user_agent(agents: &[String]) -> String {
    agents
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
}

fn redirect_target(current: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

/// Lower-cases names and joins repeated values. `Set-Cookie` is kept apart.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (name, value) in headers {
        if *name == SET_COOKIE {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
        match map.entry(name.as_str().to_ascii_lowercase()) {
            Entry::Occupied(mut existing) => {
                let joined: &mut String = existing.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
    map
}

fn tls_session(response: &Response) -> Option<TlsSession> {
    let info = response.extensions().get::<reqwest::tls::TlsInfo>()?;
    let peer_certificate = info.peer_certificate().and_then(|der| match parse_certificate(der) {
        Ok(cert) => Some(cert),
        Err(e) => {
            debug!(error = %e, "Could not parse peer certificate from fetch.");
            None
        }
    });
    Some(TlsSession { protocol: None, cipher: None, peer_certificate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_collect_headers_joins_duplicates() {
        let mut headers = HeaderMap::new();
        headers.append("X-Frame-Options", HeaderValue::from_static("DENY"));
        headers.append("Vary", HeaderValue::from_static("Accept"));
        headers.append("Vary", HeaderValue::from_static("Origin"));
        headers.append("Set-Cookie", HeaderValue::from_static("a=1"));

        let map = collect_headers(&headers);
        assert_eq!(map.get("x-frame-options").map(String::as_str), Some("DENY"));
        assert_eq!(map.get("vary").map(String::as_str), Some("Accept, Origin"));
        assert!(!map.contains_key("set-cookie"));
    }

    #[test]
    fn test_redirect_target_resolves_relative_location() {
        let current = Url::parse("https://example.com/a/b").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/login"));
        assert_eq!(redirect_target(&current, &headers).unwrap().as_str(), "https://example.com/login");

        headers.insert(LOCATION, HeaderValue::from_static("http://other.example.org/"));
        assert_eq!(redirect_target(&current, &headers).unwrap().host_str(), Some("other.example.org"));
    }

    #[test]
    fn test_user_agent_pool() {
        let pool = vec!["ua-one".to_string(), "ua-two".to_string()];
        for _ in 0..10 {
            assert!(pool.contains(&pick_user_agent(&pool)));
        }
        assert!(pick_user_agent(&[]).starts_with("webposture/"));
    }
}
