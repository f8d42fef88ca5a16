// src/core/scanner/mod.rs

// Public interface of the `scanner` module: the four category analyzers and
// the `SecurityAnalyzer` that runs them against a single fetch.
pub mod cookie_scanner;
pub mod headers_scanner;
pub mod html_scanner;
pub mod ssl_scanner;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use url::Url;

use self::cookie_scanner::run_cookie_scan;
use self::headers_scanner::run_headers_scan;
use self::html_scanner::run_html_scan;
use self::ssl_scanner::{run_ssl_scan, LiveTlsInspector, TlsInspector};
use crate::config::AnalyzerConfig;
use crate::core::errors::{AnalysisFailure, AnalyzeError, ValidationFailure};
use crate::core::fetcher::{Fetcher, HttpFetcher};
use crate::core::models::{
    AnalyzeOptions, Category, CategoryAnalysis, CategoryResults, FetchResult, NormalizedUrl, SecurityReport,
};
use crate::core::scoring::{build_report, settle, ReportContext};
use crate::core::validator::{DnsResolver, HostResolver, UrlValidator};

type CategoryTask = (Category, JoinHandle<Result<CategoryAnalysis, AnalysisFailure>>);

/// Category tasks of one analysis. Dropping the set aborts whatever is still
/// running, so a cancelled `analyze` leaves no work behind.
#[derive(Default)]
struct CategoryTasks(Vec<CategoryTask>);

impl Drop for CategoryTasks {
    fn drop(&mut self) {
        for (_, task) in &self.0 {
            task.abort();
        }
    }
}

/// Target data shared by every category task.
#[derive(Clone)]
struct Target {
    fetch: Arc<FetchResult>,
    config: Arc<AnalyzerConfig>,
    host: String,
    port: u16,
    is_https: bool,
    now: DateTime<Utc>,
}

/// The analysis service. Owns its configuration and the three network seams;
/// cheap to share behind an `Arc` and safe to call concurrently.
pub struct SecurityAnalyzer {
    config: Arc<AnalyzerConfig>,
    validator: Arc<UrlValidator>,
    fetcher: Arc<dyn Fetcher>,
    tls: Arc<dyn TlsInspector>,
}

impl SecurityAnalyzer {
    /// Builds an analyzer wired to the live resolver, HTTP client and TLS stack.
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalyzeError> {
        let validator = Arc::new(UrlValidator::new(Arc::new(DnsResolver::new()), config.timeouts.dns()));
        let fetcher = HttpFetcher::new(&config, validator.clone())
            .map_err(|e| AnalyzeError::Setup(format!("HTTP client: {}", e.technical_message)))?;
        let tls = LiveTlsInspector::new(&config.timeouts);
        Ok(Self { config: Arc::new(config), validator, fetcher: Arc::new(fetcher), tls: Arc::new(tls) })
    }

    pub fn with_components(
        config: AnalyzerConfig,
        resolver: Arc<dyn HostResolver>,
        fetcher: Arc<dyn Fetcher>,
        tls: Arc<dyn TlsInspector>,
    ) -> Self {
        let validator = Arc::new(UrlValidator::new(resolver, config.timeouts.dns()));
        Self { config: Arc::new(config), validator, fetcher, tls }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub async fn validate_url(&self, raw: &str) -> Result<NormalizedUrl, ValidationFailure> {
        self.validator.validate(raw).await
    }

    /// Validates `raw`, fetches it once and evaluates every enabled category.
    #[instrument(skip(self, options))]
    pub async fn analyze(&self, raw: &str, options: AnalyzeOptions) -> Result<SecurityReport, AnalyzeError> {
        info!(input = raw, "Starting analysis.");
        let normalized = self.validate_url(raw).await?;
        let fetch = self.fetcher.fetch(&normalized.href).await?;
        info!(
            status = fetch.status,
            final_url = fetch.final_url.as_str(),
            redirects = fetch.redirect_count,
            attempts = fetch.attempts,
            "Fetch finished."
        );
        Ok(self.analyze_fetched(&normalized.href, fetch, options).await)
    }

    /// Runs the enabled analyzers against an existing fetch result.
    ///
    /// Each category runs in its own task; every task is awaited and a failed
    /// or panicked one is replaced by a zero-score placeholder. Dropping the
    /// returned future aborts the tasks still running.
    pub async fn analyze_fetched(&self, url: &str, fetch: FetchResult, options: AnalyzeOptions) -> SecurityReport {
        let now = Utc::now();
        let final_url = Url::parse(&fetch.final_url).ok();
        let is_https = final_url.as_ref().is_some_and(|u| u.scheme() == "https");
        let host = final_url
            .as_ref()
            .and_then(|u| u.host_str())
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .unwrap_or_default();
        let port = final_url.as_ref().and_then(Url::port_or_known_default).unwrap_or(443);

        let target = Target { fetch: Arc::new(fetch), config: self.config.clone(), host, port, is_https, now };
        let mut tasks = CategoryTasks::default();
        for category in Category::iter().filter(|c| options.is_enabled(*c)) {
            tasks.0.push((category, self.spawn_category(category, target.clone())));
        }

        let mut categories = CategoryResults::default();
        for (category, task) in tasks.0.iter_mut() {
            let category = *category;
            let outcome = task.await.unwrap_or_else(|e| {
                error!(category = %category, panic = %e, "Analyzer task panicked!");
                Err(AnalysisFailure::new(category, format!("analyzer task failed: {}", e)))
            });
            categories.set(settle(category, outcome));
        }

        let context = ReportContext {
            url: url.to_string(),
            final_url: target.fetch.final_url.clone(),
            is_https,
            status: target.fetch.status,
            redirect_count: target.fetch.redirect_count,
            options,
            timestamp: now,
        };
        build_report(context, categories, &self.config.aggregate)
    }

    fn spawn_category(&self, category: Category, t: Target) -> JoinHandle<Result<CategoryAnalysis, AnalysisFailure>> {
        match category {
            Category::Ssl => {
                let inspector = self.tls.clone();
                tokio::spawn(async move {
                    run_ssl_scan(inspector.as_ref(), &t.host, t.port, t.is_https, t.fetch.tls.as_ref(), &t.config.tls, t.now)
                        .await
                })
            }
            Category::Headers => tokio::spawn(async move {
                Ok(run_headers_scan(&t.fetch.headers, &t.fetch.final_url, &t.config.headers, &t.config.optional_headers))
            }),
            Category::Cookies => {
                tokio::spawn(async move { Ok(run_cookie_scan(&t.fetch.cookies, &t.host, &t.config.cookies, t.now)) })
            }
            Category::Html => {
                tokio::spawn(async move { Ok(run_html_scan(&t.fetch.body, &t.fetch.final_url, &t.config.html)) })
            }
        }
    }
}
