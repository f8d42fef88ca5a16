// src/config.rs

//! Tunable settings for the analysis pipeline.
//!
//! Every timeout, retry knob and scoring constant lives here as a named field
//! so magnitudes can be adjusted without touching the algorithms. The library
//! never reads this from disk itself; callers construct it (the CLI loads it
//! from JSON when asked).

use crate::core::knowledge_base::OptionalHeaderPolicy;
use crate::core::models::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub timeouts: Timeouts,
    pub fetch: FetchPolicy,
    pub tls: TlsScoring,
    pub headers: HeaderScoring,
    pub cookies: CookieScoring,
    pub html: HtmlScoring,
    pub aggregate: AggregateScoring,
    pub optional_headers: OptionalHeaderPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub dns_secs: u64,
    pub request_secs: u64,
    pub connect_secs: u64,
    pub tls_handshake_secs: u64,
    /// Budget for a whole fetch: every attempt, redirect hop and backoff.
    pub total_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { dns_secs: 5, request_secs: 30, connect_secs: 5, tls_handshake_secs: 10, total_secs: 30 }
    }
}

impl Timeouts {
    pub fn dns(&self) -> Duration {
        Duration::from_secs(self.dns_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn tls_handshake(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_secs)
    }

    pub fn total(&self) -> Duration {
        Duration::from_secs(self.total_secs)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FetchMethod {
    Get,
    Head,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchPolicy {
    pub method: FetchMethod,
    pub max_attempts: u32,
    /// Delay before retry `n` is `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
    pub max_redirects: u32,
    pub max_body_bytes: usize,
    pub user_agents: Vec<String>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            method: FetchMethod::Get,
            max_attempts: 3,
            retry_delay_ms: 1000,
            max_redirects: 5,
            max_body_bytes: 5 * 1024 * 1024,
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            ]
            .iter()
            .map(|ua| ua.to_string())
            .collect(),
        }
    }
}

impl FetchPolicy {
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Points subtracted from a category score per finding of each severity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SeverityPenalties {
    pub critical: i32,
    pub high: i32,
    pub medium: i32,
    pub low: i32,
    pub warning: i32,
    pub info: i32,
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self { critical: 25, high: 15, medium: 8, low: 3, warning: 2, info: 0 }
    }
}

impl SeverityPenalties {
    pub fn for_severity(&self, severity: Severity) -> i32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TlsScoring {
    pub base_authorized: i32,
    pub base_unauthorized: i32,
    pub fallback_base_authorized: i32,
    pub fallback_base_unauthorized: i32,
    pub penalties: SeverityPenalties,
    pub tls13_bonus: i32,
    pub strong_cipher_bonus: i32,
    pub strong_cipher_bits: u16,
    pub expiry_warning_days: i64,
    pub max_chain_depth: usize,
}

impl Default for TlsScoring {
    fn default() -> Self {
        Self {
            base_authorized: 100,
            base_unauthorized: 30,
            fallback_base_authorized: 70,
            fallback_base_unauthorized: 20,
            penalties: SeverityPenalties { critical: 25, high: 15, medium: 8, low: 4, warning: 2, info: 0 },
            tls13_bonus: 5,
            strong_cipher_bonus: 5,
            strong_cipher_bits: 256,
            expiry_warning_days: 30,
            max_chain_depth: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderScoring {
    pub missing_critical_penalty: i32,
    pub missing_high_penalty: i32,
    pub hsts_min_max_age: u64,
}

impl Default for HeaderScoring {
    fn default() -> Self {
        Self { missing_critical_penalty: 15, missing_high_penalty: 10, hsts_min_max_age: 31_536_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CookieScoring {
    pub penalties: SeverityPenalties,
    pub secure_ratio_bonus: f64,
    pub http_only_ratio_bonus: f64,
    pub same_site_ratio_bonus: f64,
    pub max_lifetime_days: i64,
    pub max_cookie_count: usize,
    pub min_secure_ratio: f64,
    pub min_http_only_ratio: f64,
}

impl Default for CookieScoring {
    fn default() -> Self {
        Self {
            penalties: SeverityPenalties::default(),
            secure_ratio_bonus: 5.0,
            http_only_ratio_bonus: 5.0,
            same_site_ratio_bonus: 5.0,
            max_lifetime_days: 365,
            max_cookie_count: 10,
            min_secure_ratio: 0.8,
            min_http_only_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HtmlScoring {
    pub start_score: i32,
    pub penalties: SeverityPenalties,
}

impl Default for HtmlScoring {
    fn default() -> Self {
        Self {
            start_score: 80,
            penalties: SeverityPenalties { critical: 30, high: 20, medium: 10, low: 5, warning: 2, info: 0 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregateScoring {
    pub ssl_weight: f64,
    pub headers_weight: f64,
    pub cookies_weight: f64,
    pub html_weight: f64,
    pub critical_penalty: f64,
    pub critical_penalty_cap: f64,
    pub non_https_penalty: f64,
}

impl Default for AggregateScoring {
    fn default() -> Self {
        Self {
            ssl_weight: 0.25,
            headers_weight: 0.35,
            cookies_weight: 0.25,
            html_weight: 0.15,
            critical_penalty: 10.0,
            critical_penalty_cap: 30.0,
            non_https_penalty: 15.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.timeouts.dns(), Duration::from_secs(5));
        assert_eq!(config.timeouts.request(), Duration::from_secs(30));
        assert_eq!(config.timeouts.tls_handshake(), Duration::from_secs(10));
        assert_eq!(config.timeouts.total(), Duration::from_secs(30));
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.max_redirects, 5);
        let weights = &config.aggregate;
        let sum = weights.ssl_weight + weights.headers_weight + weights.cookies_weight + weights.html_weight;
        assert!((sum - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_retry_delay_is_linear() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.retry_delay(1), Duration::from_secs(1));
        assert_eq!(policy.retry_delay(2), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{"fetch": {"max_attempts": 1}, "timeouts": {"dns_secs": 2}}"#).unwrap();
        assert_eq!(config.fetch.max_attempts, 1);
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.timeouts.dns_secs, 2);
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.tls.base_authorized, 100);
    }

    #[test]
    fn test_penalty_lookup() {
        let penalties = SeverityPenalties::default();
        assert_eq!(penalties.for_severity(Severity::Critical), 25);
        assert_eq!(penalties.for_severity(Severity::Info), 0);
    }
}
