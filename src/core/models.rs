// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use strum::{Display, EnumIter};

// --- Severity & Findings ---

/// Ordinal risk classification of a finding. The set is closed: scoring
/// penalties are keyed on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Warning,
}

/// The four independent analysis categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Ssl,
    Headers,
    Cookies,
    Html,
}

/// A single weakness found by one of the analyzers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VulnerabilityFinding {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub impact: String,
    pub remediation: String,
}

impl VulnerabilityFinding {
    pub fn new(kind: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            message: message.into(),
            impact: String::new(),
            remediation: String::new(),
        }
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = impact.into();
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }
}

// --- Grade ---

/// Letter grade derived from a 0..=100 score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum Grade {
    #[serde(rename = "F")]
    #[strum(serialize = "F")]
    F,
    #[serde(rename = "D")]
    #[strum(serialize = "D")]
    D,
    #[serde(rename = "C")]
    #[strum(serialize = "C")]
    C,
    #[serde(rename = "B")]
    #[strum(serialize = "B")]
    B,
    #[serde(rename = "A")]
    #[strum(serialize = "A")]
    A,
    #[serde(rename = "A+")]
    #[strum(serialize = "A+")]
    APlus,
}

impl Grade {
    /// Monotonic step function: >=90 A+, >=80 A, >=70 B, >=60 C, >=50 D, else F.
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Grade::APlus,
            80..=89 => Grade::A,
            70..=79 => Grade::B,
            60..=69 => Grade::C,
            50..=59 => Grade::D,
            _ => Grade::F,
        }
    }
}

/// Clamps any intermediate score into the published `[0, 100]` range.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

// --- URL Models ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UrlMetadata {
    pub original_input: String,
    pub has_www: bool,
    pub is_ip: bool,
    pub resolved_addresses: Vec<IpAddr>,
}

/// A URL that passed validation. Never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedUrl {
    pub href: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path_and_query: String,
    pub is_https: bool,
    pub metadata: UrlMetadata,
}

// --- Fetch Models ---

/// Certificate fields extracted from a DER blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub subject_name: String,
    pub issuer_name: String,
    pub common_name: Option<String>,
    pub subject_alt_names: Vec<String>,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub signature_algorithm: String,
    /// Digest used by the signature, `None` when it cannot be determined.
    pub signature_hash: Option<String>,
    pub key_algorithm: String,
    pub key_size: usize,
    pub is_self_signed: bool,
    pub is_ca: bool,
}

/// TLS details captured from the connection used by the fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsSession {
    pub protocol: Option<String>,
    pub cipher: Option<String>,
    pub peer_certificate: Option<CertificateInfo>,
}

/// Outcome of the single outbound request of an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub status: u16,
    /// Header names are lower-cased; repeated headers are joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub final_url: String,
    pub redirect_count: u32,
    /// Raw `Set-Cookie` values from every hop, in arrival order.
    pub cookies: Vec<String>,
    pub tls: Option<TlsSession>,
    pub attempts: u32,
}

// --- Category Details ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InspectionMode {
    /// Dedicated handshake with protocol, cipher and full chain.
    Full,
    /// Coarse probe only; lower confidence.
    Fallback,
    /// Plain HTTP, nothing to inspect.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    pub subject: String,
    pub issuer: String,
    pub is_self_signed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SslDetails {
    pub is_secure: bool,
    pub inspection: InspectionMode,
    pub authorized: bool,
    pub authorization_error: Option<String>,
    pub protocol: Option<String>,
    pub protocol_grade: Option<Grade>,
    pub cipher: Option<String>,
    pub cipher_bits: Option<u16>,
    pub certificate: Option<CertificateInfo>,
    pub days_until_expiry: Option<i64>,
    pub chain: Vec<ChainLink>,
    pub chain_complete: bool,
}

impl SslDetails {
    pub fn insecure() -> Self {
        Self {
            is_secure: false,
            inspection: InspectionMode::None,
            authorized: false,
            authorization_error: None,
            protocol: None,
            protocol_grade: None,
            cipher: None,
            cipher_bits: None,
            certificate: None,
            days_until_expiry: None,
            chain: Vec::new(),
            chain_complete: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeaderEvaluation {
    pub value: String,
    pub score: u8,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HeaderDetails {
    pub present: BTreeMap<String, HeaderEvaluation>,
    pub missing: Vec<String>,
    /// Missing headers whose penalty was waived by the optional-header policy.
    pub optional_waived: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CookieSummary {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub sensitive: bool,
    pub lifetime_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CookieDetails {
    pub has_cookies: bool,
    pub total: usize,
    pub secure_count: usize,
    pub http_only_count: usize,
    pub same_site_count: usize,
    pub sensitive_count: usize,
    pub cookies: Vec<CookieSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HtmlDetails {
    /// Score before clamping; may be negative.
    pub raw_score: i32,
    pub forms: usize,
    pub password_forms: usize,
    pub scripts: usize,
    pub external_scripts: usize,
    pub iframes: usize,
    pub has_charset: bool,
}

/// Category-specific raw detail carried alongside the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryDetails {
    Ssl(SslDetails),
    Headers(HeaderDetails),
    Cookies(CookieDetails),
    Html(HtmlDetails),
    Unavailable { reason: String },
}

// --- Category Analysis ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalysis {
    pub category: Category,
    pub score: u8,
    pub grade: Grade,
    pub findings: Vec<VulnerabilityFinding>,
    pub recommendations: Vec<String>,
    pub details: CategoryDetails,
}

impl CategoryAnalysis {
    /// Builds a category result, clamping the score and deriving recommendations
    /// from the remediation text of every non-informational finding.
    pub fn new(
        category: Category,
        raw_score: f64,
        findings: Vec<VulnerabilityFinding>,
        details: CategoryDetails,
    ) -> Self {
        let score = clamp_score(raw_score);
        let mut recommendations: Vec<String> = Vec::new();
        for finding in &findings {
            if finding.severity == Severity::Info || finding.remediation.is_empty() {
                continue;
            }
            if !recommendations.contains(&finding.remediation) {
                recommendations.push(finding.remediation.clone());
            }
        }
        Self {
            category,
            score,
            grade: Grade::from_score(score),
            findings,
            recommendations,
            details,
        }
    }

    /// Zero-score placeholder for an analyzer that failed.
    pub fn failed(category: Category, reason: &str) -> Self {
        let finding = VulnerabilityFinding::new(
            "analysis_error",
            Severity::Info,
            format!("The {category} analysis could not be completed: {reason}"),
        )
        .with_impact("This category could not be evaluated, so its score is zero.")
        .with_remediation(format!("Re-run the analysis later to evaluate the {category} category."));
        Self {
            category,
            score: 0,
            grade: Grade::F,
            recommendations: vec![finding.remediation.clone()],
            findings: vec![finding],
            details: CategoryDetails::Unavailable { reason: reason.to_string() },
        }
    }
}

// --- Report ---

/// Which categories a caller wants evaluated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeOptions {
    pub check_cookies: bool,
    #[serde(rename = "checkSSL")]
    pub check_ssl: bool,
    pub check_headers: bool,
    pub check_html: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self { check_cookies: true, check_ssl: true, check_headers: true, check_html: true }
    }
}

impl AnalyzeOptions {
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Ssl => self.check_ssl,
            Category::Headers => self.check_headers,
            Category::Cookies => self.check_cookies,
            Category::Html => self.check_html,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResults {
    pub ssl: Option<CategoryAnalysis>,
    pub headers: Option<CategoryAnalysis>,
    pub cookies: Option<CategoryAnalysis>,
    pub html: Option<CategoryAnalysis>,
}

impl CategoryResults {
    pub fn iter(&self) -> impl Iterator<Item = &CategoryAnalysis> {
        [&self.ssl, &self.headers, &self.cookies, &self.html]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    pub fn set(&mut self, analysis: CategoryAnalysis) {
        let slot = match analysis.category {
            Category::Ssl => &mut self.ssl,
            Category::Headers => &mut self.headers,
            Category::Cookies => &mut self.cookies,
            Category::Html => &mut self.html,
        };
        *slot = Some(analysis);
    }
}

/// A finding in the flattened report list, tagged with its origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportFinding {
    pub category: Category,
    #[serde(flatten)]
    pub finding: VulnerabilityFinding,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SeverityStats {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub warning: usize,
    pub total: usize,
}

impl SeverityStats {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
        }
        self.total += 1;
    }
}

/// The single value handed back to callers of `analyze`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub url: String,
    pub final_url: String,
    pub is_https: bool,
    pub status: u16,
    pub redirect_count: u32,
    pub overall_score: u8,
    pub grade: Grade,
    pub categories: CategoryResults,
    pub findings: Vec<ReportFinding>,
    pub recommendations: Vec<String>,
    pub stats: SeverityStats,
    pub options: AnalyzeOptions,
    pub timestamp: DateTime<Utc>,
}
