// src/core/scanner/headers_scanner.rs

use tracing::{debug, info};

use crate::config::HeaderScoring;
use crate::core::knowledge_base::{finding, missing_header_finding, HeaderSpec, OptionalHeaderPolicy, HEADER_CATALOG};
use crate::core::models::{
    Category, CategoryAnalysis, CategoryDetails, HeaderDetails, HeaderEvaluation, Severity, VulnerabilityFinding,
};
use std::collections::BTreeMap;
use url::Url;

/// Browser features whose restriction earns Permissions-Policy credit.
const SENSITIVE_FEATURES: &[&str] = &["camera", "microphone", "geolocation", "payment", "usb"];

const KNOWN_FEATURES: &[&str] = &[
    "accelerometer",
    "ambient-light-sensor",
    "attribution-reporting",
    "autoplay",
    "battery",
    "bluetooth",
    "browsing-topics",
    "camera",
    "clipboard-read",
    "clipboard-write",
    "compute-pressure",
    "cross-origin-isolated",
    "display-capture",
    "document-domain",
    "encrypted-media",
    "fullscreen",
    "gamepad",
    "geolocation",
    "gyroscope",
    "hid",
    "identity-credentials-get",
    "idle-detection",
    "interest-cohort",
    "join-ad-interest-group",
    "keyboard-map",
    "local-fonts",
    "magnetometer",
    "microphone",
    "midi",
    "otp-credentials",
    "payment",
    "picture-in-picture",
    "publickey-credentials-create",
    "publickey-credentials-get",
    "run-ad-auction",
    "screen-wake-lock",
    "serial",
    "speaker-selection",
    "storage-access",
    "sync-xhr",
    "unload",
    "usb",
    "web-share",
    "window-management",
    "xr-spatial-tracking",
];

/// Referrer-Policy tokens and the sub-score each one earns.
const REFERRER_POLICIES: &[(&str, i32)] = &[
    ("no-referrer", 100),
    ("same-origin", 100),
    ("strict-origin", 90),
    ("strict-origin-when-cross-origin", 90),
    ("origin", 70),
    ("origin-when-cross-origin", 70),
    ("no-referrer-when-downgrade", 50),
    ("unsafe-url", 20),
];

/// Sub-score and findings produced by one header's deep check.
struct HeaderCheck {
    score: i32,
    findings: Vec<VulnerabilityFinding>,
}

impl HeaderCheck {
    fn new(score: i32) -> Self {
        Self { score, findings: Vec::new() }
    }

    fn flag(&mut self, code: &str, severity: Severity, message: impl Into<String>, deduction: i32) {
        debug!(code, severity = %severity, deduction, "Header finding.");
        self.score -= deduction;
        self.findings.push(finding(code, severity, message));
    }

    fn subscore(&self) -> u8 {
        self.score.clamp(0, 100) as u8
    }
}

/// Looks up a header in the lower-cased header map.
fn check_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    match headers.get(name) {
        Some(value) => {
            debug!(header_name = name, value = value.as_str(), "Header found.");
            Some(value.as_str())
        }
        None => {
            debug!(header_name = name, "Header not found.");
            None
        }
    }
}

/// Scores the response headers against the security header catalog.
///
/// # Arguments
/// * `headers` - Lower-cased response headers of the final response.
/// * `final_url` - URL the headers came from; decides HTTPS and the optional-header host match.
/// * `scoring` - Missing-header penalties and the HSTS threshold.
/// * `policy` - Headers whose absence is tolerated for specific hosts.
///
/// # Returns
/// The `headers` category analysis. Never fails.
pub fn run_headers_scan(
    headers: &BTreeMap<String, String>,
    final_url: &str,
    scoring: &HeaderScoring,
    policy: &OptionalHeaderPolicy,
) -> CategoryAnalysis {
    info!(target = final_url, headers = headers.len(), "Starting headers scan.");

    let parsed = Url::parse(final_url).ok();
    let host = parsed.as_ref().and_then(|u| u.host_str()).unwrap_or_default().to_string();
    let is_https = parsed.as_ref().map(|u| u.scheme() == "https").unwrap_or(false);

    let mut findings = Vec::new();
    let mut details = HeaderDetails::default();
    let mut counted_weight = 0u32;
    let mut weighted_sum = 0.0;
    let mut missing_penalty = 0;

    for spec in HEADER_CATALOG {
        match check_header(headers, spec.name) {
            Some(value) => {
                let check = evaluate(spec, value, is_https, scoring);
                counted_weight += spec.weight;
                weighted_sum += f64::from(spec.weight) * f64::from(check.subscore()) / 100.0;
                details.present.insert(
                    spec.name.to_string(),
                    HeaderEvaluation { value: value.to_string(), score: check.subscore(), weight: spec.weight },
                );
                findings.extend(check.findings);
            }
            None if policy.is_optional(&host, spec.name) => {
                debug!(header_name = spec.name, host = host.as_str(), "Missing header waived for this host.");
                let mut waived = missing_header_finding(spec, Severity::Info);
                waived.message = format!("{} header is missing (tolerated for this site)", spec.display_name);
                findings.push(waived);
                details.optional_waived.push(spec.name.to_string());
            }
            None => {
                counted_weight += spec.weight;
                missing_penalty += match spec.severity {
                    Severity::Critical => scoring.missing_critical_penalty,
                    Severity::High => scoring.missing_high_penalty,
                    _ => 0,
                };
                findings.push(missing_header_finding(spec, spec.severity));
                details.missing.push(spec.name.to_string());
            }
        }
    }

    if !headers.contains_key("content-security-policy")
        && check_header(headers, "content-security-policy-report-only").is_some()
    {
        findings.push(finding(
            "csp_report_only",
            Severity::Info,
            "Content-Security-Policy is only deployed in report-only mode",
        ));
    }

    findings.extend(information_disclosure(headers));

    let coverage = if counted_weight == 0 { 100.0 } else { weighted_sum / f64::from(counted_weight) * 100.0 };
    let raw = coverage - f64::from(missing_penalty);
    debug!(coverage, missing_penalty, raw, "Header score computed.");

    let analysis = CategoryAnalysis::new(Category::Headers, raw, findings, CategoryDetails::Headers(details));
    info!(score = analysis.score, findings = analysis.findings.len(), "Headers scan finished.");
    analysis
}

fn evaluate(spec: &HeaderSpec, value: &str, is_https: bool, scoring: &HeaderScoring) -> HeaderCheck {
    match spec.name {
        "content-security-policy" => check_csp(value),
        "strict-transport-security" => check_hsts(value, is_https, scoring.hsts_min_max_age),
        "x-frame-options" => check_frame_options(value),
        "x-content-type-options" => check_content_type_options(value),
        "referrer-policy" => check_referrer_policy(value),
        "permissions-policy" => check_permissions_policy(value),
        "x-xss-protection" => check_xss_protection(value),
        "expect-ct" => {
            let mut check = HeaderCheck::new(100);
            check.flag("expect_ct_deprecated", Severity::Info, "Expect-CT is deprecated", 0);
            check
        }
        "cache-control" => check_cache_control(value),
        "pragma" => check_pragma(value),
        _ => HeaderCheck::new(100),
    }
}

// --- Content-Security-Policy ---

/// Directive name to lower-cased source list. The first occurrence of a
/// directive wins, as in browsers.
pub fn parse_csp(value: &str) -> BTreeMap<String, Vec<String>> {
    let mut directives = BTreeMap::new();
    for part in value.split(';') {
        let mut tokens = part.split_whitespace();
        if let Some(name) = tokens.next() {
            directives
                .entry(name.to_ascii_lowercase())
                .or_insert_with(|| tokens.map(|t| t.to_ascii_lowercase()).collect());
        }
    }
    directives
}

fn check_csp(value: &str) -> HeaderCheck {
    let directives = parse_csp(value);
    let mut check = HeaderCheck::new(100);

    let default_src = directives.get("default-src");
    let script_src = directives.get("script-src");

    if default_src.is_none() {
        check.flag("csp_missing_default_src", Severity::Medium, "CSP has no default-src directive", 20);
        if script_src.is_none() {
            check.flag("csp_missing_script_src", Severity::Medium, "CSP restricts neither default-src nor script-src", 15);
        }
    }

    let default_is_none = default_src.is_some_and(|sources| sources.iter().all(|s| s == "'none'"));
    if !directives.contains_key("object-src") && !default_is_none {
        check.flag("csp_missing_object_src", Severity::Low, "CSP does not set object-src", 5);
    }

    let effective: &[String] = script_src.or(default_src).map(Vec::as_slice).unwrap_or(&[]);
    let has_nonce_or_hash = effective
        .iter()
        .any(|s| s.starts_with("'nonce-") || s.starts_with("'sha256-") || s.starts_with("'sha384-") || s.starts_with("'sha512-"));

    if effective.iter().any(|s| s == "'unsafe-inline'") {
        if has_nonce_or_hash {
            check.flag(
                "csp_unsafe_inline",
                Severity::Info,
                "CSP allows 'unsafe-inline', ignored by modern browsers because a nonce or hash is present",
                0,
            );
        } else {
            check.flag("csp_unsafe_inline", Severity::High, "CSP allows 'unsafe-inline' scripts", 25);
        }
    }
    if effective.iter().any(|s| s == "'unsafe-eval'") {
        check.flag("csp_unsafe_eval", Severity::High, "CSP allows 'unsafe-eval'", 20);
    }
    if effective.iter().any(|s| s == "*") {
        check.flag("csp_wildcard_script_src", Severity::High, "CSP allows scripts from any origin (*)", 25);
    }

    let insecure: Vec<&str> = effective
        .iter()
        .filter(|s| matches!(s.as_str(), "http:" | "https:" | "data:") || s.starts_with("http://"))
        .map(String::as_str)
        .collect();
    if !insecure.is_empty() {
        check.flag(
            "csp_insecure_script_source",
            Severity::Medium,
            format!("CSP allows scripts from broad or insecure sources: {}", insecure.join(" ")),
            10,
        );
    }

    if !directives.contains_key("frame-ancestors") {
        check.flag("csp_missing_frame_ancestors", Severity::Info, "CSP does not set frame-ancestors", 0);
    }

    check
}

// --- Strict-Transport-Security ---

/// Parsed HSTS directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HstsPolicy {
    pub max_age: Option<u64>,
    pub include_subdomains: bool,
    pub preload: bool,
}

pub fn parse_hsts(value: &str) -> HstsPolicy {
    let mut policy = HstsPolicy { max_age: None, include_subdomains: false, preload: false };
    for directive in value.split(';').map(str::trim).filter(|d| !d.is_empty()) {
        let (name, arg) = match directive.split_once('=') {
            Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
            None => (directive, None),
        };
        match name.to_ascii_lowercase().as_str() {
            "max-age" => policy.max_age = arg.and_then(|a| a.parse().ok()),
            "includesubdomains" => policy.include_subdomains = true,
            "preload" => policy.preload = true,
            _ => {}
        }
    }
    policy
}

fn check_hsts(value: &str, is_https: bool, min_max_age: u64) -> HeaderCheck {
    let policy = parse_hsts(value);
    let mut check = HeaderCheck::new(100);

    match policy.max_age {
        None | Some(0) => {
            check.flag("hsts_invalid_max_age", Severity::High, "HSTS max-age is missing, invalid or zero", 100);
            return check;
        }
        Some(age) if age < min_max_age => check.flag(
            "hsts_short_max_age",
            Severity::Medium,
            format!("HSTS max-age of {} seconds is shorter than one year", age),
            40,
        ),
        Some(_) => {}
    }

    if !policy.include_subdomains {
        check.flag("hsts_missing_include_subdomains", Severity::Low, "HSTS does not cover subdomains", 15);
    }
    if !policy.preload {
        check.flag("hsts_missing_preload", Severity::Info, "HSTS does not request preloading", 5);
    } else if !policy.include_subdomains || policy.max_age.unwrap_or(0) < min_max_age {
        check.flag(
            "hsts_preload_ineligible",
            Severity::Low,
            "HSTS requests preloading without includeSubDomains and a one-year max-age",
            0,
        );
    }
    if !is_https {
        check.flag("hsts_over_http", Severity::Low, "HSTS sent over plain HTTP is ignored by browsers", 0);
    }

    check
}

// --- Framing, sniffing and referrer ---

fn check_frame_options(value: &str) -> HeaderCheck {
    let normalized = value.trim().to_ascii_uppercase();
    match normalized.as_str() {
        "DENY" => HeaderCheck::new(100),
        "SAMEORIGIN" => HeaderCheck::new(90),
        v if v.starts_with("ALLOW-FROM") => {
            let mut check = HeaderCheck::new(100);
            check.flag(
                "xfo_obsolete_allow_from",
                Severity::Medium,
                "X-Frame-Options ALLOW-FROM is obsolete and ignored by modern browsers",
                60,
            );
            check
        }
        _ => {
            let mut check = HeaderCheck::new(100);
            check.flag("xfo_invalid", Severity::Medium, format!("X-Frame-Options value '{}' is invalid", value.trim()), 100);
            check
        }
    }
}

fn check_content_type_options(value: &str) -> HeaderCheck {
    let mut check = HeaderCheck::new(100);
    if !value.trim().eq_ignore_ascii_case("nosniff") {
        check.flag(
            "xcto_invalid",
            Severity::Medium,
            format!("X-Content-Type-Options value '{}' is not nosniff", value.trim()),
            100,
        );
    }
    check
}

/// Browsers apply the last policy token they understand.
fn check_referrer_policy(value: &str) -> HeaderCheck {
    let mut effective: Option<(&str, i32)> = None;
    let mut unknown = Vec::new();

    for token in value.split(',').map(|t| t.trim().to_ascii_lowercase()).filter(|t| !t.is_empty()) {
        match REFERRER_POLICIES.iter().find(|(name, _)| *name == token) {
            Some(&(name, score)) => effective = Some((name, score)),
            None => unknown.push(token),
        }
    }

    let mut check = HeaderCheck::new(effective.map(|(_, score)| score).unwrap_or(0));
    if !unknown.is_empty() {
        check.flag(
            "referrer_policy_unknown_token",
            Severity::Low,
            format!("Referrer-Policy contains unknown values: {}", unknown.join(", ")),
            0,
        );
    }
    if let Some(("unsafe-url", _)) = effective {
        check.flag("referrer_policy_unsafe", Severity::Medium, "Referrer-Policy unsafe-url leaks full URLs", 0);
    }
    check
}

// --- Permissions-Policy ---

fn check_permissions_policy(value: &str) -> HeaderCheck {
    let mut restricted = 0;
    let mut malformed = Vec::new();
    let mut unknown = Vec::new();
    let mut permissive = Vec::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((feature, allowlist)) = entry.split_once('=') else {
            malformed.push(entry.to_string());
            continue;
        };
        let feature = feature.trim().to_ascii_lowercase();
        let allowlist = allowlist.trim().to_ascii_lowercase();

        if !KNOWN_FEATURES.contains(&feature.as_str()) {
            unknown.push(feature);
            continue;
        }
        if !SENSITIVE_FEATURES.contains(&feature.as_str()) {
            continue;
        }
        if allowlist == "*" || allowlist == "(*)" {
            permissive.push(feature);
        } else if matches!(allowlist.as_str(), "()" | "(self)" | "self") {
            restricted += 1;
        }
    }

    let mut check = HeaderCheck::new(60 + 8 * restricted);
    if !malformed.is_empty() {
        check.flag(
            "permissions_policy_malformed",
            Severity::Low,
            format!("Permissions-Policy entries could not be parsed: {}", malformed.join(", ")),
            0,
        );
    }
    if !unknown.is_empty() {
        check.flag(
            "permissions_policy_unknown_feature",
            Severity::Info,
            format!("Permissions-Policy names unknown features: {}", unknown.join(", ")),
            0,
        );
    }
    if !permissive.is_empty() {
        check.flag(
            "permissions_policy_permissive",
            Severity::Medium,
            format!("Permissions-Policy grants sensitive features to every origin: {}", permissive.join(", ")),
            0,
        );
    }
    check
}

// --- Legacy and caching headers ---

fn check_xss_protection(value: &str) -> HeaderCheck {
    let normalized: String = value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase();
    if normalized == "0" {
        return HeaderCheck::new(100);
    }
    if normalized.starts_with("1;mode=block") {
        let mut check = HeaderCheck::new(80);
        check.flag("xxss_legacy_filter", Severity::Info, "X-XSS-Protection enables the legacy XSS auditor", 0);
        return check;
    }
    if normalized.starts_with('1') {
        let mut check = HeaderCheck::new(50);
        check.flag(
            "xxss_legacy_filter",
            Severity::Low,
            "X-XSS-Protection enables the legacy XSS auditor in filtering mode",
            0,
        );
        return check;
    }
    let mut check = HeaderCheck::new(100);
    check.flag("xxss_invalid", Severity::Low, format!("X-XSS-Protection value '{}' is invalid", value.trim()), 100);
    check
}

fn check_cache_control(value: &str) -> HeaderCheck {
    let directives: Vec<String> = value.split(',').map(|d| d.trim().to_ascii_lowercase()).collect();
    let has = |name: &str| directives.iter().any(|d| d == name);
    if has("no-store") {
        HeaderCheck::new(100)
    } else if has("private") || has("no-cache") {
        HeaderCheck::new(80)
    } else {
        let mut check = HeaderCheck::new(100);
        check.flag(
            "cache_control_permissive",
            Severity::Info,
            format!("Cache-Control '{}' allows the response to be stored", value.trim()),
            50,
        );
        check
    }
}

fn check_pragma(value: &str) -> HeaderCheck {
    let mut check = HeaderCheck::new(100);
    if !value.trim().eq_ignore_ascii_case("no-cache") {
        check.flag("pragma_invalid", Severity::Info, format!("Pragma value '{}' is not no-cache", value.trim()), 50);
    }
    check
}

// --- Information disclosure ---

fn information_disclosure(headers: &BTreeMap<String, String>) -> Vec<VulnerabilityFinding> {
    let mut findings = Vec::new();
    if let Some(server) = headers.get("server") {
        if server.chars().any(|c| c.is_ascii_digit()) {
            findings.push(finding(
                "information_disclosure",
                Severity::Low,
                format!("Server header reveals version information: {}", server),
            ));
        }
    }
    for name in ["x-powered-by", "x-aspnet-version", "x-aspnetmvc-version"] {
        if let Some(value) = headers.get(name) {
            findings.push(finding(
                "information_disclosure",
                Severity::Low,
                format!("{} header reveals the technology stack: {}", name, value),
            ));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Grade;

    fn hardened() -> BTreeMap<String, String> {
        [
            ("content-security-policy", "default-src 'self'; script-src 'self'; object-src 'none'; frame-ancestors 'none'"),
            ("strict-transport-security", "max-age=63072000; includeSubDomains; preload"),
            ("x-frame-options", "DENY"),
            ("x-content-type-options", "nosniff"),
            ("referrer-policy", "no-referrer"),
            ("permissions-policy", "camera=(), microphone=(), geolocation=(), payment=(), usb=()"),
            ("x-xss-protection", "0"),
            ("expect-ct", "max-age=86400, enforce"),
            ("cache-control", "no-store"),
            ("pragma", "no-cache"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn scan(headers: &BTreeMap<String, String>) -> CategoryAnalysis {
        run_headers_scan(headers, "https://example.com/", &HeaderScoring::default(), &OptionalHeaderPolicy::empty())
    }

    fn find<'a>(analysis: &'a CategoryAnalysis, code: &str) -> Option<&'a VulnerabilityFinding> {
        analysis.findings.iter().find(|f| f.kind == code)
    }

    fn check_severity(check: &HeaderCheck, code: &str) -> Option<Severity> {
        check.findings.iter().find(|f| f.kind == code).map(|f| f.severity)
    }

    #[test]
    fn test_hardened_headers_score_full_marks() {
        let analysis = scan(&hardened());
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.grade, Grade::APlus);
        assert!(analysis.findings.iter().all(|f| f.severity == Severity::Info));
        match analysis.details {
            CategoryDetails::Headers(details) => {
                assert_eq!(details.present.len(), 10);
                assert!(details.missing.is_empty());
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_missing_csp_and_hsts_scores_lower() {
        let mut headers = hardened();
        headers.remove("content-security-policy");
        headers.remove("strict-transport-security");
        let analysis = scan(&headers);
        assert!(analysis.score < scan(&hardened()).score);
        let missing: Vec<_> = analysis.findings.iter().filter(|f| f.kind == "missing_header").collect();
        assert_eq!(missing.len(), 2);
        assert!(missing.iter().all(|f| f.severity == Severity::High));
    }

    #[test]
    fn test_no_headers_scores_zero() {
        let analysis = scan(&BTreeMap::new());
        assert_eq!(analysis.score, 0);
        assert_eq!(analysis.findings.iter().filter(|f| f.kind == "missing_header").count(), 10);
    }

    #[test]
    fn test_csp_unsafe_directives() {
        let check = check_csp("default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; object-src 'none'");
        assert_eq!(check_severity(&check, "csp_unsafe_inline"), Some(Severity::High));
        assert_eq!(check_severity(&check, "csp_unsafe_eval"), Some(Severity::High));
        assert!(check.subscore() < 60);

        let nonce = check_csp("default-src 'self'; script-src 'nonce-abc123' 'unsafe-inline'; object-src 'none'");
        assert_eq!(check_severity(&nonce, "csp_unsafe_inline"), Some(Severity::Info));
    }

    #[test]
    fn test_csp_wildcard_and_missing_directives() {
        let check = check_csp("script-src * data:");
        assert_eq!(check_severity(&check, "csp_wildcard_script_src"), Some(Severity::High));
        assert_eq!(check_severity(&check, "csp_insecure_script_source"), Some(Severity::Medium));
        assert_eq!(check_severity(&check, "csp_missing_default_src"), Some(Severity::Medium));
        assert_eq!(check_severity(&check, "csp_missing_object_src"), Some(Severity::Low));
        assert!(check_severity(&check, "csp_missing_script_src").is_none());
    }

    #[test]
    fn test_hsts_parsing() {
        let policy = parse_hsts("max-age=\"300\"; includeSubDomains");
        assert_eq!(policy.max_age, Some(300));
        assert!(policy.include_subdomains);
        assert!(!policy.preload);

        let short = check_hsts("max-age=300; includeSubDomains; preload", true, 31_536_000);
        assert_eq!(check_severity(&short, "hsts_short_max_age"), Some(Severity::Medium));
        assert_eq!(check_severity(&short, "hsts_preload_ineligible"), Some(Severity::Low));
        assert_eq!(short.subscore(), 60);

        let invalid = check_hsts("includeSubDomains", true, 31_536_000);
        assert_eq!(invalid.subscore(), 0);

        let over_http = check_hsts("max-age=31536000; includeSubDomains", false, 31_536_000);
        assert_eq!(check_severity(&over_http, "hsts_over_http"), Some(Severity::Low));
    }

    #[test]
    fn test_frame_options_values() {
        assert_eq!(check_frame_options("deny").subscore(), 100);
        assert_eq!(check_frame_options("SAMEORIGIN").subscore(), 90);
        let allow_from = check_frame_options("ALLOW-FROM https://example.com");
        assert_eq!(check_severity(&allow_from, "xfo_obsolete_allow_from"), Some(Severity::Medium));
        assert_eq!(check_frame_options("ALLOWALL").subscore(), 0);
    }

    #[test]
    fn test_referrer_policy_uses_last_known_token() {
        let check = check_referrer_policy("unsafe-url, bogus, strict-origin-when-cross-origin");
        assert_eq!(check.subscore(), 90);
        assert_eq!(check_severity(&check, "referrer_policy_unknown_token"), Some(Severity::Low));
        assert!(check_severity(&check, "referrer_policy_unsafe").is_none());

        let unsafe_url = check_referrer_policy("unsafe-url");
        assert_eq!(check_severity(&unsafe_url, "referrer_policy_unsafe"), Some(Severity::Medium));
    }

    #[test]
    fn test_permissions_policy() {
        let check = check_permissions_policy("camera=*, microphone=(), fancy-thing=(), geolocation");
        assert_eq!(check.subscore(), 68);
        assert_eq!(check_severity(&check, "permissions_policy_permissive"), Some(Severity::Medium));
        assert_eq!(check_severity(&check, "permissions_policy_unknown_feature"), Some(Severity::Info));
        assert_eq!(check_severity(&check, "permissions_policy_malformed"), Some(Severity::Low));
    }

    #[test]
    fn test_optional_headers_waived_for_listed_hosts() {
        let mut headers = hardened();
        for name in ["x-xss-protection", "expect-ct", "pragma", "cache-control", "permissions-policy"] {
            headers.remove(name);
        }
        let analysis = run_headers_scan(
            &headers,
            "https://www.google.com/",
            &HeaderScoring::default(),
            &OptionalHeaderPolicy::default(),
        );
        assert_eq!(analysis.score, 100);
        match &analysis.details {
            CategoryDetails::Headers(details) => {
                assert_eq!(details.optional_waived.len(), 5);
                assert!(details.missing.is_empty());
            }
            other => panic!("unexpected details: {:?}", other),
        }
        assert!(analysis
            .findings
            .iter()
            .filter(|f| f.kind == "missing_header")
            .all(|f| f.severity == Severity::Info));
    }

    #[test]
    fn test_information_disclosure_and_report_only() {
        let mut headers = BTreeMap::new();
        headers.insert("server".to_string(), "Apache/2.4.41 (Ubuntu)".to_string());
        headers.insert("x-powered-by".to_string(), "PHP/7.4".to_string());
        headers.insert("content-security-policy-report-only".to_string(), "default-src 'self'".to_string());
        let analysis = scan(&headers);
        assert_eq!(analysis.findings.iter().filter(|f| f.kind == "information_disclosure").count(), 2);
        assert!(find(&analysis, "csp_report_only").is_some());
    }
}
