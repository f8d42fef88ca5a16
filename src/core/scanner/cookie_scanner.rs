// src/core/scanner/cookie_scanner.rs

use tracing::{debug, info};

use crate::config::CookieScoring;
use crate::core::knowledge_base::finding;
use crate::core::models::{
    Category, CategoryAnalysis, CategoryDetails, CookieDetails, CookieSummary, Severity, VulnerabilityFinding,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Long terms match anywhere in the name; short ones only at the start of a
/// `_`, `-` or `.` separated segment so "monkey" or "inside" stay harmless.
static SENSITIVE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(sess|token|jwt|csrf|xsrf|login|passw|pwd|secret|remember|auth|apikey)|(^|[_\-.])(sid|key|user)",
    )
    .unwrap()
});

static TRACKING_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(_ga|_gid|_gat|_gcl_|__utm|_fbp|_fbc|_hj|_uet|__hs|hubspot|mp_|_pin_|_tt_|_clck|_clsk|ajs_)").unwrap()
});

/// Values that look like a word, a number or an e-mail address rather than
/// an opaque token.
static PLAIN_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([a-z]+|[0-9]+)$").unwrap());

/// A single `Set-Cookie` header split into its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCookie {
    pub name: String,
    pub value: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
}

impl ParsedCookie {
    /// Days until the cookie expires; `Max-Age` wins over `Expires`.
    /// `None` for session cookies.
    pub fn lifetime_days(&self, now: DateTime<Utc>) -> Option<i64> {
        match (self.max_age, self.expires) {
            (Some(seconds), _) => Some(seconds / 86_400),
            (None, Some(expires)) => Some(expires.signed_duration_since(now).num_days()),
            (None, None) => None,
        }
    }

    fn same_site_valid(&self) -> bool {
        match self.same_site.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("strict") | Some("lax") => true,
            Some("none") => self.secure,
            _ => false,
        }
    }
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Netscape style: "Wed, 21-Oct-2015 07:28:00 GMT"
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses one `Set-Cookie` value. Returns `None` when there is no `name=` pair.
pub fn parse_set_cookie(raw: &str) -> Option<ParsedCookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = ParsedCookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        secure: false,
        http_only: false,
        same_site: None,
        domain: None,
        path: None,
        expires: None,
        max_age: None,
    };

    for attribute in parts.map(str::trim).filter(|a| !a.is_empty()) {
        let (key, arg) = match attribute.split_once('=') {
            Some((key, arg)) => (key.trim(), arg.trim()),
            None => (attribute, ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "samesite" => cookie.same_site = Some(arg.to_string()),
            "domain" if !arg.is_empty() => cookie.domain = Some(arg.to_ascii_lowercase()),
            "path" if !arg.is_empty() => cookie.path = Some(arg.to_string()),
            "expires" => cookie.expires = parse_expires(arg),
            "max-age" => cookie.max_age = arg.parse().ok(),
            _ => {}
        }
    }

    Some(cookie)
}

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_NAME.is_match(name)
}

pub fn is_tracking(name: &str) -> bool {
    TRACKING_NAME.is_match(name)
}

fn looks_predictable(value: &str) -> bool {
    !value.is_empty() && (value.len() < 16 || PLAIN_VALUE.is_match(value) || value.contains('@'))
}

/// Collects findings and their penalty for the cookie category.
struct CookieGrader<'a> {
    scoring: &'a CookieScoring,
    findings: Vec<VulnerabilityFinding>,
    penalty: i32,
}

impl CookieGrader<'_> {
    fn push(&mut self, code: &str, severity: Severity, message: String) {
        debug!(code, severity = %severity, "Cookie finding.");
        self.penalty += self.scoring.penalties.for_severity(severity);
        self.findings.push(finding(code, severity, message));
    }

    fn check_cookie(&mut self, cookie: &ParsedCookie, host: &str, now: DateTime<Utc>) {
        let name = cookie.name.as_str();
        let sensitive = is_sensitive(name);

        if !cookie.secure {
            let severity = if sensitive { Severity::Critical } else { Severity::High };
            self.push("cookie_missing_secure", severity, format!("Cookie '{name}' is missing the Secure flag"));
        }
        if !cookie.http_only {
            let severity = if sensitive { Severity::High } else { Severity::Medium };
            self.push("cookie_missing_httponly", severity, format!("Cookie '{name}' is missing the HttpOnly flag"));
        }

        match cookie.same_site.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None => self.push(
                "cookie_missing_samesite",
                Severity::Medium,
                format!("Cookie '{name}' has no SameSite attribute"),
            ),
            Some("none") if !cookie.secure => self.push(
                "cookie_samesite_none_insecure",
                Severity::High,
                format!("Cookie '{name}' uses SameSite=None without Secure and will be rejected by browsers"),
            ),
            Some("strict") | Some("lax") | Some("none") => {}
            Some(other) => self.push(
                "cookie_invalid_samesite",
                Severity::Low,
                format!("Cookie '{name}' has an invalid SameSite value '{other}'"),
            ),
        }

        if let Some(days) = cookie.lifetime_days(now) {
            if days > self.scoring.max_lifetime_days {
                self.push(
                    "cookie_long_lifetime",
                    Severity::Low,
                    format!("Cookie '{name}' lives for {days} days"),
                );
            }
        }

        if sensitive && looks_predictable(&cookie.value) {
            self.push(
                "cookie_predictable_value",
                Severity::Medium,
                format!("Sensitive cookie '{name}' has a short or readable value"),
            );
        }

        if let Some(domain) = cookie.domain.as_deref() {
            let domain = domain.trim_start_matches('.');
            let parent_of_host = host != domain && host.ends_with(&format!(".{domain}"));
            if parent_of_host || sensitive {
                self.push(
                    "cookie_broad_domain",
                    Severity::Low,
                    format!("Cookie '{name}' is shared with every subdomain of {domain}"),
                );
            }
        }

        if sensitive && cookie.domain.is_some() && matches!(cookie.path.as_deref(), None | Some("/")) {
            self.push(
                "cookie_broad_path",
                Severity::Low,
                format!("Sensitive cookie '{name}' is sent to every path of every subdomain"),
            );
        }

        if let Some(problem) = prefix_violation(cookie) {
            self.push("cookie_prefix_violation", Severity::High, format!("Cookie '{name}' {problem}"));
        }
    }
}

/// `__Secure-` needs `Secure`; `__Host-` also needs `Path=/` and no `Domain`.
fn prefix_violation(cookie: &ParsedCookie) -> Option<&'static str> {
    if cookie.name.starts_with("__Secure-") && !cookie.secure {
        return Some("uses the __Secure- prefix without the Secure flag");
    }
    if cookie.name.starts_with("__Host-") {
        if !cookie.secure {
            return Some("uses the __Host- prefix without the Secure flag");
        }
        if cookie.path.as_deref() != Some("/") {
            return Some("uses the __Host- prefix without Path=/");
        }
        if cookie.domain.is_some() {
            return Some("uses the __Host- prefix together with a Domain attribute");
        }
    }
    None
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 { 1.0 } else { count as f64 / total as f64 }
}

/// Scores the cookies set across every hop of the fetch.
pub fn run_cookie_scan(cookies: &[String], host: &str, scoring: &CookieScoring, now: DateTime<Utc>) -> CategoryAnalysis {
    info!(target = host, cookies = cookies.len(), "Starting cookie scan.");

    let parsed: Vec<ParsedCookie> = cookies
        .iter()
        .filter_map(|raw| {
            let cookie = parse_set_cookie(raw);
            if cookie.is_none() {
                debug!(raw = raw.as_str(), "Skipping unparseable Set-Cookie value.");
            }
            cookie
        })
        .collect();

    if parsed.is_empty() {
        info!("No cookies set, nothing to leak.");
        return CategoryAnalysis::new(Category::Cookies, 100.0, Vec::new(), CategoryDetails::Cookies(CookieDetails::default()));
    }

    let mut grader = CookieGrader { scoring, findings: Vec::new(), penalty: 0 };
    let host = host.to_ascii_lowercase();
    for cookie in &parsed {
        grader.check_cookie(cookie, &host, now);
    }

    let total = parsed.len();
    let secure_count = parsed.iter().filter(|c| c.secure).count();
    let http_only_count = parsed.iter().filter(|c| c.http_only).count();
    let same_site_count = parsed.iter().filter(|c| c.same_site_valid()).count();
    let sensitive_count = parsed.iter().filter(|c| is_sensitive(&c.name)).count();

    if total > scoring.max_cookie_count {
        grader.push("too_many_cookies", Severity::Low, format!("The response sets {total} cookies"));
    }
    let secure_ratio = ratio(secure_count, total);
    if secure_ratio < scoring.min_secure_ratio {
        grader.push(
            "low_secure_ratio",
            Severity::High,
            format!("Only {secure_count} of {total} cookies carry the Secure flag"),
        );
    }
    let http_only_ratio = ratio(http_only_count, total);
    if http_only_ratio < scoring.min_http_only_ratio {
        grader.push(
            "low_httponly_ratio",
            Severity::Medium,
            format!("Only {http_only_count} of {total} cookies carry the HttpOnly flag"),
        );
    }

    let trackers: Vec<&str> = parsed.iter().map(|c| c.name.as_str()).filter(|n| is_tracking(n)).collect();
    if !trackers.is_empty() {
        grader.push(
            "tracking_cookies",
            Severity::Info,
            format!("Tracking cookies detected: {}", trackers.join(", ")),
        );
    }

    let bonus = secure_ratio * scoring.secure_ratio_bonus
        + http_only_ratio * scoring.http_only_ratio_bonus
        + ratio(same_site_count, total) * scoring.same_site_ratio_bonus;
    let raw = 100.0 - f64::from(grader.penalty) + bonus;
    debug!(penalty = grader.penalty, bonus, raw, "Cookie score computed.");

    let details = CookieDetails {
        has_cookies: true,
        total,
        secure_count,
        http_only_count,
        same_site_count,
        sensitive_count,
        cookies: parsed
            .iter()
            .map(|c| CookieSummary {
                name: c.name.clone(),
                secure: c.secure,
                http_only: c.http_only,
                same_site: c.same_site.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                sensitive: is_sensitive(&c.name),
                lifetime_days: c.lifetime_days(now),
            })
            .collect(),
    };

    let analysis = CategoryAnalysis::new(Category::Cookies, raw, grader.findings, CategoryDetails::Cookies(details));
    info!(score = analysis.score, findings = analysis.findings.len(), "Cookie scan finished.");
    analysis
}
