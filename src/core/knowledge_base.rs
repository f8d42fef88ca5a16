//! This module acts as the central "brain" of the analyzer.
//! It contains static, read-only tables: the security header catalog with its
//! weights, the impact and remediation text of every finding, and the
//! user-facing wording of every error kind.
//! Keeping this data-driven allows the scoring code to stay free of prose.

use crate::core::errors::ErrorKind;
use crate::core::models::{Severity, VulnerabilityFinding};
use serde::{Deserialize, Serialize};

// --- Header Catalog ---

/// One entry of the security header catalog.
pub struct HeaderSpec {
    /// Lower-case header name, as stored in `FetchResult::headers`.
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Severity of the finding emitted when the header is absent.
    pub severity: Severity,
    /// Share of the header score this header contributes.
    pub weight: u32,
    pub recommendation: &'static str,
}

/// The ten headers the header analyzer scores. Weights sum to 100.
pub static HEADER_CATALOG: &[HeaderSpec] = &[
    HeaderSpec {
        name: "content-security-policy",
        display_name: "Content-Security-Policy",
        description: "Restricts the sources from which scripts, styles and other content may load, limiting the impact of cross-site scripting.",
        severity: Severity::High,
        weight: 20,
        recommendation: "Add a Content-Security-Policy header, starting with \"default-src 'self'; object-src 'none'; frame-ancestors 'none'\" and loosening only where required.",
    },
    HeaderSpec {
        name: "strict-transport-security",
        display_name: "Strict-Transport-Security",
        description: "Instructs browsers to only contact the site over HTTPS, preventing protocol downgrade and cookie hijacking.",
        severity: Severity::High,
        weight: 20,
        recommendation: "Add \"Strict-Transport-Security: max-age=31536000; includeSubDomains\" to every HTTPS response.",
    },
    HeaderSpec {
        name: "x-frame-options",
        display_name: "X-Frame-Options",
        description: "Controls whether the page may be embedded in a frame, protecting against clickjacking.",
        severity: Severity::Medium,
        weight: 15,
        recommendation: "Add \"X-Frame-Options: DENY\" (or SAMEORIGIN if the site frames itself).",
    },
    HeaderSpec {
        name: "x-content-type-options",
        display_name: "X-Content-Type-Options",
        description: "Stops browsers from MIME-sniffing a response away from its declared content type.",
        severity: Severity::Medium,
        weight: 10,
        recommendation: "Add \"X-Content-Type-Options: nosniff\".",
    },
    HeaderSpec {
        name: "referrer-policy",
        display_name: "Referrer-Policy",
        description: "Controls how much of the current URL is sent in the Referer header to other sites.",
        severity: Severity::Low,
        weight: 10,
        recommendation: "Add \"Referrer-Policy: strict-origin-when-cross-origin\" or a stricter policy such as no-referrer.",
    },
    HeaderSpec {
        name: "permissions-policy",
        display_name: "Permissions-Policy",
        description: "Restricts which powerful browser features (camera, microphone, geolocation, ...) the page and its frames may use.",
        severity: Severity::Low,
        weight: 10,
        recommendation: "Add a Permissions-Policy header disabling unused features, e.g. \"camera=(), microphone=(), geolocation=()\".",
    },
    HeaderSpec {
        name: "x-xss-protection",
        display_name: "X-XSS-Protection",
        description: "Legacy header controlling the browser XSS auditor; modern guidance is to disable it explicitly.",
        severity: Severity::Info,
        weight: 5,
        recommendation: "Send \"X-XSS-Protection: 0\" and rely on Content-Security-Policy instead.",
    },
    HeaderSpec {
        name: "expect-ct",
        display_name: "Expect-CT",
        description: "Asked browsers to enforce Certificate Transparency for the site.",
        severity: Severity::Info,
        weight: 3,
        recommendation: "Expect-CT is deprecated; Certificate Transparency is now enforced by default and no action is needed.",
    },
    HeaderSpec {
        name: "cache-control",
        display_name: "Cache-Control",
        description: "Controls whether intermediaries and the browser may store the response.",
        severity: Severity::Low,
        weight: 4,
        recommendation: "Send \"Cache-Control: no-store\" on pages that contain personal or sensitive data.",
    },
    HeaderSpec {
        name: "pragma",
        display_name: "Pragma",
        description: "HTTP/1.0 cache directive kept for compatibility with old intermediaries.",
        severity: Severity::Info,
        weight: 3,
        recommendation: "Send \"Pragma: no-cache\" alongside Cache-Control for legacy caches.",
    },
];

pub fn header_spec(name: &str) -> Option<&'static HeaderSpec> {
    HEADER_CATALOG.iter().find(|h| h.name == name)
}

pub fn total_header_weight() -> u32 {
    HEADER_CATALOG.iter().map(|h| h.weight).sum()
}

// --- Optional Header Policy ---

/// Headers whose absence is tolerated on specific sites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionalHeaderRule {
    /// Matched as a substring of the lower-case hostname.
    pub host_pattern: String,
    pub headers: Vec<String>,
}

/// Swappable allowlist that waives missing-header penalties for large sites
/// whose header choices are deliberate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionalHeaderPolicy {
    pub rules: Vec<OptionalHeaderRule>,
}

impl OptionalHeaderPolicy {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn is_optional(&self, host: &str, header: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.rules.iter().any(|rule| {
            host.contains(&rule.host_pattern) && rule.headers.iter().any(|h| h.eq_ignore_ascii_case(header))
        })
    }
}

impl Default for OptionalHeaderPolicy {
    fn default() -> Self {
        let relaxed = [
            "x-xss-protection",
            "expect-ct",
            "pragma",
            "cache-control",
            "permissions-policy",
        ];
        let hosts = [
            "google.", "youtube.", "facebook.", "amazon.", "microsoft.", "apple.", "github.", "wikipedia.",
        ];
        Self {
            rules: hosts
                .iter()
                .map(|host| OptionalHeaderRule {
                    host_pattern: host.to_string(),
                    headers: relaxed.iter().map(|h| h.to_string()).collect(),
                })
                .collect(),
        }
    }
}

// --- Finding Knowledge Base ---

/// Impact and remediation text for a finding code.
pub struct FindingDetail {
    pub code: &'static str,
    pub impact: &'static str,
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- TLS / certificate ---
    FindingDetail {
        code: "not_https",
        impact: "All traffic, including credentials and session cookies, travels in clear text and can be read or modified in transit.",
        remediation: "Serve the site over HTTPS with a certificate from a trusted authority and redirect all HTTP requests to HTTPS.",
    },
    FindingDetail {
        code: "insecure_protocol",
        impact: "SSL and TLS 1.0 have practical attacks (POODLE, BEAST) that can expose encrypted traffic.",
        remediation: "Disable SSLv3 and TLS 1.0 on the server and offer TLS 1.2 and TLS 1.3 only.",
    },
    FindingDetail {
        code: "deprecated_protocol",
        impact: "TLS 1.1 is deprecated (RFC 8996) and rejected by modern browsers.",
        remediation: "Disable TLS 1.1 and offer TLS 1.2 and TLS 1.3 only.",
    },
    FindingDetail {
        code: "weak_cipher_strength",
        impact: "Ciphers below 128 bits can be brute-forced, exposing encrypted traffic.",
        remediation: "Restrict the server to AEAD cipher suites with at least 128-bit keys (AES-GCM, ChaCha20-Poly1305).",
    },
    FindingDetail {
        code: "weak_cipher_algorithm",
        impact: "RC4, DES, 3DES and MD5-based suites have known cryptographic weaknesses.",
        remediation: "Remove RC4, DES, 3DES, NULL, EXPORT and MD5 cipher suites from the server configuration.",
    },
    FindingDetail {
        code: "certificate_expired",
        impact: "Browsers show a full-page warning and most clients refuse to connect.",
        remediation: "Renew the certificate immediately and automate renewal (for example with ACME).",
    },
    FindingDetail {
        code: "certificate_expiring",
        impact: "The certificate will soon expire and the site will become unreachable for most clients.",
        remediation: "Renew the certificate before it expires and automate renewal.",
    },
    FindingDetail {
        code: "certificate_not_yet_valid",
        impact: "Clients reject certificates whose validity period has not started.",
        remediation: "Check the server clock and the certificate's notBefore date; reissue if necessary.",
    },
    FindingDetail {
        code: "weak_signature_algorithm",
        impact: "Signatures over MD5 or SHA-1 can be forged with collision attacks.",
        remediation: "Reissue the certificate with a SHA-256 (or stronger) signature.",
    },
    FindingDetail {
        code: "weak_key_size",
        impact: "Short keys can be factored or brute-forced, allowing impersonation of the server.",
        remediation: "Reissue the certificate with an RSA key of at least 2048 bits or an ECDSA key of at least 256 bits.",
    },
    FindingDetail {
        code: "self_signed_certificate",
        impact: "Clients cannot verify the server identity, so users are trained to click through warnings.",
        remediation: "Replace the self-signed certificate with one issued by a publicly trusted authority.",
    },
    FindingDetail {
        code: "incomplete_chain",
        impact: "Clients without the missing intermediate certificate fail to build a trust path.",
        remediation: "Configure the server to send the full intermediate chain along with the leaf certificate.",
    },
    FindingDetail {
        code: "hostname_mismatch",
        impact: "The certificate does not cover this hostname, so browsers reject the connection.",
        remediation: "Issue a certificate whose subject alternative names include this hostname.",
    },
    FindingDetail {
        code: "certificate_untrusted",
        impact: "The certificate chain does not validate against the public trust store.",
        remediation: "Use a certificate from a publicly trusted authority and serve its complete chain.",
    },
    FindingDetail {
        code: "limited_inspection",
        impact: "Only a coarse validity check was possible; protocol and cipher were not graded.",
        remediation: "Ensure the server completes a TLS 1.2+ handshake so a full inspection can run.",
    },
    FindingDetail {
        code: "no_certificate",
        impact: "No certificate was presented, so the server identity cannot be verified.",
        remediation: "Configure the server to present a valid certificate.",
    },
    // --- Headers ---
    FindingDetail {
        code: "csp_missing_default_src",
        impact: "Resource types without an explicit directive are unrestricted.",
        remediation: "Add a default-src directive (e.g. default-src 'self') as a fallback for all resource types.",
    },
    FindingDetail {
        code: "csp_missing_script_src",
        impact: "Scripts can be loaded from any origin.",
        remediation: "Add a script-src directive (or default-src) restricting script origins.",
    },
    FindingDetail {
        code: "csp_missing_object_src",
        impact: "Plugins such as Flash or Java applets can be loaded and used to bypass the policy.",
        remediation: "Add object-src 'none' to the Content-Security-Policy.",
    },
    FindingDetail {
        code: "csp_unsafe_inline",
        impact: "'unsafe-inline' allows injected inline scripts to run, defeating most XSS protection.",
        remediation: "Remove 'unsafe-inline' from script-src and use nonces or hashes for inline scripts.",
    },
    FindingDetail {
        code: "csp_unsafe_eval",
        impact: "'unsafe-eval' lets attackers turn string injection into code execution via eval().",
        remediation: "Remove 'unsafe-eval' and refactor code that relies on eval or new Function.",
    },
    FindingDetail {
        code: "csp_wildcard_script_src",
        impact: "A wildcard script source allows scripts from any host.",
        remediation: "Replace the * source with an explicit list of trusted script origins.",
    },
    FindingDetail {
        code: "csp_insecure_script_source",
        impact: "Scheme sources such as http: or data: allow attacker-controlled scripts.",
        remediation: "Remove http:, https: and data: scheme sources from script-src.",
    },
    FindingDetail {
        code: "csp_missing_frame_ancestors",
        impact: "Without frame-ancestors, framing protection relies on X-Frame-Options alone.",
        remediation: "Add frame-ancestors 'none' or 'self' to the Content-Security-Policy.",
    },
    FindingDetail {
        code: "csp_report_only",
        impact: "A report-only policy is monitored but not enforced.",
        remediation: "Promote the Content-Security-Policy-Report-Only policy to an enforced Content-Security-Policy.",
    },
    FindingDetail {
        code: "hsts_invalid_max_age",
        impact: "Browsers ignore an HSTS header without a valid positive max-age.",
        remediation: "Set a valid max-age, e.g. \"Strict-Transport-Security: max-age=31536000\".",
    },
    FindingDetail {
        code: "hsts_short_max_age",
        impact: "A short HSTS lifetime leaves returning visitors open to downgrade attacks once it lapses.",
        remediation: "Raise the HSTS max-age to at least 31536000 seconds (one year).",
    },
    FindingDetail {
        code: "hsts_missing_include_subdomains",
        impact: "Subdomains can still be reached over HTTP and used to inject cookies.",
        remediation: "Add includeSubDomains to the Strict-Transport-Security header once all subdomains support HTTPS.",
    },
    FindingDetail {
        code: "hsts_missing_preload",
        impact: "First-time visitors are not protected until they receive the header.",
        remediation: "Consider adding preload and submitting the domain to the HSTS preload list.",
    },
    FindingDetail {
        code: "hsts_preload_ineligible",
        impact: "The preload list rejects domains that do not meet its requirements.",
        remediation: "For preload, use max-age of at least one year together with includeSubDomains.",
    },
    FindingDetail {
        code: "hsts_over_http",
        impact: "Browsers ignore Strict-Transport-Security received over plain HTTP.",
        remediation: "Serve the site over HTTPS and send Strict-Transport-Security on HTTPS responses.",
    },
    FindingDetail {
        code: "xfo_obsolete_allow_from",
        impact: "ALLOW-FROM is not supported by modern browsers, leaving the page frameable.",
        remediation: "Replace ALLOW-FROM with the CSP frame-ancestors directive.",
    },
    FindingDetail {
        code: "xfo_invalid",
        impact: "Browsers ignore unrecognised X-Frame-Options values, leaving the page frameable.",
        remediation: "Set X-Frame-Options to DENY or SAMEORIGIN.",
    },
    FindingDetail {
        code: "xcto_invalid",
        impact: "Only the value nosniff disables MIME sniffing.",
        remediation: "Set X-Content-Type-Options to nosniff.",
    },
    FindingDetail {
        code: "referrer_policy_unknown_token",
        impact: "Browsers ignore unknown Referrer-Policy tokens.",
        remediation: "Use only standard Referrer-Policy values such as strict-origin-when-cross-origin or no-referrer.",
    },
    FindingDetail {
        code: "referrer_policy_unsafe",
        impact: "Full URLs, including paths and query strings, leak to third parties.",
        remediation: "Replace unsafe-url or no-referrer-when-downgrade with strict-origin-when-cross-origin or stricter.",
    },
    FindingDetail {
        code: "permissions_policy_unknown_feature",
        impact: "Unknown features are ignored by browsers.",
        remediation: "Check Permissions-Policy feature names against the current specification.",
    },
    FindingDetail {
        code: "permissions_policy_malformed",
        impact: "Malformed entries are dropped by browsers, so the feature stays at its default.",
        remediation: "Write Permissions-Policy entries as feature=(allowlist), e.g. camera=().",
    },
    FindingDetail {
        code: "permissions_policy_permissive",
        impact: "Any embedded origin may use this sensitive browser feature.",
        remediation: "Restrict sensitive features to () or (self) in the Permissions-Policy header.",
    },
    FindingDetail {
        code: "xxss_legacy_filter",
        impact: "The legacy XSS auditor can itself introduce information leaks.",
        remediation: "Send \"X-XSS-Protection: 0\" and rely on Content-Security-Policy.",
    },
    FindingDetail {
        code: "xxss_invalid",
        impact: "Unrecognised X-XSS-Protection values are ignored.",
        remediation: "Send \"X-XSS-Protection: 0\".",
    },
    FindingDetail {
        code: "expect_ct_deprecated",
        impact: "Expect-CT is obsolete and ignored by current browsers.",
        remediation: "Remove the Expect-CT header.",
    },
    FindingDetail {
        code: "cache_control_permissive",
        impact: "Responses may be stored by shared caches and exposed to other users.",
        remediation: "Use Cache-Control: no-store for pages with personal data.",
    },
    FindingDetail {
        code: "pragma_invalid",
        impact: "Only no-cache is meaningful for Pragma.",
        remediation: "Send \"Pragma: no-cache\" or drop the header.",
    },
    FindingDetail {
        code: "information_disclosure",
        impact: "Software names and versions help attackers pick known exploits.",
        remediation: "Remove version details from Server and drop X-Powered-By / X-AspNet-Version headers.",
    },
    // --- Cookies ---
    FindingDetail {
        code: "cookie_missing_secure",
        impact: "The cookie is sent over unencrypted HTTP and can be intercepted.",
        remediation: "Set the Secure attribute on every cookie.",
    },
    FindingDetail {
        code: "cookie_missing_httponly",
        impact: "Scripts can read the cookie, so an XSS flaw can steal it.",
        remediation: "Set the HttpOnly attribute on cookies that JavaScript does not need.",
    },
    FindingDetail {
        code: "cookie_missing_samesite",
        impact: "The cookie is attached to cross-site requests, enabling CSRF.",
        remediation: "Set SameSite=Lax or SameSite=Strict on cookies.",
    },
    FindingDetail {
        code: "cookie_samesite_none_insecure",
        impact: "Browsers reject SameSite=None cookies that lack Secure.",
        remediation: "Add the Secure attribute to every cookie that uses SameSite=None.",
    },
    FindingDetail {
        code: "cookie_invalid_samesite",
        impact: "Browsers treat unknown SameSite values as Lax or ignore them.",
        remediation: "Use one of Strict, Lax or None for SameSite.",
    },
    FindingDetail {
        code: "cookie_long_lifetime",
        impact: "Long-lived cookies stay valid long after a session should have ended.",
        remediation: "Shorten the cookie lifetime with Max-Age or Expires.",
    },
    FindingDetail {
        code: "cookie_predictable_value",
        impact: "Short or plain-text values in sensitive cookies can be guessed or tampered with.",
        remediation: "Store only long, random, opaque identifiers in session and authentication cookies.",
    },
    FindingDetail {
        code: "cookie_broad_domain",
        impact: "The cookie is shared with every subdomain, any of which may be less trustworthy.",
        remediation: "Omit the Domain attribute so the cookie is bound to the exact host.",
    },
    FindingDetail {
        code: "cookie_broad_path",
        impact: "The credential travels with requests to every path of every subdomain, widening its exposure.",
        remediation: "Drop the Domain attribute or restrict Path to the part of the site that needs the cookie.",
    },
    FindingDetail {
        code: "cookie_prefix_violation",
        impact: "Browsers reject cookies that break the rules of their __Secure- or __Host- prefix.",
        remediation: "__Secure- cookies need Secure; __Host- cookies need Secure, Path=/ and no Domain.",
    },
    FindingDetail {
        code: "too_many_cookies",
        impact: "A large number of cookies increases request size and attack surface.",
        remediation: "Consolidate cookies and remove ones that are no longer needed.",
    },
    FindingDetail {
        code: "low_secure_ratio",
        impact: "Most cookies can leak over plain HTTP.",
        remediation: "Set the Secure attribute on all cookies.",
    },
    FindingDetail {
        code: "low_httponly_ratio",
        impact: "Most cookies are readable from JavaScript.",
        remediation: "Set HttpOnly on every cookie not read by client-side code.",
    },
    FindingDetail {
        code: "tracking_cookies",
        impact: "Third-party analytics and advertising cookies have privacy implications.",
        remediation: "Make sure tracking cookies are covered by your consent mechanism.",
    },
    // --- HTML ---
    FindingDetail {
        code: "insecure_password_form",
        impact: "Passwords typed into this form are sent without encryption.",
        remediation: "Serve the page over HTTPS and make every form with a password field submit to an https:// action.",
    },
    FindingDetail {
        code: "password_form_get",
        impact: "Passwords end up in URLs, browser history, proxy and server logs.",
        remediation: "Submit password forms with method=\"POST\".",
    },
    FindingDetail {
        code: "mixed_content_script",
        impact: "A network attacker can replace the script and take over the page.",
        remediation: "Load every script over https://.",
    },
    FindingDetail {
        code: "missing_charset",
        impact: "Without a declared charset, browsers may guess an encoding that enables XSS.",
        remediation: "Add <meta charset=\"utf-8\"> as the first element of <head>.",
    },
    FindingDetail {
        code: "insecure_form_action",
        impact: "Form data is submitted over plain HTTP.",
        remediation: "Point form actions at https:// URLs.",
    },
    FindingDetail {
        code: "mixed_content_iframe",
        impact: "Framed content loaded over HTTP can be replaced by a network attacker.",
        remediation: "Load iframes over https://.",
    },
    FindingDetail {
        code: "unsafe_target_blank",
        impact: "Pages opened with target=_blank can navigate the opener (reverse tabnabbing).",
        remediation: "Add rel=\"noopener noreferrer\" to links with target=\"_blank\".",
    },
    FindingDetail {
        code: "no_html_content",
        impact: "The response did not contain markup to inspect.",
        remediation: "",
    },
];

pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

/// Builds a finding with impact and remediation filled from the knowledge base.
pub fn finding(code: &str, severity: Severity, message: impl Into<String>) -> VulnerabilityFinding {
    let finding = VulnerabilityFinding::new(code, severity, message);
    match get_finding_detail(code) {
        Some(detail) => finding.with_impact(detail.impact).with_remediation(detail.remediation),
        None => finding,
    }
}

/// Finding for a header that is absent from the response.
pub fn missing_header_finding(spec: &HeaderSpec, severity: Severity) -> VulnerabilityFinding {
    VulnerabilityFinding::new(
        "missing_header",
        severity,
        format!("{} header is missing", spec.display_name),
    )
    .with_impact(spec.description)
    .with_remediation(spec.recommendation)
}

// --- Error Taxonomy ---

pub struct ErrorProfile {
    pub kind: ErrorKind,
    pub user_message: &'static str,
    pub suggestions: &'static [&'static str],
}

static ERROR_PROFILES: &[ErrorProfile] = &[
    ErrorProfile {
        kind: ErrorKind::DnsError,
        user_message: "The domain name could not be found.",
        suggestions: &["Check the URL spelling", "Make sure the domain is registered and has DNS records"],
    },
    ErrorProfile {
        kind: ErrorKind::ConnectionRefused,
        user_message: "The server refused the connection.",
        suggestions: &["Check that the site is online", "Verify the port in the URL"],
    },
    ErrorProfile {
        kind: ErrorKind::ConnectionReset,
        user_message: "The connection was interrupted by the server.",
        suggestions: &["Try again in a few minutes"],
    },
    ErrorProfile {
        kind: ErrorKind::Timeout,
        user_message: "The server took too long to respond.",
        suggestions: &["Try again in a few minutes", "Check that the site loads in a browser"],
    },
    ErrorProfile {
        kind: ErrorKind::SslError,
        user_message: "A secure connection to the server could not be established.",
        suggestions: &["Check the site's certificate in a browser", "Try the http:// version of the URL"],
    },
    ErrorProfile {
        kind: ErrorKind::HttpClientError,
        user_message: "The server rejected the request.",
        suggestions: &["Check the URL path", "The page may require authentication"],
    },
    ErrorProfile {
        kind: ErrorKind::HttpRateLimited,
        user_message: "The server is rate limiting requests.",
        suggestions: &["Try again in a few minutes"],
    },
    ErrorProfile {
        kind: ErrorKind::HttpServerError,
        user_message: "The server encountered an error.",
        suggestions: &["Try again in a few minutes"],
    },
    ErrorProfile {
        kind: ErrorKind::ValidationError,
        user_message: "The URL is not valid or cannot be analyzed.",
        suggestions: &["Check the URL spelling", "Only public http:// and https:// addresses can be analyzed"],
    },
    ErrorProfile {
        kind: ErrorKind::AnalysisError,
        user_message: "Part of the analysis could not be completed.",
        suggestions: &["Try again later"],
    },
    ErrorProfile {
        kind: ErrorKind::Unknown,
        user_message: "An unexpected error occurred.",
        suggestions: &["Try again later"],
    },
];

pub fn error_profile(kind: ErrorKind) -> &'static ErrorProfile {
    ERROR_PROFILES
        .iter()
        .find(|p| p.kind == kind)
        .unwrap_or(&ERROR_PROFILES[ERROR_PROFILES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_ten_headers_summing_to_100() {
        assert_eq!(HEADER_CATALOG.len(), 10);
        assert_eq!(total_header_weight(), 100);
        assert!(header_spec("content-security-policy").is_some());
        assert!(header_spec("x-unknown").is_none());
    }

    #[test]
    fn test_every_error_kind_has_a_profile() {
        for kind in [
            ErrorKind::DnsError,
            ErrorKind::ConnectionRefused,
            ErrorKind::ConnectionReset,
            ErrorKind::Timeout,
            ErrorKind::SslError,
            ErrorKind::HttpClientError,
            ErrorKind::HttpRateLimited,
            ErrorKind::HttpServerError,
            ErrorKind::ValidationError,
            ErrorKind::AnalysisError,
            ErrorKind::Unknown,
        ] {
            assert_eq!(error_profile(kind).kind, kind);
        }
    }

    #[test]
    fn test_finding_fills_remediation() {
        let f = finding("cookie_missing_secure", Severity::High, "Cookie 'a' lacks Secure");
        assert!(!f.remediation.is_empty());
        assert!(!f.impact.is_empty());

        let unknown = finding("made_up", Severity::Low, "x");
        assert!(unknown.remediation.is_empty());
    }

    #[test]
    fn test_optional_policy_substring_match() {
        let policy = OptionalHeaderPolicy::default();
        assert!(policy.is_optional("www.google.com", "expect-ct"));
        assert!(policy.is_optional("WWW.GITHUB.COM", "Pragma"));
        assert!(!policy.is_optional("www.google.com", "content-security-policy"));
        assert!(!policy.is_optional("example.com", "expect-ct"));
        assert!(!OptionalHeaderPolicy::empty().is_optional("google.com", "expect-ct"));
    }
}
