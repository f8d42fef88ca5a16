// src/core/validator.rs

use crate::core::errors::{CandidateError, ValidationFailure, ValidationReason};
use crate::core::models::{NormalizedUrl, UrlMetadata};
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::{Host, Url};

static DOMAIN_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap());

/// Common top-level domain typos and their corrections.
const TLD_TYPOS: &[(&str, &str)] = &[
    (".con", ".com"),
    (".cmo", ".com"),
    (".ocm", ".com"),
    (".comm", ".com"),
    (".nte", ".net"),
    (".ent", ".net"),
    (".ogr", ".org"),
    (".orgg", ".org"),
];

const SCHEME_TYPOS: &[(&str, &str)] = &[
    ("htp://", "http://"),
    ("htps://", "https://"),
    ("http//", "http://"),
    ("https//", "https://"),
    ("hxxp://", "http://"),
    ("hxxps://", "https://"),
];

/// Resolves a hostname to its addresses.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, String>;
}

/// Production resolver backed by the system DNS configuration.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    pub fn new() -> Self {
        Self { resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()) }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, String> {
        debug!(host, "Resolving host.");
        self.resolver
            .lookup_ip(host)
            .await
            .map(|lookup| lookup.iter().collect())
            .map_err(|e| format!("DNS Error: {}", e))
    }
}

/// Cleans raw input into a single public http(s) URL.
pub struct UrlValidator {
    resolver: Arc<dyn HostResolver>,
    dns_timeout: Duration,
}

impl UrlValidator {
    pub fn new(resolver: Arc<dyn HostResolver>, dns_timeout: Duration) -> Self {
        Self { resolver, dns_timeout }
    }

    /// Tries every candidate derived from `raw` in order and returns the first
    /// one that parses, uses http(s), has a public host and resolves.
    pub async fn validate(&self, raw: &str) -> Result<NormalizedUrl, ValidationFailure> {
        let input = raw.trim().to_lowercase();
        info!(input = %input, "Validating URL.");

        if input.is_empty() {
            return Err(ValidationFailure {
                errors: vec![CandidateError::new(raw, ValidationReason::Empty)],
                suggestions: vec!["Enter a domain such as example.com".to_string()],
            });
        }

        let mut errors = Vec::new();
        let mut dns_cache: HashMap<String, Result<Vec<IpAddr>, ValidationReason>> = HashMap::new();

        for candidate in candidates(&input) {
            match self.check_candidate(&candidate, &mut dns_cache).await {
                Ok((url, resolved_addresses)) => {
                    info!(url = %url, "URL validated.");
                    return Ok(normalize(url, raw.trim(), resolved_addresses));
                }
                Err(reason) => {
                    debug!(candidate = %candidate, reason = %reason, "Candidate rejected.");
                    errors.push(CandidateError::new(candidate, reason));
                }
            }
        }

        let suggestions = suggestions(&input, &errors);
        warn!(input = %input, candidates = errors.len(), "No URL candidate passed validation.");
        Err(ValidationFailure { errors, suggestions })
    }

    async fn check_candidate(
        &self,
        candidate: &str,
        dns_cache: &mut HashMap<String, Result<Vec<IpAddr>, ValidationReason>>,
    ) -> Result<(Url, Vec<IpAddr>), ValidationReason> {
        let url = Url::parse(candidate).map_err(|e| ValidationReason::InvalidFormat(e.to_string()))?;
        let resolved = self.check_parsed(&url, dns_cache).await?;
        Ok((url, resolved))
    }

    /// Applies the scheme, host and address rules to a URL reached after
    /// validation, such as a redirect target.
    pub async fn check_url(&self, url: &Url) -> Result<Vec<IpAddr>, ValidationReason> {
        self.check_parsed(url, &mut HashMap::new()).await
    }

    async fn check_parsed(
        &self,
        url: &Url,
        dns_cache: &mut HashMap<String, Result<Vec<IpAddr>, ValidationReason>>,
    ) -> Result<Vec<IpAddr>, ValidationReason> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ValidationReason::UnsupportedScheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(Host::Ipv4(ip)) => {
                let ip = IpAddr::V4(ip);
                reject_private(&ip, &ip.to_string())?;
                return Ok(vec![ip]);
            }
            Some(Host::Ipv6(ip)) => {
                let ip = IpAddr::V6(ip);
                reject_private(&ip, &ip.to_string())?;
                return Ok(vec![ip]);
            }
            Some(Host::Domain(domain)) => domain.to_string(),
            None => return Err(ValidationReason::InvalidHostname("missing host".to_string())),
        };

        if host == "localhost" || host.ends_with(".localhost") {
            return Err(ValidationReason::PrivateAddress(host));
        }
        if !is_valid_domain(&host) {
            return Err(ValidationReason::InvalidHostname(host));
        }

        match dns_cache.get(&host) {
            Some(cached) => cached.clone(),
            None => {
                let result = self.resolve(&host).await;
                dns_cache.insert(host, result.clone());
                result
            }
        }
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ValidationReason> {
        let addresses = match tokio::time::timeout(self.dns_timeout, self.resolver.resolve(host)).await {
            Err(_) => return Err(ValidationReason::DnsTimeout(host.to_string())),
            Ok(Err(reason)) => {
                return Err(ValidationReason::DnsResolutionFailed { host: host.to_string(), reason });
            }
            Ok(Ok(addresses)) => addresses,
        };

        if addresses.is_empty() {
            return Err(ValidationReason::DnsResolutionFailed {
                host: host.to_string(),
                reason: "no addresses returned".to_string(),
            });
        }
        for address in &addresses {
            reject_private(address, &format!("{host} resolves to {address}"))?;
        }
        Ok(addresses)
    }
}

fn reject_private(ip: &IpAddr, label: &str) -> Result<(), ValidationReason> {
    if is_private_ip(ip) {
        Err(ValidationReason::PrivateAddress(label.to_string()))
    } else {
        Ok(())
    }
}

/// Ordered URL candidates, HTTPS first.
pub fn candidates(input: &str) -> Vec<String> {
    if let Some(rest) = input.strip_prefix("https://") {
        return vec![format!("https://{rest}")];
    }
    if let Some(rest) = input.strip_prefix("http://") {
        return vec![format!("https://{rest}"), format!("http://{rest}")];
    }
    if input.contains("://") {
        return vec![input.to_string()];
    }

    let host_part = input.split(['/', '?', '#']).next().unwrap_or(input);
    let host_only = host_part.split(':').next().unwrap_or(host_part);
    let bare_ip = host_only.parse::<IpAddr>().is_ok() || host_part.starts_with('[');

    let mut list = vec![format!("https://{input}"), format!("http://{input}")];
    if !bare_ip && !host_only.starts_with("www.") && host_only.contains('.') {
        list.push(format!("https://www.{input}"));
        list.push(format!("http://www.{input}"));
    }
    list
}

/// RFC 1123 hostname shape: dot-separated labels of at most 63 characters,
/// at least two labels, non-numeric top-level label.
pub fn is_valid_domain(host: &str) -> bool {
    let host = host.trim_end_matches('.');
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let shapes_ok = labels.iter().all(|label| label.len() <= 63 && DOMAIN_LABEL.is_match(label));
    let tld_ok = labels
        .last()
        .map(|tld| !tld.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    shapes_ok && tld_ok
}

/// Loopback, private, link-local, unspecified and similar non-public ranges.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || octets[0] == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // 198.18.0.0/15 benchmarking
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
}

fn is_private_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(&v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

fn normalize(url: Url, original_input: &str, resolved_addresses: Vec<IpAddr>) -> NormalizedUrl {
    let host = url.host_str().unwrap_or_default().to_string();
    let is_ip = matches!(url.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)));
    let path_and_query = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    NormalizedUrl {
        href: url.to_string(),
        scheme: url.scheme().to_string(),
        port: url.port_or_known_default().unwrap_or(80),
        is_https: url.scheme() == "https",
        path_and_query,
        metadata: UrlMetadata {
            original_input: original_input.to_string(),
            has_www: host.starts_with("www."),
            is_ip,
            resolved_addresses,
        },
        host,
    }
}

/// Typo corrections and hints for input that failed validation.
pub fn suggestions(input: &str, errors: &[CandidateError]) -> Vec<String> {
    let mut suggestions = Vec::new();

    for (typo, fix) in SCHEME_TYPOS {
        if let Some(rest) = input.strip_prefix(typo) {
            suggestions.push(format!("Did you mean {fix}{rest}?"));
        }
    }

    let without_scheme = input.split_once("://").map(|(_, rest)| rest).unwrap_or(input);
    let host = without_scheme.split(['/', '?', '#', ':']).next().unwrap_or(without_scheme);

    for (typo, fix) in TLD_TYPOS {
        if let Some(stem) = host.strip_suffix(typo) {
            suggestions.push(format!("Did you mean {stem}{fix}?"));
        }
    }

    if input.contains(char::is_whitespace) {
        suggestions.push("Remove spaces from the URL".to_string());
    }

    let dns_failed = errors.iter().any(|e| {
        matches!(e.reason, ValidationReason::DnsResolutionFailed { .. } | ValidationReason::DnsTimeout(_))
    });
    if dns_failed && !host.starts_with("www.") && host.contains('.') {
        suggestions.push(format!("Try www.{host}"));
    }
    if dns_failed {
        suggestions.push("Check the URL spelling".to_string());
    }

    if errors.iter().any(|e| matches!(e.reason, ValidationReason::PrivateAddress(_))) {
        suggestions.push("Only publicly reachable addresses can be analyzed".to_string());
    }

    suggestions.dedup();
    suggestions
}
