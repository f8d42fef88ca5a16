// src/core/certificate.rs

use crate::core::models::{CertificateInfo, ChainLink};
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use tracing::{debug, warn};
use x509_parser::prelude::*;

/// Signature algorithm OIDs mapped to (name, digest).
static SIGNATURE_ALGORITHMS: &[(&str, &str, Option<&str>)] = &[
    ("1.2.840.113549.1.1.4", "md5WithRSAEncryption", Some("md5")),
    ("1.2.840.113549.1.1.5", "sha1WithRSAEncryption", Some("sha1")),
    ("1.2.840.113549.1.1.14", "sha224WithRSAEncryption", Some("sha224")),
    ("1.2.840.113549.1.1.11", "sha256WithRSAEncryption", Some("sha256")),
    ("1.2.840.113549.1.1.12", "sha384WithRSAEncryption", Some("sha384")),
    ("1.2.840.113549.1.1.13", "sha512WithRSAEncryption", Some("sha512")),
    ("1.2.840.113549.1.1.10", "RSASSA-PSS", None),
    ("1.2.840.10045.4.1", "ecdsa-with-SHA1", Some("sha1")),
    ("1.2.840.10045.4.3.1", "ecdsa-with-SHA224", Some("sha224")),
    ("1.2.840.10045.4.3.2", "ecdsa-with-SHA256", Some("sha256")),
    ("1.2.840.10045.4.3.3", "ecdsa-with-SHA384", Some("sha384")),
    ("1.2.840.10045.4.3.4", "ecdsa-with-SHA512", Some("sha512")),
    ("1.2.840.10040.4.3", "dsa-with-sha1", Some("sha1")),
    ("2.16.840.1.101.3.4.3.2", "dsa-with-sha256", Some("sha256")),
    ("1.3.101.112", "Ed25519", Some("sha512")),
    ("1.3.101.113", "Ed448", None),
];

static KEY_ALGORITHMS: &[(&str, &str)] = &[
    ("1.2.840.113549.1.1.1", "RSA"),
    ("1.2.840.113549.1.1.10", "RSA"),
    ("1.2.840.10045.2.1", "ECDSA"),
    ("1.2.840.10040.4.1", "DSA"),
    ("1.2.840.10046.2.1", "DH"),
    ("1.3.101.112", "Ed25519"),
    ("1.3.101.113", "Ed448"),
];

const STRONG_HASHES: &[&str] = &["sha256", "sha384", "sha512"];

pub fn describe_signature(oid: &str) -> (String, Option<String>) {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(id, _, _)| *id == oid)
        .map(|(_, name, hash)| (name.to_string(), hash.map(String::from)))
        .unwrap_or_else(|| (oid.to_string(), None))
}

pub fn describe_key_algorithm(oid: &str) -> String {
    KEY_ALGORITHMS
        .iter()
        .find(|(id, _)| *id == oid)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| oid.to_string())
}

/// A signature is weak when its digest is known and is not SHA-256/384/512.
pub fn is_weak_signature(cert: &CertificateInfo) -> bool {
    match cert.signature_hash.as_deref() {
        Some(hash) => !STRONG_HASHES.contains(&hash),
        None => false,
    }
}

/// Algorithm-specific minimum key size in bits.
pub fn minimum_key_size(key_algorithm: &str) -> Option<usize> {
    match key_algorithm {
        "RSA" | "DSA" | "DH" => Some(2048),
        "ECDSA" => Some(256),
        _ => None,
    }
}

pub fn is_weak_key(cert: &CertificateInfo) -> bool {
    match minimum_key_size(&cert.key_algorithm) {
        Some(minimum) => cert.key_size > 0 && cert.key_size < minimum,
        None => false,
    }
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Parses a DER-encoded X.509 certificate into the fields the analyzer grades.
pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, String> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| format!("X.509 Parse Error: {}", e))?;

    let validity = x509.validity();
    let (signature_algorithm, signature_hash) =
        describe_signature(&x509.signature_algorithm.algorithm.to_id_string());
    let key_algorithm = describe_key_algorithm(&x509.public_key().algorithm.algorithm.to_id_string());
    let key_size = x509.public_key().parsed().map(|key| key.key_size()).unwrap_or(0);

    let subject_alt_names = x509
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_lowercase()),
                    GeneralName::IPAddress(bytes) => san_ip(bytes).map(|ip| ip.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let common_name = x509
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let subject_name = x509.subject().to_string();
    let issuer_name = x509.issuer().to_string();
    debug!(subject = %subject_name, issuer = %issuer_name, "Parsed certificate.");

    Ok(CertificateInfo {
        is_self_signed: subject_name == issuer_name,
        subject_name,
        issuer_name,
        common_name,
        subject_alt_names,
        serial_number: x509.raw_serial_as_string(),
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
        signature_algorithm,
        signature_hash,
        key_algorithm,
        key_size,
        is_ca: x509.is_ca(),
    })
}

/// Parses every certificate the peer sent, skipping blobs that fail to parse.
pub fn parse_chain(ders: &[Vec<u8>]) -> Vec<CertificateInfo> {
    ders.iter()
        .filter_map(|der| match parse_certificate(der) {
            Ok(cert) => Some(cert),
            Err(e) => {
                warn!(error = %e, "Skipping unparseable certificate in peer chain.");
                None
            }
        })
        .collect()
}

/// Result of walking a certificate chain from the leaf towards its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainWalk {
    pub links: Vec<ChainLink>,
    /// The walk ended on a self-signed certificate.
    pub reached_root: bool,
    /// The walk stopped because `max_depth` was hit.
    pub truncated: bool,
}

impl ChainWalk {
    /// A chain is complete when it reaches a root or the server supplied at
    /// least one intermediate for a leaf that is not self-issued.
    pub fn is_complete(&self) -> bool {
        self.reached_root || self.links.len() >= 2
    }
}

/// Walks `certs` (leaf first, in any order after that) from issuer to issuer.
///
/// Each certificate is visited at most once and the walk is bounded by
/// `max_depth`, so chains whose issuer pointers form a cycle terminate.
pub fn walk_chain(certs: &[CertificateInfo], max_depth: usize) -> ChainWalk {
    let mut walk = ChainWalk { links: Vec::new(), reached_root: false, truncated: false };
    let Some(leaf) = certs.first() else {
        return walk;
    };

    let mut visited = vec![false; certs.len()];
    visited[0] = true;
    let mut current = leaf;

    loop {
        walk.links.push(ChainLink {
            subject: current.subject_name.clone(),
            issuer: current.issuer_name.clone(),
            is_self_signed: current.is_self_signed,
        });

        if current.issuer_name == current.subject_name {
            walk.reached_root = true;
            break;
        }
        if walk.links.len() >= max_depth {
            walk.truncated = true;
            break;
        }

        let next = certs
            .iter()
            .enumerate()
            .find(|(index, candidate)| !visited[*index] && candidate.subject_name == current.issuer_name);

        match next {
            Some((index, issuer)) => {
                visited[index] = true;
                current = issuer;
            }
            None => break,
        }
    }

    walk
}

/// Checks the hostname against the SAN DNS names, falling back to the CN.
pub fn hostname_matches(cert: &CertificateInfo, host: &str) -> bool {
    // IP targets only match iPAddress SANs, never the CN or a wildcard.
    if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return cert.subject_alt_names.iter().any(|name| name.parse::<IpAddr>().is_ok_and(|san| san == ip));
    }
    let host = host.trim_end_matches('.').to_lowercase();
    let names: Vec<String> = if cert.subject_alt_names.is_empty() {
        cert.common_name.iter().map(|cn| cn.to_lowercase()).collect()
    } else {
        cert.subject_alt_names.clone()
    };
    names.iter().any(|pattern| name_matches(pattern, &host))
}

fn san_ip(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

fn name_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        // A wildcard covers exactly one label.
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        },
        None => pattern == host,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn cert(subject: &str, issuer: &str) -> CertificateInfo {
        let now = Utc::now();
        CertificateInfo {
            subject_name: subject.to_string(),
            issuer_name: issuer.to_string(),
            common_name: None,
            subject_alt_names: Vec::new(),
            serial_number: "01".to_string(),
            not_before: now - Duration::days(30),
            not_after: now + Duration::days(200),
            signature_algorithm: "sha256WithRSAEncryption".to_string(),
            signature_hash: Some("sha256".to_string()),
            key_algorithm: "RSA".to_string(),
            key_size: 2048,
            is_self_signed: subject == issuer,
            is_ca: false,
        }
    }

    #[test]
    fn test_walk_reaches_root() {
        let chain = vec![
            cert("CN=example.com", "CN=Intermediate"),
            cert("CN=Root", "CN=Root"),
            cert("CN=Intermediate", "CN=Root"),
        ];
        let walk = walk_chain(&chain, 10);
        assert!(walk.reached_root);
        assert!(!walk.truncated);
        assert_eq!(walk.links.len(), 3);
        assert_eq!(walk.links[1].subject, "CN=Intermediate");
        assert!(walk.is_complete());
    }

    #[test]
    fn test_walk_leaf_only_is_incomplete() {
        let walk = walk_chain(&[cert("CN=example.com", "CN=Intermediate")], 10);
        assert_eq!(walk.links.len(), 1);
        assert!(!walk.reached_root);
        assert!(!walk.is_complete());
    }

    #[test]
    fn test_walk_terminates_on_cycle() {
        let chain = vec![cert("CN=A", "CN=B"), cert("CN=B", "CN=A")];
        let walk = walk_chain(&chain, 10);
        assert_eq!(walk.links.len(), 2);
        assert!(!walk.reached_root);
    }

    #[test]
    fn test_walk_respects_max_depth() {
        let chain = vec![cert("CN=1", "CN=2"), cert("CN=2", "CN=3"), cert("CN=3", "CN=4")];
        let walk = walk_chain(&chain, 2);
        assert_eq!(walk.links.len(), 2);
        assert!(walk.truncated);
    }

    #[test]
    fn test_walk_empty() {
        let walk = walk_chain(&[], 10);
        assert!(walk.links.is_empty());
        assert!(!walk.is_complete());
    }

    #[test]
    fn test_signature_strength() {
        let mut c = cert("CN=a", "CN=b");
        assert!(!is_weak_signature(&c));
        c.signature_hash = Some("sha1".into());
        assert!(is_weak_signature(&c));
        c.signature_hash = None;
        assert!(!is_weak_signature(&c));

        assert_eq!(describe_signature("1.2.840.113549.1.1.5").1.as_deref(), Some("sha1"));
        assert_eq!(describe_signature("1.2.840.10045.4.3.3").0, "ecdsa-with-SHA384");
        assert_eq!(describe_signature("9.9.9").0, "9.9.9");
    }

    #[test]
    fn test_key_size_minimums() {
        let mut c = cert("CN=a", "CN=b");
        c.key_size = 1024;
        assert!(is_weak_key(&c));
        c.key_algorithm = "ECDSA".into();
        c.key_size = 256;
        assert!(!is_weak_key(&c));
        c.key_size = 192;
        assert!(is_weak_key(&c));
        c.key_algorithm = "Ed25519".into();
        assert!(!is_weak_key(&c));
    }

    #[test]
    fn test_hostname_matching() {
        let mut c = cert("CN=example.com", "CN=CA");
        c.subject_alt_names = vec!["example.com".into(), "*.example.com".into()];
        assert!(hostname_matches(&c, "example.com"));
        assert!(hostname_matches(&c, "www.example.com"));
        assert!(hostname_matches(&c, "WWW.Example.com."));
        assert!(!hostname_matches(&c, "a.b.example.com"));
        assert!(!hostname_matches(&c, "example.org"));

        let mut cn_only = cert("CN=legacy.example", "CN=CA");
        cn_only.common_name = Some("legacy.example".into());
        assert!(hostname_matches(&cn_only, "legacy.example"));
    }

    #[test]
    fn test_ip_targets_match_ip_sans() {
        let mut c = cert("CN=203.0.113.7", "CN=CA");
        c.common_name = Some("203.0.113.7".into());
        c.subject_alt_names = vec!["api.example.com".into(), "203.0.113.7".into(), "2001:db8::1".into()];
        assert!(hostname_matches(&c, "203.0.113.7"));
        assert!(hostname_matches(&c, "2001:db8::1"));
        assert!(hostname_matches(&c, "[2001:0db8:0:0::1]"));
        assert!(!hostname_matches(&c, "203.0.113.8"));

        let mut cn_only = cert("CN=198.51.100.1", "CN=CA");
        cn_only.common_name = Some("198.51.100.1".into());
        assert!(!hostname_matches(&cn_only, "198.51.100.1"));

        assert_eq!(san_ip(&[192, 0, 2, 1]), Some("192.0.2.1".parse().unwrap()));
        assert_eq!(san_ip(&[1, 2, 3]), None);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_certificate(b"not a certificate").is_err());
        assert!(parse_chain(&[b"junk".to_vec()]).is_empty());
    }
}
