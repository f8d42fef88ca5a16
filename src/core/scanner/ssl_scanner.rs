// src/core/scanner/ssl_scanner.rs

use tracing::{debug, error, info, warn};

use crate::config::{Timeouts, TlsScoring};
use crate::core::certificate::{
    hostname_matches, is_weak_key, is_weak_signature, parse_certificate, parse_chain, walk_chain,
};
use crate::core::errors::{classify_io, classify_message, AnalysisFailure, ClassifiedError, ErrorKind};
use crate::core::knowledge_base::finding;
use crate::core::models::{
    Category, CategoryAnalysis, CategoryDetails, CertificateInfo, Grade, InspectionMode, Severity, SslDetails,
    TlsSession, VulnerabilityFinding,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector as NativeTlsConnector;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, ProtocolVersion, RootCertStore, SignatureScheme};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

// --- Inspection Seam ---

/// What a full handshake revealed about the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHandshake {
    pub protocol: Option<String>,
    pub cipher: Option<String>,
    /// Whether the chain validates against the public web PKI for this host.
    pub authorized: bool,
    pub authorization_error: Option<String>,
    /// Leaf first, as sent by the server.
    pub chain: Vec<CertificateInfo>,
}

/// Coarse result of the fallback probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub authorized: bool,
    pub authorization_error: Option<String>,
    pub status_line: Option<String>,
    pub certificate: Option<CertificateInfo>,
}

#[async_trait]
pub trait TlsInspector: Send + Sync {
    /// Dedicated handshake reporting protocol, cipher and the full chain.
    async fn handshake(&self, host: &str, port: u16) -> Result<TlsHandshake, ClassifiedError>;

    /// Lightweight secure request used when the handshake fails.
    async fn probe(&self, host: &str, port: u16) -> Result<ProbeOutcome, ClassifiedError>;
}

// --- Live Inspector ---

/// Accepts every certificate so the handshake completes, while recording what
/// the web PKI verifier would have decided.
#[derive(Debug)]
struct RecordingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    verdict: Mutex<Option<Result<(), String>>>,
}

impl RecordingVerifier {
    fn new(provider: Arc<CryptoProvider>) -> Result<Self, ClassifiedError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|e| ClassifiedError::new(ErrorKind::SslError, format!("Verifier setup failed: {}", e)))?;
        Ok(Self { inner, verdict: Mutex::new(None) })
    }

    fn verdict(&self) -> Result<(), String> {
        match self.verdict.lock() {
            Ok(slot) => slot.clone().unwrap_or_else(|| Err("certificate was never presented".to_string())),
            Err(_) => Err("verifier state unavailable".to_string()),
        }
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verdict = self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            .map(|_| ())
            .map_err(|e| e.to_string());
        debug!(authorized = verdict.is_ok(), "Recorded certificate verdict.");
        if let Ok(mut slot) = self.verdict.lock() {
            *slot = Some(verdict);
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Production inspector: tokio-rustls for the handshake, blocking native-tls
/// for the fallback probe.
pub struct LiveTlsInspector {
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl LiveTlsInspector {
    pub fn new(timeouts: &Timeouts) -> Self {
        Self { connect_timeout: timeouts.connect(), handshake_timeout: timeouts.tls_handshake() }
    }
}

#[async_trait]
impl TlsInspector for LiveTlsInspector {
    async fn handshake(&self, host: &str, port: u16) -> Result<TlsHandshake, ClassifiedError> {
        debug!(target = host, port, "Performing TLS handshake.");
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = Arc::new(RecordingVerifier::new(provider.clone())?);
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ClassifiedError::new(ErrorKind::SslError, e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ClassifiedError::new(ErrorKind::ValidationError, format!("Invalid server name: {}", e)))?;

        let tcp = timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClassifiedError::new(ErrorKind::Timeout, "TCP connect timed out"))?
            .map_err(|e| classify_io(&e))?;

        let stream = timeout(self.handshake_timeout, TlsConnector::from(Arc::new(config)).connect(server_name, tcp))
            .await
            .map_err(|_| ClassifiedError::new(ErrorKind::Timeout, "TLS handshake timed out"))?
            .map_err(|e| {
                let classified = classify_io(&e);
                if classified.kind == ErrorKind::Unknown {
                    ClassifiedError::new(ErrorKind::SslError, e.to_string())
                } else {
                    classified
                }
            })?;

        let (_, connection) = stream.get_ref();
        let protocol = connection.protocol_version().map(protocol_name);
        let cipher = connection.negotiated_cipher_suite().map(|suite| format!("{:?}", suite.suite()));
        let ders: Vec<Vec<u8>> = connection
            .peer_certificates()
            .map(|certs| certs.iter().map(|cert| cert.as_ref().to_vec()).collect())
            .unwrap_or_default();
        let chain = parse_chain(&ders);

        let verdict = verifier.verdict();
        info!(
            target = host,
            protocol = protocol.as_deref().unwrap_or("unknown"),
            cipher = cipher.as_deref().unwrap_or("unknown"),
            authorized = verdict.is_ok(),
            certificates = chain.len(),
            "TLS handshake completed."
        );

        Ok(TlsHandshake {
            protocol,
            cipher,
            authorized: verdict.is_ok(),
            authorization_error: verdict.err(),
            chain,
        })
    }

    async fn probe(&self, host: &str, port: u16) -> Result<ProbeOutcome, ClassifiedError> {
        let target_owned = host.to_string();
        let io_timeout = self.handshake_timeout;

        debug!("Spawning blocking task for TLS probe.");
        spawn_blocking(move || perform_tls_probe(&target_owned, port, io_timeout))
            .await
            .unwrap_or_else(|e| {
                error!(panic = %e, "Blocking TLS probe task panicked!");
                Err(ClassifiedError::new(ErrorKind::AnalysisError, format!("Task panicked: {}", e)))
            })
    }
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::SSLv2 => "SSLv2".to_string(),
        ProtocolVersion::SSLv3 => "SSLv3".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        other => format!("{:?}", other),
    }
}

/// Validating connect first; on a certificate error, reconnect without
/// validation and report the certificate as unauthorized.
fn perform_tls_probe(target: &str, port: u16, io_timeout: Duration) -> Result<ProbeOutcome, ClassifiedError> {
    match probe_once(target, port, io_timeout, true) {
        Ok(outcome) => Ok(outcome),
        Err(err) if err.kind == ErrorKind::SslError => {
            debug!(error = %err, "Validating probe failed, retrying without validation.");
            let mut outcome = probe_once(target, port, io_timeout, false)?;
            outcome.authorized = false;
            outcome.authorization_error = Some(err.technical_message);
            Ok(outcome)
        }
        Err(err) => Err(err),
    }
}

fn probe_once(target: &str, port: u16, io_timeout: Duration, validate: bool) -> Result<ProbeOutcome, ClassifiedError> {
    let connector = NativeTlsConnector::builder()
        .danger_accept_invalid_certs(!validate)
        .danger_accept_invalid_hostnames(!validate)
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to create TlsConnector");
            ClassifiedError::new(ErrorKind::SslError, format!("TlsConnector Error: {}", e))
        })?;

    let address = (target, port)
        .to_socket_addrs()
        .map_err(|e| ClassifiedError::new(ErrorKind::DnsError, format!("DNS Error: {}", e)))?
        .next()
        .ok_or_else(|| ClassifiedError::new(ErrorKind::DnsError, format!("No address for {}", target)))?;

    debug!(target, port, "Connecting TCP stream for probe.");
    let stream = StdTcpStream::connect_timeout(&address, io_timeout).map_err(|e| {
        error!(error = %e, "TCP connection failed");
        classify_io(&e)
    })?;
    stream.set_read_timeout(Some(io_timeout)).map_err(|e| classify_io(&e))?;
    stream.set_write_timeout(Some(io_timeout)).map_err(|e| classify_io(&e))?;

    let mut stream = connector.connect(target, stream).map_err(|e| {
        let message = format!("TLS Handshake Error: {}", e);
        let classified = classify_message(&message);
        if classified.kind == ErrorKind::Unknown {
            ClassifiedError::new(ErrorKind::SslError, message)
        } else {
            classified
        }
    })?;

    let certificate = match stream.peer_certificate() {
        Ok(Some(cert)) => cert.to_der().ok().and_then(|der| parse_certificate(&der).ok()),
        Ok(None) => {
            debug!("TLS connection successful, but no peer certificate provided.");
            None
        }
        Err(e) => {
            warn!(error = %e, "Could not get peer certificate");
            None
        }
    };

    let request = format!("HEAD / HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n", target);
    let status_line = match stream.write_all(request.as_bytes()) {
        Ok(()) => {
            let mut line = String::new();
            BufReader::new(&mut stream)
                .read_line(&mut line)
                .ok()
                .filter(|read| *read > 0)
                .map(|_| line.trim().to_string())
        }
        Err(e) => {
            debug!(error = %e, "Probe request could not be written.");
            None
        }
    };

    Ok(ProbeOutcome { authorized: validate, authorization_error: None, status_line, certificate })
}

// --- Grading ---

fn normalize_protocol(protocol: &str) -> String {
    protocol
        .to_ascii_lowercase()
        .replace(['v', ' ', '_'], "")
}

/// Letter grade of the negotiated protocol version.
pub fn protocol_grade(protocol: &str) -> Grade {
    match normalize_protocol(protocol).as_str() {
        "tls1.3" | "tls13" => Grade::APlus,
        "tls1.2" | "tls12" => Grade::A,
        "tls1.1" | "tls11" => Grade::B,
        _ => Grade::F,
    }
}

/// Symmetric key strength implied by a cipher suite name.
pub fn cipher_bits(cipher: &str) -> Option<u16> {
    let name = cipher.to_ascii_uppercase().replace('-', "_");
    let table: &[(&str, u16)] = &[
        ("NULL", 0),
        ("EXPORT", 40),
        ("_40_", 40),
        ("CHACHA20", 256),
        ("AES_256", 256),
        ("AES256", 256),
        ("CAMELLIA_256", 256),
        ("AES_128", 128),
        ("AES128", 128),
        ("CAMELLIA_128", 128),
        ("3DES", 112),
        ("DES_CBC3", 112),
        ("RC4", 128),
        ("DES", 56),
    ];
    table.iter().find(|(needle, _)| name.contains(needle)).map(|(_, bits)| *bits)
}

/// Name of a broken algorithm present in the cipher suite, if any.
pub fn weak_cipher_algorithm(cipher: &str) -> Option<&'static str> {
    let name = cipher.to_ascii_uppercase().replace('-', "_");
    let table: &[(&str, &str)] = &[
        ("RC4", "RC4"),
        ("3DES", "3DES"),
        ("DES_CBC3", "3DES"),
        ("DES", "DES"),
        ("MD5", "MD5"),
        ("NULL", "NULL"),
        ("EXPORT", "EXPORT"),
    ];
    table.iter().find(|(needle, _)| name.contains(needle)).map(|(_, label)| *label)
}

/// Collects findings and the running penalty for one SSL evaluation.
struct SslGrader<'a> {
    scoring: &'a TlsScoring,
    findings: Vec<VulnerabilityFinding>,
    penalty: i32,
}

impl<'a> SslGrader<'a> {
    fn new(scoring: &'a TlsScoring) -> Self {
        Self { scoring, findings: Vec::new(), penalty: 0 }
    }

    fn push(&mut self, code: &str, severity: Severity, message: impl Into<String>) {
        debug!(code, severity = %severity, "SSL finding.");
        self.penalty += self.scoring.penalties.for_severity(severity);
        self.findings.push(finding(code, severity, message));
    }

    /// Expiry, validity window, signature, key size, self-signing and host
    /// coverage. Returns the days until expiry.
    fn check_certificate(&mut self, cert: &CertificateInfo, host: &str, now: DateTime<Utc>) -> i64 {
        let days_until_expiry = cert.not_after.signed_duration_since(now).num_days();

        if now > cert.not_after {
            self.push(
                "certificate_expired",
                Severity::Critical,
                format!("Certificate expired on {}", cert.not_after.format("%Y-%m-%d")),
            );
        } else if days_until_expiry <= self.scoring.expiry_warning_days {
            self.push(
                "certificate_expiring",
                Severity::Warning,
                format!("Certificate expires in {} days", days_until_expiry),
            );
        }

        if now < cert.not_before {
            self.push(
                "certificate_not_yet_valid",
                Severity::High,
                format!("Certificate is not valid before {}", cert.not_before.format("%Y-%m-%d")),
            );
        }

        if is_weak_signature(cert) {
            self.push(
                "weak_signature_algorithm",
                Severity::High,
                format!("Certificate is signed with {}", cert.signature_algorithm),
            );
        }

        if is_weak_key(cert) {
            self.push(
                "weak_key_size",
                Severity::High,
                format!("{} key of {} bits is below the recommended minimum", cert.key_algorithm, cert.key_size),
            );
        }

        if cert.is_self_signed {
            self.push("self_signed_certificate", Severity::High, "Certificate is self-signed");
        }

        if !hostname_matches(cert, host) {
            self.push(
                "hostname_mismatch",
                Severity::High,
                format!("Certificate does not cover the hostname {}", host),
            );
        }

        days_until_expiry
    }

    fn finish(self, base: i32, bonus: i32, details: SslDetails) -> CategoryAnalysis {
        let raw = base - self.penalty + bonus;
        debug!(base, penalty = self.penalty, bonus, raw, "SSL score computed.");
        CategoryAnalysis::new(Category::Ssl, f64::from(raw), self.findings, CategoryDetails::Ssl(details))
    }
}

/// Grades the result of a full handshake.
pub fn grade_handshake(
    handshake: &TlsHandshake,
    host: &str,
    scoring: &TlsScoring,
    now: DateTime<Utc>,
) -> CategoryAnalysis {
    let mut grader = SslGrader::new(scoring);
    let base = if handshake.authorized { scoring.base_authorized } else { scoring.base_unauthorized };
    let mut bonus = 0;

    if !handshake.authorized {
        grader.push(
            "certificate_untrusted",
            Severity::Warning,
            format!(
                "Certificate is not trusted: {}",
                handshake.authorization_error.as_deref().unwrap_or("unknown reason")
            ),
        );
    }

    let graded_protocol = handshake.protocol.as_deref().map(protocol_grade);
    if let (Some(protocol), Some(grade)) = (handshake.protocol.as_deref(), graded_protocol) {
        match grade {
            Grade::APlus => bonus += scoring.tls13_bonus,
            Grade::A => {}
            Grade::B => grader.push(
                "deprecated_protocol",
                Severity::Medium,
                format!("{} is deprecated", protocol),
            ),
            _ => grader.push(
                "insecure_protocol",
                Severity::Critical,
                format!("{} is insecure and must be disabled", protocol),
            ),
        }
    }

    let bits = handshake.cipher.as_deref().and_then(cipher_bits);
    if let Some(cipher) = handshake.cipher.as_deref() {
        match bits {
            Some(b) if b < 128 => grader.push(
                "weak_cipher_strength",
                Severity::Critical,
                format!("Cipher {} provides only {} bits", cipher, b),
            ),
            Some(b) if b >= scoring.strong_cipher_bits => bonus += scoring.strong_cipher_bonus,
            _ => {}
        }
        if let Some(algorithm) = weak_cipher_algorithm(cipher) {
            grader.push(
                "weak_cipher_algorithm",
                Severity::High,
                format!("Cipher {} uses {}", cipher, algorithm),
            );
        }
    }

    let walk = walk_chain(&handshake.chain, scoring.max_chain_depth);
    let leaf = handshake.chain.first();
    let days_until_expiry = match leaf {
        Some(cert) => {
            let days = grader.check_certificate(cert, host, now);
            if !walk.is_complete() {
                grader.push(
                    "incomplete_chain",
                    Severity::Medium,
                    format!("Server sent no intermediate certificate for issuer {}", cert.issuer_name),
                );
            }
            Some(days)
        }
        None => {
            grader.push("no_certificate", Severity::High, "Server presented no certificate");
            None
        }
    };

    let details = SslDetails {
        is_secure: true,
        inspection: InspectionMode::Full,
        authorized: handshake.authorized,
        authorization_error: handshake.authorization_error.clone(),
        protocol: handshake.protocol.clone(),
        protocol_grade: graded_protocol,
        cipher: handshake.cipher.clone(),
        cipher_bits: bits,
        certificate: leaf.cloned(),
        days_until_expiry,
        chain_complete: walk.is_complete(),
        chain: walk.links,
    };

    grader.finish(base, bonus, details)
}

/// True when a handshake error says the server offers neither TLS 1.2 nor
/// TLS 1.3, which the rustls handshake cannot negotiate below.
pub fn refused_modern_protocols(err: &ClassifiedError) -> bool {
    let message = err.technical_message.to_ascii_lowercase();
    ["protocolversion", "protocol version", "doesnotsupporttls12or13", "unsupported protocol"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Grades the lower-confidence fallback probe. No bonuses apply.
///
/// `legacy_only` marks a server whose handshake was refused for TLS 1.2 and
/// 1.3 but which still answered the native-tls connection.
pub fn grade_probe(
    outcome: &ProbeOutcome,
    host: &str,
    scoring: &TlsScoring,
    now: DateTime<Utc>,
    legacy_only: bool,
) -> CategoryAnalysis {
    let mut grader = SslGrader::new(scoring);
    let base = if outcome.authorized { scoring.fallback_base_authorized } else { scoring.fallback_base_unauthorized };

    grader.push(
        "limited_inspection",
        Severity::Info,
        "Full TLS handshake failed; only a basic probe could be performed",
    );
    if legacy_only {
        grader.push(
            "insecure_protocol",
            Severity::Critical,
            "Server refused TLS 1.2 and TLS 1.3; only legacy protocol versions are offered",
        );
    }
    if !outcome.authorized {
        grader.push(
            "certificate_untrusted",
            Severity::Warning,
            format!(
                "Certificate is not trusted: {}",
                outcome.authorization_error.as_deref().unwrap_or("unknown reason")
            ),
        );
    }

    let days_until_expiry = outcome.certificate.as_ref().map(|cert| grader.check_certificate(cert, host, now));

    let details = SslDetails {
        is_secure: true,
        inspection: InspectionMode::Fallback,
        authorized: outcome.authorized,
        authorization_error: outcome.authorization_error.clone(),
        certificate: outcome.certificate.clone(),
        days_until_expiry,
        protocol_grade: legacy_only.then_some(Grade::F),
        ..SslDetails::insecure()
    };

    grader.finish(base, 0, details)
}

/// Result for a plain-HTTP target: zero score and one recommendation.
pub fn not_https_analysis() -> CategoryAnalysis {
    let finding = finding("not_https", Severity::High, "The site is not served over HTTPS");
    CategoryAnalysis::new(Category::Ssl, 0.0, vec![finding], CategoryDetails::Ssl(SslDetails::insecure()))
}

// --- Entry Point ---

/// Handshake first, then the probe, then the certificate captured during the
/// page fetch. Fails only when none of them yields anything to grade.
pub async fn run_ssl_scan(
    inspector: &dyn TlsInspector,
    host: &str,
    port: u16,
    is_https: bool,
    fetched: Option<&TlsSession>,
    scoring: &TlsScoring,
    now: DateTime<Utc>,
) -> Result<CategoryAnalysis, AnalysisFailure> {
    info!(target = host, port, "Starting SSL/TLS scan.");

    if !is_https {
        info!(target = host, "Target is not HTTPS, skipping TLS inspection.");
        return Ok(not_https_analysis());
    }

    let primary = match inspector.handshake(host, port).await {
        Ok(handshake) => {
            let analysis = grade_handshake(&handshake, host, scoring, now);
            info!(score = analysis.score, findings = analysis.findings.len(), "SSL/TLS scan finished.");
            return Ok(analysis);
        }
        Err(e) => e,
    };

    warn!(target = host, error = %primary, "TLS handshake failed, falling back to probe.");
    let legacy_only = refused_modern_protocols(&primary);
    let fallback = match inspector.probe(host, port).await {
        Ok(outcome) => {
            if legacy_only {
                warn!(target = host, "Server only offers protocol versions older than TLS 1.2.");
            }
            let analysis = grade_probe(&outcome, host, scoring, now, legacy_only);
            info!(score = analysis.score, findings = analysis.findings.len(), "SSL/TLS probe finished.");
            return Ok(analysis);
        }
        Err(e) => e,
    };

    if let Some(cert) = fetched.and_then(|session| session.peer_certificate.clone()) {
        warn!(target = host, error = %fallback, "TLS probe failed, grading certificate from the page fetch.");
        let outcome = ProbeOutcome {
            authorized: false,
            authorization_error: Some("trust could not be verified".to_string()),
            status_line: None,
            certificate: Some(cert),
        };
        return Ok(grade_probe(&outcome, host, scoring, now, false));
    }

    error!(target = host, error = %fallback, "TLS inspection failed.");
    Err(AnalysisFailure::new(
        Category::Ssl,
        format!("handshake failed ({}); probe failed ({})", primary.technical_message, fallback.technical_message),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::certificate::tests::cert;
    use chrono::Duration as ChronoDuration;

    fn leaf() -> CertificateInfo {
        let mut leaf = cert("CN=example.com", "CN=Test Intermediate");
        leaf.common_name = Some("example.com".to_string());
        leaf.subject_alt_names = vec!["example.com".to_string(), "www.example.com".to_string()];
        leaf
    }

    fn modern(chain: Vec<CertificateInfo>) -> TlsHandshake {
        TlsHandshake {
            protocol: Some("TLSv1.3".to_string()),
            cipher: Some("TLS13_AES_256_GCM_SHA384".to_string()),
            authorized: true,
            authorization_error: None,
            chain,
        }
    }

    fn full_chain() -> Vec<CertificateInfo> {
        vec![leaf(), cert("CN=Test Intermediate", "CN=Test Root")]
    }

    fn codes(analysis: &CategoryAnalysis) -> Vec<&str> {
        analysis.findings.iter().map(|f| f.kind.as_str()).collect()
    }

    struct FailingInspector {
        probe: Option<ProbeOutcome>,
    }

    #[async_trait]
    impl TlsInspector for FailingInspector {
        async fn handshake(&self, _host: &str, _port: u16) -> Result<TlsHandshake, ClassifiedError> {
            Err(ClassifiedError::new(ErrorKind::ConnectionReset, "connection reset by peer"))
        }

        async fn probe(&self, _host: &str, _port: u16) -> Result<ProbeOutcome, ClassifiedError> {
            self.probe.clone().ok_or_else(|| ClassifiedError::new(ErrorKind::Timeout, "probe timed out"))
        }
    }

    /// Rejects the rustls handshake the way a TLS 1.0-only server does.
    struct LegacyOnlyInspector;

    #[async_trait]
    impl TlsInspector for LegacyOnlyInspector {
        async fn handshake(&self, _host: &str, _port: u16) -> Result<TlsHandshake, ClassifiedError> {
            Err(ClassifiedError::new(ErrorKind::SslError, "received fatal alert: ProtocolVersion"))
        }

        async fn probe(&self, _host: &str, _port: u16) -> Result<ProbeOutcome, ClassifiedError> {
            Ok(ProbeOutcome {
                authorized: true,
                authorization_error: None,
                status_line: Some("HTTP/1.1 200 OK".to_string()),
                certificate: Some(leaf()),
            })
        }
    }

    #[test]
    fn test_protocol_grades() {
        assert_eq!(protocol_grade("TLSv1.3"), Grade::APlus);
        assert_eq!(protocol_grade("TLS 1.2"), Grade::A);
        assert_eq!(protocol_grade("TLSv1_1"), Grade::B);
        assert_eq!(protocol_grade("TLSv1"), Grade::F);
        assert_eq!(protocol_grade("SSLv3"), Grade::F);
    }

    #[test]
    fn test_cipher_strength() {
        assert_eq!(cipher_bits("TLS13_AES_256_GCM_SHA384"), Some(256));
        assert_eq!(cipher_bits("TLS13_CHACHA20_POLY1305_SHA256"), Some(256));
        assert_eq!(cipher_bits("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"), Some(128));
        assert_eq!(cipher_bits("ECDHE-RSA-AES128-GCM-SHA256"), Some(128));
        assert_eq!(cipher_bits("TLS_RSA_WITH_3DES_EDE_CBC_SHA"), Some(112));
        assert_eq!(cipher_bits("TLS_RSA_EXPORT_WITH_RC4_40_MD5"), Some(40));
        assert_eq!(cipher_bits("TLS_RSA_WITH_NULL_SHA"), Some(0));

        assert_eq!(weak_cipher_algorithm("TLS_RSA_WITH_RC4_128_SHA"), Some("RC4"));
        assert_eq!(weak_cipher_algorithm("TLS_RSA_WITH_3DES_EDE_CBC_SHA"), Some("3DES"));
        assert_eq!(weak_cipher_algorithm("TLS_RSA_WITH_DES_CBC_SHA"), Some("DES"));
        assert_eq!(weak_cipher_algorithm("TLS13_AES_128_GCM_SHA256"), None);
    }

    #[test]
    fn test_modern_handshake_scores_full_marks() {
        let analysis = grade_handshake(&modern(full_chain()), "example.com", &TlsScoring::default(), Utc::now());
        assert!(analysis.findings.is_empty(), "unexpected findings: {:?}", codes(&analysis));
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.grade, Grade::APlus);
        match analysis.details {
            CategoryDetails::Ssl(details) => {
                assert_eq!(details.inspection, InspectionMode::Full);
                assert_eq!(details.protocol_grade, Some(Grade::APlus));
                assert_eq!(details.cipher_bits, Some(256));
                assert!(details.chain_complete);
                assert_eq!(details.chain.len(), 2);
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_deprecated_and_insecure_protocols() {
        let mut handshake = modern(full_chain());
        handshake.protocol = Some("TLSv1.1".to_string());
        let analysis = grade_handshake(&handshake, "example.com", &TlsScoring::default(), Utc::now());
        let deprecated = analysis.findings.iter().find(|f| f.kind == "deprecated_protocol").unwrap();
        assert_eq!(deprecated.severity, Severity::Medium);

        handshake.protocol = Some("TLSv1".to_string());
        let analysis = grade_handshake(&handshake, "example.com", &TlsScoring::default(), Utc::now());
        let insecure = analysis.findings.iter().find(|f| f.kind == "insecure_protocol").unwrap();
        assert_eq!(insecure.severity, Severity::Critical);
    }

    #[test]
    fn test_weak_ciphers() {
        let mut handshake = modern(full_chain());
        handshake.protocol = Some("TLSv1.2".to_string());
        handshake.cipher = Some("TLS_RSA_WITH_RC4_128_SHA".to_string());
        let analysis = grade_handshake(&handshake, "example.com", &TlsScoring::default(), Utc::now());
        assert_eq!(codes(&analysis), vec!["weak_cipher_algorithm"]);
        assert_eq!(analysis.findings[0].severity, Severity::High);

        handshake.cipher = Some("TLS_RSA_EXPORT_WITH_DES40_CBC_SHA".to_string());
        let analysis = grade_handshake(&handshake, "example.com", &TlsScoring::default(), Utc::now());
        let strength = analysis.findings.iter().find(|f| f.kind == "weak_cipher_strength").unwrap();
        assert_eq!(strength.severity, Severity::Critical);
    }

    #[test]
    fn test_certificate_expiry() {
        let now = Utc::now();
        let mut chain = full_chain();
        chain[0].not_after = now - ChronoDuration::days(2);
        let analysis = grade_handshake(&modern(chain.clone()), "example.com", &TlsScoring::default(), now);
        let expired = analysis.findings.iter().find(|f| f.kind == "certificate_expired").unwrap();
        assert_eq!(expired.severity, Severity::Critical);

        chain[0].not_after = now + ChronoDuration::days(10);
        let analysis = grade_handshake(&modern(chain), "example.com", &TlsScoring::default(), now);
        let expiring = analysis.findings.iter().find(|f| f.kind == "certificate_expiring").unwrap();
        assert_eq!(expiring.severity, Severity::Warning);
    }

    #[test]
    fn test_certificate_weaknesses() {
        let mut chain = full_chain();
        chain[0].key_size = 1024;
        chain[0].signature_hash = Some("sha1".to_string());
        chain[0].signature_algorithm = "sha1WithRSAEncryption".to_string();
        let analysis = grade_handshake(&modern(chain), "other.org", &TlsScoring::default(), Utc::now());
        let found = codes(&analysis);
        assert!(found.contains(&"weak_key_size"));
        assert!(found.contains(&"weak_signature_algorithm"));
        assert!(found.contains(&"hostname_mismatch"));
    }

    #[test]
    fn test_self_signed_and_unauthorized() {
        let mut self_signed = cert("CN=example.com", "CN=example.com");
        self_signed.subject_alt_names = vec!["example.com".to_string()];
        let handshake = TlsHandshake {
            authorized: false,
            authorization_error: Some("invalid peer certificate: UnknownIssuer".to_string()),
            ..modern(vec![self_signed])
        };
        let analysis = grade_handshake(&handshake, "example.com", &TlsScoring::default(), Utc::now());
        let found = codes(&analysis);
        assert!(found.contains(&"self_signed_certificate"));
        assert!(found.contains(&"certificate_untrusted"));
        assert!(!found.contains(&"incomplete_chain"));
        assert!(analysis.score < 50);
    }

    #[test]
    fn test_leaf_without_intermediate_is_incomplete() {
        let analysis = grade_handshake(&modern(vec![leaf()]), "example.com", &TlsScoring::default(), Utc::now());
        assert_eq!(codes(&analysis), vec!["incomplete_chain"]);
    }

    #[test]
    fn test_not_https_has_single_recommendation() {
        let analysis = not_https_analysis();
        assert_eq!(analysis.score, 0);
        assert_eq!(analysis.recommendations.len(), 1);
        match analysis.details {
            CategoryDetails::Ssl(details) => assert!(!details.is_secure),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_probe() {
        let inspector = FailingInspector {
            probe: Some(ProbeOutcome {
                authorized: true,
                authorization_error: None,
                status_line: Some("HTTP/1.1 200 OK".to_string()),
                certificate: Some(leaf()),
            }),
        };
        let analysis = run_ssl_scan(&inspector, "example.com", 443, true, None, &TlsScoring::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(codes(&analysis), vec!["limited_inspection"]);
        assert_eq!(analysis.score, 70);
        match analysis.details {
            CategoryDetails::Ssl(details) => assert_eq!(details.inspection, InspectionMode::Fallback),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_legacy_only_server_is_graded_insecure() {
        let analysis =
            run_ssl_scan(&LegacyOnlyInspector, "example.com", 443, true, None, &TlsScoring::default(), Utc::now())
                .await
                .unwrap();
        let insecure = analysis.findings.iter().find(|f| f.kind == "insecure_protocol").unwrap();
        assert_eq!(insecure.severity, Severity::Critical);
        assert!(analysis.score < 70);
        match analysis.details {
            CategoryDetails::Ssl(details) => {
                assert_eq!(details.inspection, InspectionMode::Fallback);
                assert_eq!(details.protocol_grade, Some(Grade::F));
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_refused_modern_protocols() {
        for message in [
            "received fatal alert: ProtocolVersion",
            "peer is incompatible: ServerDoesNotSupportTls12Or13",
        ] {
            assert!(refused_modern_protocols(&ClassifiedError::new(ErrorKind::SslError, message)), "{message}");
        }
        assert!(!refused_modern_protocols(&ClassifiedError::new(ErrorKind::ConnectionReset, "connection reset by peer")));
        assert!(!refused_modern_protocols(&ClassifiedError::new(ErrorKind::SslError, "invalid peer certificate")));
    }

    #[tokio::test]
    async fn test_uses_fetched_certificate_when_both_paths_fail() {
        let inspector = FailingInspector { probe: None };
        let session = TlsSession { protocol: None, cipher: None, peer_certificate: Some(leaf()) };
        let analysis =
            run_ssl_scan(&inspector, "example.com", 443, true, Some(&session), &TlsScoring::default(), Utc::now())
                .await
                .unwrap();
        assert!(codes(&analysis).contains(&"limited_inspection"));
    }

    #[tokio::test]
    async fn test_fails_when_nothing_to_grade() {
        let inspector = FailingInspector { probe: None };
        let failure = run_ssl_scan(&inspector, "example.com", 443, true, None, &TlsScoring::default(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(failure.category, Category::Ssl);
        assert!(failure.reason.contains("probe timed out"));
    }

    #[tokio::test]
    async fn test_plain_http_skips_inspection() {
        let inspector = FailingInspector { probe: None };
        let analysis = run_ssl_scan(&inspector, "example.com", 80, false, None, &TlsScoring::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(analysis.score, 0);
        assert_eq!(codes(&analysis), vec!["not_https"]);
    }
}
