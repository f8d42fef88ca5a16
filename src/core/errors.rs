// src/core/errors.rs

//! Error taxonomy shared by the validator, the fetcher and the analyzers.
//!
//! Raw failures (reqwest, io, TLS, HTTP status codes) are mapped onto a small,
//! stable set of [`ErrorKind`]s. Each kind carries a user-facing message and a
//! list of suggestions taken from the static table in the knowledge base.

use crate::core::knowledge_base::error_profile;
use crate::core::models::Category;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::io;
use strum::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    DnsError,
    ConnectionRefused,
    ConnectionReset,
    Timeout,
    SslError,
    HttpClientError,
    HttpRateLimited,
    HttpServerError,
    ValidationError,
    AnalysisError,
    Unknown,
}

/// Whether an operation that failed with `kind` is worth retrying.
pub fn is_retryable(kind: ErrorKind, status: Option<u16>) -> bool {
    match kind {
        ErrorKind::ConnectionReset | ErrorKind::Timeout | ErrorKind::HttpRateLimited => true,
        ErrorKind::HttpServerError => matches!(status, Some(502..=504)),
        _ => false,
    }
}

/// A failure mapped onto the taxonomy, with both log and user wording.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {technical_message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub technical_message: String,
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub retryable: bool,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, technical_message: impl Into<String>) -> Self {
        let profile = error_profile(kind);
        Self {
            kind,
            status: None,
            technical_message: technical_message.into(),
            user_message: profile.user_message.to_string(),
            suggestions: profile.suggestions.iter().map(|s| s.to_string()).collect(),
            retryable: is_retryable(kind, None),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self.retryable = is_retryable(self.kind, Some(status));
        self
    }

    /// Classifies an HTTP status code. Returns `None` for non-error statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        let kind = match status {
            408 => ErrorKind::Timeout,
            429 => ErrorKind::HttpRateLimited,
            400..=499 => ErrorKind::HttpClientError,
            500..=599 => ErrorKind::HttpServerError,
            _ => return None,
        };
        Some(Self::new(kind, format!("HTTP status {status}")).with_status(status))
    }
}

/// Maps a reqwest failure onto the taxonomy, inspecting the source chain for
/// the underlying io error where one exists.
pub fn classify_reqwest(err: &reqwest::Error) -> ClassifiedError {
    let technical = error_chain_text(err);

    if err.is_timeout() {
        return ClassifiedError::new(ErrorKind::Timeout, technical);
    }
    if let Some(status) = err.status() {
        if let Some(classified) = ClassifiedError::from_status(status.as_u16()) {
            return ClassifiedError { technical_message: technical, ..classified };
        }
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            let classified = classify_io(io_err);
            if classified.kind != ErrorKind::Unknown {
                return ClassifiedError { technical_message: technical, ..classified };
            }
        }
        source = inner.source();
    }

    let classified = classify_message(&technical);
    if classified.kind == ErrorKind::Unknown && err.is_connect() {
        return ClassifiedError::new(ErrorKind::ConnectionRefused, technical);
    }
    classified
}

pub fn classify_io(err: &io::Error) -> ClassifiedError {
    let kind = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => ErrorKind::ConnectionReset,
        // rustls reports alerts and bad records as InvalidData
        io::ErrorKind::InvalidData => ErrorKind::SslError,
        _ => return classify_message(&err.to_string()),
    };
    ClassifiedError::new(kind, err.to_string())
}

/// Last-resort classification by message text.
pub fn classify_message(message: &str) -> ClassifiedError {
    let lower = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    let kind = if contains_any(&[
        "dns error",
        "failed to lookup address",
        "no such host",
        "name or service not known",
        "nodename nor servname",
        "no record found",
    ]) {
        ErrorKind::DnsError
    } else if contains_any(&["connection refused"]) {
        ErrorKind::ConnectionRefused
    } else if contains_any(&["connection reset", "broken pipe", "connection closed", "unexpected eof"]) {
        ErrorKind::ConnectionReset
    } else if contains_any(&["timed out", "timeout", "deadline has elapsed"]) {
        ErrorKind::Timeout
    } else if contains_any(&["certificate", "tls", "ssl", "handshake", "alert"]) {
        ErrorKind::SslError
    } else {
        ErrorKind::Unknown
    };
    ClassifiedError::new(kind, message)
}

fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let part = inner.to_string();
        if !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
        source = inner.source();
    }
    text
}

// --- Validation Errors ---

/// Why a single URL candidate was rejected.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum ValidationReason {
    #[error("URL is empty")]
    Empty,

    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported scheme: {0}. Only HTTP and HTTPS are supported")]
    UnsupportedScheme(String),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Private IP address not allowed: {0}")]
    PrivateAddress(String),

    #[error("DNS resolution failed for {host}: {reason}")]
    DnsResolutionFailed { host: String, reason: String },

    #[error("DNS resolution timed out for {0}")]
    DnsTimeout(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateError {
    pub candidate: String,
    pub reason: ValidationReason,
    pub message: String,
}

impl CandidateError {
    pub fn new(candidate: impl Into<String>, reason: ValidationReason) -> Self {
        let message = reason.to_string();
        Self { candidate: candidate.into(), reason, message }
    }
}

/// Every candidate failed; carries all per-candidate errors plus suggestions.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[error("URL validation failed: {}", summarize(.errors))]
pub struct ValidationFailure {
    pub errors: Vec<CandidateError>,
    pub suggestions: Vec<String>,
}

fn summarize(errors: &[CandidateError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.candidate, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationFailure {
    pub fn classified(&self) -> ClassifiedError {
        let mut classified = ClassifiedError::new(ErrorKind::ValidationError, self.to_string());
        classified.suggestions.extend(self.suggestions.iter().cloned());
        classified
    }
}

// --- Pipeline Errors ---

/// A category-local failure; never aborts the report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{category} analysis failed: {reason}")]
pub struct AnalysisFailure {
    pub category: Category,
    pub reason: String,
}

impl AnalysisFailure {
    pub fn new(category: Category, reason: impl Into<String>) -> Self {
        Self { category, reason: reason.into() }
    }
}

/// Failures that prevent any report from being produced.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] ClassifiedError),

    #[error("Analyzer setup failed: {0}")]
    Setup(String),
}

impl AnalyzeError {
    /// The taxonomy entry to show to an end user.
    pub fn classified(&self) -> ClassifiedError {
        match self {
            AnalyzeError::Validation(failure) => failure.classified(),
            AnalyzeError::Fetch(classified) => classified.clone(),
            AnalyzeError::Setup(reason) => ClassifiedError::new(ErrorKind::Unknown, reason.clone()),
        }
    }
}
