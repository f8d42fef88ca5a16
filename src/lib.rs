// src/lib.rs

//! Passive security posture analysis for a single web endpoint.
//!
//! A [`SecurityAnalyzer`] validates a URL, fetches it once and grades the
//! response across TLS, security headers, cookies and HTML content.

pub mod config;
pub mod core;

pub use crate::config::AnalyzerConfig;
pub use crate::core::errors::{AnalyzeError, ClassifiedError, ErrorKind, ValidationFailure};
pub use crate::core::models::{AnalyzeOptions, Category, Grade, SecurityReport, Severity};
pub use crate::core::scanner::SecurityAnalyzer;
