// src/core/mod.rs

// Root of the `core` module: the analysis pipeline and everything it shares.

/// Data structures used throughout the pipeline, from `NormalizedUrl` to
/// the final `SecurityReport`.
pub mod models;

/// Error taxonomy and the typed errors returned by each stage.
pub mod errors;

/// Static tables: the security header catalog, finding remediation texts and
/// user-facing error messages.
pub mod knowledge_base;

pub mod validator;
pub mod fetcher;
pub mod certificate;

/// The four category analyzers and the `SecurityAnalyzer` orchestrator.
pub mod scanner;

pub mod scoring;
