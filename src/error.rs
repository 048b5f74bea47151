// ⚠️ Error types
// ConfigError aborts startup, ExtractionError never leaves the supervisor

use thiserror::Error;

/// Fatal configuration problems, surfaced while building the rule table
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate source identifier in rule table: {0}")]
    DuplicateSource(String),

    #[error("rule for {source_id} has an empty bank name")]
    EmptyBankName { source_id: String },

    #[error("invalid {field} pattern for {source_id}: {error}")]
    InvalidPattern {
        source_id: String,
        field: &'static str,
        #[source]
        error: regex::Error,
    },

    #[error("{field} pattern for {source_id} has no capture group")]
    MissingCaptureGroup {
        source_id: String,
        field: &'static str,
    },

    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("duplicate window ({duplicate_ms} ms) exceeds rate window ({window_ms} ms)")]
    DuplicateWindowTooLong { duplicate_ms: u64, window_ms: u64 },

    #[error("logo region for {bank} lies outside the unit square")]
    InvalidLogoRegion { bank: String },
}

/// Unexpected per-event failures inside an extractor
#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    /// A pattern matched but none of its capture groups took part in the match
    #[error("{field} pattern for {bank} matched without capturing")]
    EmptyCapture { bank: String, field: &'static str },

    #[error("rule table fingerprint changed: expected {expected}, found {found}")]
    RuleTableCorrupted { expected: String, found: String },
}
