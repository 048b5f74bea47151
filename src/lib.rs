// PayNotify - Core Library
// Bank-notification extraction exposed for the CLI, API server and tests

pub mod admission;      // Fixed-window rate limiting
pub mod banks;          // Bank directory: codes + aliases
pub mod config;         // JSON config + env overrides
pub mod deduplication;  // Repeated-notification suppression
pub mod dispatch;       // Envelopes, alerts and sinks
pub mod error;
pub mod extraction;     // Rule selection + field extraction
pub mod ocr;            // Screen text → extraction events
pub mod pipeline;       // End-to-end wiring
pub mod recovery;       // Fault containment around extraction
pub mod replay;         // CSV event loading
pub mod rules;          // Per-source rule table

// Re-export commonly used types
pub use admission::{AdmissionController, AdmissionDecision, RateWindowState};
pub use banks::{Bank, BankDirectory};
pub use config::{AppConfig, RateLimitConfig};
pub use deduplication::{DuplicateDecision, DuplicateSuppressor};
pub use dispatch::{
    ChannelSink, JsonLinesSink, LogSink, Origin, TransactionAlert, TransactionEnvelope,
    TransactionSink,
};
pub use error::{ConfigError, ExtractionError};
pub use extraction::{
    ExtractedTransaction, ExtractionEngine, ExtractionOutcome, Extractor, NoMatchReason, RawEvent,
    Resolution,
};
pub use ocr::{BankHint, LogoRegion, OcrDocument, OcrFieldMapper, OcrResult, OcrTextBlock, Region};
pub use pipeline::{NotificationPipeline, PipelineOutcome, PipelineStats};
pub use recovery::RecoverySupervisor;
pub use replay::{load_events, read_events};
pub use rules::{ExtractionRule, RuleSpec, RuleTable, SourceId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
