// 🔎 Extraction Engine
// Rule selection (exact source, else bank-name sniffing) + field extraction

use crate::error::ExtractionError;
use crate::rules::{ExtractionRule, RuleTable, SourceId};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Sender placeholder when the sender pattern finds nothing
pub const UNKNOWN_SENDER: &str = "Unknown";

// ============================================================================
// CORE TYPES
// ============================================================================

/// One inbound notification (or OCR text block), consumed once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub source: SourceId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub posted_at_ms: i64,
}

impl RawEvent {
    pub fn new(
        source: impl Into<SourceId>,
        title: impl Into<String>,
        body: impl Into<String>,
        posted_at_ms: i64,
    ) -> Self {
        RawEvent {
            source: source.into(),
            title: title.into(),
            body: body.into(),
            posted_at_ms,
        }
    }

    /// Title then body, joined by a single space
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty()
    }
}

/// Structured payment record produced by a successful extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTransaction {
    pub bank_name: String,
    pub amount: Decimal,
    /// Empty when the account pattern did not match
    pub account_number: String,
    /// `UNKNOWN_SENDER` when the sender pattern did not match
    pub sender_info: String,
    pub raw_text: String,
    pub observed_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    /// Title and body are both blank
    EmptyInput,
    /// No rule for the source and no bank name in the text
    UnknownSource,
    AmountNotFound,
    AmountUnparseable,
    /// An unexpected failure was absorbed by the supervisor
    Recovered,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoMatchReason::EmptyInput => "empty_input",
            NoMatchReason::UnknownSource => "unknown_source",
            NoMatchReason::AmountNotFound => "amount_not_found",
            NoMatchReason::AmountUnparseable => "amount_unparseable",
            NoMatchReason::Recovered => "recovered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Extracted(ExtractedTransaction),
    NoMatch { reason: NoMatchReason },
}

impl ExtractionOutcome {
    pub fn no_match(reason: NoMatchReason) -> Self {
        ExtractionOutcome::NoMatch { reason }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, ExtractionOutcome::Extracted(_))
    }

    pub fn transaction(&self) -> Option<&ExtractedTransaction> {
        match self {
            ExtractionOutcome::Extracted(tx) => Some(tx),
            ExtractionOutcome::NoMatch { .. } => None,
        }
    }

    pub fn into_transaction(self) -> Option<ExtractedTransaction> {
        match self {
            ExtractionOutcome::Extracted(tx) => Some(tx),
            ExtractionOutcome::NoMatch { .. } => None,
        }
    }
}

/// How a rule was chosen for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The source has its own rule
    Direct,
    /// Found by scanning the text for a configured bank name
    Fallback,
}

// ============================================================================
// EXTRACTOR TRAIT
// ============================================================================

/// The seam the recovery supervisor wraps
pub trait Extractor: Send + Sync {
    /// Extract a transaction from one event.
    ///
    /// `Ok(NoMatch)` is an ordinary outcome; `Err` means something
    /// unexpected happened and the event should be dropped.
    fn extract(&self, event: &RawEvent) -> Result<ExtractionOutcome, ExtractionError>;

    /// Confirm internal state is still usable after a failure
    fn verify_state(&self) -> Result<(), ExtractionError> {
        Ok(())
    }
}

// ============================================================================
// EXTRACTION ENGINE
// ============================================================================

/// Pure extraction over an immutable rule table. Cheap to clone and safe to
/// share between threads.
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    rules: Arc<RuleTable>,
}

impl ExtractionEngine {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        ExtractionEngine { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn rule_table(&self) -> Arc<RuleTable> {
        Arc::clone(&self.rules)
    }

    /// Pick the rule for `source`, falling back to the first rule whose bank
    /// name appears in `combined`. Never recurses.
    pub fn resolve_rule(&self, source: &str, combined: &str) -> Option<(&ExtractionRule, Resolution)> {
        if let Some(rule) = self.rules.lookup(source) {
            return Some((rule, Resolution::Direct));
        }

        let lower = combined.to_lowercase();
        self.rules
            .all_rules()
            .iter()
            .find(|rule| rule.mentioned_in(&lower))
            .map(|rule| (rule, Resolution::Fallback))
    }

    /// Run one concrete rule's patterns over `combined`
    pub fn extract_with_rule(
        &self,
        rule: &ExtractionRule,
        combined: &str,
        observed_at_ms: i64,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let raw_amount = match capture(rule.amount_pattern(), combined) {
            Capture::Miss => return Ok(ExtractionOutcome::no_match(NoMatchReason::AmountNotFound)),
            Capture::Empty => return Err(empty_capture(rule, "amount")),
            Capture::Value(value) => value,
        };

        let amount = match parse_amount(raw_amount) {
            Some(amount) => amount,
            None => {
                tracing::debug!(bank = rule.bank_name(), raw_amount, "amount did not parse");
                return Ok(ExtractionOutcome::no_match(NoMatchReason::AmountUnparseable));
            }
        };

        let account_number = match capture(rule.account_pattern(), combined) {
            Capture::Miss => String::new(),
            Capture::Empty => return Err(empty_capture(rule, "account")),
            Capture::Value(value) => value.trim().to_string(),
        };

        let sender_info = match capture(rule.sender_pattern(), combined) {
            Capture::Miss => UNKNOWN_SENDER.to_string(),
            Capture::Empty => return Err(empty_capture(rule, "sender")),
            Capture::Value(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    UNKNOWN_SENDER.to_string()
                } else {
                    trimmed.to_string()
                }
            }
        };

        Ok(ExtractionOutcome::Extracted(ExtractedTransaction {
            bank_name: rule.bank_name().to_string(),
            amount,
            account_number,
            sender_info,
            raw_text: combined.to_string(),
            observed_at_ms,
        }))
    }
}

impl Extractor for ExtractionEngine {
    fn extract(&self, event: &RawEvent) -> Result<ExtractionOutcome, ExtractionError> {
        if event.is_blank() {
            return Ok(ExtractionOutcome::no_match(NoMatchReason::EmptyInput));
        }

        let combined = event.combined_text();
        let (rule, resolution) = match self.resolve_rule(event.source.as_str(), &combined) {
            Some(found) => found,
            None => {
                tracing::debug!(source = %event.source, "no rule and no bank name in text");
                return Ok(ExtractionOutcome::no_match(NoMatchReason::UnknownSource));
            }
        };

        tracing::debug!(
            source = %event.source,
            bank = rule.bank_name(),
            fallback = resolution == Resolution::Fallback,
            "rule selected"
        );

        self.extract_with_rule(rule, &combined, event.posted_at_ms)
    }

    fn verify_state(&self) -> Result<(), ExtractionError> {
        self.rules.verify_integrity()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

enum Capture<'t> {
    /// The pattern did not match
    Miss,
    /// The pattern matched but no capture group participated
    Empty,
    Value(&'t str),
}

/// First participating capture group of the first match
fn capture<'t>(pattern: &Regex, text: &'t str) -> Capture<'t> {
    let caps = match pattern.captures(text) {
        Some(caps) => caps,
        None => return Capture::Miss,
    };

    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| Capture::Value(m.as_str()))
        .unwrap_or(Capture::Empty)
}

fn empty_capture(rule: &ExtractionRule, field: &'static str) -> ExtractionError {
    ExtractionError::EmptyCapture {
        bank: rule.bank_name().to_string(),
        field,
    }
}

/// Parse a captured amount: thousands separators and whitespace removed,
/// Thai digits mapped to ASCII, trailing punctuation trimmed.
/// Negative or malformed values give `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let normalized: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .map(thai_digit_to_ascii)
        .collect();
    let normalized = normalized.trim_end_matches(&['.', ','][..]);

    if normalized.is_empty() {
        return None;
    }

    let amount = Decimal::from_str(normalized).ok()?;
    if amount.is_sign_negative() {
        return None;
    }
    Some(amount)
}

fn thai_digit_to_ascii(c: char) -> char {
    match c {
        '๐'..='๙' => {
            let offset = c as u32 - '๐' as u32;
            char::from_digit(offset, 10).unwrap_or(c)
        }
        _ => c,
    }
}

// ============================================================================
// TESTS
// ============================================================================
