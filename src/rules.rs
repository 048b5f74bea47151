// 🏷️ Extraction Rules - Rules as Data
// Per-source patterns for amount, account and sender, plus the canonical bank name

use crate::error::{ConfigError, ExtractionError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// SHARED PATTERNS
// ============================================================================

/// Thai/English transfer wording, then the first number attached to a
/// currency token on either side (`THB 500`, `500.00 บาท`). Bare numbers
/// such as account numbers and dates never match.
pub const TRANSFER_AMOUNT_PATTERN: &str =
    r"(?i)(?:transferred|received|deposit(?:ed)?|โอนเงิน|รับเงิน|เงินเข้า|ได้รับเงิน|รายการโอน|จำนวน|amount).*?(?:(?:THB|฿|บาท)\s*(\d[\d,]*(?:\.\d+)?)|(\d[\d,]*(?:\.\d+)?)\s*(?:บาท|THB|฿))";

/// Account keyword followed by a dashed or spaced account number
pub const ACCOUNT_NUMBER_PATTERN: &str =
    r"(?i)(?:a/c|acc(?:ount)?|บัญชี)[^\d\n]*(\d{3}[-\s]?\d+[-\s]?\d+)";

/// Name after "from"/"by" (or จาก/โดย), stopping at digits, line ends or an account keyword
pub const SENDER_PATTERN: &str = r"(?i)(?:จาก|โดย|\bfrom\b|\bby\b)[ \t]*:?[ \t]*([^\d\s:]+(?:[ \t]+[^\d\s]+)*?)(?:[ \t]+(?:บัญชี|เข้า|ไปยัง|(?:a/c|acc(?:ount)?|to|ref)\b)|[ \t]*\d|[ \t]*\r?\n|\s*$)";

// ============================================================================
// SOURCE IDENTIFIER
// ============================================================================

/// Opaque name of the app or channel a notification came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        SourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        SourceId(id.to_string())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        SourceId(id)
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Uncompiled rule, as it appears in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub source: SourceId,
    pub bank_name: String,
    pub amount_pattern: String,
    pub account_pattern: String,
    pub sender_pattern: String,
}

impl RuleSpec {
    /// Rule using the shared Thai/English transfer patterns
    pub fn thai_transfer(source: &str, bank_name: &str) -> Self {
        RuleSpec {
            source: SourceId::from(source),
            bank_name: bank_name.to_string(),
            amount_pattern: TRANSFER_AMOUNT_PATTERN.to_string(),
            account_pattern: ACCOUNT_NUMBER_PATTERN.to_string(),
            sender_pattern: SENDER_PATTERN.to_string(),
        }
    }
}

/// A compiled rule. Only obtainable through `compile`, so all three
/// patterns are always present.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    source: SourceId,
    bank_name: String,
    amount: Regex,
    account: Regex,
    sender: Regex,
}

impl ExtractionRule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, ConfigError> {
        if spec.bank_name.trim().is_empty() {
            return Err(ConfigError::EmptyBankName {
                source_id: spec.source.to_string(),
            });
        }

        Ok(ExtractionRule {
            source: spec.source.clone(),
            bank_name: spec.bank_name.clone(),
            amount: compile_field(&spec.source, "amount", &spec.amount_pattern)?,
            account: compile_field(&spec.source, "account", &spec.account_pattern)?,
            sender: compile_field(&spec.source, "sender", &spec.sender_pattern)?,
        })
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn bank_name(&self) -> &str {
        &self.bank_name
    }

    pub fn amount_pattern(&self) -> &Regex {
        &self.amount
    }

    pub fn account_pattern(&self) -> &Regex {
        &self.account
    }

    pub fn sender_pattern(&self) -> &Regex {
        &self.sender
    }

    /// Case-insensitive check for the bank name anywhere in `text`
    pub fn mentioned_in(&self, text_lower: &str) -> bool {
        text_lower.contains(&self.bank_name.to_lowercase())
    }

    /// Back to the configuration form (pattern sources are kept verbatim)
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            source: self.source.clone(),
            bank_name: self.bank_name.clone(),
            amount_pattern: self.amount.as_str().to_string(),
            account_pattern: self.account.as_str().to_string(),
            sender_pattern: self.sender.as_str().to_string(),
        }
    }
}

fn compile_field(source: &SourceId, field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern).map_err(|error| ConfigError::InvalidPattern {
        source_id: source.to_string(),
        field,
        error,
    })?;

    // Group 0 is the whole match, the field value needs at least one more
    if regex.captures_len() < 2 {
        return Err(ConfigError::MissingCaptureGroup {
            source_id: source.to_string(),
            field,
        });
    }

    Ok(regex)
}

// ============================================================================
// RULE TABLE
// ============================================================================

/// Immutable source → rule mapping. Declaration order is kept for the
/// generic fallback scan.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<ExtractionRule>,
    index: HashMap<SourceId, usize>,
    fingerprint: String,
}

impl RuleTable {
    /// Compile every spec; the first duplicate source aborts construction
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(specs.len());
        let mut index = HashMap::with_capacity(specs.len());

        for spec in specs {
            if index.contains_key(&spec.source) {
                return Err(ConfigError::DuplicateSource(spec.source.to_string()));
            }
            index.insert(spec.source.clone(), rules.len());
            rules.push(ExtractionRule::compile(spec)?);
        }

        let fingerprint = fingerprint_rules(&rules);
        Ok(RuleTable {
            rules,
            index,
            fingerprint,
        })
    }

    /// Built-in table for the Thai banking apps on Android and iOS
    pub fn thai_banks() -> Result<Self, ConfigError> {
        Self::from_specs(&default_rule_specs())
    }

    pub fn lookup(&self, source: &str) -> Option<&ExtractionRule> {
        self.index.get(source).map(|&i| &self.rules[i])
    }

    /// All rules in declaration order
    pub fn all_rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// First rule whose bank name equals `bank_name`, ignoring case
    pub fn rule_for_bank(&self, bank_name: &str) -> Option<&ExtractionRule> {
        self.rules
            .iter()
            .find(|rule| rule.bank_name.eq_ignore_ascii_case(bank_name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// SHA-256 over the rule definitions, taken at construction
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Recompute the fingerprint and compare it with the recorded one
    pub fn verify_integrity(&self) -> Result<(), ExtractionError> {
        let found = fingerprint_rules(&self.rules);
        if found != self.fingerprint {
            return Err(ExtractionError::RuleTableCorrupted {
                expected: self.fingerprint.clone(),
                found,
            });
        }
        Ok(())
    }
}

fn fingerprint_rules(rules: &[ExtractionRule]) -> String {
    let mut hasher = Sha256::new();
    for rule in rules {
        for part in [
            rule.source.as_str(),
            rule.bank_name.as_str(),
            rule.amount.as_str(),
            rule.account.as_str(),
            rule.sender.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

/// Rules for the monitored Thai banking apps
pub fn default_rule_specs() -> Vec<RuleSpec> {
    vec![
        // Android packages
        RuleSpec::thai_transfer("com.scb.phone", "SCB"),
        RuleSpec::thai_transfer("com.kasikorn.retail.mbanking.wap", "KBANK"),
        RuleSpec::thai_transfer("com.ktb.netbank", "KTB"),
        RuleSpec::thai_transfer("com.bbl.mobilebanking", "BBL"),
        RuleSpec::thai_transfer("com.tmb.droid.mybiz", "TTB"),
        RuleSpec::thai_transfer("th.co.uob.uobmbk", "UOB"),
        // iOS bundles
        RuleSpec::thai_transfer("com.scb.retail.ios", "SCB"),
        RuleSpec::thai_transfer("com.kasikorn.kplus", "KBANK"),
        RuleSpec::thai_transfer("com.ktb.next", "KTB"),
        RuleSpec::thai_transfer("com.ttb.oneapp", "TTB"),
        RuleSpec::thai_transfer("com.tmbbank.tmb.retail.ios", "TTB"),
        RuleSpec::thai_transfer("com.krungsri.kma", "BAY"),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
