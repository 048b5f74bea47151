// 📷 OCR Field Mapper
// Maps recognized screen text onto the same extraction engine.
// A logo-region hint (or bank names in the text) only picks the initial
// source guess; field extraction is identical to notifications.

use crate::banks::BankDirectory;
use crate::error::ConfigError;
use crate::extraction::{ExtractionOutcome, Extractor, RawEvent};
use crate::recovery::RecoverySupervisor;
use crate::rules::{RuleTable, SourceId};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source used when no bank could be guessed; never registered, so the
/// engine goes straight to its generic fallback
pub const OCR_SOURCE: &str = "ocr";

// ============================================================================
// GEOMETRY
// ============================================================================

/// Rectangle in normalized image coordinates (0.0 - 1.0, origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region { x, y, width, height }
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    pub fn is_normalized(&self) -> bool {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && self.width >= 0.0
            && self.height >= 0.0
            && in_unit(self.x + self.width)
            && in_unit(self.y + self.height)
    }
}

/// Where a bank's logo sits on its transfer slip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoRegion {
    pub bank: String,
    pub region: Region,
}

impl LogoRegion {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.is_normalized() {
            Ok(())
        } else {
            Err(ConfigError::InvalidLogoRegion {
                bank: self.bank.clone(),
            })
        }
    }
}

/// Top-left logo area shared by the major Thai slips
pub fn default_logo_regions() -> Vec<LogoRegion> {
    ["SCB", "KBANK", "KTB", "BBL"]
        .iter()
        .map(|bank| LogoRegion {
            bank: bank.to_string(),
            region: Region::new(0.05, 0.05, 0.2, 0.1),
        })
        .collect()
}

// ============================================================================
// OCR INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrTextBlock {
    pub text: String,
    /// Missing when the recognizer gave no bounding box
    #[serde(default)]
    pub bounds: Option<Region>,
}

/// Recognized text for one captured screen or slip image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDocument {
    /// Full text; rebuilt from the blocks when empty
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub blocks: Vec<OcrTextBlock>,
    pub captured_at_ms: i64,
}

impl OcrDocument {
    pub fn from_text(text: &str, captured_at_ms: i64) -> Self {
        OcrDocument {
            text: text.to_string(),
            blocks: Vec::new(),
            captured_at_ms,
        }
    }

    pub fn full_text(&self) -> String {
        if !self.text.trim().is_empty() {
            return self.text.clone();
        }
        self.blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// OCR OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "bank", rename_all = "snake_case")]
pub enum BankHint {
    /// A text block inside a configured logo region named the bank
    LogoRegion(String),
    /// A bank name or alias appears in the text
    Text(String),
    None,
}

impl BankHint {
    pub fn bank(&self) -> Option<&str> {
        match self {
            BankHint::LogoRegion(bank) | BankHint::Text(bank) => Some(bank),
            BankHint::None => None,
        }
    }
}

/// Document turned into an engine event, before extraction
#[derive(Debug, Clone, PartialEq)]
pub struct OcrMapping {
    pub event: RawEvent,
    pub hint: BankHint,
    pub slip_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    pub hint: BankHint,
    pub source: SourceId,
    pub slip_time: Option<NaiveDateTime>,
    pub outcome: ExtractionOutcome,
}

// ============================================================================
// MAPPER
// ============================================================================

pub struct OcrFieldMapper {
    rules: Arc<RuleTable>,
    directory: BankDirectory,
    regions: Vec<LogoRegion>,
}

impl OcrFieldMapper {
    pub fn new(rules: Arc<RuleTable>, directory: BankDirectory, regions: Vec<LogoRegion>) -> Self {
        OcrFieldMapper {
            rules,
            directory,
            regions,
        }
    }

    /// Logo regions are checked in order; the first region holding a block
    /// whose top-left corner lies inside it and whose text names the bank wins.
    pub fn detect_logo_bank(&self, doc: &OcrDocument) -> Option<&str> {
        self.regions.iter().find_map(|logo| {
            let code = logo.bank.to_lowercase();
            doc.blocks
                .iter()
                .filter_map(|block| block.bounds.map(|bounds| (block, bounds)))
                .any(|(block, bounds)| {
                    logo.region.contains_point(bounds.x, bounds.y)
                        && block.text.to_lowercase().contains(&code)
                })
                .then_some(logo.bank.as_str())
        })
    }

    pub fn detect_hint(&self, doc: &OcrDocument, full_text: &str) -> BankHint {
        if let Some(bank) = self.detect_logo_bank(doc) {
            return BankHint::LogoRegion(bank.to_string());
        }
        match self.directory.detect(full_text) {
            Some(bank) => BankHint::Text(bank.code.clone()),
            None => BankHint::None,
        }
    }

    /// Source the hint points at, or `OCR_SOURCE` when no rule exists for it
    pub fn source_for(&self, hint: &BankHint) -> SourceId {
        hint.bank()
            .and_then(|bank| self.rules.rule_for_bank(bank))
            .map(|rule| rule.source().clone())
            .unwrap_or_else(|| SourceId::from(OCR_SOURCE))
    }

    pub fn map(&self, doc: &OcrDocument) -> OcrMapping {
        let text = doc.full_text();
        let hint = self.detect_hint(doc, &text);
        let source = self.source_for(&hint);
        let slip_time = parse_slip_time(&text);

        tracing::debug!(source = %source, hint = ?hint, "ocr document mapped");

        OcrMapping {
            event: RawEvent::new(source, "", text, doc.captured_at_ms),
            hint,
            slip_time,
        }
    }

    pub fn extract<E: Extractor>(&self, doc: &OcrDocument, supervisor: &RecoverySupervisor<E>) -> OcrResult {
        let mapping = self.map(doc);
        let outcome = supervisor.extract(&mapping.event);

        OcrResult {
            hint: mapping.hint,
            source: mapping.event.source,
            slip_time: mapping.slip_time,
            outcome,
        }
    }
}

// ============================================================================
// SLIP TIMESTAMPS
// ============================================================================

static NUMERIC_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\s+(\d{1,2}):(\d{2})(?::(\d{2}))?").expect("valid regex")
});

static THAI_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+([\p{Thai}.]+)\s+(\d{2,4})\s+(?:เวลา\s*)?(\d{1,2}):(\d{2})(?::(\d{2}))?")
        .expect("valid regex")
});

const THAI_MONTHS: [(&str, &str); 12] = [
    ("ม.ค.", "มกราคม"),
    ("ก.พ.", "กุมภาพันธ์"),
    ("มี.ค.", "มีนาคม"),
    ("เม.ย.", "เมษายน"),
    ("พ.ค.", "พฤษภาคม"),
    ("มิ.ย.", "มิถุนายน"),
    ("ก.ค.", "กรกฎาคม"),
    ("ส.ค.", "สิงหาคม"),
    ("ก.ย.", "กันยายน"),
    ("ต.ค.", "ตุลาคม"),
    ("พ.ย.", "พฤศจิกายน"),
    ("ธ.ค.", "ธันวาคม"),
];

/// Transfer time printed on a slip: `DD/MM/YYYY HH:MM`, `DD-MM-YYYY HH:MM`
/// or `DD <Thai month> YYYY HH:MM`. Buddhist-era years are converted.
/// The first candidate that forms a valid date wins.
pub fn parse_slip_time(text: &str) -> Option<NaiveDateTime> {
    let numeric = NUMERIC_DATE_TIME.captures_iter(text).find_map(|caps| {
        let month = caps[2].parse().ok()?;
        build_date_time(&caps, month)
    });
    if numeric.is_some() {
        return numeric;
    }

    THAI_DATE_TIME.captures_iter(text).find_map(|caps| {
        let month_text = caps[2].trim_end_matches('.');
        let month = THAI_MONTHS
            .iter()
            .position(|(short, long)| short.trim_end_matches('.') == month_text || *long == month_text)?;
        build_date_time(&caps, month as u32 + 1)
    })
}

fn build_date_time(caps: &regex::Captures<'_>, month: u32) -> Option<NaiveDateTime> {
    let day: u32 = caps[1].parse().ok()?;
    let year = gregorian_year(caps[3].parse().ok()?);
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    let second: u32 = match caps.get(6) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

// Slips print either Gregorian or Buddhist-era years, sometimes as two digits
fn gregorian_year(year: i32) -> i32 {
    match year {
        0..=99 if year >= 43 => 2500 + year - 543,
        0..=99 => 2000 + year,
        y if y >= 2400 => y - 543,
        y => y,
    }
}

// ============================================================================
// TESTS
// ============================================================================
