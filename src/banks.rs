// 🏦 Bank Directory - Canonical codes + aliases
//
// "ไทยพาณิชย์", "Siam Commercial Bank", "SCB" → all the same bank.
// Used to guess the bank behind OCR text that has no source app attached.

use serde::{Deserialize, Serialize};

// ============================================================================
// BANK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    /// Canonical short code, also the rule table's bank name
    pub code: String,

    /// English display name
    pub name: String,

    /// Alternative spellings (Thai and English)
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Bank {
    pub fn new(code: &str, name: &str) -> Self {
        Bank {
            code: code.to_string(),
            name: name.to_string(),
            aliases: Vec::new(),
        }
    }

    /// Builder: add an alias
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.add_alias(alias.to_string());
        self
    }

    pub fn add_alias(&mut self, alias: String) {
        if !self.aliases.contains(&alias) && alias != self.code {
            self.aliases.push(alias);
        }
    }

    /// Code, name and aliases
    pub fn all_names(&self) -> Vec<&str> {
        let mut names = vec![self.code.as_str(), self.name.as_str()];
        names.extend(self.aliases.iter().map(|a| a.as_str()));
        names
    }

    /// Whether any name of this bank occurs in `text`.
    ///
    /// ASCII names must stand alone ("bay" does not match "ebay");
    /// Thai names match anywhere since Thai is written without spaces.
    pub fn mentioned_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.all_names().into_iter().any(|name| {
            let name = name.to_lowercase();
            if name.is_ascii() {
                contains_ascii_word(&lower, &name)
            } else {
                lower.contains(&name)
            }
        })
    }
}

fn contains_ascii_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }

    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.map_or(false, |c| c.is_ascii_alphanumeric())
            && !after.map_or(false, |c| c.is_ascii_alphanumeric())
    })
}

// ============================================================================
// BANK DIRECTORY
// ============================================================================

/// Ordered list of known banks; detection returns the first hit
#[derive(Debug, Clone, Default)]
pub struct BankDirectory {
    banks: Vec<Bank>,
}

impl BankDirectory {
    pub fn new() -> Self {
        BankDirectory { banks: Vec::new() }
    }

    /// The Thai retail banks seen in notifications and transfer slips
    pub fn thai() -> Self {
        let mut directory = BankDirectory::new();

        directory.register(
            Bank::new("SCB", "Siam Commercial Bank")
                .with_alias("ไทยพาณิชย์")
                .with_alias("SCB Easy"),
        );
        directory.register(
            Bank::new("KBANK", "Kasikornbank")
                .with_alias("กสิกร")
                .with_alias("Kasikorn")
                .with_alias("K PLUS"),
        );
        directory.register(
            Bank::new("KTB", "Krungthai Bank")
                .with_alias("กรุงไทย")
                .with_alias("Krungthai"),
        );
        directory.register(
            Bank::new("BBL", "Bangkok Bank")
                .with_alias("ธนาคารกรุงเทพ")
                .with_alias("กรุงเทพ"),
        );
        directory.register(
            Bank::new("TTB", "TMBThanachart Bank")
                .with_alias("ทหารไทย")
                .with_alias("ธนชาต")
                .with_alias("TMB"),
        );
        directory.register(
            Bank::new("BAY", "Bank of Ayudhya")
                .with_alias("กรุงศรี")
                .with_alias("Krungsri"),
        );
        directory.register(
            Bank::new("GSB", "Government Savings Bank")
                .with_alias("ออมสิน")
                .with_alias("MyMo"),
        );
        directory.register(
            Bank::new("UOB", "United Overseas Bank")
                .with_alias("ยูโอบี")
                .with_alias("UOB TMRW"),
        );

        directory
    }

    pub fn register(&mut self, bank: Bank) {
        self.banks.push(bank);
    }

    /// First registered bank mentioned in `text`
    pub fn detect(&self, text: &str) -> Option<&Bank> {
        self.banks.iter().find(|bank| bank.mentioned_in(text))
    }

    /// Lookup by canonical code, ignoring case
    pub fn find(&self, code: &str) -> Option<&Bank> {
        self.banks.iter().find(|bank| bank.code.eq_ignore_ascii_case(code))
    }

    /// Any known name → canonical code
    pub fn normalize(&self, name: &str) -> Option<&str> {
        let lower = name.trim().to_lowercase();
        self.banks
            .iter()
            .find(|bank| bank.all_names().iter().any(|n| n.to_lowercase() == lower))
            .map(|bank| bank.code.as_str())
    }

    pub fn all_banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn count(&self) -> usize {
        self.banks.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_thai_alias() {
        let directory = BankDirectory::thai();

        assert_eq!(directory.detect("โอนเงินสำเร็จ ธนาคารไทยพาณิชย์").unwrap().code, "SCB");
        assert_eq!(directory.detect("ธนาคารกสิกรไทย").unwrap().code, "KBANK");
        assert_eq!(directory.detect("ธนชาต").unwrap().code, "TTB");
        assert_eq!(directory.detect("ออมสิน").unwrap().code, "GSB");
    }

    #[test]
    fn test_detect_ascii_code_case_insensitive() {
        let directory = BankDirectory::thai();
        assert_eq!(directory.detect("Transfer via kbank app").unwrap().code, "KBANK");
    }

    #[test]
    fn test_ascii_code_needs_word_boundary() {
        let directory = BankDirectory::thai();

        assert!(directory.detect("bought on ebay yesterday").is_none());
        assert_eq!(directory.detect("BAY: transfer complete").unwrap().code, "BAY");
    }

    #[test]
    fn test_detect_none() {
        let directory = BankDirectory::thai();
        assert!(directory.detect("hello world").is_none());
    }

    #[test]
    fn test_normalize_names() {
        let directory = BankDirectory::thai();

        assert_eq!(directory.normalize("Krungsri"), Some("BAY"));
        assert_eq!(directory.normalize(" กรุงไทย "), Some("KTB"));
        assert_eq!(directory.normalize("scb"), Some("SCB"));
        assert_eq!(directory.normalize("Nowhere Bank"), None);
    }

    #[test]
    fn test_alias_not_duplicated() {
        let mut bank = Bank::new("SCB", "Siam Commercial Bank");
        bank.add_alias("ไทยพาณิชย์".to_string());
        bank.add_alias("ไทยพาณิชย์".to_string());
        bank.add_alias("SCB".to_string());

        assert_eq!(bank.aliases.len(), 1);
    }

    #[test]
    fn test_find_by_code() {
        let directory = BankDirectory::thai();
        assert_eq!(directory.find("uob").unwrap().name, "United Overseas Bank");
        assert_eq!(directory.count(), 8);
    }
}
