// ⚙️ Configuration - Rules as Data
// JSON file + environment overrides; every section has a built-in default

use crate::admission::{DEFAULT_MAX_EVENTS, DEFAULT_WINDOW_MS};
use crate::deduplication::DEFAULT_DUPLICATE_WINDOW_MS;
use crate::error::ConfigError;
use crate::ocr::{default_logo_regions, LogoRegion};
use crate::rules::{default_rule_specs, RuleSpec, RuleTable};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const ENV_MAX_EVENTS: &str = "PAYNOTIFY_MAX_EVENTS";
pub const ENV_WINDOW_MS: &str = "PAYNOTIFY_WINDOW_MS";
pub const ENV_DUPLICATE_WINDOW_MS: &str = "PAYNOTIFY_DUPLICATE_WINDOW_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_events")]
    pub max_events: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_max_events() -> u32 {
    DEFAULT_MAX_EVENTS
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_duplicate_window_ms() -> u64 {
    DEFAULT_DUPLICATE_WINDOW_MS
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_events: DEFAULT_MAX_EVENTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rule_specs")]
    pub rules: Vec<RuleSpec>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default = "default_duplicate_window_ms")]
    pub duplicate_window_ms: u64,

    /// Sources the listener accepts; empty accepts everything
    #[serde(default = "default_monitored_sources")]
    pub monitored_sources: Vec<String>,

    #[serde(default = "default_logo_regions")]
    pub logo_regions: Vec<LogoRegion>,
}

/// Banking apps plus the messaging apps used for testing
pub fn default_monitored_sources() -> Vec<String> {
    let mut sources: Vec<String> = default_rule_specs()
        .into_iter()
        .map(|spec| spec.source.to_string())
        .collect();
    sources.push("com.google.android.gm".to_string());
    sources.push("com.whatsapp".to_string());
    sources
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            rules: default_rule_specs(),
            rate_limit: RateLimitConfig::default(),
            duplicate_window_ms: DEFAULT_DUPLICATE_WINDOW_MS,
            monitored_sources: default_monitored_sources(),
            logo_regions: default_logo_regions(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file; missing sections take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path.as_ref()))?;

        Ok(config)
    }

    /// Defaults, or the file when one is given, then env overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override numeric settings from `lookup` (normally the process environment)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_EVENTS) {
            self.rate_limit.max_events = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got {:?}", ENV_MAX_EVENTS, value))?;
        }
        if let Some(value) = lookup(ENV_WINDOW_MS) {
            self.rate_limit.window_ms = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got {:?}", ENV_WINDOW_MS, value))?;
        }
        if let Some(value) = lookup(ENV_DUPLICATE_WINDOW_MS) {
            self.duplicate_window_ms = value.trim().parse().with_context(|| {
                format!("{} must be an integer, got {:?}", ENV_DUPLICATE_WINDOW_MS, value)
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_events == 0 {
            return Err(ConfigError::InvalidRateLimit("max_events must be at least 1".to_string()));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(ConfigError::InvalidRateLimit("window_ms must be at least 1".to_string()));
        }
        if self.duplicate_window_ms > self.rate_limit.window_ms {
            return Err(ConfigError::DuplicateWindowTooLong {
                duplicate_ms: self.duplicate_window_ms,
                window_ms: self.rate_limit.window_ms,
            });
        }
        for region in &self.logo_regions {
            region.validate()?;
        }
        Ok(())
    }

    /// Compile the configured rules
    pub fn rule_table(&self) -> Result<RuleTable, ConfigError> {
        RuleTable::from_specs(&self.rules)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.rate_limit.max_events, 10);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert!(config.monitored_sources.contains(&"com.whatsapp".to_string()));
        assert!(config.validate().is_ok());
        assert_eq!(config.rule_table().unwrap().len(), config.rules.len());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "rules": [{{
                    "source": "BANK_A",
                    "bank_name": "BANK_A",
                    "amount_pattern": "เงินเข้า ([\\d,.]+)",
                    "account_pattern": "บัญชี ([\\d-]+)",
                    "sender_pattern": "จาก (\\S+)"
                }}],
                "rate_limit": {{ "max_events": 3 }}
            }}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rate_limit.max_events, 3);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.duplicate_window_ms, DEFAULT_DUPLICATE_WINDOW_MS);
        assert!(config.rule_table().unwrap().lookup("BANK_A").is_some());
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_from_file_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(AppConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_MAX_EVENTS, "25"), (ENV_DUPLICATE_WINDOW_MS, " 1000 ")]
            .into_iter()
            .collect();
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rate_limit.max_events, 25);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.duplicate_window_ms, 1_000);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| (key == ENV_WINDOW_MS).then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = AppConfig::default();
        config.rate_limit.max_events = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRateLimit(_))));
    }

    #[test]
    fn test_validate_rejects_long_duplicate_window() {
        let mut config = AppConfig::default();
        config.duplicate_window_ms = config.rate_limit.window_ms + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateWindowTooLong { .. })
        ));
    }

    #[test]
    fn test_duplicate_rules_fail_at_build() {
        let mut config = AppConfig::default();
        config.rules.push(config.rules[0].clone());
        assert!(matches!(config.rule_table(), Err(ConfigError::DuplicateSource(_))));
    }
}
