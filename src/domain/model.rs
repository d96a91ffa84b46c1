use crate::utils::error::{Result, StockError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Normalized (trimmed, lower-cased) service name. Safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim().to_lowercase();
        let invalid = |reason: &str| StockError::InvalidServiceName {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if name.contains(['/', '\\']) {
            return Err(invalid("name cannot contain path separators"));
        }
        if name.starts_with('.') {
            return Err(invalid("name cannot start with '.'"));
        }
        if name.chars().any(char::is_control) {
            return Err(invalid("name cannot contain control characters"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = StockError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ServiceName> for String {
    fn from(value: ServiceName) -> Self {
        value.0
    }
}

/// One withdrawable line of stock.
pub type Record = String;

/// Split a text block into records, dropping blank and whitespace-only lines.
pub fn parse_records(block: &str) -> Vec<Record> {
    block
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn render_records(records: &[Record]) -> String {
    if records.is_empty() {
        return String::new();
    }
    let mut out = records.join("\n");
    out.push('\n');
    out
}

/// Maximum batch size a grant allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quota {
    Unlimited,
    Limited(usize),
}

impl Quota {
    pub fn permits(&self, count: usize) -> bool {
        match self {
            Quota::Unlimited => true,
            Quota::Limited(max) => count <= *max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub allowed: bool,
    pub max_withdraw: Quota,
    pub cooldown: Duration,
    /// Name of the tier that matched, `None` for the owner or a denial.
    pub tier: Option<String>,
}

impl AccessGrant {
    pub fn owner() -> Self {
        Self {
            allowed: true,
            max_withdraw: Quota::Unlimited,
            cooldown: Duration::ZERO,
            tier: None,
        }
    }

    pub fn denied() -> Self {
        Self {
            allowed: false,
            max_withdraw: Quota::Limited(0),
            cooldown: Duration::ZERO,
            tier: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStock {
    pub service: ServiceName,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReport {
    pub services: Vec<ServiceStock>,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockOutcome {
    pub added: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_normalizes() {
        let name = ServiceName::parse("  NetFlix ").unwrap();
        assert_eq!(name.as_str(), "netflix");
    }

    #[test]
    fn test_service_name_rejects_escapes() {
        assert!(ServiceName::parse("").is_err());
        assert!(ServiceName::parse("   ").is_err());
        assert!(ServiceName::parse("../etc").is_err());
        assert!(ServiceName::parse("a/b").is_err());
        assert!(ServiceName::parse("a\\b").is_err());
        assert!(ServiceName::parse(".hidden").is_err());
        assert!(ServiceName::parse("a\nb").is_err());
    }

    #[test]
    fn test_parse_records_drops_blank_lines() {
        assert_eq!(parse_records("a\n\nb\n"), vec!["a", "b"]);
        assert_eq!(parse_records("a\r\n   \r\nb"), vec!["a", "b"]);
        assert!(parse_records("\n \n\t\n").is_empty());
    }

    #[test]
    fn test_parse_records_strips_lone_carriage_return() {
        assert_eq!(parse_records("a\r\nb\r"), vec!["a", "b"]);
        assert_eq!(parse_records("x\r\r\n"), vec!["x"]);
    }

    #[test]
    fn test_render_records() {
        assert_eq!(render_records(&[]), "");
        assert_eq!(
            render_records(&["a".to_string(), "b".to_string()]),
            "a\nb\n"
        );
    }

    #[test]
    fn test_quota_permits() {
        assert!(Quota::Unlimited.permits(usize::MAX));
        assert!(Quota::Limited(3).permits(3));
        assert!(!Quota::Limited(3).permits(4));
    }
}
