//! Issue vocabulary shared by the counter, the formulas and the store
//!
//! Issues never reach the engine one by one: the store hands over rows that
//! are already grouped by type, severity, resolution, status and leak flag.

use serde::{Deserialize, Serialize};

pub const RESOLUTION_FIXED: &str = "FIXED";
pub const RESOLUTION_FALSE_POSITIVE: &str = "FALSE-POSITIVE";
pub const RESOLUTION_WONT_FIX: &str = "WONTFIX";
pub const RESOLUTION_REMOVED: &str = "REMOVED";

pub const STATUS_OPEN: &str = "OPEN";
pub const STATUS_CONFIRMED: &str = "CONFIRMED";
pub const STATUS_REOPENED: &str = "REOPENED";
pub const STATUS_RESOLVED: &str = "RESOLVED";
pub const STATUS_CLOSED: &str = "CLOSED";

/// Kind of rule that raised an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    CodeSmell,
    Bug,
    Vulnerability,
    SecurityHotspot,
}

impl RuleType {
    /// Integer code used in the issues table
    pub fn db_constant(self) -> i64 {
        match self {
            RuleType::CodeSmell => 1,
            RuleType::Bug => 2,
            RuleType::Vulnerability => 3,
            RuleType::SecurityHotspot => 4,
        }
    }

    pub fn from_db_constant(code: i64) -> Option<Self> {
        match code {
            1 => Some(RuleType::CodeSmell),
            2 => Some(RuleType::Bug),
            3 => Some(RuleType::Vulnerability),
            4 => Some(RuleType::SecurityHotspot),
            _ => None,
        }
    }
}

/// Issue severity, declared from lowest to highest so that `Ord` follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Minor,
        Severity::Major,
        Severity::Critical,
        Severity::Blocker,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Critical => "CRITICAL",
            Severity::Blocker => "BLOCKER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Severity::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-aggregated issue statistics for one component subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IssueGroup {
    pub rule_type: RuleType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub status: String,
    pub effort: f64,
    pub count: u64,
    pub in_leak: bool,
}

impl IssueGroup {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
