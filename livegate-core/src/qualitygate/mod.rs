//! Quality gates - condition model, evaluation and the live gate computer
//!
//! Global invariants enforced:
//! - Gates are evaluated against the project row of the matrix only
//! - Overall status is the worst condition status (ERROR > WARN > OK)
//! - Evaluated conditions are ordered by metric key

mod computer;
mod details;
mod evaluator;

pub use computer::LiveQualityGateComputer;
pub use details::to_json;
pub use evaluator::{evaluate, evaluate_condition};

use crate::error::{LiveMeasureError, Result};
use crate::metric;
use serde::{Deserialize, Serialize};

/// Id of the built-in gate applied to short-lived branches and pull requests
pub const SHORT_LIVING_BRANCHES_GATE_ID: &str = "-1";
pub const SHORT_LIVING_BRANCHES_GATE_NAME: &str = "Hardcoded short living branch quality gate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "EQ")]
    Equals,
    #[serde(rename = "NE")]
    NotEquals,
    #[serde(rename = "GT")]
    GreaterThan,
    #[serde(rename = "LT")]
    LessThan,
}

impl Operator {
    pub fn db_value(self) -> &'static str {
        match self {
            Operator::Equals => "EQ",
            Operator::NotEquals => "NE",
            Operator::GreaterThan => "GT",
            Operator::LessThan => "LT",
        }
    }

    pub fn from_db_value(value: &str) -> Result<Self> {
        match value {
            "EQ" => Ok(Operator::Equals),
            "NE" => Ok(Operator::NotEquals),
            "GT" => Ok(Operator::GreaterThan),
            "LT" => Ok(Operator::LessThan),
            other => Err(LiveMeasureError::UnknownOperator(other.to_string())),
        }
    }
}

/// Evaluation status, declared from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Ok,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "OK" => Ok(Level::Ok),
            "WARN" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            other => Err(LiveMeasureError::UnknownLevel(other.to_string())),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Condition {
    pub metric_key: String,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<String>,
    pub on_leak: bool,
}

impl Condition {
    /// Blank thresholds are treated as absent
    pub fn new(
        metric_key: &str,
        operator: Operator,
        error_threshold: Option<&str>,
        warning_threshold: Option<&str>,
        on_leak: bool,
    ) -> Self {
        let non_blank = |t: Option<&str>| {
            t.map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        Condition {
            metric_key: metric_key.to_string(),
            operator,
            error_threshold: non_blank(error_threshold),
            warning_threshold: non_blank(warning_threshold),
            on_leak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityGate {
    pub id: String,
    pub name: String,
    pub conditions: Vec<Condition>,
}

impl QualityGate {
    /// Gate applied to short-lived branches and pull requests
    pub fn short_living_branches() -> Self {
        let no_issue = |key: &str| Condition::new(key, Operator::GreaterThan, Some("0"), None, false);
        QualityGate {
            id: SHORT_LIVING_BRANCHES_GATE_ID.to_string(),
            name: SHORT_LIVING_BRANCHES_GATE_NAME.to_string(),
            conditions: vec![
                no_issue(metric::BUGS),
                no_issue(metric::VULNERABILITIES),
                no_issue(metric::CODE_SMELLS),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluatedCondition {
    pub condition: Condition,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluatedQualityGate {
    pub quality_gate: QualityGate,
    pub status: Level,
    pub evaluated_conditions: Vec<EvaluatedCondition>,
    pub ignored_conditions: bool,
}
