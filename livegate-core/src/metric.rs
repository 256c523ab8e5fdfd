//! Metric catalog - keys, value types and the built-in definitions
//!
//! Metric rows are read-only during a pass. Ids are assigned by the store when
//! a metric is registered; `core_metrics()` carries the ids of a fresh
//! database so that tests and the CLI agree on them.

use crate::error::{LiveMeasureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CODE_SMELLS: &str = "code_smells";
pub const BUGS: &str = "bugs";
pub const VULNERABILITIES: &str = "vulnerabilities";
pub const SECURITY_HOTSPOTS: &str = "security_hotspots";
pub const VIOLATIONS: &str = "violations";
pub const BLOCKER_VIOLATIONS: &str = "blocker_violations";
pub const CRITICAL_VIOLATIONS: &str = "critical_violations";
pub const MAJOR_VIOLATIONS: &str = "major_violations";
pub const MINOR_VIOLATIONS: &str = "minor_violations";
pub const INFO_VIOLATIONS: &str = "info_violations";
pub const FALSE_POSITIVE_ISSUES: &str = "false_positive_issues";
pub const WONT_FIX_ISSUES: &str = "wont_fix_issues";
pub const OPEN_ISSUES: &str = "open_issues";
pub const REOPENED_ISSUES: &str = "reopened_issues";
pub const CONFIRMED_ISSUES: &str = "confirmed_issues";
pub const TECHNICAL_DEBT: &str = "sqale_index";
pub const RELIABILITY_REMEDIATION_EFFORT: &str = "reliability_remediation_effort";
pub const SECURITY_REMEDIATION_EFFORT: &str = "security_remediation_effort";
pub const SQALE_DEBT_RATIO: &str = "sqale_debt_ratio";
pub const SQALE_RATING: &str = "sqale_rating";
pub const EFFORT_TO_REACH_MAINTAINABILITY_RATING_A: &str =
    "effort_to_reach_maintainability_rating_a";
pub const RELIABILITY_RATING: &str = "reliability_rating";
pub const SECURITY_RATING: &str = "security_rating";
pub const DEVELOPMENT_COST: &str = "development_cost";

pub const NEW_CODE_SMELLS: &str = "new_code_smells";
pub const NEW_BUGS: &str = "new_bugs";
pub const NEW_VULNERABILITIES: &str = "new_vulnerabilities";
pub const NEW_SECURITY_HOTSPOTS: &str = "new_security_hotspots";
pub const NEW_VIOLATIONS: &str = "new_violations";
pub const NEW_BLOCKER_VIOLATIONS: &str = "new_blocker_violations";
pub const NEW_CRITICAL_VIOLATIONS: &str = "new_critical_violations";
pub const NEW_MAJOR_VIOLATIONS: &str = "new_major_violations";
pub const NEW_MINOR_VIOLATIONS: &str = "new_minor_violations";
pub const NEW_INFO_VIOLATIONS: &str = "new_info_violations";
pub const NEW_TECHNICAL_DEBT: &str = "new_technical_debt";
pub const NEW_RELIABILITY_REMEDIATION_EFFORT: &str = "new_reliability_remediation_effort";
pub const NEW_SECURITY_REMEDIATION_EFFORT: &str = "new_security_remediation_effort";
pub const NEW_RELIABILITY_RATING: &str = "new_reliability_rating";
pub const NEW_SECURITY_RATING: &str = "new_security_rating";
pub const NEW_SQALE_DEBT_RATIO: &str = "new_sqale_debt_ratio";
pub const NEW_MAINTAINABILITY_RATING: &str = "new_maintainability_rating";
pub const NEW_DEVELOPMENT_COST: &str = "new_development_cost";

pub const ALERT_STATUS: &str = "alert_status";
pub const QUALITY_GATE_DETAILS: &str = "quality_gate_details";

/// Storage type of a metric's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Int,
    Float,
    Percent,
    Bool,
    String,
    Millisec,
    Data,
    Level,
    Distrib,
    Rating,
    WorkDur,
}

impl ValueType {
    const NAMES: [(ValueType, &'static str); 11] = [
        (ValueType::Int, "INT"),
        (ValueType::Float, "FLOAT"),
        (ValueType::Percent, "PERCENT"),
        (ValueType::Bool, "BOOL"),
        (ValueType::String, "STRING"),
        (ValueType::Millisec, "MILLISEC"),
        (ValueType::Data, "DATA"),
        (ValueType::Level, "LEVEL"),
        (ValueType::Distrib, "DISTRIB"),
        (ValueType::Rating, "RATING"),
        (ValueType::WorkDur, "WORK_DUR"),
    ];

    pub fn as_str(self) -> &'static str {
        ValueType::NAMES
            .iter()
            .find(|(vt, _)| *vt == self)
            .map_or("", |(_, name)| name)
    }

    pub fn parse(name: &str) -> Option<Self> {
        ValueType::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(vt, _)| *vt)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric definition as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Metric {
    pub id: i64,
    pub key: String,
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_scale: Option<u32>,
}

impl Metric {
    pub fn new(id: i64, key: &str, value_type: ValueType) -> Self {
        let decimal_scale = match value_type {
            ValueType::Float | ValueType::Percent => Some(1),
            _ => None,
        };
        Metric {
            id,
            key: key.to_string(),
            value_type,
            best_value: None,
            decimal_scale,
        }
    }

    pub fn with_best_value(mut self, best_value: f64) -> Self {
        self.best_value = Some(best_value);
        self
    }
}

/// Lookup of metric definitions by key and by id
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    by_key: HashMap<String, Metric>,
    keys_by_id: HashMap<i64, String>,
}

impl MetricCatalog {
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut catalog = MetricCatalog::default();
        for metric in metrics {
            catalog.keys_by_id.insert(metric.id, metric.key.clone());
            catalog.by_key.insert(metric.key.clone(), metric);
        }
        catalog
    }

    pub fn get(&self, key: &str) -> Result<&Metric> {
        self.by_key
            .get(key)
            .ok_or_else(|| LiveMeasureError::MetricNotRegistered(key.to_string()))
    }

    pub fn get_by_id(&self, id: i64) -> Option<&Metric> {
        self.keys_by_id.get(&id).and_then(|k| self.by_key.get(k))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.by_key.values()
    }
}

/// Built-in metric definitions, numbered from 1 in declaration order
pub fn core_metrics() -> Vec<Metric> {
    use ValueType::{Data, Float, Int, Level, Percent, Rating, WorkDur};

    let definitions: [(&str, ValueType, Option<f64>); 46] = [
        (CODE_SMELLS, Int, Some(0.0)),
        (BUGS, Int, Some(0.0)),
        (VULNERABILITIES, Int, Some(0.0)),
        (SECURITY_HOTSPOTS, Int, Some(0.0)),
        (VIOLATIONS, Int, Some(0.0)),
        (BLOCKER_VIOLATIONS, Int, Some(0.0)),
        (CRITICAL_VIOLATIONS, Int, Some(0.0)),
        (MAJOR_VIOLATIONS, Int, Some(0.0)),
        (MINOR_VIOLATIONS, Int, Some(0.0)),
        (INFO_VIOLATIONS, Int, Some(0.0)),
        (FALSE_POSITIVE_ISSUES, Int, Some(0.0)),
        (WONT_FIX_ISSUES, Int, Some(0.0)),
        (OPEN_ISSUES, Int, None),
        (REOPENED_ISSUES, Int, None),
        (CONFIRMED_ISSUES, Int, Some(0.0)),
        (TECHNICAL_DEBT, WorkDur, Some(0.0)),
        (RELIABILITY_REMEDIATION_EFFORT, WorkDur, Some(0.0)),
        (SECURITY_REMEDIATION_EFFORT, WorkDur, Some(0.0)),
        (SQALE_DEBT_RATIO, Percent, Some(0.0)),
        (SQALE_RATING, Rating, Some(1.0)),
        (EFFORT_TO_REACH_MAINTAINABILITY_RATING_A, WorkDur, Some(0.0)),
        (RELIABILITY_RATING, Rating, Some(1.0)),
        (SECURITY_RATING, Rating, Some(1.0)),
        (DEVELOPMENT_COST, ValueType::String, None),
        (NEW_CODE_SMELLS, Int, Some(0.0)),
        (NEW_BUGS, Int, Some(0.0)),
        (NEW_VULNERABILITIES, Int, Some(0.0)),
        (NEW_SECURITY_HOTSPOTS, Int, Some(0.0)),
        (NEW_VIOLATIONS, Int, Some(0.0)),
        (NEW_BLOCKER_VIOLATIONS, Int, Some(0.0)),
        (NEW_CRITICAL_VIOLATIONS, Int, Some(0.0)),
        (NEW_MAJOR_VIOLATIONS, Int, Some(0.0)),
        (NEW_MINOR_VIOLATIONS, Int, Some(0.0)),
        (NEW_INFO_VIOLATIONS, Int, Some(0.0)),
        (NEW_TECHNICAL_DEBT, WorkDur, Some(0.0)),
        (NEW_RELIABILITY_REMEDIATION_EFFORT, WorkDur, Some(0.0)),
        (NEW_SECURITY_REMEDIATION_EFFORT, WorkDur, Some(0.0)),
        (NEW_RELIABILITY_RATING, Rating, Some(1.0)),
        (NEW_SECURITY_RATING, Rating, Some(1.0)),
        (NEW_SQALE_DEBT_RATIO, Percent, Some(0.0)),
        (NEW_MAINTAINABILITY_RATING, Rating, Some(1.0)),
        (NEW_DEVELOPMENT_COST, Float, None),
        (ALERT_STATUS, Level, None),
        (QUALITY_GATE_DETAILS, Data, None),
        ("ncloc", Int, None),
        ("coverage", Percent, Some(100.0)),
    ];

    definitions
        .iter()
        .zip(1..)
        .map(|((key, value_type, best_value), id)| Metric {
            best_value: *best_value,
            ..Metric::new(id, key, *value_type)
        })
        .collect()
}
