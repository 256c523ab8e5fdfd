//! JSON detail blob persisted in the `quality_gate_details` measure

use super::{EvaluatedCondition, EvaluatedQualityGate, Level};
use serde::Serialize;

#[derive(Serialize)]
struct Details<'a> {
    level: Level,
    conditions: Vec<ConditionDetails<'a>>,
    #[serde(rename = "ignoredConditions")]
    ignored_conditions: bool,
}

#[derive(Serialize)]
struct ConditionDetails<'a> {
    metric: &'a str,
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<&'a str>,
    level: Level,
}

impl<'a> From<&'a EvaluatedCondition> for ConditionDetails<'a> {
    fn from(evaluated: &'a EvaluatedCondition) -> Self {
        let condition = &evaluated.condition;
        ConditionDetails {
            metric: &condition.metric_key,
            op: condition.operator.db_value(),
            period: condition.on_leak.then_some(1),
            warning: condition.warning_threshold.as_deref(),
            error: condition.error_threshold.as_deref(),
            actual: evaluated.actual_value.as_deref(),
            level: evaluated.level,
        }
    }
}

pub fn to_json(gate: &EvaluatedQualityGate) -> serde_json::Result<String> {
    let details = Details {
        level: gate.status,
        conditions: gate.evaluated_conditions.iter().map(Into::into).collect(),
        ignored_conditions: gate.ignored_conditions,
    };
    serde_json::to_string(&details)
}
