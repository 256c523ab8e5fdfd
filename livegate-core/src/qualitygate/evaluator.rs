//! Condition evaluation against the project row of a measure matrix

use super::{Condition, EvaluatedCondition, EvaluatedQualityGate, Level, Operator, QualityGate};
use crate::error::{LiveMeasureError, Result};
use crate::matrix::{LiveMeasure, MeasureMatrix};
use crate::metric::{Metric, ValueType};
use std::cmp::Ordering;

/// A measure value or threshold, typed after the metric
#[derive(Debug, Clone, PartialEq)]
enum Comparable {
    Integer(i64),
    Double(f64),
    Text(String),
}

impl Comparable {
    fn compare(&self, other: &Comparable) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Integer(a), Comparable::Integer(b)) => Some(a.cmp(b)),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Text(a), Comparable::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Comparable::Integer(v) => v.to_string(),
            Comparable::Double(v) => format!("{:?}", v),
            Comparable::Text(v) => v.clone(),
        }
    }
}

pub fn evaluate(
    gate: &QualityGate,
    matrix: &MeasureMatrix,
    project_uuid: &str,
) -> Result<EvaluatedQualityGate> {
    let mut evaluated_conditions = gate
        .conditions
        .iter()
        .map(|condition| {
            let metric = matrix.metric(&condition.metric_key)?;
            let measure = matrix.get_measure(project_uuid, &condition.metric_key)?;
            evaluate_condition(condition, metric, measure)
        })
        .collect::<Result<Vec<_>>>()?;
    evaluated_conditions.sort_by(|a, b| a.condition.metric_key.cmp(&b.condition.metric_key));

    let status = evaluated_conditions
        .iter()
        .map(|c| c.level)
        .max()
        .unwrap_or(Level::Ok);

    Ok(EvaluatedQualityGate {
        quality_gate: gate.clone(),
        status,
        evaluated_conditions,
        ignored_conditions: false,
    })
}

/// Error threshold first, then warning threshold, else OK
pub fn evaluate_condition(
    condition: &Condition,
    metric: &Metric,
    measure: Option<&LiveMeasure>,
) -> Result<EvaluatedCondition> {
    let value = match measure {
        Some(measure) => measure_value(condition, metric, measure)?,
        None => None,
    };
    let Some(value) = value else {
        return Ok(EvaluatedCondition {
            condition: condition.clone(),
            level: Level::Ok,
            actual_value: None,
        });
    };

    let level = if reaches(condition, metric, &value, condition.error_threshold.as_deref())? {
        Level::Error
    } else if reaches(condition, metric, &value, condition.warning_threshold.as_deref())? {
        Level::Warn
    } else {
        Level::Ok
    };

    Ok(EvaluatedCondition {
        condition: condition.clone(),
        level,
        actual_value: Some(value.render()),
    })
}

fn reaches(
    condition: &Condition,
    metric: &Metric,
    value: &Comparable,
    threshold: Option<&str>,
) -> Result<bool> {
    let Some(threshold) = threshold else {
        return Ok(false);
    };
    let threshold = parse_threshold(condition, metric, threshold)?;
    let Some(ordering) = value.compare(&threshold) else {
        return Ok(false);
    };
    Ok(match condition.operator {
        Operator::Equals => ordering == Ordering::Equal,
        Operator::NotEquals => ordering != Ordering::Equal,
        Operator::GreaterThan => ordering == Ordering::Greater,
        Operator::LessThan => ordering == Ordering::Less,
    })
}

fn measure_value(
    condition: &Condition,
    metric: &Metric,
    measure: &LiveMeasure,
) -> Result<Option<Comparable>> {
    if condition.on_leak {
        return match metric.value_type {
            ValueType::Level | ValueType::String => Err(unsupported(metric)),
            value_type => numeric(metric, value_type, measure.variation),
        };
    }
    match metric.value_type {
        ValueType::Level | ValueType::String => {
            Ok(measure.text_value.clone().map(Comparable::Text))
        }
        value_type => numeric(metric, value_type, measure.value),
    }
}

fn numeric(metric: &Metric, value_type: ValueType, value: Option<f64>) -> Result<Option<Comparable>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value_type {
        ValueType::Bool
        | ValueType::Int
        | ValueType::Rating
        | ValueType::Millisec
        | ValueType::WorkDur => Ok(Some(Comparable::Integer(value as i64))),
        ValueType::Float | ValueType::Percent => Ok(Some(Comparable::Double(value))),
        _ => Err(unsupported(metric)),
    }
}

fn parse_threshold(condition: &Condition, metric: &Metric, threshold: &str) -> Result<Comparable> {
    let invalid = || LiveMeasureError::InvalidThreshold {
        metric: condition.metric_key.clone(),
        threshold: threshold.to_string(),
    };
    match metric.value_type {
        ValueType::Bool => threshold
            .parse::<i64>()
            .map(Comparable::Integer)
            .map_err(|_| invalid()),
        ValueType::Int | ValueType::Rating | ValueType::Millisec | ValueType::WorkDur => {
            let integer_part = threshold.split('.').next().unwrap_or(threshold);
            integer_part
                .parse::<i64>()
                .map(Comparable::Integer)
                .map_err(|_| invalid())
        }
        ValueType::Float | ValueType::Percent => threshold
            .parse::<f64>()
            .map(Comparable::Double)
            .map_err(|_| invalid()),
        ValueType::Level | ValueType::String => Ok(Comparable::Text(threshold.to_string())),
        _ => Err(unsupported(metric)),
    }
}

fn unsupported(metric: &Metric) -> LiveMeasureError {
    LiveMeasureError::UnsupportedValueType {
        metric: metric.key.clone(),
        value_type: metric.value_type.to_string(),
    }
}
