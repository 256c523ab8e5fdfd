//! Domain errors raised while recomputing live measures
//!
//! Storage and configuration failures travel as `anyhow::Error`; the variants
//! below are the invariant violations of the engine itself. They convert into
//! `anyhow::Error` through `?` and can be recovered with `downcast_ref`.

use thiserror::Error;

/// Errors from live measure computation and quality gate evaluation.
#[derive(Debug, Error)]
pub enum LiveMeasureError {
    #[error("Metric with key {0} is not registered")]
    MetricNotRegistered(String),

    #[error("Component {0} is not part of the measure matrix")]
    UnknownComponent(String),

    #[error("Metric {0} is not declared as a dependency")]
    UndeclaredDependency(String),

    #[error("No project found in {0:?}")]
    ProjectNotFound(Vec<String>),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Quality Gate not found for project {0}")]
    QualityGateNotFound(String),

    #[error("Quality Gate: unable to parse threshold '{threshold}' to compare against {metric}")]
    InvalidThreshold { metric: String, threshold: String },

    #[error("Conditions on value type {value_type} are not supported (metric {metric})")]
    UnsupportedValueType { metric: String, value_type: String },

    #[error("Unknown condition operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown quality gate level: {0}")]
    UnknownLevel(String),

    #[error("Invalid rating grid: {0}")]
    InvalidRatingGrid(String),

    #[error("Fail to compute {metric} on {component}")]
    FormulaFailed {
        metric: String,
        component: String,
        #[source]
        source: Box<LiveMeasureError>,
    },
}

pub type Result<T> = std::result::Result<T, LiveMeasureError>;
