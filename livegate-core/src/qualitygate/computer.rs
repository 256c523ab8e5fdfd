//! Loads the gate that applies to a project and refreshes its status measures

use super::{details, evaluator, Condition, EvaluatedQualityGate, Operator, QualityGate};
use crate::component::{Branch, Component};
use crate::error::LiveMeasureError;
use crate::matrix::MeasureMatrix;
use crate::metric::{self, MetricCatalog};
use crate::store::LiveMeasureStore;
use anyhow::{Context, Result};
use std::collections::BTreeSet;

#[derive(Debug, Default, Clone, Copy)]
pub struct LiveQualityGateComputer;

impl LiveQualityGateComputer {
    pub fn new() -> Self {
        LiveQualityGateComputer
    }

    /// Short-lived branches and pull requests get the built-in gate; other
    /// branches use the gate of their main project
    pub fn load_quality_gate(
        &self,
        store: &dyn LiveMeasureStore,
        project: &Component,
        branch: &Branch,
    ) -> Result<QualityGate> {
        if branch.branch_type.is_short_lived() {
            return Ok(QualityGate::short_living_branches());
        }

        let gate_project_uuid = project.gate_project_uuid();
        let gate = store
            .select_quality_gate_for_project(gate_project_uuid)
            .with_context(|| format!("Failed to load quality gate of project {}", gate_project_uuid))?
            .ok_or_else(|| LiveMeasureError::QualityGateNotFound(gate_project_uuid.to_string()))?;

        let rows = store
            .select_conditions(gate.id)
            .with_context(|| format!("Failed to load conditions of quality gate {}", gate.name))?;
        let metric_ids: Vec<i64> = rows
            .iter()
            .map(|r| r.metric_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let metrics = MetricCatalog::new(store.select_metrics_by_ids(&metric_ids)?);

        let conditions = rows
            .iter()
            .map(|row| {
                let metric = metrics.get_by_id(row.metric_id).ok_or_else(|| {
                    LiveMeasureError::MetricNotRegistered(format!("#{}", row.metric_id))
                })?;
                Ok(Condition::new(
                    &metric.key,
                    Operator::from_db_value(&row.operator)?,
                    row.error_threshold.as_deref(),
                    row.warning_threshold.as_deref(),
                    row.period == Some(1),
                ))
            })
            .collect::<Result<Vec<_>, LiveMeasureError>>()?;

        Ok(QualityGate {
            id: gate.id.to_string(),
            name: gate.name,
            conditions,
        })
    }

    /// Evaluates the gate on the project row and writes status and details
    pub fn refresh_gate_status(
        &self,
        project: &Component,
        gate: &QualityGate,
        matrix: &mut MeasureMatrix,
    ) -> Result<EvaluatedQualityGate> {
        let evaluated = evaluator::evaluate(gate, matrix, &project.uuid)?;
        matrix.set_text(project, metric::ALERT_STATUS, evaluated.status.as_str())?;
        let json = details::to_json(&evaluated).context("Failed to serialize quality gate details")?;
        matrix.set_text(project, metric::QUALITY_GATE_DETAILS, &json)?;
        Ok(evaluated)
    }

    pub fn metrics_related_to(&self, gate: &QualityGate) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = gate
            .conditions
            .iter()
            .map(|c| c.metric_key.clone())
            .collect();
        keys.insert(metric::ALERT_STATUS.to_string());
        keys.insert(metric::QUALITY_GATE_DETAILS.to_string());
        keys
    }
}
