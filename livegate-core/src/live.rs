//! Live measure computer - refreshes issue measures and the quality gate of
//! the projects owning a set of touched components
//!
//! Global invariants enforced:
//! - Projects are independent units of work, processed one after the other
//! - A failing formula aborts its project before anything is persisted
//! - Live measures never roll child values up into parents
//! - Changed cells are persisted in (component uuid, metric id) order

use crate::component::{Analysis, Branch, BranchType, Component};
use crate::config::ResolvedConfig;
use crate::counter::IssueCounter;
use crate::error::LiveMeasureError;
use crate::formula::{
    DefaultFormulaFactory, FormulaContext, FormulaValue, IssueMetricFormula,
    IssueMetricFormulaFactory,
};
use crate::matrix::{compare_measures, LiveMeasure, MeasureMatrix};
use crate::metric::{self, Metric};
use crate::qualitygate::{EvaluatedQualityGate, Level, LiveQualityGateComputer};
use crate::store::{IndexingCause, LiveMeasureStore, ProjectIndexer};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, trace};

/// Outcome of a refreshed project, handed to notification collaborators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityGateChangeEvent {
    pub project: Component,
    pub branch: Branch,
    pub analysis: Analysis,
    pub config: ResolvedConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<Level>,
    pub evaluated_gate: EvaluatedQualityGate,
}

impl QualityGateChangeEvent {
    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.evaluated_gate.status)
    }
}

pub struct LiveMeasureComputer<F: IssueMetricFormulaFactory = DefaultFormulaFactory> {
    formula_factory: F,
    gate_computer: LiveQualityGateComputer,
    config: ResolvedConfig,
}

impl LiveMeasureComputer<DefaultFormulaFactory> {
    pub fn with_default_formulas(config: ResolvedConfig) -> Self {
        LiveMeasureComputer::new(DefaultFormulaFactory::new(), config)
    }
}

impl<F: IssueMetricFormulaFactory> LiveMeasureComputer<F> {
    pub fn new(formula_factory: F, config: ResolvedConfig) -> Self {
        LiveMeasureComputer {
            formula_factory,
            gate_computer: LiveQualityGateComputer::new(),
            config,
        }
    }

    /// Recomputes the projects owning `components`
    ///
    /// Returns one event per refreshed project; projects without analysis
    /// are skipped. Persistence goes through `store` and is left uncommitted.
    pub fn refresh(
        &self,
        store: &mut dyn LiveMeasureStore,
        indexer: &mut dyn ProjectIndexer,
        components: &[Component],
    ) -> Result<Vec<QualityGateChangeEvent>> {
        let mut by_project: BTreeMap<&str, Vec<&Component>> = BTreeMap::new();
        for component in components {
            by_project
                .entry(component.project_uuid.as_str())
                .or_default()
                .push(component);
        }

        let mut events = Vec::new();
        for (project_uuid, touched) in by_project {
            let event = self
                .refresh_project(store, indexer, &touched)
                .with_context(|| format!("Failed to refresh live measures of project {}", project_uuid))?;
            events.extend(event);
        }
        Ok(events)
    }

    fn refresh_project(
        &self,
        store: &mut dyn LiveMeasureStore,
        indexer: &mut dyn ProjectIndexer,
        touched: &[&Component],
    ) -> Result<Option<QualityGateChangeEvent>> {
        let components = load_tree(store, touched)?;
        let project = find_project(&components)?.clone();
        let branch = store
            .select_branch(&project.uuid)?
            .ok_or_else(|| LiveMeasureError::BranchNotFound(project.uuid.clone()))?;

        let Some(analysis) = store.select_last_analysis(&project.uuid)? else {
            debug!(project = %project.key, "Project has no analysis yet, skipping");
            return Ok(None);
        };

        let gate = self
            .gate_computer
            .load_quality_gate(&*store, &project, &branch)?;
        let metric_keys = self.involved_metric_keys(&self.gate_computer.metrics_related_to(&gate));
        let metrics = store
            .select_metrics_by_keys(&metric_keys)
            .context("Failed to load metrics")?;
        let metric_ids: Vec<i64> = metrics.iter().map(|m| m.id).collect();
        let component_uuids: Vec<String> = components.iter().map(|c| c.uuid.clone()).collect();
        let measures = store
            .select_measures(&component_uuids, &metric_ids)
            .context("Failed to load live measures")?;
        let previous_status = load_previous_status(&project, &metrics, &measures)?;

        let leak_cutoff = beginning_of_leak_period(&analysis, &branch);
        debug!(
            project = %project.key,
            branch = %branch.key,
            components = components.len(),
            leak_cutoff,
            "Refreshing live measures"
        );

        let mut matrix = MeasureMatrix::new(components.iter().cloned(), metrics, measures)?;
        for component in &components {
            let groups = store
                .select_issue_groups(component, leak_cutoff)
                .with_context(|| format!("Failed to load issues of {}", component.key))?;
            let counter = IssueCounter::new(&groups);
            for formula in self.formula_factory.formulas() {
                if formula.on_leak && leak_cutoff == i64::MAX {
                    continue;
                }
                self.apply_formula(&mut matrix, component, formula, &counter)
                    .map_err(|source| LiveMeasureError::FormulaFailed {
                        metric: formula.metric.to_string(),
                        component: component.key.clone(),
                        source: Box::new(source),
                    })?;
            }
        }

        let evaluated_gate = self
            .gate_computer
            .refresh_gate_status(&project, &gate, &mut matrix)?;

        let mut changed: Vec<&LiveMeasure> = matrix.get_changed().collect();
        changed.sort_by(|a, b| compare_measures(a, b));
        for measure in &changed {
            store.upsert_measure(measure).with_context(|| {
                format!(
                    "Failed to persist measure {} of component {}",
                    measure.metric_id, measure.component_uuid
                )
            })?;
        }
        indexer.commit_and_index(&project, IndexingCause::MeasureChange)?;

        info!(
            project = %project.key,
            measures = changed.len(),
            status = %evaluated_gate.status,
            "Live measures refreshed"
        );

        Ok(Some(QualityGateChangeEvent {
            project,
            branch,
            analysis,
            config: self.config.clone(),
            previous_status,
            evaluated_gate,
        }))
    }

    fn apply_formula(
        &self,
        matrix: &mut MeasureMatrix,
        component: &Component,
        formula: &IssueMetricFormula,
        counter: &IssueCounter,
    ) -> Result<(), LiveMeasureError> {
        let value = {
            let row = matrix.row(&component.uuid);
            let context =
                FormulaContext::new(component, &self.config.debt_rating_grid, formula, &row);
            formula.compute(&context, counter)?
        };
        match (formula.on_leak, value) {
            (false, FormulaValue::Number(v)) => matrix.set_value(component, formula.metric, v),
            (false, FormulaValue::Rating(r)) => matrix.set_rating(component, formula.metric, r),
            (true, FormulaValue::Number(v)) => matrix.set_leak_value(component, formula.metric, v),
            (true, FormulaValue::Rating(r)) => matrix.set_leak_rating(component, formula.metric, r),
        }
    }

    fn involved_metric_keys(&self, gate_metrics: &BTreeSet<String>) -> Vec<String> {
        let mut keys: BTreeSet<String> = self
            .formula_factory
            .formula_metrics()
            .into_iter()
            .map(str::to_string)
            .collect();
        keys.extend(gate_metrics.iter().cloned());
        keys.into_iter().collect()
    }
}

/// Touched components plus every ancestor up to the project
fn load_tree(store: &dyn LiveMeasureStore, touched: &[&Component]) -> Result<Vec<Component>> {
    let mut uuids = BTreeSet::new();
    for component in touched {
        uuids.insert(component.uuid.clone());
        uuids.extend(component.uuid_path.iter().cloned());
    }
    let uuids: Vec<String> = uuids.into_iter().collect();
    store
        .select_components_by_uuids(&uuids)
        .context("Failed to load component tree")
}

fn find_project(components: &[Component]) -> Result<&Component, LiveMeasureError> {
    components
        .iter()
        .find(|c| c.is_root_project())
        .ok_or_else(|| {
            LiveMeasureError::ProjectNotFound(components.iter().map(|c| c.uuid.clone()).collect())
        })
}

/// Status persisted before this pass; unparsable values count as absent
fn load_previous_status(
    project: &Component,
    metrics: &[Metric],
    measures: &[LiveMeasure],
) -> Result<Option<Level>, LiveMeasureError> {
    let alert_status = metrics
        .iter()
        .find(|m| m.key == metric::ALERT_STATUS)
        .ok_or_else(|| LiveMeasureError::MetricNotRegistered(metric::ALERT_STATUS.to_string()))?;

    let text = measures
        .iter()
        .filter(|m| m.metric_id == alert_status.id && m.component_uuid == project.uuid)
        .find_map(|m| m.text_value.as_deref());

    Ok(text.and_then(|text| match Level::parse(text) {
        Ok(level) => Some(level),
        Err(err) => {
            trace!(value = text, error = %err, "Failed to parse value of metric alert_status");
            None
        }
    }))
}

/// Epoch millis from which issues are new: always for short-lived branches,
/// never when a long-lived branch has no period
fn beginning_of_leak_period(analysis: &Analysis, branch: &Branch) -> i64 {
    match branch.branch_type {
        BranchType::Short | BranchType::PullRequest => 0,
        BranchType::Long => analysis.period_date.unwrap_or(i64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::QUALIFIER_PROJECT;
    use crate::metric::ValueType;

    fn project() -> Component {
        Component {
            uuid: "P1".to_string(),
            key: "my_project".to_string(),
            project_uuid: "P1".to_string(),
            uuid_path: vec![],
            qualifier: QUALIFIER_PROJECT.to_string(),
            main_branch_project_uuid: None,
        }
    }

    fn analysis(period_date: Option<i64>) -> Analysis {
        Analysis {
            uuid: "A1".to_string(),
            project_uuid: "P1".to_string(),
            created_at: 1_000,
            period_date,
        }
    }

    fn branch(branch_type: BranchType) -> Branch {
        Branch {
            uuid: "P1".to_string(),
            project_uuid: "P1".to_string(),
            key: "master".to_string(),
            branch_type,
        }
    }

    fn status(text: &str) -> LiveMeasure {
        LiveMeasure {
            component_uuid: "P1".to_string(),
            project_uuid: "P1".to_string(),
            metric_id: 7,
            value: None,
            text_value: Some(text.to_string()),
            variation: None,
        }
    }

    #[test]
    fn test_beginning_of_leak_period() {
        assert_eq!(beginning_of_leak_period(&analysis(None), &branch(BranchType::Short)), 0);
        assert_eq!(
            beginning_of_leak_period(&analysis(Some(500)), &branch(BranchType::PullRequest)),
            0
        );
        assert_eq!(
            beginning_of_leak_period(&analysis(Some(500)), &branch(BranchType::Long)),
            500
        );
        assert_eq!(
            beginning_of_leak_period(&analysis(None), &branch(BranchType::Long)),
            i64::MAX
        );
    }

    #[test]
    fn test_previous_status() {
        let metrics = vec![Metric::new(7, metric::ALERT_STATUS, ValueType::Level)];
        assert_eq!(
            load_previous_status(&project(), &metrics, &[status("WARN")]).unwrap(),
            Some(Level::Warn)
        );
        assert_eq!(
            load_previous_status(&project(), &metrics, &[status("GREEN")]).unwrap(),
            None
        );
        assert_eq!(load_previous_status(&project(), &metrics, &[]).unwrap(), None);
    }

    #[test]
    fn test_previous_status_requires_alert_status_metric() {
        let err = load_previous_status(&project(), &[], &[]).unwrap_err();
        assert_eq!(err.to_string(), "Metric with key alert_status is not registered");
    }

    #[test]
    fn test_find_project() {
        let mut file = project();
        file.uuid = "F1".to_string();
        file.uuid_path = vec!["P1".to_string()];
        assert!(matches!(
            find_project(std::slice::from_ref(&file)),
            Err(LiveMeasureError::ProjectNotFound(uuids)) if uuids == vec!["F1".to_string()]
        ));
        let components = vec![file, project()];
        assert_eq!(find_project(&components).unwrap().uuid, "P1");
    }
}
