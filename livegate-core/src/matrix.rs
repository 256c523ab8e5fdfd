//! Measure matrix - sparse (component x metric) table of live measures
//!
//! Seeded from persisted rows, mutated by formulas and the quality gate, then
//! drained of the cells that actually changed.
//!
//! Global invariants enforced:
//! - One cell per (component uuid, metric key)
//! - Writing a value equal to the current one never marks a cell changed
//! - Numeric writes are rounded half-up to the metric's decimal scale
//! - Cells created during the pass are always reported as changed

use crate::component::Component;
use crate::error::{LiveMeasureError, Result};
use crate::formula::MeasureLookup;
use crate::metric::{Metric, MetricCatalog};
use crate::rating::Rating;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Persisted measure row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LiveMeasure {
    pub component_uuid: String,
    pub project_uuid: String,
    pub metric_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<f64>,
}

impl LiveMeasure {
    fn empty(component: &Component, metric: &Metric) -> Self {
        LiveMeasure {
            component_uuid: component.uuid.clone(),
            project_uuid: component.project_uuid.clone(),
            metric_id: metric.id,
            value: None,
            text_value: None,
            variation: None,
        }
    }
}

/// Persistence order: component uuid, then metric id
pub fn compare_measures(a: &LiveMeasure, b: &LiveMeasure) -> Ordering {
    a.component_uuid
        .cmp(&b.component_uuid)
        .then(a.metric_id.cmp(&b.metric_id))
}

#[derive(Debug, Clone)]
struct MeasureCell {
    measure: LiveMeasure,
    changed: bool,
}

#[derive(Debug)]
pub struct MeasureMatrix {
    components: HashMap<String, Component>,
    metrics: MetricCatalog,
    cells: HashMap<(String, String), MeasureCell>,
}

impl MeasureMatrix {
    pub fn new(
        components: impl IntoIterator<Item = Component>,
        metrics: impl IntoIterator<Item = Metric>,
        measures: impl IntoIterator<Item = LiveMeasure>,
    ) -> Result<Self> {
        let components: HashMap<String, Component> = components
            .into_iter()
            .map(|c| (c.uuid.clone(), c))
            .collect();
        let metrics = MetricCatalog::new(metrics);

        let mut cells = HashMap::new();
        for measure in measures {
            let metric = metrics.get_by_id(measure.metric_id).ok_or_else(|| {
                LiveMeasureError::MetricNotRegistered(format!("#{}", measure.metric_id))
            })?;
            let key = (measure.component_uuid.clone(), metric.key.clone());
            cells.insert(
                key,
                MeasureCell {
                    measure,
                    changed: false,
                },
            );
        }

        Ok(MeasureMatrix {
            components,
            metrics,
            cells,
        })
    }

    pub fn metric(&self, metric_key: &str) -> Result<&Metric> {
        self.metrics.get(metric_key)
    }

    pub fn component(&self, uuid: &str) -> Option<&Component> {
        self.components.get(uuid)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn get_measure(&self, component_uuid: &str, metric_key: &str) -> Result<Option<&LiveMeasure>> {
        self.metric(metric_key)?;
        Ok(self
            .cells
            .get(&(component_uuid.to_string(), metric_key.to_string()))
            .map(|cell| &cell.measure))
    }

    pub fn get_value(&self, component_uuid: &str, metric_key: &str) -> Result<Option<f64>> {
        Ok(self
            .get_measure(component_uuid, metric_key)?
            .and_then(|m| m.value))
    }

    pub fn set_value(&mut self, component: &Component, metric_key: &str, value: f64) -> Result<()> {
        let metric = self.metric(metric_key)?.clone();
        let new_value = scale(&metric, value);
        self.change_cell(component, &metric, |m| {
            let initial_value = m.value;
            if initial_value == Some(new_value) {
                return false;
            }
            m.value = Some(new_value);
            if let (Some(initial), Some(variation)) = (initial_value, m.variation) {
                let leak_initial_value = initial - variation;
                m.variation = Some(scale(&metric, new_value - leak_initial_value));
            }
            true
        })
    }

    /// Stores the index as value and the letter as text
    pub fn set_rating(&mut self, component: &Component, metric_key: &str, rating: Rating) -> Result<()> {
        let metric = self.metric(metric_key)?.clone();
        let new_value = f64::from(rating.index());
        self.change_cell(component, &metric, |m| {
            m.text_value = Some(rating.letter().to_string());
            let initial_value = m.value;
            if initial_value == Some(new_value) {
                return false;
            }
            m.value = Some(new_value);
            if let (Some(initial), Some(variation)) = (initial_value, m.variation) {
                m.variation = Some(new_value - (initial - variation));
            }
            true
        })
    }

    pub fn set_text(&mut self, component: &Component, metric_key: &str, text: &str) -> Result<()> {
        let metric = self.metric(metric_key)?.clone();
        self.change_cell(component, &metric, |m| {
            if m.text_value.as_deref() == Some(text) {
                return false;
            }
            m.text_value = Some(text.to_string());
            true
        })
    }

    pub fn set_leak_value(&mut self, component: &Component, metric_key: &str, value: f64) -> Result<()> {
        let metric = self.metric(metric_key)?.clone();
        let new_variation = scale(&metric, value);
        self.change_cell(component, &metric, |m| {
            if m.variation == Some(new_variation) {
                return false;
            }
            m.variation = Some(new_variation);
            true
        })
    }

    /// Leak ratings keep only the index, in the variation field
    pub fn set_leak_rating(&mut self, component: &Component, metric_key: &str, rating: Rating) -> Result<()> {
        self.set_leak_value(component, metric_key, f64::from(rating.index()))
    }

    /// Cells marked changed, in no particular order
    pub fn get_changed(&self) -> impl Iterator<Item = &LiveMeasure> {
        self.cells
            .values()
            .filter(|cell| cell.changed)
            .map(|cell| &cell.measure)
    }

    /// Read-only view of one component's row, as seen by formulas
    pub fn row<'a>(&'a self, component_uuid: &'a str) -> ComponentMeasures<'a> {
        ComponentMeasures {
            matrix: self,
            component_uuid,
        }
    }

    fn change_cell<F>(&mut self, component: &Component, metric: &Metric, changer: F) -> Result<()>
    where
        F: FnOnce(&mut LiveMeasure) -> bool,
    {
        if !self.components.contains_key(&component.uuid) {
            return Err(LiveMeasureError::UnknownComponent(component.key.clone()));
        }
        let key = (component.uuid.clone(), metric.key.clone());
        match self.cells.get_mut(&key) {
            Some(cell) => {
                if changer(&mut cell.measure) {
                    cell.changed = true;
                }
            }
            None => {
                let mut measure = LiveMeasure::empty(component, metric);
                changer(&mut measure);
                self.cells.insert(
                    key,
                    MeasureCell {
                        measure,
                        changed: true,
                    },
                );
            }
        }
        Ok(())
    }
}

/// Measures of a single component
pub struct ComponentMeasures<'a> {
    matrix: &'a MeasureMatrix,
    component_uuid: &'a str,
}

impl ComponentMeasures<'_> {
    fn measure(&self, metric_key: &str) -> Option<&LiveMeasure> {
        self.matrix
            .get_measure(self.component_uuid, metric_key)
            .ok()
            .flatten()
    }
}

impl MeasureLookup for ComponentMeasures<'_> {
    /// Falls back to the text value for historically textual metrics
    fn value(&self, metric_key: &str) -> Option<f64> {
        let measure = self.measure(metric_key)?;
        measure.value.or_else(|| {
            measure
                .text_value
                .as_deref()
                .and_then(|text| text.trim().parse().ok())
        })
    }

    fn leak_value(&self, metric_key: &str) -> Option<f64> {
        self.measure(metric_key)?.variation
    }
}

fn scale(metric: &Metric, value: f64) -> f64 {
    match metric.decimal_scale {
        Some(decimal_scale) => round_half_up(value, decimal_scale),
        None => value,
    }
}

/// Rounds the shortest decimal form of `value`, away from zero on ties
fn round_half_up(value: f64, decimal_scale: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimal_scale as i32);
    let shifted = format!("{}e{}", value, decimal_scale)
        .parse::<f64>()
        .unwrap_or(value * factor);
    shifted.round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{QUALIFIER_FILE, QUALIFIER_PROJECT};
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

    fn file() -> Component {
        Component {
            uuid: "F1".to_string(),
            key: "my_project:src/foo.rs".to_string(),
            project_uuid: "P1".to_string(),
            uuid_path: vec!["P1".to_string()],
            qualifier: QUALIFIER_FILE.to_string(),
            main_branch_project_uuid: None,
        }
    }

    fn metrics() -> Vec<Metric> {
        vec![
            Metric::new(1, "ncloc", ValueType::Int),
            Metric {
                decimal_scale: Some(2),
                ..Metric::new(2, "coverage", ValueType::Percent)
            },
            Metric::new(3, "sqale_debt_ratio", ValueType::Percent),
            Metric::new(4, "sqale_rating", ValueType::Rating),
            Metric::new(5, "alert_status", ValueType::Level),
        ]
    }

    fn measure(component: &Component, metric_id: i64, value: Option<f64>, variation: Option<f64>) -> LiveMeasure {
        LiveMeasure {
            component_uuid: component.uuid.clone(),
            project_uuid: component.project_uuid.clone(),
            metric_id,
            value,
            text_value: None,
            variation,
        }
    }

    fn matrix(measures: Vec<LiveMeasure>) -> MeasureMatrix {
        MeasureMatrix::new(vec![project(), file()], metrics(), measures).unwrap()
    }

    #[test]
    fn test_get_value_of_unregistered_metric_fails() {
        let matrix = matrix(vec![]);
        let err = matrix.get_value("P1", "unknown").unwrap_err();
        assert_eq!(err.to_string(), "Metric with key unknown is not registered");
    }

    #[test]
    fn test_get_value_absent_without_cell() {
        let matrix = matrix(vec![measure(&file(), 1, None, None)]);
        assert_eq!(matrix.get_value("P1", "ncloc").unwrap(), None);
        assert_eq!(matrix.get_value("F1", "ncloc").unwrap(), None);
        assert_eq!(matrix.get_changed().count(), 0);
    }

    #[test]
    fn test_set_value_creates_changed_cell() {
        let mut matrix = matrix(vec![]);
        matrix.set_value(&file(), "ncloc", 42.0).unwrap();

        let changed: Vec<_> = matrix.get_changed().collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].component_uuid, "F1");
        assert_eq!(changed[0].project_uuid, "P1");
        assert_eq!(changed[0].metric_id, 1);
        assert_eq!(changed[0].value, Some(42.0));
    }

    #[test]
    fn test_set_same_value_is_a_no_op() {
        let mut matrix = matrix(vec![measure(&project(), 1, Some(10.0), None)]);
        matrix.set_value(&project(), "ncloc", 10.0).unwrap();
        assert_eq!(matrix.get_changed().count(), 0);

        matrix.set_value(&project(), "ncloc", 11.0).unwrap();
        matrix.set_value(&project(), "ncloc", 11.0).unwrap();
        assert_eq!(matrix.get_changed().count(), 1);
    }

    #[test]
    fn test_set_value_rounds_to_decimal_scale() {
        let mut matrix = matrix(vec![]);
        matrix.set_value(&project(), "coverage", 1.23456).unwrap();
        matrix.set_value(&file(), "coverage", 1.005).unwrap();

        assert_eq!(matrix.get_value("P1", "coverage").unwrap(), Some(1.23));
        assert_eq!(matrix.get_value("F1", "coverage").unwrap(), Some(1.01));
    }

    #[test]
    fn test_set_value_keeps_leak_baseline() {
        let mut matrix = matrix(vec![measure(&project(), 3, Some(40.0), Some(5.0))]);
        matrix.set_value(&project(), "sqale_debt_ratio", 50.0).unwrap();

        let measure = matrix.get_measure("P1", "sqale_debt_ratio").unwrap().unwrap();
        assert_eq!(measure.value, Some(50.0));
        assert_eq!(measure.variation, Some(15.0));
    }

    #[test]
    fn test_set_value_without_variation_leaves_it_absent() {
        let mut matrix = matrix(vec![measure(&project(), 3, Some(40.0), None)]);
        matrix.set_value(&project(), "sqale_debt_ratio", 50.0).unwrap();

        let measure = matrix.get_measure("P1", "sqale_debt_ratio").unwrap().unwrap();
        assert_eq!(measure.variation, None);
    }

    #[test]
    fn test_set_rating_stores_index_and_letter() {
        let mut matrix = matrix(vec![measure(&project(), 4, Some(1.0), Some(0.0))]);
        matrix.set_rating(&project(), "sqale_rating", Rating::C).unwrap();

        let measure = matrix.get_measure("P1", "sqale_rating").unwrap().unwrap();
        assert_eq!(measure.value, Some(3.0));
        assert_eq!(measure.text_value.as_deref(), Some("C"));
        assert_eq!(measure.variation, Some(2.0));
        assert_eq!(matrix.get_changed().count(), 1);
    }

    #[test]
    fn test_set_leak_value() {
        let mut matrix = matrix(vec![measure(&project(), 2, Some(80.0), Some(3.5))]);
        matrix.set_leak_value(&project(), "coverage", 3.5).unwrap();
        assert_eq!(matrix.get_changed().count(), 0);

        matrix.set_leak_value(&project(), "coverage", 4.567).unwrap();
        let measure = matrix.get_measure("P1", "coverage").unwrap().unwrap();
        assert_eq!(measure.value, Some(80.0));
        assert_eq!(measure.variation, Some(4.57));
        assert_eq!(matrix.get_changed().count(), 1);
    }

    #[test]
    fn test_set_text() {
        let mut matrix = matrix(vec![LiveMeasure {
            text_value: Some("OK".to_string()),
            ..measure(&project(), 5, None, None)
        }]);
        matrix.set_text(&project(), "alert_status", "OK").unwrap();
        assert_eq!(matrix.get_changed().count(), 0);

        matrix.set_text(&project(), "alert_status", "ERROR").unwrap();
        let changed: Vec<_> = matrix.get_changed().collect();
        assert_eq!(changed[0].text_value.as_deref(), Some("ERROR"));
    }

    #[test]
    fn test_write_on_unknown_component_fails() {
        let mut matrix = matrix(vec![]);
        let mut other = file();
        other.uuid = "F2".to_string();
        assert!(matches!(
            matrix.set_value(&other, "ncloc", 1.0),
            Err(LiveMeasureError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_row_falls_back_to_text_value() {
        let matrix = matrix(vec![
            LiveMeasure {
                text_value: Some("1600".to_string()),
                ..measure(&project(), 5, None, None)
            },
            measure(&project(), 1, Some(12.0), Some(2.0)),
        ]);
        let row = matrix.row("P1");
        assert_eq!(row.value("alert_status"), Some(1600.0));
        assert_eq!(row.value("ncloc"), Some(12.0));
        assert_eq!(row.leak_value("ncloc"), Some(2.0));
        assert_eq!(row.value("coverage"), None);
        assert_eq!(matrix.row("F1").value("ncloc"), None);
    }

    #[test]
    fn test_compare_measures_orders_by_component_then_metric() {
        let mut measures = vec![
            measure(&project(), 3, None, None),
            measure(&file(), 1, None, None),
            measure(&project(), 1, None, None),
        ];
        measures.sort_by(compare_measures);
        let keys: Vec<_> = measures
            .iter()
            .map(|m| (m.component_uuid.as_str(), m.metric_id))
            .collect();
        assert_eq!(keys, vec![("F1", 1), ("P1", 1), ("P1", 3)]);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(-0.125, 2), -0.13);
        assert_eq!(round_half_up(12.5, 0), 13.0);
        assert_eq!(round_half_up(2.0 / 3.0, 1), 0.7);
    }
}
