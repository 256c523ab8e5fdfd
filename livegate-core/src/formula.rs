//! Issue metric formulas
//!
//! Each formula turns the issue counter of one component into the value of one
//! metric. Formulas are plain function pointers in an ordered table; a formula
//! may read other metrics of the same component only if it declares them as
//! dependencies, and the table order guarantees those were written earlier in
//! the pass.
//!
//! Global invariants enforced:
//! - Formulas are pure: they return a value, never write into the matrix
//! - `on_leak` decides whether the value lands in the absolute or leak field
//! - Reading an undeclared metric is an error, never a silent `None`

use crate::component::Component;
use crate::counter::IssueCounter;
use crate::error::{LiveMeasureError, Result};
use crate::issue::{
    RuleType, Severity, RESOLUTION_FALSE_POSITIVE, RESOLUTION_WONT_FIX, STATUS_CONFIRMED,
    STATUS_OPEN, STATUS_REOPENED,
};
use crate::metric;
use crate::rating::{DebtRatingGrid, Rating};
use std::collections::BTreeSet;

/// Value produced by a formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    Rating(Rating),
}

impl From<f64> for FormulaValue {
    fn from(value: f64) -> Self {
        FormulaValue::Number(value)
    }
}

impl From<u64> for FormulaValue {
    fn from(value: u64) -> Self {
        FormulaValue::Number(value as f64)
    }
}

impl From<Rating> for FormulaValue {
    fn from(rating: Rating) -> Self {
        FormulaValue::Rating(rating)
    }
}

/// Read access to the already-computed measures of the current component
pub trait MeasureLookup {
    fn value(&self, metric_key: &str) -> Option<f64>;
    fn leak_value(&self, metric_key: &str) -> Option<f64>;
}

/// Inputs of one formula evaluation
pub struct FormulaContext<'a> {
    pub component: &'a Component,
    pub debt_rating_grid: &'a DebtRatingGrid,
    dependencies: &'static [&'static str],
    measures: &'a dyn MeasureLookup,
}

impl<'a> FormulaContext<'a> {
    pub fn new(
        component: &'a Component,
        debt_rating_grid: &'a DebtRatingGrid,
        formula: &IssueMetricFormula,
        measures: &'a dyn MeasureLookup,
    ) -> Self {
        FormulaContext {
            component,
            debt_rating_grid,
            dependencies: formula.dependencies,
            measures,
        }
    }

    pub fn value(&self, metric_key: &str) -> Result<Option<f64>> {
        self.check_dependency(metric_key)?;
        Ok(self.measures.value(metric_key))
    }

    pub fn leak_value(&self, metric_key: &str) -> Result<Option<f64>> {
        self.check_dependency(metric_key)?;
        Ok(self.measures.leak_value(metric_key))
    }

    fn check_dependency(&self, metric_key: &str) -> Result<()> {
        if self.dependencies.iter().any(|d| *d == metric_key) {
            Ok(())
        } else {
            Err(LiveMeasureError::UndeclaredDependency(metric_key.to_string()))
        }
    }
}

pub type ComputeFn = fn(&FormulaContext<'_>, &IssueCounter) -> Result<FormulaValue>;

#[derive(Clone, Copy)]
pub struct IssueMetricFormula {
    pub metric: &'static str,
    pub on_leak: bool,
    pub dependencies: &'static [&'static str],
    compute: ComputeFn,
}

impl IssueMetricFormula {
    pub fn new(metric: &'static str, on_leak: bool, compute: ComputeFn) -> Self {
        IssueMetricFormula {
            metric,
            on_leak,
            dependencies: &[],
            compute,
        }
    }

    pub fn with_dependencies(mut self, dependencies: &'static [&'static str]) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn compute(&self, context: &FormulaContext<'_>, counter: &IssueCounter) -> Result<FormulaValue> {
        (self.compute)(context, counter)
    }
}

impl std::fmt::Debug for IssueMetricFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueMetricFormula")
            .field("metric", &self.metric)
            .field("on_leak", &self.on_leak)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Source of the ordered formula table
pub trait IssueMetricFormulaFactory {
    fn formulas(&self) -> &[IssueMetricFormula];

    /// Every metric a formula writes or reads
    fn formula_metrics(&self) -> BTreeSet<&'static str> {
        let mut metrics = BTreeSet::new();
        for formula in self.formulas() {
            metrics.insert(formula.metric);
            metrics.extend(formula.dependencies.iter().copied());
        }
        metrics
    }
}

#[derive(Debug)]
pub struct DefaultFormulaFactory {
    formulas: Vec<IssueMetricFormula>,
}

impl DefaultFormulaFactory {
    pub fn new() -> Self {
        DefaultFormulaFactory {
            formulas: default_formulas(),
        }
    }
}

impl Default for DefaultFormulaFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueMetricFormulaFactory for DefaultFormulaFactory {
    fn formulas(&self) -> &[IssueMetricFormula] {
        &self.formulas
    }
}

const DEBT_DEPENDENCIES: &[&str] = &[metric::TECHNICAL_DEBT, metric::DEVELOPMENT_COST];
const NEW_DEBT_DEPENDENCIES: &[&str] = &[metric::NEW_TECHNICAL_DEBT, metric::NEW_DEVELOPMENT_COST];

fn default_formulas() -> Vec<IssueMetricFormula> {
    use IssueMetricFormula as F;

    vec![
        F::new(metric::CODE_SMELLS, false, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::CodeSmell, false).into())
        }),
        F::new(metric::BUGS, false, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::Bug, false).into())
        }),
        F::new(metric::VULNERABILITIES, false, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::Vulnerability, false).into())
        }),
        F::new(metric::SECURITY_HOTSPOTS, false, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::SecurityHotspot, false).into())
        }),
        F::new(metric::VIOLATIONS, false, |_, c| Ok(c.count_unresolved(false).into())),
        F::new(metric::BLOCKER_VIOLATIONS, false, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Blocker, false).into())
        }),
        F::new(metric::CRITICAL_VIOLATIONS, false, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Critical, false).into())
        }),
        F::new(metric::MAJOR_VIOLATIONS, false, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Major, false).into())
        }),
        F::new(metric::MINOR_VIOLATIONS, false, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Minor, false).into())
        }),
        F::new(metric::INFO_VIOLATIONS, false, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Info, false).into())
        }),
        F::new(metric::FALSE_POSITIVE_ISSUES, false, |_, c| {
            Ok(c.count_by_resolution(RESOLUTION_FALSE_POSITIVE, false).into())
        }),
        F::new(metric::WONT_FIX_ISSUES, false, |_, c| {
            Ok(c.count_by_resolution(RESOLUTION_WONT_FIX, false).into())
        }),
        F::new(metric::OPEN_ISSUES, false, |_, c| {
            Ok(c.count_by_status(STATUS_OPEN, false).into())
        }),
        F::new(metric::REOPENED_ISSUES, false, |_, c| {
            Ok(c.count_by_status(STATUS_REOPENED, false).into())
        }),
        F::new(metric::CONFIRMED_ISSUES, false, |_, c| {
            Ok(c.count_by_status(STATUS_CONFIRMED, false).into())
        }),
        F::new(metric::TECHNICAL_DEBT, false, |_, c| {
            Ok(c.sum_effort_of_unresolved(RuleType::CodeSmell, false).into())
        }),
        F::new(metric::RELIABILITY_REMEDIATION_EFFORT, false, |_, c| {
            Ok(c.sum_effort_of_unresolved(RuleType::Bug, false).into())
        }),
        F::new(metric::SECURITY_REMEDIATION_EFFORT, false, |_, c| {
            Ok(c.sum_effort_of_unresolved(RuleType::Vulnerability, false).into())
        }),
        F::new(metric::SQALE_DEBT_RATIO, false, |ctx, _| {
            Ok((100.0 * debt_density(ctx)?).into())
        })
        .with_dependencies(DEBT_DEPENDENCIES),
        F::new(metric::SQALE_RATING, false, |ctx, _| {
            let density = debt_density(ctx)?;
            Ok(ctx.debt_rating_grid.rating_for_density(density).into())
        })
        .with_dependencies(DEBT_DEPENDENCIES),
        F::new(metric::EFFORT_TO_REACH_MAINTAINABILITY_RATING_A, false, |ctx, _| {
            effort_to_reach_rating_a(ctx)
        })
        .with_dependencies(DEBT_DEPENDENCIES),
        F::new(metric::RELIABILITY_RATING, false, |_, c| {
            let severity = c.highest_severity_of_unresolved(RuleType::Bug, false);
            Ok(Rating::from_severity(severity).into())
        }),
        F::new(metric::SECURITY_RATING, false, |_, c| {
            let severity = c.highest_severity_of_unresolved(RuleType::Vulnerability, false);
            Ok(Rating::from_severity(severity).into())
        }),
        F::new(metric::NEW_CODE_SMELLS, true, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::CodeSmell, true).into())
        }),
        F::new(metric::NEW_BUGS, true, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::Bug, true).into())
        }),
        F::new(metric::NEW_VULNERABILITIES, true, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::Vulnerability, true).into())
        }),
        F::new(metric::NEW_SECURITY_HOTSPOTS, true, |_, c| {
            Ok(c.count_unresolved_by_type(RuleType::SecurityHotspot, true).into())
        }),
        F::new(metric::NEW_VIOLATIONS, true, |_, c| Ok(c.count_unresolved(true).into())),
        F::new(metric::NEW_BLOCKER_VIOLATIONS, true, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Blocker, true).into())
        }),
        F::new(metric::NEW_CRITICAL_VIOLATIONS, true, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Critical, true).into())
        }),
        F::new(metric::NEW_MAJOR_VIOLATIONS, true, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Major, true).into())
        }),
        F::new(metric::NEW_MINOR_VIOLATIONS, true, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Minor, true).into())
        }),
        F::new(metric::NEW_INFO_VIOLATIONS, true, |_, c| {
            Ok(c.count_unresolved_by_severity(Severity::Info, true).into())
        }),
        F::new(metric::NEW_TECHNICAL_DEBT, true, |_, c| {
            Ok(c.sum_effort_of_unresolved(RuleType::CodeSmell, true).into())
        }),
        F::new(metric::NEW_RELIABILITY_REMEDIATION_EFFORT, true, |_, c| {
            Ok(c.sum_effort_of_unresolved(RuleType::Bug, true).into())
        }),
        F::new(metric::NEW_SECURITY_REMEDIATION_EFFORT, true, |_, c| {
            Ok(c.sum_effort_of_unresolved(RuleType::Vulnerability, true).into())
        }),
        F::new(metric::NEW_RELIABILITY_RATING, true, |_, c| {
            let severity = c.highest_severity_of_unresolved(RuleType::Bug, true);
            Ok(Rating::from_severity(severity).into())
        }),
        F::new(metric::NEW_SECURITY_RATING, true, |_, c| {
            let severity = c.highest_severity_of_unresolved(RuleType::Vulnerability, true);
            Ok(Rating::from_severity(severity).into())
        }),
        F::new(metric::NEW_SQALE_DEBT_RATIO, true, |ctx, _| {
            Ok((100.0 * new_debt_density(ctx)?).into())
        })
        .with_dependencies(NEW_DEBT_DEPENDENCIES),
        F::new(metric::NEW_MAINTAINABILITY_RATING, true, |ctx, _| {
            let density = new_debt_density(ctx)?;
            Ok(ctx.debt_rating_grid.rating_for_density(density).into())
        })
        .with_dependencies(NEW_DEBT_DEPENDENCIES),
    ]
}

/// Debt over development cost; 0 when the cost is missing or not positive
pub fn density(debt: Option<f64>, development_cost: Option<f64>) -> f64 {
    let debt = debt.unwrap_or(0.0).max(0.0);
    match development_cost {
        Some(cost) if cost > 0.0 => debt / cost,
        _ => 0.0,
    }
}

fn debt_density(ctx: &FormulaContext<'_>) -> Result<f64> {
    let debt = ctx.value(metric::TECHNICAL_DEBT)?;
    let cost = ctx.value(metric::DEVELOPMENT_COST)?;
    Ok(density(debt, cost))
}

fn new_debt_density(ctx: &FormulaContext<'_>) -> Result<f64> {
    let debt = ctx.leak_value(metric::NEW_TECHNICAL_DEBT)?;
    let cost = ctx.leak_value(metric::NEW_DEVELOPMENT_COST)?;
    Ok(density(debt, cost))
}

fn effort_to_reach_rating_a(ctx: &FormulaContext<'_>) -> Result<FormulaValue> {
    let cost = ctx.value(metric::DEVELOPMENT_COST)?.unwrap_or(0.0);
    let debt = ctx.value(metric::TECHNICAL_DEBT)?.unwrap_or(0.0);
    let upper_grade_cost = ctx.debt_rating_grid.grade_lower_bound(Rating::B) * cost;
    if upper_grade_cost < debt {
        Ok((debt - upper_grade_cost).into())
    } else {
        Ok(0.0.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::QUALIFIER_FILE;
    use crate::issue::{IssueGroup, RESOLUTION_FIXED, STATUS_CLOSED, STATUS_RESOLVED};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Measures {
        values: HashMap<&'static str, f64>,
        leak_values: HashMap<&'static str, f64>,
    }

    impl MeasureLookup for Measures {
        fn value(&self, metric_key: &str) -> Option<f64> {
            self.values.get(metric_key).copied()
        }

        fn leak_value(&self, metric_key: &str) -> Option<f64> {
            self.leak_values.get(metric_key).copied()
        }
    }

    fn component() -> Component {
        Component {
            uuid: "F1".to_string(),
            key: "my_project:src/foo.rs".to_string(),
            project_uuid: "P1".to_string(),
            uuid_path: vec!["P1".to_string()],
            qualifier: QUALIFIER_FILE.to_string(),
            main_branch_project_uuid: None,
        }
    }

    fn new_group(rule_type: RuleType) -> IssueGroup {
        IssueGroup {
            rule_type,
            severity: Severity::Info,
            resolution: None,
            status: STATUS_OPEN.to_string(),
            effort: 0.0,
            count: 1,
            in_leak: false,
        }
    }

    fn new_resolved_group(rule_type: RuleType) -> IssueGroup {
        IssueGroup {
            resolution: Some(RESOLUTION_FALSE_POSITIVE.to_string()),
            status: STATUS_CLOSED.to_string(),
            ..new_group(rule_type)
        }
    }

    fn run(metric_key: &str, expect_leak: bool, groups: &[IssueGroup], measures: &Measures) -> FormulaValue {
        let factory = DefaultFormulaFactory::new();
        let formula = factory
            .formulas()
            .iter()
            .find(|f| f.metric == metric_key)
            .unwrap();
        assert_eq!(formula.on_leak, expect_leak, "leak flag of {}", metric_key);
        let component = component();
        let grid = DebtRatingGrid::default();
        let ctx = FormulaContext::new(&component, &grid, formula, measures);
        formula.compute(&ctx, &IssueCounter::new(groups)).unwrap()
    }

    fn value(metric_key: &str, groups: &[IssueGroup]) -> FormulaValue {
        run(metric_key, false, groups, &Measures::default())
    }

    fn leak_value(metric_key: &str, groups: &[IssueGroup]) -> FormulaValue {
        run(metric_key, true, groups, &Measures::default())
    }

    fn with_values(metric_key: &str, values: &[(&'static str, f64)]) -> FormulaValue {
        let measures = Measures {
            values: values.iter().copied().collect(),
            ..Default::default()
        };
        run(metric_key, false, &[], &measures)
    }

    fn with_leak_values(metric_key: &str, values: &[(&'static str, f64)]) -> FormulaValue {
        let measures = Measures {
            leak_values: values.iter().copied().collect(),
            ..Default::default()
        };
        run(metric_key, true, &[], &measures)
    }

    fn n(value: f64) -> FormulaValue {
        FormulaValue::Number(value)
    }

    fn r(rating: Rating) -> FormulaValue {
        FormulaValue::Rating(rating)
    }

    #[test]
    fn test_formula_metrics_include_dependencies() {
        let factory = DefaultFormulaFactory::new();
        let metrics = factory.formula_metrics();
        for formula in factory.formulas() {
            assert!(metrics.contains(formula.metric));
            for dependency in formula.dependencies {
                assert!(metrics.contains(dependency));
            }
        }
        assert!(metrics.contains(metric::DEVELOPMENT_COST));
        assert!(metrics.contains(metric::NEW_DEVELOPMENT_COST));
    }

    #[test]
    fn test_dependencies_are_computed_before_use() {
        let factory = DefaultFormulaFactory::new();
        let position = |key: &str| factory.formulas().iter().position(|f| f.metric == key);
        for (index, formula) in factory.formulas().iter().enumerate() {
            for dependency in formula.dependencies {
                if let Some(dep_index) = position(*dependency) {
                    assert!(dep_index < index, "{} before {}", dependency, formula.metric);
                }
            }
        }
    }

    #[test]
    fn test_violations() {
        assert_eq!(value(metric::VIOLATIONS, &[]), n(0.0));

        let resolved = IssueGroup {
            resolution: Some(RESOLUTION_FIXED.to_string()),
            status: STATUS_RESOLVED.to_string(),
            ..new_group(RuleType::CodeSmell)
        };
        let on_leak = IssueGroup {
            count: 11,
            in_leak: true,
            ..new_group(RuleType::CodeSmell)
        };
        let groups = vec![
            new_group(RuleType::CodeSmell),
            new_group(RuleType::CodeSmell),
            resolved,
            on_leak,
        ];
        assert_eq!(value(metric::VIOLATIONS, &groups), n(13.0));
    }

    #[test]
    fn test_bugs_exclude_resolved_and_other_types() {
        let groups = vec![
            IssueGroup {
                severity: Severity::Major,
                count: 3,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                severity: Severity::Critical,
                count: 5,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                count: 7,
                ..new_resolved_group(RuleType::Bug)
            },
            IssueGroup {
                count: 11,
                ..new_group(RuleType::CodeSmell)
            },
        ];
        assert_eq!(value(metric::BUGS, &groups), n(8.0));
        assert_eq!(value(metric::CODE_SMELLS, &groups), n(11.0));
        assert_eq!(value(metric::VULNERABILITIES, &groups), n(0.0));
    }

    #[test]
    fn test_technical_debt_ignores_hotspots() {
        let groups = vec![
            IssueGroup {
                effort: 3.0,
                ..new_group(RuleType::CodeSmell)
            },
            IssueGroup {
                effort: 5.0,
                in_leak: true,
                ..new_group(RuleType::CodeSmell)
            },
            IssueGroup {
                effort: 9.0,
                in_leak: true,
                ..new_group(RuleType::SecurityHotspot)
            },
            IssueGroup {
                effort: 7.0,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                effort: 17.0,
                ..new_resolved_group(RuleType::CodeSmell)
            },
        ];
        assert_eq!(value(metric::TECHNICAL_DEBT, &groups), n(8.0));
        assert_eq!(leak_value(metric::NEW_TECHNICAL_DEBT, &groups), n(5.0));
        assert_eq!(value(metric::RELIABILITY_REMEDIATION_EFFORT, &groups), n(7.0));
    }

    #[test]
    fn test_sqale_debt_ratio_and_rating() {
        use metric::{DEVELOPMENT_COST as COST, SQALE_DEBT_RATIO as RATIO, SQALE_RATING, TECHNICAL_DEBT as DEBT};

        assert_eq!(with_values(RATIO, &[]), n(0.0));
        assert_eq!(with_values(SQALE_RATING, &[]), r(Rating::A));
        assert_eq!(with_values(RATIO, &[(DEBT, 20.0)]), n(0.0));
        assert_eq!(with_values(RATIO, &[(COST, 20.0)]), n(0.0));
        assert_eq!(with_values(RATIO, &[(DEBT, 20.0), (COST, 0.0)]), n(0.0));
        assert_eq!(with_values(RATIO, &[(DEBT, 20.0), (COST, 160.0)]), n(12.5));
        assert_eq!(with_values(SQALE_RATING, &[(DEBT, 20.0), (COST, 160.0)]), r(Rating::C));
        assert_eq!(with_values(RATIO, &[(DEBT, 20.0), (COST, 10.0)]), n(200.0));
        assert_eq!(with_values(SQALE_RATING, &[(DEBT, 20.0), (COST, 10.0)]), r(Rating::E));
        assert_eq!(with_values(RATIO, &[(DEBT, 10.0), (COST, 200.0)]), n(5.0));
        assert_eq!(with_values(SQALE_RATING, &[(DEBT, 10.0), (COST, 200.0)]), r(Rating::A));
        assert_eq!(with_values(RATIO, &[(DEBT, -20.0), (COST, 80.0)]), n(0.0));
        assert_eq!(with_values(RATIO, &[(DEBT, 20.0), (COST, -80.0)]), n(0.0));
        assert_eq!(with_values(SQALE_RATING, &[(DEBT, 20.0), (COST, -80.0)]), r(Rating::A));
    }

    #[test]
    fn test_effort_to_reach_maintainability_rating_a() {
        use metric::{DEVELOPMENT_COST as COST, EFFORT_TO_REACH_MAINTAINABILITY_RATING_A as EFFORT, TECHNICAL_DEBT as DEBT};

        assert_eq!(with_values(EFFORT, &[]), n(0.0));
        assert_eq!(with_values(EFFORT, &[(COST, 20.0)]), n(0.0));
        assert_eq!(with_values(EFFORT, &[(DEBT, 20.0)]), n(20.0));
        assert_eq!(with_values(EFFORT, &[(DEBT, 40.0), (COST, 200.0)]), n(30.0));
        assert_eq!(with_values(EFFORT, &[(DEBT, 180.0), (COST, 200.0)]), n(170.0));
        assert_eq!(with_values(EFFORT, &[(DEBT, 8.0), (COST, 200.0)]), n(0.0));
        assert_eq!(with_values(EFFORT, &[(DEBT, 10.0), (COST, 200.0)]), n(0.0));
    }

    #[test]
    fn test_reliability_and_security_ratings() {
        let groups = vec![
            IssueGroup {
                severity: Severity::Critical,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                severity: Severity::Minor,
                count: 5,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                severity: Severity::Blocker,
                count: 3,
                ..new_group(RuleType::CodeSmell)
            },
        ];
        assert_eq!(value(metric::RELIABILITY_RATING, &groups), r(Rating::D));
        assert_eq!(value(metric::SECURITY_RATING, &groups), r(Rating::A));
    }

    #[test]
    fn test_new_reliability_rating() {
        assert_eq!(leak_value(metric::NEW_RELIABILITY_RATING, &[]), r(Rating::A));

        let groups = vec![
            IssueGroup {
                count: 3,
                in_leak: true,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                severity: Severity::Minor,
                in_leak: true,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                severity: Severity::Blocker,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                severity: Severity::Blocker,
                in_leak: true,
                ..new_group(RuleType::CodeSmell)
            },
            IssueGroup {
                severity: Severity::Blocker,
                in_leak: true,
                ..new_resolved_group(RuleType::Bug)
            },
        ];
        assert_eq!(leak_value(metric::NEW_RELIABILITY_RATING, &groups), r(Rating::B));
    }

    #[test]
    fn test_new_violations_counts_leak_only() {
        let groups = vec![
            IssueGroup {
                count: 5,
                in_leak: true,
                ..new_group(RuleType::Bug)
            },
            IssueGroup {
                count: 7,
                in_leak: true,
                ..new_group(RuleType::CodeSmell)
            },
            IssueGroup {
                count: 11,
                ..new_group(RuleType::Bug)
            },
        ];
        assert_eq!(leak_value(metric::NEW_VIOLATIONS, &groups), n(12.0));
        assert_eq!(leak_value(metric::NEW_BUGS, &groups), n(5.0));
    }

    #[test]
    fn test_new_sqale_debt_ratio_reads_leak_values() {
        use metric::{
            NEW_DEVELOPMENT_COST as COST, NEW_MAINTAINABILITY_RATING as RATING,
            NEW_SQALE_DEBT_RATIO as RATIO, NEW_TECHNICAL_DEBT as DEBT,
        };

        assert_eq!(with_leak_values(RATIO, &[]), n(0.0));
        assert_eq!(with_leak_values(RATING, &[]), r(Rating::A));
        assert_eq!(with_leak_values(RATIO, &[(DEBT, 20.0), (COST, 160.0)]), n(12.5));
        assert_eq!(with_leak_values(RATING, &[(DEBT, 20.0), (COST, 160.0)]), r(Rating::C));
        assert_eq!(with_leak_values(RATIO, &[(DEBT, 20.0), (COST, 10.0)]), n(200.0));
        assert_eq!(with_leak_values(RATING, &[(DEBT, 20.0), (COST, 10.0)]), r(Rating::E));
        assert_eq!(with_leak_values(RATIO, &[(DEBT, -20.0), (COST, 0.0)]), n(0.0));

        // absolute values are ignored
        let measures = Measures {
            values: [(DEBT, 20.0), (COST, 160.0)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(run(RATIO, true, &[], &measures), n(0.0));
    }

    #[test]
    fn test_undeclared_dependency_is_rejected() {
        let formula = IssueMetricFormula::new(metric::BUGS, false, |ctx, _| {
            let ncloc = ctx.value("ncloc")?;
            Ok(ncloc.unwrap_or(0.0).into())
        });
        let component = component();
        let grid = DebtRatingGrid::default();
        let measures = Measures::default();
        let ctx = FormulaContext::new(&component, &grid, &formula, &measures);

        let err = formula.compute(&ctx, &IssueCounter::new(&[])).unwrap_err();
        assert!(matches!(err, LiveMeasureError::UndeclaredDependency(k) if k == "ncloc"));
    }

    #[test]
    fn test_density_guards_against_missing_cost() {
        assert_eq!(density(Some(10.0), None), 0.0);
        assert_eq!(density(Some(10.0), Some(0.0)), 0.0);
        assert_eq!(density(None, Some(10.0)), 0.0);
        assert_eq!(density(Some(10.0), Some(40.0)), 0.25);
    }
}
