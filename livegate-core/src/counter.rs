//! Issue counter - folds issue groups into per-dimension totals
//!
//! Global invariants enforced:
//! - Built once from a slice of groups, read-only afterwards
//! - Every bucket keeps an absolute total and a leak-only total
//! - Security hotspots only land in the per-type bucket

use crate::issue::{IssueGroup, RuleType, Severity};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy)]
struct Count {
    absolute: u64,
    leak: u64,
}

impl Count {
    fn add(&mut self, group: &IssueGroup) {
        self.absolute += group.count;
        if group.in_leak {
            self.leak += group.count;
        }
    }

    fn get(&self, only_in_leak: bool) -> u64 {
        if only_in_leak {
            self.leak
        } else {
            self.absolute
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Effort {
    absolute: f64,
    leak: f64,
}

impl Effort {
    fn add(&mut self, group: &IssueGroup) {
        self.absolute += group.effort;
        if group.in_leak {
            self.leak += group.effort;
        }
    }

    fn get(&self, only_in_leak: bool) -> f64 {
        if only_in_leak {
            self.leak
        } else {
            self.absolute
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct HighestSeverity {
    absolute: Option<Severity>,
    leak: Option<Severity>,
}

impl HighestSeverity {
    fn add(&mut self, group: &IssueGroup) {
        self.absolute = self.absolute.max(Some(group.severity));
        if group.in_leak {
            self.leak = self.leak.max(Some(group.severity));
        }
    }

    fn get(&self, only_in_leak: bool) -> Option<Severity> {
        if only_in_leak {
            self.leak
        } else {
            self.absolute
        }
    }
}

/// Totals of issue groups by severity, type, resolution and status
#[derive(Debug, Default)]
pub struct IssueCounter {
    highest_severity_of_unresolved: HashMap<RuleType, HighestSeverity>,
    effort_of_unresolved: HashMap<RuleType, Effort>,
    unresolved_by_severity: HashMap<Severity, Count>,
    unresolved_by_type: HashMap<RuleType, Count>,
    by_resolution: HashMap<String, Count>,
    by_status: HashMap<String, Count>,
    unresolved: Count,
}

impl IssueCounter {
    pub fn new(groups: &[IssueGroup]) -> Self {
        let mut counter = IssueCounter::default();
        for group in groups {
            counter.add(group);
        }
        counter
    }

    fn add(&mut self, group: &IssueGroup) {
        if group.is_resolved() {
            if group.rule_type != RuleType::SecurityHotspot {
                if let Some(resolution) = &group.resolution {
                    self.by_resolution
                        .entry(resolution.clone())
                        .or_default()
                        .add(group);
                }
            }
        } else {
            self.unresolved_by_type
                .entry(group.rule_type)
                .or_default()
                .add(group);
            self.effort_of_unresolved
                .entry(group.rule_type)
                .or_default()
                .add(group);
            self.highest_severity_of_unresolved
                .entry(group.rule_type)
                .or_default()
                .add(group);
            if group.rule_type != RuleType::SecurityHotspot {
                self.unresolved_by_severity
                    .entry(group.severity)
                    .or_default()
                    .add(group);
                self.unresolved.add(group);
            }
        }
        if group.rule_type != RuleType::SecurityHotspot {
            self.by_status
                .entry(group.status.clone())
                .or_default()
                .add(group);
        }
    }

    pub fn highest_severity_of_unresolved(
        &self,
        rule_type: RuleType,
        only_in_leak: bool,
    ) -> Option<Severity> {
        self.highest_severity_of_unresolved
            .get(&rule_type)
            .and_then(|h| h.get(only_in_leak))
    }

    pub fn sum_effort_of_unresolved(&self, rule_type: RuleType, only_in_leak: bool) -> f64 {
        self.effort_of_unresolved
            .get(&rule_type)
            .map_or(0.0, |e| e.get(only_in_leak))
    }

    pub fn count_unresolved_by_severity(&self, severity: Severity, only_in_leak: bool) -> u64 {
        self.unresolved_by_severity
            .get(&severity)
            .map_or(0, |c| c.get(only_in_leak))
    }

    pub fn count_by_resolution(&self, resolution: &str, only_in_leak: bool) -> u64 {
        self.by_resolution
            .get(resolution)
            .map_or(0, |c| c.get(only_in_leak))
    }

    pub fn count_unresolved_by_type(&self, rule_type: RuleType, only_in_leak: bool) -> u64 {
        self.unresolved_by_type
            .get(&rule_type)
            .map_or(0, |c| c.get(only_in_leak))
    }

    pub fn count_by_status(&self, status: &str, only_in_leak: bool) -> u64 {
        self.by_status
            .get(status)
            .map_or(0, |c| c.get(only_in_leak))
    }

    pub fn count_unresolved(&self, only_in_leak: bool) -> u64 {
        self.unresolved.get(only_in_leak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{RESOLUTION_FALSE_POSITIVE, RESOLUTION_WONT_FIX, STATUS_CLOSED, STATUS_OPEN};

    fn group(rule_type: RuleType, severity: Severity, count: u64, effort: f64) -> IssueGroup {
        IssueGroup {
            rule_type,
            severity,
            resolution: None,
            status: STATUS_OPEN.to_string(),
            effort,
            count,
            in_leak: false,
        }
    }

    fn resolved(rule_type: RuleType, resolution: &str, count: u64) -> IssueGroup {
        IssueGroup {
            resolution: Some(resolution.to_string()),
            status: STATUS_CLOSED.to_string(),
            ..group(rule_type, Severity::Info, count, 0.0)
        }
    }

    #[test]
    fn test_empty_counter_returns_zeros() {
        let counter = IssueCounter::new(&[]);
        assert_eq!(counter.count_unresolved(false), 0);
        assert_eq!(counter.count_unresolved_by_type(RuleType::Bug, true), 0);
        assert_eq!(counter.sum_effort_of_unresolved(RuleType::Bug, false), 0.0);
        assert_eq!(
            counter.highest_severity_of_unresolved(RuleType::Bug, false),
            None
        );
    }

    #[test]
    fn test_mixed_groups() {
        let groups = vec![
            IssueGroup {
                in_leak: true,
                ..group(RuleType::CodeSmell, Severity::Major, 2, 10.0)
            },
            group(RuleType::Bug, Severity::Blocker, 1, 5.0),
            resolved(RuleType::CodeSmell, RESOLUTION_FALSE_POSITIVE, 1),
        ];
        let counter = IssueCounter::new(&groups);

        assert_eq!(counter.count_unresolved_by_type(RuleType::CodeSmell, false), 2);
        assert_eq!(counter.count_unresolved_by_type(RuleType::CodeSmell, true), 2);
        assert_eq!(counter.count_unresolved_by_severity(Severity::Blocker, false), 1);
        assert_eq!(counter.sum_effort_of_unresolved(RuleType::Bug, false), 5.0);
        assert_eq!(counter.count_by_resolution(RESOLUTION_FALSE_POSITIVE, false), 1);
        assert_eq!(
            counter.highest_severity_of_unresolved(RuleType::CodeSmell, false),
            Some(Severity::Major)
        );
        assert_eq!(counter.count_unresolved(false), 3);
        assert_eq!(counter.count_unresolved(true), 2);
    }

    #[test]
    fn test_highest_severity_respects_leak_restriction() {
        let groups = vec![
            group(RuleType::Bug, Severity::Blocker, 1, 0.0),
            IssueGroup {
                in_leak: true,
                ..group(RuleType::Bug, Severity::Minor, 3, 0.0)
            },
            IssueGroup {
                in_leak: true,
                ..group(RuleType::Bug, Severity::Info, 1, 0.0)
            },
        ];
        let counter = IssueCounter::new(&groups);

        assert_eq!(
            counter.highest_severity_of_unresolved(RuleType::Bug, false),
            Some(Severity::Blocker)
        );
        assert_eq!(
            counter.highest_severity_of_unresolved(RuleType::Bug, true),
            Some(Severity::Minor)
        );
    }

    #[test]
    fn test_resolved_groups_are_not_unresolved() {
        let groups = vec![
            resolved(RuleType::Bug, RESOLUTION_WONT_FIX, 7),
            resolved(RuleType::Bug, RESOLUTION_WONT_FIX, 11),
        ];
        let counter = IssueCounter::new(&groups);

        assert_eq!(counter.count_unresolved(false), 0);
        assert_eq!(counter.count_unresolved_by_type(RuleType::Bug, false), 0);
        assert_eq!(counter.count_by_resolution(RESOLUTION_WONT_FIX, false), 18);
        assert_eq!(counter.count_by_status(STATUS_CLOSED, false), 18);
    }

    #[test]
    fn test_security_hotspots_only_count_by_type() {
        let groups = vec![
            group(RuleType::SecurityHotspot, Severity::Critical, 15, 9.0),
            resolved(RuleType::SecurityHotspot, RESOLUTION_WONT_FIX, 4),
        ];
        let counter = IssueCounter::new(&groups);

        assert_eq!(
            counter.count_unresolved_by_type(RuleType::SecurityHotspot, false),
            15
        );
        assert_eq!(counter.count_unresolved_by_severity(Severity::Critical, false), 0);
        assert_eq!(counter.count_unresolved(false), 0);
        assert_eq!(counter.count_by_resolution(RESOLUTION_WONT_FIX, false), 0);
        assert_eq!(counter.count_by_status(STATUS_OPEN, false), 0);
    }
}
