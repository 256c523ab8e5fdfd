//! Persistence and indexing collaborators of a recomputation pass
//!
//! The engine never owns a session: callers hand in a store (usually backed
//! by an open transaction) and an indexer, and commit once the pass returns.

use crate::component::{Analysis, Branch, Component};
use crate::issue::IssueGroup;
use crate::matrix::LiveMeasure;
use crate::metric::Metric;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Quality gate definition row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualityGateRow {
    pub id: i64,
    pub name: String,
}

/// Quality gate condition row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConditionRow {
    pub id: i64,
    pub quality_gate_id: i64,
    pub metric_id: i64,
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<i64>,
}

pub trait LiveMeasureStore {
    fn select_components_by_uuids(&self, uuids: &[String]) -> Result<Vec<Component>>;

    fn select_component_by_key(&self, key: &str) -> Result<Option<Component>>;

    fn select_branch(&self, uuid: &str) -> Result<Option<Branch>>;

    fn select_last_analysis(&self, project_uuid: &str) -> Result<Option<Analysis>>;

    /// Gate bound to the project, else the default gate
    fn select_quality_gate_for_project(&self, project_uuid: &str) -> Result<Option<QualityGateRow>>;

    fn select_conditions(&self, quality_gate_id: i64) -> Result<Vec<ConditionRow>>;

    fn select_metrics_by_keys(&self, keys: &[String]) -> Result<Vec<Metric>>;

    fn select_metrics_by_ids(&self, ids: &[i64]) -> Result<Vec<Metric>>;

    fn select_measures(&self, component_uuids: &[String], metric_ids: &[i64]) -> Result<Vec<LiveMeasure>>;

    /// Unresolved and resolved issue groups of `base` and all its descendants;
    /// a group is in leak when its issues were created at or after `leak_cutoff`
    fn select_issue_groups(&self, base: &Component, leak_cutoff: i64) -> Result<Vec<IssueGroup>>;

    fn upsert_measure(&mut self, measure: &LiveMeasure) -> Result<()>;
}

/// Why a project is re-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingCause {
    MeasureChange,
}

pub trait ProjectIndexer {
    fn commit_and_index(&mut self, project: &Component, cause: IndexingCause) -> Result<()>;
}

/// Indexer that only records the projects it was asked to index
#[derive(Debug, Default)]
pub struct RecordingIndexer {
    pub indexed: Vec<String>,
}

impl ProjectIndexer for RecordingIndexer {
    fn commit_and_index(&mut self, project: &Component, _cause: IndexingCause) -> Result<()> {
        self.indexed.push(project.uuid.clone());
        Ok(())
    }
}
