//! livegate core library - live measure and quality gate recomputation

#![deny(warnings)]

// Global invariants enforced in this crate:
// - All pass state is local to one call of LiveMeasureComputer::refresh
// - No global mutable state
// - No threads or async; projects are processed sequentially
// - Collaborators (store, indexer, config) are passed in explicitly
// - Changed measures are persisted in a deterministic order

pub mod component;
pub mod config;
pub mod counter;
pub mod error;
pub mod formula;
pub mod issue;
pub mod live;
pub mod matrix;
pub mod metric;
pub mod qualitygate;
pub mod rating;
pub mod sqlite;
pub mod store;

pub use component::{Analysis, Branch, BranchType, Component};
pub use config::ResolvedConfig;
pub use error::LiveMeasureError;
pub use formula::{DefaultFormulaFactory, IssueMetricFormulaFactory};
pub use live::{LiveMeasureComputer, QualityGateChangeEvent};
pub use matrix::{LiveMeasure, MeasureMatrix};
pub use qualitygate::{EvaluatedQualityGate, Level, QualityGate};
pub use sqlite::SqliteStore;
pub use store::{IndexingCause, LiveMeasureStore, ProjectIndexer, RecordingIndexer};
