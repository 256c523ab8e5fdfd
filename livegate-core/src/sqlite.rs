//! SQLite-backed live measure store
//!
//! `SqliteStore` borrows a connection, so a caller-owned transaction can back
//! a whole recomputation pass and be committed once the pass returns.
//!
//! Global invariants enforced:
//! - One live measure row per (component uuid, metric id)
//! - Uuid paths are stored encoded (`.uuid1.uuid2.`)
//! - Closed issues never reach the issue groups

use crate::component::{decode_uuid_path, encode_uuid_path, Analysis, Branch, BranchType, Component};
use crate::issue::{IssueGroup, RuleType, Severity, STATUS_CLOSED};
use crate::matrix::LiveMeasure;
use crate::metric::{Metric, ValueType};
use crate::qualitygate::Condition;
use crate::store::{ConditionRow, LiveMeasureStore, QualityGateRow};
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS components (
    uuid TEXT PRIMARY KEY,
    kee TEXT NOT NULL UNIQUE,
    project_uuid TEXT NOT NULL,
    uuid_path TEXT NOT NULL,
    qualifier TEXT NOT NULL,
    main_branch_project_uuid TEXT
);

CREATE TABLE IF NOT EXISTS project_branches (
    uuid TEXT PRIMARY KEY,
    project_uuid TEXT NOT NULL,
    kee TEXT NOT NULL,
    branch_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshots (
    uuid TEXT PRIMARY KEY,
    component_uuid TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    period_date INTEGER,
    islast INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    val_type TEXT NOT NULL,
    best_value REAL,
    decimal_scale INTEGER
);

CREATE TABLE IF NOT EXISTS live_measures (
    component_uuid TEXT NOT NULL,
    project_uuid TEXT NOT NULL,
    metric_id INTEGER NOT NULL,
    value REAL,
    text_value TEXT,
    variation REAL,
    PRIMARY KEY (component_uuid, metric_id)
);

CREATE TABLE IF NOT EXISTS quality_gates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS project_qgates (
    project_uuid TEXT PRIMARY KEY,
    quality_gate_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS quality_gate_conditions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    qgate_id INTEGER NOT NULL,
    metric_id INTEGER NOT NULL,
    operator TEXT NOT NULL,
    value_error TEXT,
    value_warning TEXT,
    period INTEGER
);

CREATE TABLE IF NOT EXISTS issues (
    kee TEXT PRIMARY KEY,
    component_uuid TEXT NOT NULL,
    project_uuid TEXT NOT NULL,
    issue_type INTEGER NOT NULL,
    severity TEXT NOT NULL,
    resolution TEXT,
    status TEXT NOT NULL,
    effort REAL,
    issue_creation_date INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS issues_component ON issues (component_uuid);
CREATE INDEX IF NOT EXISTS snapshots_component ON snapshots (component_uuid, islast);
";

/// Create every table used by the store (idempotent)
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Failed to create live measure schema")
}

/// Insert metric definitions, keeping the ones already registered
pub fn register_metrics(conn: &Connection, metrics: &[Metric]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO metrics (id, name, val_type, best_value, decimal_scale)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut inserted = 0;
    for metric in metrics {
        inserted += stmt
            .execute(params![
                metric.id,
                metric.key,
                metric.value_type.as_str(),
                metric.best_value,
                metric.decimal_scale,
            ])
            .with_context(|| format!("Failed to register metric {}", metric.key))?;
    }
    Ok(inserted)
}

pub fn insert_component(conn: &Connection, component: &Component) -> Result<()> {
    conn.execute(
        "INSERT INTO components (uuid, kee, project_uuid, uuid_path, qualifier, main_branch_project_uuid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            component.uuid,
            component.key,
            component.project_uuid,
            encode_uuid_path(&component.uuid_path),
            component.qualifier,
            component.main_branch_project_uuid,
        ],
    )
    .with_context(|| format!("Failed to insert component {}", component.key))?;
    Ok(())
}

pub fn insert_branch(conn: &Connection, branch: &Branch) -> Result<()> {
    conn.execute(
        "INSERT INTO project_branches (uuid, project_uuid, kee, branch_type) VALUES (?1, ?2, ?3, ?4)",
        params![
            branch.uuid,
            branch.project_uuid,
            branch.key,
            branch.branch_type.as_str()
        ],
    )
    .with_context(|| format!("Failed to insert branch {}", branch.key))?;
    Ok(())
}

/// Record `analysis` as the last analysis of its project
pub fn insert_analysis(conn: &Connection, analysis: &Analysis) -> Result<()> {
    conn.execute(
        "UPDATE snapshots SET islast = 0 WHERE component_uuid = ?1",
        params![analysis.project_uuid],
    )?;
    conn.execute(
        "INSERT INTO snapshots (uuid, component_uuid, created_at, period_date, islast)
         VALUES (?1, ?2, ?3, ?4, 1)",
        params![
            analysis.uuid,
            analysis.project_uuid,
            analysis.created_at,
            analysis.period_date
        ],
    )
    .with_context(|| format!("Failed to insert analysis {}", analysis.uuid))?;
    Ok(())
}

/// Returns the id of the new gate
pub fn insert_quality_gate(conn: &Connection, name: &str, is_default: bool) -> Result<i64> {
    if is_default {
        conn.execute("UPDATE quality_gates SET is_default = 0", [])?;
    }
    conn.execute(
        "INSERT INTO quality_gates (name, is_default) VALUES (?1, ?2)",
        params![name, is_default],
    )
    .with_context(|| format!("Failed to insert quality gate {}", name))?;
    Ok(conn.last_insert_rowid())
}

/// Adds `condition` to a gate; the metric must already be registered
pub fn insert_condition(conn: &Connection, quality_gate_id: i64, condition: &Condition) -> Result<i64> {
    let metric_id: i64 = conn
        .query_row(
            "SELECT id FROM metrics WHERE name = ?1",
            params![condition.metric_key],
            |row| row.get(0),
        )
        .optional()?
        .with_context(|| format!("Metric {} is not registered", condition.metric_key))?;

    conn.execute(
        "INSERT INTO quality_gate_conditions (qgate_id, metric_id, operator, value_error, value_warning, period)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            quality_gate_id,
            metric_id,
            condition.operator.db_value(),
            condition.error_threshold,
            condition.warning_threshold,
            condition.on_leak.then_some(1_i64),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn associate_quality_gate(conn: &Connection, project_uuid: &str, quality_gate_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO project_qgates (project_uuid, quality_gate_id) VALUES (?1, ?2)
         ON CONFLICT(project_uuid) DO UPDATE SET quality_gate_id = excluded.quality_gate_id",
        params![project_uuid, quality_gate_id],
    )
    .with_context(|| format!("Failed to bind quality gate to project {}", project_uuid))?;
    Ok(())
}

/// Issue row used to seed a database
#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub key: String,
    pub component_uuid: String,
    pub project_uuid: String,
    pub rule_type: RuleType,
    pub severity: Severity,
    pub resolution: Option<String>,
    pub status: String,
    pub effort: Option<f64>,
    pub created_at: i64,
}

pub fn insert_issue(conn: &Connection, issue: &IssueRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO issues (kee, component_uuid, project_uuid, issue_type, severity, resolution,
                             status, effort, issue_creation_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            issue.key,
            issue.component_uuid,
            issue.project_uuid,
            issue.rule_type.db_constant(),
            issue.severity.as_str(),
            issue.resolution,
            issue.status,
            issue.effort,
            issue.created_at,
        ],
    )
    .with_context(|| format!("Failed to insert issue {}", issue.key))?;
    Ok(())
}

pub fn insert_measure(conn: &Connection, measure: &LiveMeasure) -> Result<()> {
    conn.execute(
        "INSERT INTO live_measures (component_uuid, project_uuid, metric_id, value, text_value, variation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(component_uuid, metric_id) DO UPDATE SET
             project_uuid = excluded.project_uuid,
             value = excluded.value,
             text_value = excluded.text_value,
             variation = excluded.variation",
        params![
            measure.component_uuid,
            measure.project_uuid,
            measure.metric_id,
            measure.value,
            measure.text_value,
            measure.variation,
        ],
    )?;
    Ok(())
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore { conn }
    }

    fn select_metrics_where<P: rusqlite::ToSql>(&self, column: &str, values: &[P]) -> Result<Vec<Metric>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, val_type, best_value, decimal_scale FROM metrics
             WHERE {} IN ({}) ORDER BY id",
            column,
            placeholders(values.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), parse_metric_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl LiveMeasureStore for SqliteStore<'_> {
    fn select_components_by_uuids(&self, uuids: &[String]) -> Result<Vec<Component>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT uuid, kee, project_uuid, uuid_path, qualifier, main_branch_project_uuid
             FROM components WHERE uuid IN ({}) ORDER BY uuid",
            placeholders(uuids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(uuids.iter()), parse_component_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn select_component_by_key(&self, key: &str) -> Result<Option<Component>> {
        let component = self
            .conn
            .query_row(
                "SELECT uuid, kee, project_uuid, uuid_path, qualifier, main_branch_project_uuid
                 FROM components WHERE kee = ?1",
                params![key],
                parse_component_row,
            )
            .optional()?;
        Ok(component)
    }

    fn select_branch(&self, uuid: &str) -> Result<Option<Branch>> {
        let branch = self
            .conn
            .query_row(
                "SELECT uuid, project_uuid, kee, branch_type FROM project_branches WHERE uuid = ?1",
                params![uuid],
                |row| {
                    let raw: String = row.get(3)?;
                    let branch_type = BranchType::parse(&raw)
                        .ok_or_else(|| invalid_column(3, Type::Text, format!("unknown branch type: {raw}")))?;
                    Ok(Branch {
                        uuid: row.get(0)?,
                        project_uuid: row.get(1)?,
                        key: row.get(2)?,
                        branch_type,
                    })
                },
            )
            .optional()?;
        Ok(branch)
    }

    fn select_last_analysis(&self, project_uuid: &str) -> Result<Option<Analysis>> {
        let analysis = self
            .conn
            .query_row(
                "SELECT uuid, component_uuid, created_at, period_date FROM snapshots
                 WHERE component_uuid = ?1 AND islast = 1",
                params![project_uuid],
                |row| {
                    Ok(Analysis {
                        uuid: row.get(0)?,
                        project_uuid: row.get(1)?,
                        created_at: row.get(2)?,
                        period_date: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(analysis)
    }

    fn select_quality_gate_for_project(&self, project_uuid: &str) -> Result<Option<QualityGateRow>> {
        let to_row = |row: &Row<'_>| {
            Ok(QualityGateRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        };
        let bound = self
            .conn
            .query_row(
                "SELECT qg.id, qg.name FROM quality_gates qg
                 INNER JOIN project_qgates pq ON pq.quality_gate_id = qg.id
                 WHERE pq.project_uuid = ?1",
                params![project_uuid],
                to_row,
            )
            .optional()?;
        if bound.is_some() {
            return Ok(bound);
        }
        let default = self
            .conn
            .query_row(
                "SELECT id, name FROM quality_gates WHERE is_default = 1",
                [],
                to_row,
            )
            .optional()?;
        Ok(default)
    }

    fn select_conditions(&self, quality_gate_id: i64) -> Result<Vec<ConditionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, qgate_id, metric_id, operator, value_error, value_warning, period
             FROM quality_gate_conditions WHERE qgate_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![quality_gate_id], |row| {
            Ok(ConditionRow {
                id: row.get(0)?,
                quality_gate_id: row.get(1)?,
                metric_id: row.get(2)?,
                operator: row.get(3)?,
                error_threshold: row.get(4)?,
                warning_threshold: row.get(5)?,
                period: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn select_metrics_by_keys(&self, keys: &[String]) -> Result<Vec<Metric>> {
        self.select_metrics_where("name", keys)
    }

    fn select_metrics_by_ids(&self, ids: &[i64]) -> Result<Vec<Metric>> {
        self.select_metrics_where("id", ids)
    }

    fn select_measures(&self, component_uuids: &[String], metric_ids: &[i64]) -> Result<Vec<LiveMeasure>> {
        if component_uuids.is_empty() || metric_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT component_uuid, project_uuid, metric_id, value, text_value, variation
             FROM live_measures
             WHERE component_uuid IN ({}) AND metric_id IN ({})
             ORDER BY component_uuid, metric_id",
            placeholders(component_uuids.len()),
            placeholders(metric_ids.len())
        );
        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(component_uuids.len() + metric_ids.len());
        values.extend(component_uuids.iter().map(|u| u as &dyn rusqlite::ToSql));
        values.extend(metric_ids.iter().map(|id| id as &dyn rusqlite::ToSql));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(values.as_slice(), |row| {
            Ok(LiveMeasure {
                component_uuid: row.get(0)?,
                project_uuid: row.get(1)?,
                metric_id: row.get(2)?,
                value: row.get(3)?,
                text_value: row.get(4)?,
                variation: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn select_issue_groups(&self, base: &Component, leak_cutoff: i64) -> Result<Vec<IssueGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.issue_type, i.severity, i.resolution, i.status,
                    SUM(COALESCE(i.effort, 0.0)), COUNT(*),
                    CASE WHEN i.issue_creation_date >= ?2 THEN 1 ELSE 0 END AS in_leak
             FROM issues i
             INNER JOIN components c ON c.uuid = i.component_uuid
             WHERE i.status <> ?3
               AND c.project_uuid = ?4
               AND (c.uuid = ?1 OR instr(c.uuid_path, ?5) > 0)
             GROUP BY i.issue_type, i.severity, i.resolution, i.status, in_leak
             ORDER BY i.issue_type, i.severity, i.resolution, i.status, in_leak",
        )?;
        let rows = stmt.query_map(
            params![
                base.uuid,
                leak_cutoff,
                STATUS_CLOSED,
                base.project_uuid,
                format!(".{}.", base.uuid),
            ],
            parse_issue_group_row,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to group issues of {}", base.key))
    }

    fn upsert_measure(&mut self, measure: &LiveMeasure) -> Result<()> {
        insert_measure(self.conn, measure)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn invalid_column(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        ty,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn parse_component_row(row: &Row<'_>) -> rusqlite::Result<Component> {
    let uuid_path: String = row.get(3)?;
    Ok(Component {
        uuid: row.get(0)?,
        key: row.get(1)?,
        project_uuid: row.get(2)?,
        uuid_path: decode_uuid_path(&uuid_path),
        qualifier: row.get(4)?,
        main_branch_project_uuid: row.get(5)?,
    })
}

fn parse_metric_row(row: &Row<'_>) -> rusqlite::Result<Metric> {
    let raw_type: String = row.get(2)?;
    let value_type = ValueType::parse(&raw_type)
        .ok_or_else(|| invalid_column(2, Type::Text, format!("unknown value type: {raw_type}")))?;
    Ok(Metric {
        id: row.get(0)?,
        key: row.get(1)?,
        value_type,
        best_value: row.get(3)?,
        decimal_scale: row.get(4)?,
    })
}

fn parse_issue_group_row(row: &Row<'_>) -> rusqlite::Result<IssueGroup> {
    let raw_type: i64 = row.get(0)?;
    let rule_type = RuleType::from_db_constant(raw_type)
        .ok_or_else(|| invalid_column(0, Type::Integer, format!("unknown issue type: {raw_type}")))?;
    let raw_severity: String = row.get(1)?;
    let severity = Severity::parse(&raw_severity)
        .ok_or_else(|| invalid_column(1, Type::Text, format!("unknown severity: {raw_severity}")))?;
    let count: i64 = row.get(5)?;
    let in_leak: i64 = row.get(6)?;

    Ok(IssueGroup {
        rule_type,
        severity,
        resolution: row.get(2)?,
        status: row.get(3)?,
        effort: row.get(4)?,
        count: u64::try_from(count).unwrap_or(0),
        in_leak: in_leak == 1,
    })
}
