//! Startup schema migration.
//!
//! Runs on every start before anything else touches the database.
//!
//! - **Additive only**: missing tables and columns are created, nothing is dropped
//! - **Idempotent**: every step checks current state first, so re-running is a no-op
//! - **Non-fatal**: a failing step is logged and skipped; the remaining steps still run
//! - **Data repairs**: ids missing from legacy rows are backfilled, and stored
//!   summaries are rewritten to agree with the authoritative columns

use crate::core::db;
use crate::core::error::{FailureKind, ReportError};
use crate::core::pool::SqlitePool;
use crate::core::schemas::{self, ColumnSpec, REPORT_COLUMNS};
use crate::reports::model::Report;
use crate::reports::summary::{self, ARCHIVED_PREFIX, REPORT_ID_PREFIX};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{error, info};

type StepFn = Box<dyn Fn(&mut Connection) -> Result<usize, ReportError>>;

/// One migration step. `up` returns how many objects or rows it changed.
pub struct MigrationStep {
    pub name: String,
    pub description: String,
    pub up: StepFn,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepResult {
    pub name: String,
    pub changed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepFailure {
    pub name: String,
    pub kind: FailureKind,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MigrationReport {
    pub completed: Vec<StepResult>,
    pub failed: Vec<StepFailure>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_changed(&self) -> usize {
        self.completed.iter().map(|s| s.changed).sum()
    }
}

/// All steps in execution order.
pub fn all_steps() -> Vec<MigrationStep> {
    let mut steps = vec![MigrationStep {
        name: "create_tables".to_string(),
        description: "Create report and player tables if absent".to_string(),
        up: Box::new(create_tables),
    }];

    for spec in schemas::EXPECTED_COLUMNS {
        steps.push(MigrationStep {
            name: format!("add_column:{}.{}", spec.table, spec.column),
            description: format!("Add {}.{} {}", spec.table, spec.column, spec.definition),
            up: Box::new(move |conn: &mut Connection| add_column_if_missing(conn, spec)),
        });
    }

    steps.push(MigrationStep {
        name: "create_report_id_index".to_string(),
        description: "Index bug_reports by report_id".to_string(),
        up: Box::new(|conn: &mut Connection| {
            conn.execute(schemas::REPORTS_DB_SCHEMA_INDEX, [])?;
            Ok(0)
        }),
    });
    steps.push(MigrationStep {
        name: "repair_report_ids".to_string(),
        description: "Backfill null or zero report ids".to_string(),
        up: Box::new(repair_report_ids),
    });
    steps.push(MigrationStep {
        name: "repair_summaries".to_string(),
        description: "Rewrite stored summaries to match report id and archive flag".to_string(),
        up: Box::new(repair_summaries),
    });
    steps
}

/// Bring the database at `pool` up to the expected shape.
pub fn ensure_schema(pool: &SqlitePool) -> MigrationReport {
    let mut report = MigrationReport::default();

    for step in all_steps() {
        match pool.with_write(|conn| (step.up)(conn)) {
            Ok(changed) => {
                if changed > 0 {
                    info!(event = "migration_applied", step = %step.name, changed, description = %step.description);
                }
                report.completed.push(StepResult {
                    name: step.name,
                    changed,
                });
            }
            Err(err) => {
                let kind = FailureKind::classify(&err);
                error!(
                    event = "migration_step_failed",
                    step = %step.name,
                    kind = kind.as_str(),
                    error = %err,
                    "migration step skipped; stored data may drift until it succeeds"
                );
                report.failed.push(StepFailure {
                    name: step.name,
                    kind,
                    error: err.to_string(),
                });
            }
        }
    }

    report
}

fn create_tables(conn: &mut Connection) -> Result<usize, ReportError> {
    conn.execute(schemas::REPORTS_DB_SCHEMA, [])?;
    conn.execute(schemas::PLAYER_DATA_DB_SCHEMA, [])?;
    Ok(0)
}

fn add_column_if_missing(conn: &mut Connection, spec: &ColumnSpec) -> Result<usize, ReportError> {
    if db::column_exists(conn, spec.table, spec.column)? {
        return Ok(0);
    }
    // Identifiers come from the fixed list in `schemas`, never from input.
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        spec.table, spec.column, spec.definition
    );
    conn.execute(&sql, [])?;
    Ok(1)
}

/// Give every row whose id is null or zero the 1-based ordinal of its
/// position in a rowid-ordered scan. If that ordinal is already held by
/// another row the next id above the current maximum is used instead.
fn repair_report_ids(conn: &mut Connection) -> Result<usize, ReportError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let key = db::rowid_alias(&tx, schemas::REPORTS_TABLE)?;

    let rows: Vec<(i64, Option<i64>)> = {
        let sql = format!(
            "SELECT {key}, report_id FROM bug_reports ORDER BY {key} ASC",
            key = key
        );
        let mut stmt = tx.prepare(&sql)?;
        let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for r in mapped {
            out.push(r?);
        }
        out
    };

    let mut taken: BTreeSet<i64> = rows
        .iter()
        .filter_map(|(_, id)| id.filter(|v| *v != 0))
        .collect();

    let update = format!("UPDATE bug_reports SET report_id = ?1 WHERE {} = ?2", key);
    let mut repaired = 0;
    for (ordinal, (row_key, id)) in (1i64..).zip(rows.iter()) {
        if id.is_some_and(|v| v != 0) {
            continue;
        }
        let new_id = if taken.contains(&ordinal) {
            taken.last().copied().unwrap_or(0) + 1
        } else {
            ordinal
        };
        tx.execute(&update, params![new_id, row_key])?;
        taken.insert(new_id);
        repaired += 1;
    }

    tx.commit()?;
    Ok(repaired)
}

/// Rewrite the `Report ID:` and `Archived:` lines of every stored header so
/// they match the columns. A header missing either line, or missing
/// entirely, is rendered afresh from the row.
fn repair_summaries(conn: &mut Connection) -> Result<usize, ReportError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let key = db::rowid_alias(&tx, schemas::REPORTS_TABLE)?;

    let rows: Vec<(i64, Option<String>, Option<i64>, Option<i64>)> = {
        let sql = format!(
            "SELECT {}, header, report_id, archived FROM bug_reports",
            key
        );
        let mut stmt = tx.prepare(&sql)?;
        let mapped = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        let mut out = Vec::new();
        for r in mapped {
            out.push(r?);
        }
        out
    };

    let by_key = format!(
        "SELECT {} FROM bug_reports WHERE {} = ?1",
        REPORT_COLUMNS, key
    );
    let update = format!("UPDATE bug_reports SET header = ?1 WHERE {} = ?2", key);
    let mut rewritten = 0;
    for (row_key, header, report_id, archived) in rows {
        let new_header = match header.as_deref().filter(|h| has_state_lines(h)) {
            Some(h) => {
                let id_text = report_id.unwrap_or(0).to_string();
                let archived_text = u8::from(archived.unwrap_or(0) != 0).to_string();
                let h = summary::rewrite_line(h, REPORT_ID_PREFIX, &id_text);
                summary::rewrite_line(&h, ARCHIVED_PREFIX, &archived_text)
            }
            None => {
                let Some(report) = tx
                    .query_row(&by_key, params![row_key], Report::from_row)
                    .optional()?
                else {
                    continue;
                };
                summary::render_summary(&report)
            }
        };

        if header.as_deref() != Some(new_header.as_str()) {
            tx.execute(&update, params![new_header, row_key])?;
            rewritten += 1;
        }
    }

    tx.commit()?;
    Ok(rewritten)
}

fn has_state_lines(header: &str) -> bool {
    summary::read_line(header, REPORT_ID_PREFIX).is_some()
        && summary::read_line(header, ARCHIVED_PREFIX).is_some()
}
