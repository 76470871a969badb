//! Persistence gateway: the only code that issues SQL against report tables.
//!
//! Every public method is fail-soft. Errors are logged with their
//! [`FailureKind`] and handed back as [`Outcome::Failed`] instead of being
//! propagated, so the rendering layer always gets a usable value.

use crate::core::error::{FailureKind, Outcome, ReportError};
use crate::core::pool::SqlitePool;
use crate::core::schemas::REPORT_COLUMNS;
use crate::reports::model::{CountFilter, Location, NewReport, Report, ReportId, Transition};
use crate::reports::summary::{self, ARCHIVED_PREFIX};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use tracing::{error, warn};

pub struct Gateway {
    pool: SqlitePool,
}

impl Gateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert `draft` under `max(existing id) + 1`, or `id_hint` if that is
    /// larger. The max is read inside the same immediate transaction as the
    /// insert.
    pub fn insert(&self, draft: &NewReport, id_hint: Option<ReportId>) -> Outcome<Report> {
        let result = self.pool.with_write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let db_max: i64 = tx.query_row(
                "SELECT COALESCE(MAX(report_id), 0) FROM bug_reports",
                [],
                |row| row.get(0),
            )?;
            let id = (db_max + 1).max(id_hint.unwrap_or(0));

            let report = Report {
                id,
                submitter_id: draft.submitter.submitter_id.clone(),
                submitter_name: draft.submitter.submitter_name.clone(),
                environment_name: draft.submitter.location.environment.clone(),
                location: Some(draft.submitter.location.clone()),
                mode: draft.submitter.mode.clone(),
                body: draft.body.clone(),
                category_id: draft.category_id,
                archived: false,
                created_at: draft.created_at,
            };

            tx.execute(
                "INSERT INTO bug_reports(player_id, header, message, username, world, archived, report_id, timestamp, location, gamemode, category_id)
                 VALUES(?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9, ?10)",
                params![
                    report.submitter_id,
                    summary::render_summary(&report),
                    report.body,
                    report.submitter_name,
                    report.environment_name,
                    report.id,
                    report.created_at,
                    draft.submitter.location.to_string(),
                    report.mode,
                    report.category_id,
                ],
            )?;
            tx.commit()?;
            Ok(report)
        });
        self.soft("insert", result)
    }

    pub fn count_where(&self, filter: &CountFilter) -> Outcome<i64> {
        let result = self.pool.with_read(|conn| {
            let count = match filter {
                CountFilter::All => {
                    conn.query_row("SELECT COUNT(*) FROM bug_reports", [], |row| row.get(0))?
                }
                CountFilter::Archived(archived) => conn.query_row(
                    "SELECT COUNT(*) FROM bug_reports WHERE COALESCE(archived, 0) = ?1",
                    params![i64::from(*archived)],
                    |row| row.get(0),
                )?,
                CountFilter::BySubmitter(id) => conn.query_row(
                    "SELECT COUNT(*) FROM bug_reports WHERE player_id = ?1",
                    params![id],
                    |row| row.get(0),
                )?,
                CountFilter::BySubmitterArchived(id, archived) => conn.query_row(
                    "SELECT COUNT(*) FROM bug_reports WHERE player_id = ?1 AND COALESCE(archived, 0) = ?2",
                    params![id, i64::from(*archived)],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        });
        self.soft("count_where", result)
    }

    /// All reports ordered by id ascending. Rows that cannot be decoded are
    /// skipped and logged rather than failing the scan.
    pub fn list_all(&self) -> Outcome<Vec<Report>> {
        let result = self.pool.with_read(|conn| {
            let sql = format!(
                "SELECT {} FROM bug_reports ORDER BY report_id ASC",
                REPORT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], Report::from_row)?;
            let mut out = Vec::new();
            for row in rows {
                match row {
                    Ok(report) => out.push(report),
                    Err(err) => warn!(event = "report_row_skipped", error = %err),
                }
            }
            Ok(out)
        });
        self.soft("list_all", result)
    }

    pub fn max_id(&self) -> Outcome<ReportId> {
        let result = self.pool.with_read(|conn| {
            Ok(conn.query_row(
                "SELECT COALESCE(MAX(report_id), 0) FROM bug_reports",
                [],
                |row| row.get(0),
            )?)
        });
        self.soft("max_id", result)
    }

    pub fn get(&self, id: ReportId) -> Outcome<Report> {
        let result = self
            .pool
            .with_read(|conn| fetch_report(conn, id).map_err(ReportError::from));
        self.soft("get", result).flatten()
    }

    /// Flip the archive flag and rewrite the stored header's `Archived:` line
    /// in the same transaction. Writing the state a report already has is
    /// reported as `Unchanged` and touches nothing.
    pub fn set_archived(&self, id: ReportId, archived: bool) -> Outcome<Transition> {
        let result = self.pool.with_write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(mut report) = fetch_report(&tx, id)? else {
                return Ok(Transition::Missing);
            };
            if report.archived == archived {
                return Ok(Transition::Unchanged);
            }
            report.archived = archived;

            let header: Option<String> = tx
                .query_row(
                    "SELECT header FROM bug_reports WHERE report_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            let header = match header {
                Some(h) if summary::read_line(&h, ARCHIVED_PREFIX).is_some() => {
                    summary::rewrite_line(&h, ARCHIVED_PREFIX, &u8::from(archived).to_string())
                }
                _ => summary::render_summary(&report),
            };

            tx.execute(
                "UPDATE bug_reports SET archived = ?1, header = ?2 WHERE report_id = ?3",
                params![i64::from(archived), header, id],
            )?;
            tx.commit()?;
            Ok(Transition::Applied)
        });
        self.soft("set_archived", result)
    }

    pub fn delete_by_id(&self, id: ReportId) -> Outcome<Transition> {
        let result = self.pool.with_write(|conn| {
            let changed = conn.execute(
                "DELETE FROM bug_reports WHERE report_id = ?1",
                params![id],
            )?;
            Ok(if changed > 0 {
                Transition::Applied
            } else {
                Transition::Missing
            })
        });
        self.soft("delete_by_id", result)
    }

    pub fn upsert_last_login(&self, submitter_id: &str, timestamp: i64) -> Outcome<()> {
        let result = self.pool.with_write(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let updated = tx.execute(
                "UPDATE player_data SET last_login_timestamp = ?1 WHERE player_id = ?2",
                params![timestamp, submitter_id],
            )?;
            if updated == 0 {
                tx.execute(
                    "INSERT INTO player_data(player_id, last_login_timestamp) VALUES(?1, ?2)",
                    params![submitter_id, timestamp],
                )?;
            }
            tx.commit()?;
            Ok(())
        });
        self.soft("upsert_last_login", result)
    }

    pub fn last_login(&self, submitter_id: &str) -> Outcome<i64> {
        let result = self.pool.with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT last_login_timestamp FROM player_data WHERE player_id = ?1",
                    params![submitter_id],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten())
        });
        self.soft("last_login", result).flatten()
    }

    /// Stored location for a report. A missing or unparseable value is `Empty`.
    pub fn get_location_by_id(&self, id: ReportId) -> Outcome<Location> {
        let result = self.pool.with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT location FROM bug_reports WHERE report_id = ?1",
                    params![id],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten())
        });
        self.soft("get_location_by_id", result)
            .flatten()
            .and_then(|raw| match raw.parse::<Location>() {
                Ok(location) => Outcome::Ok(location),
                Err(err) => {
                    warn!(event = "location_unparseable", report_id = id, raw = %raw, error = %err);
                    Outcome::Empty
                }
            })
    }

    /// `(created_at, body)` for every report filed under `name`.
    pub fn list_by_submitter_name(&self, name: &str) -> Outcome<Vec<(i64, String)>> {
        let result = self.pool.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT COALESCE(timestamp, 0), COALESCE(message, '') FROM bug_reports WHERE username = ?1 ORDER BY report_id ASC",
            )?;
            let rows = stmt.query_map(params![name], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        });
        self.soft("list_by_submitter_name", result)
    }

    /// `(submitter_name, body)` for every report.
    pub fn bodies_per_submitter(&self) -> Outcome<Vec<(String, String)>> {
        let result = self.pool.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT COALESCE(username, ''), COALESCE(message, '') FROM bug_reports ORDER BY report_id ASC",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        });
        self.soft("bodies_per_submitter", result)
    }

    fn soft<T>(&self, op: &str, result: Result<T, ReportError>) -> Outcome<T> {
        match result {
            Ok(v) => Outcome::Ok(v),
            Err(err) => {
                let kind = FailureKind::classify(&err);
                log_failure(self.pool.db_path(), op, kind, &err);
                Outcome::Failed(kind)
            }
        }
    }
}

pub(crate) fn log_failure(db_path: &Path, op: &str, kind: FailureKind, err: &ReportError) {
    error!(event = "store_failure", op, kind = kind.as_str(), error = %err);
    if kind == FailureKind::Corruption {
        error!(
            event = "store_corrupt",
            path = %db_path.display(),
            "report database is corrupted; stop the process, move the file aside and restart to recreate it"
        );
    }
}

fn fetch_report(conn: &Connection, id: ReportId) -> rusqlite::Result<Option<Report>> {
    let sql = format!(
        "SELECT {} FROM bug_reports WHERE report_id = ?1",
        REPORT_COLUMNS
    );
    conn.query_row(&sql, params![id], Report::from_row)
        .optional()
}
