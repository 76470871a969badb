//! The report store: the public API collaborators use.
//!
//! All mutations (`submit`, `set_archive_state`, `delete`) run under one
//! mutex, and each one commits to the database before it patches the cache.
//! Reads never take that mutex. They re-read the database on every call and
//! only install the result into the cache if no mutation patched it in the
//! meantime.

use crate::core::config::StoreConfig;
use crate::core::error::{FailureKind, Outcome, ReportError};
use crate::core::migration::{self, MigrationReport};
use crate::core::pool::SqlitePool;
use crate::core::time;
use crate::reports::cache::{CachedReport, ReportCache};
use crate::reports::gateway::Gateway;
use crate::reports::hooks::{self, NoopHooks, ReportHooks};
use crate::reports::model::{
    CountFilter, Location, NewReport, Report, ReportId, ReportStats, SubmitterInfo, Transition,
};
use crate::reports::pagination::{self, Page};
use crate::reports::tokens::{Action, ActionLedger, ActionToken};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted { report: Report },
    QuotaExceeded { limit: u64 },
    Rejected { reason: String },
    Failed { kind: FailureKind },
}

pub struct ReportStore {
    config: StoreConfig,
    gateway: Gateway,
    cache: ReportCache,
    mutation_lock: Mutex<()>,
    actions: ActionLedger,
    hooks: Arc<dyn ReportHooks>,
    migration: MigrationReport,
}

impl ReportStore {
    pub fn open(config: StoreConfig) -> Result<Self, ReportError> {
        Self::open_with_hooks(config, Arc::new(NoopHooks))
    }

    /// Migrate the database, then warm the cache. Migration failures are
    /// logged and kept in [`migration_report`](Self::migration_report); only
    /// an invalid config is fatal.
    pub fn open_with_hooks(
        config: StoreConfig,
        hooks: Arc<dyn ReportHooks>,
    ) -> Result<Self, ReportError> {
        config.validate()?;
        let pool = SqlitePool::new(&config.database.path, config.busy_timeout());
        let migration = migration::ensure_schema(&pool);
        if !migration.is_clean() {
            warn!(
                event = "store_degraded",
                failed_steps = migration.failed.len(),
                "report store opened with failed migration steps"
            );
        }

        let store = Self {
            config,
            gateway: Gateway::new(pool),
            cache: ReportCache::new(),
            mutation_lock: Mutex::new(()),
            actions: ActionLedger::new(),
            hooks,
            migration,
        };
        store.reload_cache();
        info!(
            event = "store_opened",
            path = %store.gateway.pool().db_path().display(),
            cached = store.cache.len()
        );
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    /// Read-only view of the in-memory projection.
    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// File a new report. Its id is one past the largest id ever observed,
    /// never the row count, so ids of deleted reports are not reused.
    pub fn submit(
        &self,
        submitter: SubmitterInfo,
        body: &str,
        category_id: Option<i64>,
    ) -> SubmitOutcome {
        if body.trim().is_empty() {
            return SubmitOutcome::Rejected {
                reason: "report body is empty".to_string(),
            };
        }

        let report = {
            let _guard = self.lock_mutations();

            let limit = self.config.limits.max_reports_per_submitter;
            if limit > 0 {
                let filter = CountFilter::BySubmitter(submitter.submitter_id.clone());
                match self.gateway.count_where(&filter) {
                    Outcome::Ok(count) if count >= limit as i64 => {
                        return SubmitOutcome::QuotaExceeded { limit };
                    }
                    Outcome::Failed(kind) => return SubmitOutcome::Failed { kind },
                    Outcome::Ok(_) | Outcome::Empty => {}
                }
            }

            let id_hint = match self.cache.max_id() {
                Some(max) => Some(max + 1),
                None => self.gateway.max_id().into_option().map(|max| max + 1),
            };
            let draft = NewReport {
                submitter,
                body: body.to_string(),
                category_id,
                created_at: time::now_millis(),
            };

            let report = match self.gateway.insert(&draft, id_hint) {
                Outcome::Ok(report) => report,
                Outcome::Failed(kind) => return SubmitOutcome::Failed { kind },
                Outcome::Empty => {
                    return SubmitOutcome::Failed {
                        kind: FailureKind::Internal,
                    };
                }
            };
            self.cache.append(report.clone());
            report
        };

        info!(event = "report_submitted", report_id = report.id, submitter = %report.submitter_id);
        self.fire_submission_hooks(&report);
        SubmitOutcome::Submitted { report }
    }

    /// Reports whose archive flag equals `include_archived`, by id ascending.
    /// Always re-reads the database.
    pub fn list(&self, include_archived: bool) -> Outcome<Vec<CachedReport>> {
        let observed = self.cache.generation();
        let reports = match self.gateway.list_all() {
            Outcome::Ok(reports) => reports,
            Outcome::Empty => Vec::new(),
            Outcome::Failed(kind) => return Outcome::Failed(kind),
        };

        if let Some(submitters) = self.cache.reload_if_current(reports.clone(), observed) {
            hooks::dispatch_submitters(Arc::clone(&self.hooks), submitters);
        }

        let entries = reports.into_iter().map(CachedReport::new).collect();
        Outcome::Ok(pagination::filter_and_sort(entries, include_archived))
    }

    /// Window `list` using the configured page size.
    pub fn paginate<T: Clone>(&self, list: &[T], page_number: usize) -> Page<T> {
        pagination::paginate(list, page_number, self.config.listing.page_size)
    }

    /// `list` followed by `paginate`.
    pub fn page(&self, include_archived: bool, page_number: usize) -> Outcome<Page<CachedReport>> {
        self.list(include_archived)
            .map(|list| self.paginate(&list, page_number))
    }

    /// Archive or restore a report. Repeating a call with the same target
    /// state yields `Unchanged` and writes nothing.
    pub fn set_archive_state(&self, id: ReportId, archived: bool) -> Outcome<Transition> {
        let _guard = self.lock_mutations();

        let transition = match self.gateway.set_archived(id, archived) {
            Outcome::Ok(transition) => transition,
            other => return other,
        };

        self.reload_cache();
        if transition != Transition::Missing {
            self.cache.patch(id, |report| report.archived = archived);
        }
        info!(event = "report_archive_state", report_id = id, archived, ?transition);
        Outcome::Ok(transition)
    }

    /// Delete a report. Deleting an id that no longer exists yields `Missing`.
    pub fn delete(&self, id: ReportId) -> Outcome<Transition> {
        let _guard = self.lock_mutations();

        let transition = match self.gateway.delete_by_id(id) {
            Outcome::Ok(transition) => transition,
            other => return other,
        };

        self.reload_cache();
        self.cache.remove(id);
        self.actions.invalidate_report(id);
        info!(event = "report_deleted", report_id = id, ?transition);
        Outcome::Ok(transition)
    }

    /// Hand out a single-use token for a moderation action on `id`. No token
    /// is issued for a report that does not exist.
    pub fn issue_action(&self, id: ReportId, action: Action) -> Outcome<ActionToken> {
        self.gateway.get(id).map(|_| {
            let token = self.actions.issue(id, action);
            debug!(
                event = "action_issued",
                report_id = id,
                ?action,
                outstanding = self.actions.outstanding()
            );
            token
        })
    }

    /// Drop tokens of a view that was closed without being used.
    pub fn revoke_actions(&self, tokens: &[ActionToken]) -> usize {
        self.actions.revoke(tokens)
    }

    /// Perform the action behind `token`. A token that was already used or
    /// belonged to a deleted report yields `Stale` and does nothing.
    pub fn redeem(&self, token: &ActionToken) -> Outcome<Transition> {
        let Some(pending) = self.actions.take(token) else {
            return Outcome::Ok(Transition::Stale);
        };
        match pending.action {
            Action::Archive => self.set_archive_state(pending.report_id, true),
            Action::Unarchive => self.set_archive_state(pending.report_id, false),
            Action::Delete => self.delete(pending.report_id),
        }
    }

    pub fn get(&self, id: ReportId) -> Outcome<Report> {
        self.gateway.get(id)
    }

    pub fn get_location(&self, id: ReportId) -> Outcome<Location> {
        self.gateway.get_location_by_id(id)
    }

    pub fn record_login(&self, submitter_id: &str) -> Outcome<()> {
        self.gateway
            .upsert_last_login(submitter_id, time::now_millis())
    }

    pub fn last_login(&self, submitter_id: &str) -> Outcome<i64> {
        self.gateway.last_login(submitter_id)
    }

    pub fn stats(&self) -> Outcome<ReportStats> {
        self.collect_stats(
            CountFilter::All,
            CountFilter::Archived(false),
            CountFilter::Archived(true),
        )
    }

    pub fn submitter_stats(&self, submitter_id: &str) -> Outcome<ReportStats> {
        let id = submitter_id.to_string();
        self.collect_stats(
            CountFilter::BySubmitter(id.clone()),
            CountFilter::BySubmitterArchived(id.clone(), false),
            CountFilter::BySubmitterArchived(id, true),
        )
    }

    /// `(created_at, body)` of every report filed under `name`.
    pub fn history_for(&self, name: &str) -> Outcome<Vec<(i64, String)>> {
        self.gateway.list_by_submitter_name(name)
    }

    /// `(submitter_name, body)` of every report.
    pub fn bodies_per_submitter(&self) -> Outcome<Vec<(String, String)>> {
        self.gateway.bodies_per_submitter()
    }

    fn collect_stats(
        &self,
        total: CountFilter,
        open: CountFilter,
        archived: CountFilter,
    ) -> Outcome<ReportStats> {
        let mut counts = [0i64; 3];
        for (slot, filter) in counts.iter_mut().zip([total, open, archived]) {
            match self.gateway.count_where(&filter) {
                Outcome::Ok(n) => *slot = n,
                Outcome::Empty => {}
                Outcome::Failed(kind) => return Outcome::Failed(kind),
            }
        }
        let [total, open, archived] = counts;
        Outcome::Ok(ReportStats {
            total,
            open,
            archived,
        })
    }

    /// Full reload from the database. A failed read leaves the cache as is.
    fn reload_cache(&self) {
        if let Outcome::Ok(reports) = self.gateway.list_all() {
            let submitters = self.cache.reload(reports);
            hooks::dispatch_submitters(Arc::clone(&self.hooks), submitters);
        }
    }

    fn fire_submission_hooks(&self, report: &Report) {
        let timeout = self.config.dispatch_timeout();

        if self.config.notifications.enabled {
            let sink = Arc::clone(&self.hooks);
            let report = report.clone();
            hooks::dispatch("report_created", timeout, move || sink.report_created(&report));
        }

        if self.config.notifications.webhook_enabled {
            if !self.config.webhook_active() {
                warn!(
                    event = "webhook_url_missing",
                    "webhook is enabled but notifications.webhook_url is empty"
                );
                return;
            }
            let sink = Arc::clone(&self.hooks);
            let report = report.clone();
            let url = self.config.notifications.webhook_url.clone();
            hooks::dispatch("webhook", timeout, move || sink.webhook(&url, &report));
        }
    }

    fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutation_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
