//! In-memory projection of every report, indexed by id.
//!
//! The cache is only ever patched after the matching durable write has
//! committed, so on any disagreement the database wins and the next
//! [`ReportCache::reload`] converges.

use crate::reports::model::{Report, ReportId};
use crate::reports::summary::render_summary;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A report together with its rendered summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedReport {
    pub report: Report,
    pub summary: String,
}

impl CachedReport {
    pub fn new(report: Report) -> Self {
        let summary = render_summary(&report);
        Self { report, summary }
    }
}

/// Distinct submitter seen during a reload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubmitterRef {
    pub submitter_id: String,
    pub submitter_name: String,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: BTreeMap<ReportId, CachedReport>,
    /// Bumped on every patch so a reload built from an older read can be
    /// recognized and dropped.
    generation: u64,
    /// Largest id ever held, including since-deleted ones.
    high_water: ReportId,
    warm: bool,
}

#[derive(Debug, Default)]
pub struct ReportCache {
    state: RwLock<CacheState>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Replace the whole projection. Returns the distinct submitters seen.
    pub fn reload(&self, reports: Vec<Report>) -> Vec<SubmitterRef> {
        let mut state = self.write();
        let submitters = replace_entries(&mut state, reports);
        state.generation += 1;
        submitters
    }

    /// Like [`reload`](Self::reload), but only if no patch landed since
    /// `observed` was read. Returns `None` when the reload was dropped.
    pub fn reload_if_current(
        &self,
        reports: Vec<Report>,
        observed: u64,
    ) -> Option<Vec<SubmitterRef>> {
        let mut state = self.write();
        if state.generation != observed {
            return None;
        }
        Some(replace_entries(&mut state, reports))
    }

    /// Apply `mutate` to the entry for `id` and re-render its summary.
    /// Returns false, touching nothing, when no entry matches.
    pub fn patch<F>(&self, id: ReportId, mutate: F) -> bool
    where
        F: FnOnce(&mut Report),
    {
        let mut state = self.write();
        let Some(entry) = state.entries.get_mut(&id) else {
            return false;
        };
        mutate(&mut entry.report);
        entry.report.id = id;
        entry.summary = render_summary(&entry.report);
        state.generation += 1;
        true
    }

    pub fn append(&self, report: Report) {
        let mut state = self.write();
        state.high_water = state.high_water.max(report.id);
        state.entries.insert(report.id, CachedReport::new(report));
        state.generation += 1;
    }

    pub fn remove(&self, id: ReportId) -> bool {
        let mut state = self.write();
        let removed = state.entries.remove(&id).is_some();
        if removed {
            state.generation += 1;
        }
        removed
    }

    /// Largest id this cache has ever held, or `None` while it is cold.
    /// Deleting the newest report does not lower it.
    pub fn max_id(&self) -> Option<ReportId> {
        let state = self.read();
        state.warm.then_some(state.high_water)
    }

    pub fn get(&self, id: ReportId) -> Option<CachedReport> {
        self.read().entries.get(&id).cloned()
    }

    /// Entries ordered by id ascending.
    pub fn snapshot(&self) -> Vec<CachedReport> {
        self.read().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn replace_entries(state: &mut CacheState, reports: Vec<Report>) -> Vec<SubmitterRef> {
    let mut submitters = BTreeSet::new();
    let mut entries = BTreeMap::new();
    for report in reports {
        submitters.insert(SubmitterRef {
            submitter_id: report.submitter_id.clone(),
            submitter_name: report.submitter_name.clone(),
        });
        entries.insert(report.id, CachedReport::new(report));
    }
    if let Some(&max) = entries.keys().next_back() {
        state.high_water = state.high_water.max(max);
    }
    state.entries = entries;
    state.warm = true;
    submitters.into_iter().collect()
}
