//! Single-use handles for moderation actions.
//!
//! A view issues one token per button it renders; the first redemption
//! consumes it, so a repeated click on a view that has not yet been torn down
//! cannot replay the action.

use crate::reports::model::ReportId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Archive,
    Unarchive,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionToken(String);

impl ActionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub report_id: ReportId,
    pub action: Action,
}

/// How long an unredeemed token stays valid. Views are expected to be torn
/// down well before this.
pub const ACTION_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct Entry {
    pending: PendingAction,
    issued_at: Instant,
}

#[derive(Debug)]
pub struct ActionLedger {
    pending: Mutex<HashMap<ActionToken, Entry>>,
    ttl: Duration,
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self::with_ttl(ACTION_TOKEN_TTL)
    }
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a token. Expired tokens are swept first so abandoned views do
    /// not accumulate.
    pub fn issue(&self, report_id: ReportId, action: Action) -> ActionToken {
        let token = ActionToken(Ulid::new().to_string());
        let now = Instant::now();
        let mut pending = self.lock();
        pending.retain(|_, e| !self.expired(e, now));
        pending.insert(
            token.clone(),
            Entry {
                pending: PendingAction { report_id, action },
                issued_at: now,
            },
        );
        token
    }

    /// Consume `token`. Only the first call within the ttl returns the action.
    pub fn take(&self, token: &ActionToken) -> Option<PendingAction> {
        let entry = self.lock().remove(token)?;
        if self.expired(&entry, Instant::now()) {
            return None;
        }
        Some(entry.pending)
    }

    /// Drop tokens a closed view no longer needs. Returns how many were live.
    pub fn revoke(&self, tokens: &[ActionToken]) -> usize {
        let mut pending = self.lock();
        tokens.iter().filter(|t| pending.remove(*t).is_some()).count()
    }

    /// Drop every outstanding token aimed at `report_id`.
    pub fn invalidate_report(&self, report_id: ReportId) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, e| e.pending.report_id != report_id);
        before - pending.len()
    }

    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.issued_at) >= self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ActionToken, Entry>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_redeems_once() {
        let ledger = ActionLedger::new();
        let token = ledger.issue(7, Action::Archive);
        assert_eq!(
            ledger.take(&token),
            Some(PendingAction {
                report_id: 7,
                action: Action::Archive
            })
        );
        assert_eq!(ledger.take(&token), None);
    }

    #[test]
    fn tokens_are_distinct_ulids() {
        let ledger = ActionLedger::new();
        let a = ledger.issue(1, Action::Delete);
        let b = ledger.issue(1, Action::Delete);
        assert_ne!(a, b);
        assert!(Ulid::from_string(a.as_str()).is_ok());
    }

    #[test]
    fn invalidate_drops_only_matching_report() {
        let ledger = ActionLedger::new();
        let stale = ledger.issue(1, Action::Archive);
        ledger.issue(1, Action::Delete);
        let keep = ledger.issue(2, Action::Archive);
        assert_eq!(ledger.invalidate_report(1), 2);
        assert_eq!(ledger.take(&stale), None);
        assert!(ledger.take(&keep).is_some());
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn abandoned_tokens_do_not_pile_up() {
        let ledger = ActionLedger::with_ttl(Duration::ZERO);
        let mut last = None;
        for id in 0..50 {
            last = Some(ledger.issue(id, Action::Archive));
        }
        assert_eq!(ledger.outstanding(), 1);
        assert_eq!(ledger.take(&last.unwrap()), None);
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn revoke_drops_only_listed_tokens() {
        let ledger = ActionLedger::new();
        let a = ledger.issue(1, Action::Archive);
        let b = ledger.issue(1, Action::Delete);
        let c = ledger.issue(2, Action::Unarchive);
        assert_eq!(ledger.revoke(&[a.clone(), b.clone()]), 2);
        assert_eq!(ledger.revoke(&[a]), 0);
        assert_eq!(ledger.outstanding(), 1);
        assert!(ledger.take(&b).is_none());
        assert!(ledger.take(&c).is_some());
    }
}
