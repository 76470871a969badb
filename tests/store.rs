use bugreport::core::config::StoreConfig;
use bugreport::core::error::Outcome;
use bugreport::reports::cache::SubmitterRef;
use bugreport::reports::hooks::ReportHooks;
use bugreport::reports::model::{Location, Report, SubmitterInfo, Transition};
use bugreport::reports::store::{ReportStore, SubmitOutcome};
use bugreport::reports::summary::{ARCHIVED_PREFIX, REPORT_ID_PREFIX, read_line};
use bugreport::reports::tokens::Action;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

fn open_store() -> (TempDir, ReportStore) {
    let tmp = tempdir().unwrap();
    let config = StoreConfig::for_database(tmp.path().join("reports.db"));
    let store = ReportStore::open(config).unwrap();
    (tmp, store)
}

fn submitter(n: usize) -> SubmitterInfo {
    SubmitterInfo {
        submitter_id: format!("00000000-0000-0000-0000-{:012}", n),
        submitter_name: format!("player{}", n),
        location: Location {
            environment: "overworld".to_string(),
            x: n as f64,
            y: 64.0,
            z: -12.5,
        },
        mode: "SURVIVAL".to_string(),
    }
}

fn submit(store: &ReportStore, n: usize) -> Report {
    match store.submit(submitter(n), &format!("bug number {}", n), Some(1)) {
        SubmitOutcome::Submitted { report } => report,
        other => panic!("submission failed: {other:?}"),
    }
}

fn ids(store: &ReportStore, archived: bool) -> Vec<i64> {
    store
        .list(archived)
        .into_option()
        .expect("list")
        .iter()
        .map(|e| e.report.id)
        .collect()
}

fn assert_summaries_consistent(store: &ReportStore) {
    for archived in [false, true] {
        for entry in store.list(archived).into_option().unwrap() {
            let id = entry.report.id.to_string();
            let flag = u8::from(entry.report.archived).to_string();
            assert_eq!(read_line(&entry.summary, REPORT_ID_PREFIX), Some(id.as_str()));
            assert_eq!(read_line(&entry.summary, ARCHIVED_PREFIX), Some(flag.as_str()));
        }
    }
    for entry in store.cache().snapshot() {
        let id = entry.report.id.to_string();
        assert_eq!(read_line(&entry.summary, REPORT_ID_PREFIX), Some(id.as_str()));
    }
}

#[test]
fn sequential_submissions_get_ids_one_to_n() {
    let (_tmp, store) = open_store();
    let assigned: Vec<i64> = (0..12).map(|n| submit(&store, n).id).collect();
    assert_eq!(assigned, (1..=12).collect::<Vec<_>>());
    assert_eq!(ids(&store, false), (1..=12).collect::<Vec<_>>());
}

#[test]
fn archive_moves_report_between_lists() {
    let (_tmp, store) = open_store();
    for n in 0..3 {
        submit(&store, n);
    }

    assert_eq!(store.set_archive_state(2, true), Outcome::Ok(Transition::Applied));
    assert_eq!(ids(&store, false), vec![1, 3]);
    assert_eq!(ids(&store, true), vec![2]);

    assert_eq!(store.set_archive_state(2, false), Outcome::Ok(Transition::Applied));
    assert_eq!(ids(&store, false), vec![1, 2, 3]);
    assert!(ids(&store, true).is_empty());
}

#[test]
fn ids_are_not_reused_after_delete() {
    let (_tmp, store) = open_store();
    for n in 0..3 {
        submit(&store, n);
    }
    assert_eq!(store.delete(1), Outcome::Ok(Transition::Applied));
    assert_eq!(submit(&store, 9).id, 4);
    assert_eq!(ids(&store, false), vec![2, 3, 4]);
}

#[test]
fn deleting_the_highest_id_still_advances() {
    let (_tmp, store) = open_store();
    for n in 0..3 {
        submit(&store, n);
    }
    store.delete(3);
    assert_eq!(submit(&store, 4).id, 4);
}

#[test]
fn repeated_archive_is_idempotent() {
    let (_tmp, store) = open_store();
    submit(&store, 1);
    assert_eq!(store.set_archive_state(1, true), Outcome::Ok(Transition::Applied));
    assert_eq!(store.set_archive_state(1, true), Outcome::Ok(Transition::Unchanged));
    let report = store.get(1).into_option().unwrap();
    assert!(report.archived);
    assert_eq!(ids(&store, true), vec![1]);
}

#[test]
fn repeated_delete_is_a_noop() {
    let (_tmp, store) = open_store();
    submit(&store, 1);
    submit(&store, 2);
    assert_eq!(store.delete(1), Outcome::Ok(Transition::Applied));
    assert_eq!(store.delete(1), Outcome::Ok(Transition::Missing));
    assert_eq!(ids(&store, false), vec![2]);
    assert_eq!(store.get(1), Outcome::Empty);
}

#[test]
fn archive_of_unknown_id_reports_missing() {
    let (_tmp, store) = open_store();
    assert_eq!(store.set_archive_state(77, true), Outcome::Ok(Transition::Missing));
}

#[test]
fn summaries_track_authoritative_fields_through_mutations() {
    let (_tmp, store) = open_store();
    for n in 0..6 {
        submit(&store, n);
    }
    store.set_archive_state(2, true);
    store.set_archive_state(5, true);
    store.delete(3);
    store.set_archive_state(5, false);
    submit(&store, 7);
    store.set_archive_state(7, true);

    assert_summaries_consistent(&store);
    assert_eq!(ids(&store, false), vec![1, 4, 5, 6]);
    assert_eq!(ids(&store, true), vec![2, 7]);
}

#[test]
fn pages_follow_configured_size() {
    let tmp = tempdir().unwrap();
    let mut config = StoreConfig::for_database(tmp.path().join("reports.db"));
    config.limits.max_reports_per_submitter = 0;
    let store = ReportStore::open(config).unwrap();
    for _ in 0..(27 * 2 + 4) {
        submit(&store, 1);
    }

    let first = store.page(false, 1).into_option().unwrap();
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.items.len(), 27);
    assert_eq!(first.items[0].report.id, 1);

    let last = store.page(false, 40).into_option().unwrap();
    assert_eq!(last.current_page, 3);
    assert_eq!(last.items.len(), 4);
    assert_eq!(last.items[3].report.id, 58);

    let archived = store.page(true, 1).into_option().unwrap();
    assert_eq!(archived.total_pages, 1);
    assert!(archived.items.is_empty());
}

#[test]
fn quota_blocks_further_submissions() {
    let tmp = tempdir().unwrap();
    let mut config = StoreConfig::for_database(tmp.path().join("reports.db"));
    config.limits.max_reports_per_submitter = 2;
    let store = ReportStore::open(config).unwrap();

    submit(&store, 1);
    submit(&store, 1);
    assert_eq!(
        store.submit(submitter(1), "third", None),
        SubmitOutcome::QuotaExceeded { limit: 2 }
    );
    assert_eq!(submit(&store, 2).id, 3);
}

#[test]
fn blank_body_is_rejected_without_writing() {
    let (_tmp, store) = open_store();
    assert!(matches!(
        store.submit(submitter(1), "   \n", None),
        SubmitOutcome::Rejected { .. }
    ));
    assert_eq!(store.stats().into_option().unwrap().total, 0);
}

#[test]
fn action_tokens_redeem_once() {
    let (_tmp, store) = open_store();
    submit(&store, 1);
    submit(&store, 2);

    let archive = store.issue_action(1, Action::Archive).into_option().unwrap();
    assert_eq!(store.redeem(&archive), Outcome::Ok(Transition::Applied));
    assert_eq!(store.redeem(&archive), Outcome::Ok(Transition::Stale));

    let delete = store.issue_action(2, Action::Delete).into_option().unwrap();
    let unarchive = store.issue_action(2, Action::Unarchive).into_option().unwrap();
    assert_eq!(store.redeem(&delete), Outcome::Ok(Transition::Applied));
    assert_eq!(store.redeem(&unarchive), Outcome::Ok(Transition::Stale));
    assert_eq!(ids(&store, true), vec![1]);
}

#[test]
fn tokens_are_refused_for_unknown_reports_and_revocable() {
    let (_tmp, store) = open_store();
    submit(&store, 1);

    assert_eq!(store.issue_action(42, Action::Delete), Outcome::Empty);

    let tokens: Vec<_> = [Action::Archive, Action::Unarchive, Action::Delete]
        .into_iter()
        .map(|a| store.issue_action(1, a).into_option().unwrap())
        .collect();
    assert_eq!(store.revoke_actions(&tokens), 3);
    assert_eq!(store.revoke_actions(&tokens), 0);
    assert_eq!(store.redeem(&tokens[0]), Outcome::Ok(Transition::Stale));
    assert_eq!(ids(&store, false), vec![1]);
}

#[test]
fn location_and_detail_lookup() {
    let (_tmp, store) = open_store();
    let report = submit(&store, 3);

    let location = store.get_location(report.id).into_option().unwrap();
    assert_eq!(location.environment, "overworld");
    assert_eq!(location.x, 3.0);
    assert_eq!(location.z, -12.5);
    assert_eq!(store.get_location(999), Outcome::Empty);

    let detail = store.get(report.id).into_option().unwrap();
    assert_eq!(detail, report);
}

#[test]
fn login_is_upserted() {
    let (_tmp, store) = open_store();
    assert_eq!(store.last_login("abc"), Outcome::Empty);
    assert_eq!(store.record_login("abc"), Outcome::Ok(()));
    let first = store.last_login("abc").into_option().unwrap();
    std::thread::sleep(Duration::from_millis(5));
    store.record_login("abc");
    let second = store.last_login("abc").into_option().unwrap();
    assert!(second >= first);
}

#[test]
fn stats_count_by_state_and_submitter() {
    let (_tmp, store) = open_store();
    submit(&store, 1);
    submit(&store, 1);
    submit(&store, 2);
    store.set_archive_state(2, true);

    let all = store.stats().into_option().unwrap();
    assert_eq!((all.total, all.open, all.archived), (3, 2, 1));
    let one = store
        .submitter_stats(&submitter(1).submitter_id)
        .into_option()
        .unwrap();
    assert_eq!((one.total, one.open, one.archived), (2, 1, 1));
}

#[test]
fn history_reads_by_display_name() {
    let (_tmp, store) = open_store();
    submit(&store, 1);
    submit(&store, 2);
    submit(&store, 1);
    let history = store.history_for("player1").into_option().unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|(_, body)| body == "bug number 1"));
    assert_eq!(store.bodies_per_submitter().into_option().unwrap().len(), 3);
}

#[test]
fn reopening_continues_id_sequence() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("reports.db");
    {
        let store = ReportStore::open(StoreConfig::for_database(&path)).unwrap();
        submit(&store, 1);
        submit(&store, 2);
        store.set_archive_state(2, true);
    }
    let store = ReportStore::open(StoreConfig::for_database(&path)).unwrap();
    assert!(store.migration_report().is_clean());
    assert_eq!(store.config().listing.page_size, 27);
    assert_eq!(store.cache().max_id(), Some(2));
    assert_eq!(submit(&store, 3).id, 3);
    assert_eq!(ids(&store, true), vec![2]);
}

#[derive(Debug, PartialEq)]
enum HookEvent {
    Created(i64),
    Webhook(String, i64),
    Seen(String),
}

struct RecordingHooks {
    tx: Mutex<Sender<HookEvent>>,
    fail: bool,
}

impl RecordingHooks {
    fn send(&self, event: HookEvent) {
        let _ = self.tx.lock().unwrap().send(event);
    }
}

impl ReportHooks for RecordingHooks {
    fn report_created(&self, report: &Report) -> Result<(), String> {
        self.send(HookEvent::Created(report.id));
        if self.fail {
            return Err("notification channel down".to_string());
        }
        Ok(())
    }

    fn webhook(&self, url: &str, report: &Report) -> Result<(), String> {
        self.send(HookEvent::Webhook(url.to_string(), report.id));
        if self.fail {
            panic!("webhook client crashed");
        }
        Ok(())
    }

    fn submitter_seen(&self, submitter: &SubmitterRef) {
        self.send(HookEvent::Seen(submitter.submitter_name.clone()));
    }
}

fn collect_events(rx: &mpsc::Receiver<HookEvent>) -> Vec<HookEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.recv_timeout(Duration::from_millis(500)) {
        out.push(event);
    }
    out
}

#[test]
fn hooks_fire_off_thread_and_respect_config() {
    let tmp = tempdir().unwrap();
    let mut config = StoreConfig::for_database(tmp.path().join("reports.db"));
    config.notifications.webhook_enabled = true;
    config.notifications.webhook_url = "https://hooks.example.invalid/x".to_string();
    let (tx, rx) = mpsc::channel();
    let hooks = Arc::new(RecordingHooks {
        tx: Mutex::new(tx),
        fail: false,
    });
    let store = ReportStore::open_with_hooks(config, hooks).unwrap();

    submit(&store, 1);
    store.list(false);

    let events = collect_events(&rx);
    assert!(events.contains(&HookEvent::Created(1)));
    assert!(events.contains(&HookEvent::Webhook(
        "https://hooks.example.invalid/x".to_string(),
        1
    )));
    assert!(events.contains(&HookEvent::Seen("player1".to_string())));
}

#[test]
fn disabled_notifications_skip_hooks() {
    let tmp = tempdir().unwrap();
    let mut config = StoreConfig::for_database(tmp.path().join("reports.db"));
    config.notifications.enabled = false;
    config.notifications.webhook_enabled = true;
    let (tx, rx) = mpsc::channel();
    let hooks = Arc::new(RecordingHooks {
        tx: Mutex::new(tx),
        fail: false,
    });
    let store = ReportStore::open_with_hooks(config, hooks).unwrap();

    submit(&store, 1);
    let events = collect_events(&rx);
    assert!(!events.iter().any(|e| matches!(e, HookEvent::Created(_))));
    // Enabled webhook without a URL is logged and skipped.
    assert!(!events.iter().any(|e| matches!(e, HookEvent::Webhook(..))));
}

#[test]
fn failing_hooks_do_not_affect_submission() {
    let tmp = tempdir().unwrap();
    let mut config = StoreConfig::for_database(tmp.path().join("reports.db"));
    config.notifications.webhook_enabled = true;
    config.notifications.webhook_url = "https://hooks.example.invalid/x".to_string();
    config.notifications.dispatch_timeout_ms = 50;
    let (tx, rx) = mpsc::channel();
    let hooks = Arc::new(RecordingHooks {
        tx: Mutex::new(tx),
        fail: true,
    });
    let store = ReportStore::open_with_hooks(config, hooks).unwrap();

    let report = submit(&store, 1);
    assert_eq!(report.id, 1);
    let _ = collect_events(&rx);
    assert_eq!(ids(&store, false), vec![1]);
    assert_eq!(submit(&store, 2).id, 2);
}
