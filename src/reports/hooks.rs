//! Collaborator callbacks fired by the store, always off the calling thread.

use crate::reports::cache::SubmitterRef;
use crate::reports::model::Report;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Consumers of store events. Every method defaults to a no-op, and none of
/// them can affect the outcome of the operation that triggered them.
pub trait ReportHooks: Send + Sync + 'static {
    /// In-process notification that a report was filed.
    fn report_created(&self, _report: &Report) -> Result<(), String> {
        Ok(())
    }

    /// Outbound webhook delivery. Only called when a webhook is configured.
    fn webhook(&self, _url: &str, _report: &Report) -> Result<(), String> {
        Ok(())
    }

    /// Identity/avatar lookup for a submitter seen during a reload.
    fn submitter_seen(&self, _submitter: &SubmitterRef) {}
}

#[derive(Debug, Default)]
pub struct NoopHooks;

impl ReportHooks for NoopHooks {}

/// Run `task` on a detached thread. A watchdog logs when it overruns
/// `timeout`; nothing waits on either thread.
pub(crate) fn dispatch<F>(name: &'static str, timeout: Duration, task: F)
where
    F: FnOnce() -> Result<(), String> + Send + 'static,
{
    let (done_tx, done_rx) = mpsc::channel::<Result<(), String>>();
    let spawned = thread::Builder::new()
        .name(format!("hook-{}", name))
        .spawn(move || {
            let _ = done_tx.send(task());
        });
    if let Err(err) = spawned {
        warn!(event = "hook_spawn_failed", hook = name, error = %err);
        return;
    }

    let watchdog = thread::Builder::new()
        .name(format!("hook-{}-watchdog", name))
        .spawn(move || match done_rx.recv_timeout(timeout) {
            Ok(Ok(())) => debug!(event = "hook_done", hook = name),
            Ok(Err(err)) => warn!(event = "hook_failed", hook = name, error = %err),
            Err(mpsc::RecvTimeoutError::Timeout) => warn!(
                event = "hook_timeout",
                hook = name,
                timeout_ms = timeout.as_millis() as u64
            ),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!(event = "hook_panicked", hook = name)
            }
        });
    if let Err(err) = watchdog {
        warn!(event = "hook_spawn_failed", hook = name, error = %err);
    }
}

/// Fan out identity lookups for `submitters` on one background thread.
pub(crate) fn dispatch_submitters(hooks: Arc<dyn ReportHooks>, submitters: Vec<SubmitterRef>) {
    if submitters.is_empty() {
        return;
    }
    let spawned = thread::Builder::new()
        .name("hook-submitter-seen".to_string())
        .spawn(move || {
            for submitter in &submitters {
                hooks.submitter_seen(submitter);
            }
        });
    if let Err(err) = spawned {
        warn!(event = "hook_spawn_failed", hook = "submitter_seen", error = %err);
    }
}
