//! bugreport: a report store for live multi-user environments.
//!
//! Players file free-text reports tagged with who, where, and in what mode
//! they were. Operators page through them, archive, restore, and delete.
//!
//! # Architecture
//!
//! - [`crate::core::migration`] brings the SQLite file up to the expected shape on
//!   every start (additive columns, id and summary repairs)
//! - [`reports::gateway`] is the only code that issues SQL; it is fail-soft
//!   and reports failures as [`crate::core::error::Outcome::Failed`]
//! - [`reports::cache`] is the in-memory projection the rendering layer reads
//! - [`reports::store`] serializes mutations, writes through the gateway
//!   first and patches the cache second
//! - [`reports::pagination`] is the pure filter/sort/window step
//!
//! # Examples
//!
//! ```bash
//! bugreport submit --submitter-id 6f1c --name steve --location overworld,10,64,-3 "chest dupes items"
//! bugreport list --page 2
//! bugreport archive 4
//! bugreport --format json list --archived
//! ```

pub mod core;
pub mod reports;

mod cli;

use cli::{Cli, Command, OutputFormat};
use crate::core::config;
use crate::core::error::{Outcome, ReportError};
use crate::core::{output, time};
use crate::reports::model::{Location, SubmitterInfo, Transition};
use crate::reports::store::{ReportStore, SubmitOutcome};

use clap::Parser;
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` wins, then
/// `BUGREPORT_LOG_LEVEL`, then `info`. Logs go to stderr so JSON output on
/// stdout stays machine-readable.
pub fn init_logging() {
    let level = std::env::var("BUGREPORT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> Result<(), ReportError> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;
    let store = ReportStore::open(config)?;
    let format = cli.format;

    match cli.command {
        Command::Migrate => {
            let report = store.migration_report();
            if format == OutputFormat::Json {
                let status = if report.is_clean() { "ok" } else { "degraded" };
                print_json("migrate", status, json!({ "migration": report }));
            } else {
                for step in &report.completed {
                    if step.changed > 0 {
                        println!("{} {} ({} changed)", "●".bright_cyan(), step.name, step.changed);
                    }
                }
                for failure in &report.failed {
                    println!("{} {}: {}", "✗".bright_red(), failure.name, failure.error);
                }
                println!(
                    "{} schema ready, {} change(s), {} failed step(s)",
                    "✓".bright_green(),
                    report.total_changed(),
                    report.failed.len()
                );
            }
        }
        Command::Submit {
            submitter_id,
            name,
            location,
            mode,
            category,
            body,
        } => {
            let location: Location = location
                .parse()
                .map_err(|e| ReportError::ValidationError(format!("--location: {}", e)))?;
            let submitter = SubmitterInfo {
                submitter_id,
                submitter_name: name,
                location,
                mode,
            };
            match store.submit(submitter, &body, category) {
                SubmitOutcome::Submitted { report } => {
                    if format == OutputFormat::Json {
                        print_json("submit", "ok", json!({ "report": report }));
                    } else {
                        println!("{} report #{} filed", "✓".bright_green(), report.id);
                    }
                }
                SubmitOutcome::QuotaExceeded { limit } => {
                    return Err(ReportError::ValidationError(format!(
                        "submitter already has {} reports (limit)",
                        limit
                    )));
                }
                SubmitOutcome::Rejected { reason } => {
                    return Err(ReportError::ValidationError(reason));
                }
                SubmitOutcome::Failed { kind } => return Err(ReportError::StoreFailure(kind)),
            }
        }
        Command::List { archived, page } => {
            let page = settle(store.page(archived, page))?.unwrap_or_else(|| store.paginate(&[], 1));
            if format == OutputFormat::Json {
                print_json("list", "ok", json!({ "archived": archived, "page": page }));
            } else {
                let heading = if archived { "Archived reports" } else { "Open reports" };
                println!(
                    "{} ({}, {} total)",
                    heading.bold(),
                    output::page_indicator(page.current_page, page.total_pages),
                    page.total_items
                );
                if page.items.is_empty() {
                    println!("  {}", "no reports".dimmed());
                }
                for entry in &page.items {
                    let r = &entry.report;
                    println!(
                        "  {} {} {}",
                        format!("#{}", r.id).bright_yellow(),
                        r.submitter_name.bright_cyan(),
                        output::preview(&r.body, 60)
                    );
                }
            }
        }
        Command::Show { id } => {
            let report = settle(store.get(id))?
                .ok_or_else(|| ReportError::NotFound(format!("report #{}", id)))?;
            if format == OutputFormat::Json {
                print_json("show", "ok", json!({ "report": report }));
            } else {
                println!("{}", reports::summary::render_summary(&report));
            }
        }
        Command::Archive { id } => {
            let t = settle(store.set_archive_state(id, true))?;
            print_transition("archive", format, id, t);
        }
        Command::Unarchive { id } => {
            let t = settle(store.set_archive_state(id, false))?;
            print_transition("unarchive", format, id, t);
        }
        Command::Delete { id } => {
            let t = settle(store.delete(id))?;
            print_transition("delete", format, id, t);
        }
        Command::Location { id } => match settle(store.get_location(id))? {
            Some(location) => {
                if format == OutputFormat::Json {
                    print_json("location", "ok", json!({ "report_id": id, "location": location }));
                } else {
                    println!("{}", location);
                }
            }
            None => {
                if format == OutputFormat::Json {
                    print_json("location", "unavailable", json!({ "report_id": id }));
                } else {
                    println!("{} location not available for report #{}", "!".yellow(), id);
                }
            }
        },
        Command::Login { submitter_id } => {
            settle(store.record_login(&submitter_id))?;
            if format == OutputFormat::Json {
                print_json("login", "ok", json!({ "submitter_id": submitter_id, "ts": time::now_millis() }));
            } else {
                println!("{} login recorded for {}", "✓".bright_green(), submitter_id);
            }
        }
        Command::Stats { submitter_id } => {
            let stats = match &submitter_id {
                Some(id) => settle(store.submitter_stats(id))?,
                None => settle(store.stats())?,
            }
            .unwrap_or_default();
            if format == OutputFormat::Json {
                print_json("stats", "ok", json!({ "submitter_id": submitter_id, "stats": stats }));
            } else {
                println!(
                    "total {}  open {}  archived {}",
                    stats.total.to_string().bold(),
                    stats.open.to_string().bright_green(),
                    stats.archived.to_string().dimmed()
                );
            }
        }
        Command::History { name } => {
            let history = settle(store.history_for(&name))?.unwrap_or_default();
            if format == OutputFormat::Json {
                let items: Vec<_> = history
                    .iter()
                    .map(|(ts, body)| json!({ "created_at": ts, "body": body }))
                    .collect();
                print_json("history", "ok", json!({ "name": name, "reports": items }));
            } else {
                for (ts, body) in &history {
                    println!("  {} {}", ts.to_string().dimmed(), output::preview(body, 70));
                }
            }
        }
    }

    Ok(())
}

/// `Failed` becomes an error; `Empty` becomes `None`.
fn settle<T>(outcome: Outcome<T>) -> Result<Option<T>, ReportError> {
    match outcome {
        Outcome::Ok(v) => Ok(Some(v)),
        Outcome::Empty => Ok(None),
        Outcome::Failed(kind) => Err(ReportError::StoreFailure(kind)),
    }
}

fn print_json(cmd: &str, status: &str, extra: serde_json::Value) {
    println!("{}", output::Envelope::new(cmd, status, extra));
}

fn print_transition(cmd: &str, format: OutputFormat, id: i64, transition: Option<Transition>) {
    let transition = transition.unwrap_or(Transition::Missing);
    if format == OutputFormat::Json {
        print_json(cmd, "ok", json!({ "report_id": id, "transition": transition }));
        return;
    }
    match transition {
        Transition::Applied => println!("{} {} #{}", "✓".bright_green(), cmd, id),
        Transition::Unchanged => println!("{} #{} already in that state", "·".dimmed(), id),
        Transition::Missing | Transition::Stale => {
            println!("{} no report #{}", "!".yellow(), id)
        }
    }
}
