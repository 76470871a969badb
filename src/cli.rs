//! CLI struct definitions for the `bugreport` command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "bugreport",
    version = env!("CARGO_PKG_VERSION"),
    about = "File, browse, and moderate player bug reports"
)]
pub(crate) struct Cli {
    /// Path to the TOML config file.
    #[clap(long, global = true, default_value = crate::core::config::CONFIG_FILE_NAME)]
    pub config: PathBuf,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run schema migration and data repairs, then exit
    Migrate,
    /// File a new report
    Submit {
        /// Stable identity token of the submitter
        #[clap(long)]
        submitter_id: String,
        /// Display name at time of submission
        #[clap(long)]
        name: String,
        /// Location as `env,x,y,z`
        #[clap(long)]
        location: String,
        /// Mode the submitter was in (e.g. SURVIVAL)
        #[clap(long, default_value = "SURVIVAL")]
        mode: String,
        /// Optional report category
        #[clap(long)]
        category: Option<i64>,
        /// Report text
        body: String,
    },
    /// List one page of reports
    List {
        /// Show archived reports instead of open ones
        #[clap(long)]
        archived: bool,
        /// 1-based page number (clamped into range)
        #[clap(long, default_value_t = 1)]
        page: usize,
    },
    /// Show one report in full
    Show { id: i64 },
    /// Archive a report
    Archive { id: i64 },
    /// Restore an archived report
    Unarchive { id: i64 },
    /// Delete a report permanently
    Delete { id: i64 },
    /// Print where a report was filed
    Location { id: i64 },
    /// Record a session start for a submitter
    Login { submitter_id: String },
    /// Report counts, optionally for one submitter
    Stats {
        #[clap(long)]
        submitter_id: Option<String>,
    },
    /// Every report filed under a display name
    History { name: String },
}
