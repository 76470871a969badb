//! Centralized schema definitions for the report database.
//!
//! Table and column names used in DDL live here and nowhere else. They are the
//! only identifiers ever formatted into SQL text; every value goes through
//! bound parameters.

pub const REPORTS_TABLE: &str = "bug_reports";
pub const PLAYER_DATA_TABLE: &str = "player_data";

/// Base shape of the reports table as first shipped. Later columns are added
/// by the migrator so older database files converge on the same layout.
pub const REPORTS_DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS bug_reports (
        player_id TEXT,
        header TEXT,
        message TEXT,
        username TEXT,
        world TEXT,
        archived INTEGER DEFAULT 0,
        report_id INTEGER,
        timestamp BIGINT
    )
";

pub const PLAYER_DATA_DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS player_data (
        player_id TEXT,
        last_login_timestamp BIGINT DEFAULT 0
    )
";

pub const REPORTS_DB_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_bug_reports_report_id ON bug_reports(report_id)";

/// An additive column the migrator guarantees.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

pub const EXPECTED_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        table: PLAYER_DATA_TABLE,
        column: "last_login_timestamp",
        definition: "BIGINT DEFAULT 0",
    },
    ColumnSpec {
        table: REPORTS_TABLE,
        column: "archived",
        definition: "INTEGER DEFAULT 0",
    },
    ColumnSpec {
        table: REPORTS_TABLE,
        column: "report_id",
        definition: "INTEGER",
    },
    ColumnSpec {
        table: REPORTS_TABLE,
        column: "timestamp",
        definition: "BIGINT",
    },
    ColumnSpec {
        table: REPORTS_TABLE,
        column: "location",
        definition: "TEXT",
    },
    ColumnSpec {
        table: REPORTS_TABLE,
        column: "gamemode",
        definition: "TEXT",
    },
    ColumnSpec {
        table: REPORTS_TABLE,
        column: "category_id",
        definition: "INTEGER",
    },
];

/// Column list every report read selects, in `Report::from_row` order.
pub const REPORT_COLUMNS: &str = "report_id, player_id, username, world, location, gamemode, message, category_id, archived, timestamp";
