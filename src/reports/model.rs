use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ReportId = i64;

/// Point in a named environment where a report was filed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub environment: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.environment, self.x, self.y, self.z)
    }
}

impl FromStr for Location {
    type Err = String;

    /// Parses `env,x,y,z`; whitespace around fields is tolerated since older
    /// rows were written as `env, x, y, z`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [environment, x, y, z] = parts.as_slice() else {
            return Err(format!("expected 4 comma-separated fields, got {}", parts.len()));
        };
        if environment.is_empty() {
            return Err("empty environment name".to_string());
        }
        let coord = |v: &str| {
            v.parse::<f64>()
                .map_err(|e| format!("invalid coordinate '{}': {}", v, e))
        };
        Ok(Location {
            environment: environment.to_string(),
            x: coord(*x)?,
            y: coord(*y)?,
            z: coord(*z)?,
        })
    }
}

/// Identity and context captured at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitterInfo {
    pub submitter_id: String,
    pub submitter_name: String,
    pub location: Location,
    pub mode: String,
}

/// A filed report. Everything except `archived` is immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub submitter_id: String,
    pub submitter_name: String,
    pub environment_name: String,
    pub location: Option<Location>,
    pub mode: String,
    pub body: String,
    pub category_id: Option<i64>,
    pub archived: bool,
    pub created_at: i64,
}

impl Report {
    /// Build from a row selected with `schemas::REPORT_COLUMNS`. Nullable
    /// legacy columns default instead of failing the whole scan.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let location: Option<String> = row.get(4)?;
        Ok(Report {
            id: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
            submitter_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            submitter_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            environment_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            location: location.and_then(|s| s.parse().ok()),
            mode: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            body: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            category_id: row.get(7)?,
            archived: row.get::<_, Option<i64>>(8)?.unwrap_or(0) != 0,
            created_at: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
        })
    }
}

/// A report before an id has been assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub submitter: SubmitterInfo,
    pub body: String,
    pub category_id: Option<i64>,
    pub created_at: i64,
}

/// Closed set of predicates `count_where` accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountFilter {
    All,
    Archived(bool),
    BySubmitter(String),
    BySubmitterArchived(String, bool),
}

/// What a moderation write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Applied,
    /// Target state already held; nothing written.
    Unchanged,
    /// No report with that id.
    Missing,
    /// Action token was already used or invalidated.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total: i64,
    pub open: i64,
    pub archived: i64,
}
