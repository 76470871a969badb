use crate::core::error::ReportError;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Open a connection with the bounded busy timeout that doubles as the
/// acquisition timeout for the store.
pub fn db_connect(db_path: &Path, busy_timeout: Duration) -> Result<Connection, ReportError> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    Ok(conn)
}

/// True when `table` has a column named `column`.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, ReportError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Name that reaches the implicit rowid of `table`. Older databases declare an
/// ordinary column called `rowid`, which hides the real one under that name.
pub fn rowid_alias(conn: &Connection, table: &str) -> Result<&'static str, ReportError> {
    for alias in ["rowid", "_rowid_", "oid"] {
        if !column_exists(conn, table, alias)? {
            return Ok(alias);
        }
    }
    Err(ReportError::ValidationError(format!(
        "{} declares columns shadowing every rowid alias",
        table
    )))
}
