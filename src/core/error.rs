use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store operation failed: {}", .0.as_str())]
    StoreFailure(FailureKind),
}

/// Failure taxonomy surfaced to callers that need to tell "no data" apart from
/// "store unreachable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connectivity,
    Corruption,
    Constraint,
    Internal,
}

impl FailureKind {
    pub fn classify(err: &ReportError) -> Self {
        match err {
            ReportError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => {
                match code.code {
                    rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                        FailureKind::Corruption
                    }
                    rusqlite::ErrorCode::ConstraintViolation
                    | rusqlite::ErrorCode::TypeMismatch => FailureKind::Constraint,
                    _ => FailureKind::Connectivity,
                }
            }
            ReportError::RusqliteError(
                rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::IntegralValueOutOfRange(..),
            ) => FailureKind::Constraint,
            ReportError::RusqliteError(_) | ReportError::IoError(_) => FailureKind::Connectivity,
            ReportError::ValidationError(_) | ReportError::NotFound(_) => FailureKind::Constraint,
            ReportError::ConfigError(_) => FailureKind::Internal,
            ReportError::StoreFailure(kind) => *kind,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connectivity => "connectivity",
            FailureKind::Corruption => "corruption",
            FailureKind::Constraint => "constraint",
            FailureKind::Internal => "internal",
        }
    }
}

/// Fail-soft result handed across the store boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Empty,
    Failed(FailureKind),
}

impl<T> Outcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            Outcome::Empty | Outcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(kind) => Outcome::Failed(kind),
        }
    }

    pub fn and_then<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Outcome::Ok(v) => f(v),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(kind) => Outcome::Failed(kind),
        }
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.into_option().unwrap_or_default()
    }
}

impl<T> Outcome<Option<T>> {
    /// Collapse a successful-but-absent lookup into `Empty`.
    pub fn flatten(self) -> Outcome<T> {
        self.and_then(Outcome::from)
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Outcome::Ok(v),
            None => Outcome::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> ReportError {
        ReportError::RusqliteError(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            None,
        ))
    }

    #[test]
    fn classify_maps_sqlite_codes() {
        assert_eq!(
            FailureKind::classify(&sqlite_failure(rusqlite::ffi::SQLITE_CORRUPT)),
            FailureKind::Corruption
        );
        assert_eq!(
            FailureKind::classify(&sqlite_failure(rusqlite::ffi::SQLITE_NOTADB)),
            FailureKind::Corruption
        );
        assert_eq!(
            FailureKind::classify(&sqlite_failure(rusqlite::ffi::SQLITE_BUSY)),
            FailureKind::Connectivity
        );
        assert_eq!(
            FailureKind::classify(&sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT)),
            FailureKind::Constraint
        );
    }

    #[test]
    fn outcome_defaults_are_fail_soft() {
        let failed: Outcome<Vec<i64>> = Outcome::Failed(FailureKind::Connectivity);
        assert!(failed.is_failed());
        assert!(failed.unwrap_or_default().is_empty());

        let empty: Outcome<Vec<i64>> = Outcome::Empty;
        assert!(!empty.is_failed());

        let ok = Outcome::Ok(3).map(|v| v * 2);
        assert_eq!(ok.into_option(), Some(6));
    }
}
