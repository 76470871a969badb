//! Shared infrastructure: configuration, errors, SQLite access, and migration.

pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod output;
pub mod pool;
pub mod schemas;
pub mod time;
