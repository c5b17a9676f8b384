mod repository;

pub mod expenses;
pub mod ledger;
pub mod parts;
pub mod service_records;
pub mod tractors;
pub mod users;

pub use ledger::IntegrityStats;
pub use repository::*;

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::parse_date;

pub(crate) fn decode_date(raw: &str, column: &'static str) -> Result<NaiveDate> {
    parse_date(raw).with_context(|| format!("Invalid {column} date: {raw}"))
}

pub(crate) fn decode_timestamp(raw: &str, column: &'static str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid {column} timestamp: {raw}"))?
        .with_timezone(&Utc))
}

/// True when the error chain carries a SQLite UNIQUE constraint failure.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

/// True when the error chain carries a SQLite FOREIGN KEY constraint failure.
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_foreign_key_violation())
}
