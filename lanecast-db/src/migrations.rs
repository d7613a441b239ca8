use std::error::Error;

use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::info;
use miette::Diagnostic;
use thiserror::Error;

use crate::conn::{ConnectError, establish};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../migrations");

#[derive(Debug, Error, Diagnostic)]
pub enum MigrationError {
    #[error("couldn't connect to database")]
    FailedToConnectToDatabase(#[source] ConnectError),

    #[error("error running migrations")]
    FailedToRunMigrations(#[source] Box<dyn Error + Send + Sync>),
}

/// Migrations are additive and idempotent; re-running against an existing
/// database is a no-op. SQLite serializes the schema writes itself, so there
/// is no separate migration lock.
pub fn run_migrations(db_path: &str) -> Result<(), MigrationError> {
    let mut conn = establish(db_path).map_err(MigrationError::FailedToConnectToDatabase)?;
    run_migrations_on(&mut conn)
}

pub fn run_migrations_on(conn: &mut diesel::SqliteConnection) -> Result<(), MigrationError> {
    info!("Running any pending migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(MigrationError::FailedToRunMigrations)?;

    info!("Migrations finished");
    Ok(())
}
